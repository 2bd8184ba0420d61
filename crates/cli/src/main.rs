use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use nifty_algo_core::{AppConfig, ConfigLoader};
use nifty_algo_engine::{FileSnapshotProvider, TracingNotifier, TradingEngine};
use nifty_algo_execution::PaperBroker;

#[derive(Parser)]
#[command(name = "nifty-algo")]
#[command(about = "Automated NIFTY options trading engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine daemon on its configured signal and monitor cadences
    Run {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Evaluate a single signal tick against the current snapshot and exit
    SignalTick {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Run a single monitoring pass over open positions and exit
    MonitorTick {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Close every open position immediately, regardless of stops and targets
    ForcedClose {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Print the day's risk state and the open position book
    Status {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let engine = start_engine(&config).await?;
            engine.run().await?;
        }
        Commands::SignalTick { config } => {
            let engine = start_engine(&config).await?;
            let outcome = engine.on_signal_tick(Utc::now()).await?;
            match outcome {
                Some(outcome) => println!("signal tick: {outcome:?}"),
                None => println!("signal tick: no trade"),
            }
        }
        Commands::MonitorTick { config } => {
            let engine = start_engine(&config).await?;
            let exits = engine.on_monitor_tick(Utc::now()).await;
            println!("monitor tick: {exits} position(s) exited");
        }
        Commands::ForcedClose { config } => {
            let engine = start_engine(&config).await?;
            let closed = engine.on_forced_close().await;
            println!("forced close: {closed} position(s) closed");
        }
        Commands::Status { config } => {
            let engine = start_engine(&config).await?;
            print_status(&engine);
        }
    }

    Ok(())
}

/// Wires the engine against the paper gateway and the file-based feed.
/// The paper broker fills at the net market value of each order's legs,
/// so dry runs and live quotes stay consistent.
async fn start_engine(config_path: &str) -> anyhow::Result<TradingEngine> {
    let config: AppConfig = ConfigLoader::load(config_path)?;
    tracing::info!(config = config_path, "starting engine");

    let market = Arc::new(FileSnapshotProvider::new(
        config.storage.snapshot_path.clone(),
        config.storage.quotes_path.clone(),
    ));
    let broker = Arc::new(PaperBroker::with_market(market.clone()));
    let notifier = Arc::new(TracingNotifier);

    TradingEngine::start(config, broker, market, notifier).await
}

fn print_status(engine: &TradingEngine) {
    let state = engine.risk_state();
    println!("trading day        {}", state.trading_day);
    println!("realized loss      {}", state.realized_loss_today);
    println!(
        "trades today       {}/{}",
        state.trades_today,
        engine.config().risk.max_trades_per_day
    );
    println!(
        "open positions     {}/{}",
        state.open_positions_count,
        engine.config().risk.max_open_positions
    );
    println!(
        "circuit breaker    {}",
        if state.circuit_breaker_tripped {
            "TRIPPED"
        } else {
            "armed"
        }
    );

    let open = engine.open_positions();
    if open.is_empty() {
        println!("position book      empty");
        return;
    }
    for position in open {
        println!(
            "  {} {} {:?} entry {} stop {} target {} qty {}",
            position.id,
            position.symbol,
            position.strategy,
            position.entry_price,
            position.stop_loss_price,
            position.target_price,
            position.quantity,
        );
    }
}
