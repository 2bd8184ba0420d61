pub mod clock;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod events;
pub mod traits;
pub mod types;

pub use clock::{ClockGate, TradeAction};
pub use config::{
    AppConfig, EngineConfig, ExecutionConfig, RiskConstraints, SessionConfig, SignalConfig,
    SignalWeights, StorageConfig,
};
pub use config_loader::ConfigLoader;
pub use error::EngineError;
pub use events::EngineEvent;
pub use traits::{BrokerGateway, MarketDataProvider, Notifier, OrderRequest, OrderTicket};
pub use types::{
    DenyReason, ExitReason, Greeks, IncompleteData, LegSide, MarketSnapshot, OptionLeg,
    OrderIntent, OrderStatus, PositionId, Quote, StrategyKind,
};
