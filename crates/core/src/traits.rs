use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::types::{MarketSnapshot, OptionLeg, OrderIntent, OrderStatus, Quote};

/// Order submitted to the broker gateway. All orders are at market; the
/// engine does not manage limit books.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub legs: Vec<OptionLeg>,
    /// Total units (lots x lot size).
    pub quantity: Decimal,
    pub intent: OrderIntent,
    /// Correlation tag, set to the position id so orders can be found
    /// again during startup reconciliation.
    pub tag: String,
}

/// Broker acknowledgement for a placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTicket {
    pub order_id: String,
    pub status: OrderStatus,
}

/// External market data provider. May return partial or stale data; the
/// caller is responsible for staleness checks.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot, EngineError>;

    /// Current quote for a single option instrument.
    async fn leg_quote(&self, instrument: &str) -> Result<Quote, EngineError>;
}

/// External broker / order gateway.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderTicket, EngineError>;

    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, EngineError>;

    /// Looks up an order by its correlation tag. Used at startup to
    /// confirm-or-release reservations that were in flight at a crash.
    async fn find_order(&self, tag: &str) -> Result<Option<OrderTicket>, EngineError>;
}

/// Fire-and-forget notification channel. Implementations must swallow
/// delivery failures; a lost notification never blocks or rolls back a
/// trading decision.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &EngineEvent);
}
