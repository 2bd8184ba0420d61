//! Deterministic paper broker and market feed.
//!
//! Responses are scripted so tests (and dry runs) replay exact broker
//! behaviour: fills at a settable mark, rejects, outages, and orders
//! stuck pending. No randomness anywhere.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nifty_algo_core::{
    BrokerGateway, EngineError, MarketDataProvider, MarketSnapshot, OrderRequest, OrderStatus,
    OrderTicket, Quote,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;

/// How the paper broker answers the next `place_order` call.
#[derive(Debug, Clone)]
pub enum PaperResponse {
    /// Fill at the current mark plus slippage.
    Fill,
    /// Broker accepts the order but rejects it.
    Reject(String),
    /// Gateway unreachable.
    Unreachable,
    /// Order goes pending; `order_status` then reports `resolve`, or
    /// stays pending forever when `None`.
    Pending { resolve: Option<OrderStatus> },
}

struct BrokerState {
    mark: Decimal,
    slippage: Decimal,
    script: VecDeque<PaperResponse>,
    orders: HashMap<String, OrderStatus>,
    by_tag: HashMap<String, OrderTicket>,
    phantom_fill: Option<Decimal>,
    seq: u64,
    placed: u32,
}

/// In-process broker for paper trading and tests.
pub struct PaperBroker {
    state: Mutex<BrokerState>,
    /// When present, fills price at the net of live leg quotes instead
    /// of the fixed mark.
    market: Option<std::sync::Arc<dyn MarketDataProvider>>,
}

impl PaperBroker {
    #[must_use]
    pub fn new(mark: Decimal) -> Self {
        Self {
            state: Mutex::new(BrokerState {
                mark,
                slippage: Decimal::ZERO,
                script: VecDeque::new(),
                orders: HashMap::new(),
                by_tag: HashMap::new(),
                phantom_fill: None,
                seq: 0,
                placed: 0,
            }),
            market: None,
        }
    }

    /// Paper broker that fills every order at the current net market
    /// value of its legs.
    #[must_use]
    pub fn with_market(market: std::sync::Arc<dyn MarketDataProvider>) -> Self {
        let mut broker = Self::new(Decimal::ZERO);
        broker.market = Some(market);
        broker
    }

    async fn fill_mark(&self, request: &OrderRequest) -> Result<Decimal, EngineError> {
        let Some(market) = &self.market else {
            let state = self.state.lock();
            return Ok(state.mark + state.slippage);
        };
        let mut value = Decimal::ZERO;
        for leg in &request.legs {
            let quote = market.leg_quote(&leg.instrument).await?;
            value += match leg.side {
                nifty_algo_core::LegSide::Buy => quote.price,
                nifty_algo_core::LegSide::Sell => -quote.price,
            };
        }
        Ok(value + self.state.lock().slippage)
    }

    /// Net mark the next fill executes at.
    pub fn set_mark(&self, mark: Decimal) {
        self.state.lock().mark = mark;
    }

    pub fn set_slippage(&self, slippage: Decimal) {
        self.state.lock().slippage = slippage;
    }

    /// Queues the response for the next unscripted `place_order` call.
    /// An empty script always fills.
    pub fn push_response(&self, response: PaperResponse) {
        self.state.lock().script.push_back(response);
    }

    /// Makes `find_order` report a fill for any known tag even though the
    /// order never confirmed, simulating a phantom fill discovered at
    /// reconciliation.
    pub fn set_phantom_fill(&self, fill_price: Decimal) {
        self.state.lock().phantom_fill = Some(fill_price);
    }

    #[must_use]
    pub fn placed_count(&self) -> u32 {
        self.state.lock().placed
    }
}

#[async_trait]
impl BrokerGateway for PaperBroker {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderTicket, EngineError> {
        let fill = self.fill_mark(request).await?;
        let mut state = self.state.lock();
        state.placed += 1;
        state.seq += 1;
        let order_id = format!("PAPER-{}", state.seq);
        let response = state.script.pop_front().unwrap_or(PaperResponse::Fill);

        let (status, later) = match response {
            PaperResponse::Fill => {
                let status = OrderStatus::Filled { fill_price: fill };
                (status.clone(), status)
            }
            PaperResponse::Reject(reason) => {
                let status = OrderStatus::Rejected { reason };
                (status.clone(), status)
            }
            PaperResponse::Unreachable => {
                return Err(EngineError::BrokerUnavailable(
                    "paper gateway offline".to_string(),
                ));
            }
            PaperResponse::Pending { resolve } => {
                (OrderStatus::Pending, resolve.unwrap_or(OrderStatus::Pending))
            }
        };

        let ticket = OrderTicket {
            order_id: order_id.clone(),
            status,
        };
        state.orders.insert(order_id, later);
        state.by_tag.insert(request.tag.clone(), ticket.clone());
        Ok(ticket)
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, EngineError> {
        self.state
            .lock()
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| EngineError::BrokerUnavailable(format!("unknown order {order_id}")))
    }

    async fn find_order(&self, tag: &str) -> Result<Option<OrderTicket>, EngineError> {
        let state = self.state.lock();
        match (state.phantom_fill, state.by_tag.contains_key(tag)) {
            (Some(fill_price), true) => Ok(Some(OrderTicket {
                order_id: format!("PAPER-PHANTOM-{tag}"),
                status: OrderStatus::Filled { fill_price },
            })),
            (_, known) => Ok(known.then(|| state.by_tag[tag].clone())),
        }
    }
}

/// In-process market feed with settable snapshot and per-leg quotes.
#[derive(Default)]
pub struct PaperMarket {
    snapshot: Mutex<Option<MarketSnapshot>>,
    quotes: Mutex<HashMap<String, Quote>>,
}

impl PaperMarket {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_snapshot(&self, snapshot: MarketSnapshot) {
        *self.snapshot.lock() = Some(snapshot);
    }

    pub fn set_quote(&self, instrument: &str, price: Decimal) {
        self.set_quote_at(instrument, price, Utc::now());
    }

    pub fn set_quote_at(&self, instrument: &str, price: Decimal, timestamp: DateTime<Utc>) {
        self.quotes
            .lock()
            .insert(instrument.to_string(), Quote { price, timestamp });
    }
}

#[async_trait]
impl MarketDataProvider for PaperMarket {
    async fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot, EngineError> {
        self.snapshot
            .lock()
            .clone()
            .ok_or_else(|| EngineError::BrokerUnavailable(format!("no snapshot for {symbol}")))
    }

    async fn leg_quote(&self, instrument: &str) -> Result<Quote, EngineError> {
        self.quotes
            .lock()
            .get(instrument)
            .copied()
            .ok_or_else(|| EngineError::BrokerUnavailable(format!("no quote for {instrument}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nifty_algo_core::OrderIntent;
    use rust_decimal_macros::dec;

    fn request(tag: &str) -> OrderRequest {
        OrderRequest {
            symbol: "NIFTY".to_string(),
            legs: vec![],
            quantity: dec!(50),
            intent: OrderIntent::Entry,
            tag: tag.to_string(),
        }
    }

    #[tokio::test]
    async fn unscripted_orders_fill_at_the_mark() {
        let broker = PaperBroker::new(dec!(102.5));
        let ticket = broker.place_order(&request("t1")).await.unwrap();
        assert_eq!(
            ticket.status,
            OrderStatus::Filled {
                fill_price: dec!(102.5)
            }
        );
    }

    #[tokio::test]
    async fn scripted_responses_replay_in_order() {
        let broker = PaperBroker::new(dec!(100));
        broker.push_response(PaperResponse::Reject("margin".to_string()));
        broker.push_response(PaperResponse::Fill);

        let first = broker.place_order(&request("t1")).await.unwrap();
        assert!(matches!(first.status, OrderStatus::Rejected { .. }));
        let second = broker.place_order(&request("t2")).await.unwrap();
        assert!(matches!(second.status, OrderStatus::Filled { .. }));
        assert_eq!(broker.placed_count(), 2);
    }

    #[tokio::test]
    async fn pending_orders_resolve_through_status_polls() {
        let broker = PaperBroker::new(dec!(100));
        broker.push_response(PaperResponse::Pending {
            resolve: Some(OrderStatus::Filled {
                fill_price: dec!(101),
            }),
        });

        let ticket = broker.place_order(&request("t1")).await.unwrap();
        assert_eq!(ticket.status, OrderStatus::Pending);
        let status = broker.order_status(&ticket.order_id).await.unwrap();
        assert_eq!(
            status,
            OrderStatus::Filled {
                fill_price: dec!(101)
            }
        );
    }

    #[tokio::test]
    async fn orders_are_findable_by_tag() {
        let broker = PaperBroker::new(dec!(100));
        broker.place_order(&request("abc")).await.unwrap();
        assert!(broker.find_order("abc").await.unwrap().is_some());
        assert!(broker.find_order("missing").await.unwrap().is_none());
    }
}
