//! Startup reconciliation of in-flight reservations.
//!
//! A crash between `try_reserve` and order confirmation leaves the
//! ledger holding reservations whose fate only the broker knows. Each
//! one is resolved against the broker's actual order state: confirmed
//! when a fill is found, released otherwise. In-memory state alone is
//! never trusted across a restart.

use nifty_algo_core::{
    BrokerGateway, EngineError, EngineEvent, Notifier, OrderStatus, PositionId,
};
use nifty_algo_positions::PositionStore;
use nifty_algo_risk::RiskLedger;
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Confirms or releases every reservation the ledger replay left
/// pending.
///
/// # Errors
///
/// Fails when the broker cannot be queried or the ledger cannot be
/// written; startup must not proceed with unresolved reservations.
pub async fn reconcile_pending(
    pending: &[(PositionId, Decimal)],
    risk: &RiskLedger,
    store: &PositionStore,
    broker: &dyn BrokerGateway,
    notifier: &dyn Notifier,
) -> Result<(), EngineError> {
    for &(id, cost) in pending {
        if store.get(id).is_some() {
            // The position was registered; only the confirmation record
            // was lost with the crash.
            risk.confirm(id)
                .map_err(|e| EngineError::PersistenceUnavailable(e.to_string()))?;
            info!(position_id = %id, "re-confirmed reservation for registered position");
            continue;
        }

        match broker.find_order(&id.to_string()).await? {
            Some(ticket) => match ticket.status {
                OrderStatus::Filled { fill_price } => {
                    // Real exposure with no position record. Keep it
                    // counted and escalate; releasing would hide it.
                    risk.confirm(id)
                        .map_err(|e| EngineError::PersistenceUnavailable(e.to_string()))?;
                    warn!(
                        position_id = %id,
                        order_id = %ticket.order_id,
                        %fill_price,
                        "phantom fill found at reconciliation"
                    );
                    notifier
                        .notify(&EngineEvent::Alert {
                            message: format!(
                                "reconciliation: order {} for reservation {id} filled at {fill_price} \
                                 with no position record; manual intervention required",
                                ticket.order_id
                            ),
                        })
                        .await;
                }
                _ => {
                    risk.release(id)
                        .map_err(|e| EngineError::PersistenceUnavailable(e.to_string()))?;
                    info!(position_id = %id, %cost, "released unfilled reservation");
                }
            },
            None => {
                risk.release(id)
                    .map_err(|e| EngineError::PersistenceUnavailable(e.to_string()))?;
                info!(position_id = %id, %cost, "released reservation with no broker order");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotifier;
    use chrono::{NaiveDate, Utc};
    use nifty_algo_core::{
        LegSide, OptionLeg, OrderIntent, OrderRequest, RiskConstraints, StrategyKind,
    };
    use nifty_algo_execution::{PaperBroker, PaperResponse};
    use nifty_algo_positions::{FilledLeg, Position};
    use nifty_algo_risk::{ReserveOutcome, RiskWal};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 24).unwrap()
    }

    fn reopen(dir: &TempDir) -> (RiskLedger, Vec<(PositionId, Decimal)>) {
        let wal = RiskWal::new(dir.path().join("risk-wal.jsonl"));
        RiskLedger::open(RiskConstraints::default(), wal, today()).unwrap()
    }

    fn reserve_and_crash(dir: &TempDir) -> PositionId {
        let (ledger, _) = reopen(dir);
        let id = Uuid::new_v4();
        let outcome = ledger.try_reserve(id, dec!(2000)).unwrap();
        assert_eq!(outcome, ReserveOutcome::Approved);
        // Ledger dropped here without confirm/release, as in a crash.
        id
    }

    fn position(id: PositionId) -> Position {
        Position::open(
            id,
            "NIFTY".to_string(),
            StrategyKind::AtmDirectional,
            vec![FilledLeg {
                leg: OptionLeg {
                    instrument: "NIFTY26AUG24500CE".to_string(),
                    side: LegSide::Buy,
                    strike: dec!(24500),
                    expiry: NaiveDate::from_ymd_opt(2026, 8, 27).unwrap(),
                },
                fill_price: dec!(100),
            }],
            dec!(100),
            dec!(50),
            dec!(0.40),
            dec!(0.40),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn registered_position_is_reconfirmed() {
        let dir = TempDir::new().unwrap();
        let id = reserve_and_crash(&dir);
        let store = PositionStore::open(dir.path().join("positions.json"));
        store.insert_open(position(id)).unwrap();

        let (risk, pending) = reopen(&dir);
        assert_eq!(pending, vec![(id, dec!(2000))]);
        let broker = PaperBroker::new(dec!(100));
        let notifier = MemoryNotifier::new();
        reconcile_pending(&pending, &risk, &store, &broker, &notifier)
            .await
            .unwrap();

        // Still counted as exposure, and no longer pending on replay.
        assert_eq!(risk.state().open_positions_count, 1);
        let (_, still_pending) = reopen(&dir);
        assert!(still_pending.is_empty());
        assert!(notifier.events().is_empty());
    }

    #[tokio::test]
    async fn unknown_order_releases_the_reservation() {
        let dir = TempDir::new().unwrap();
        let id = reserve_and_crash(&dir);
        let store = PositionStore::open(dir.path().join("positions.json"));

        let (risk, pending) = reopen(&dir);
        assert_eq!(pending.len(), 1);
        let broker = PaperBroker::new(dec!(100));
        let notifier = MemoryNotifier::new();
        reconcile_pending(&pending, &risk, &store, &broker, &notifier)
            .await
            .unwrap();

        let state = risk.state();
        assert_eq!(state.open_positions_count, 0);
        assert_eq!(state.trades_today, 0);
        let (_, still_pending) = reopen(&dir);
        assert!(still_pending.is_empty());
        let _ = id;
    }

    #[tokio::test]
    async fn phantom_fill_is_confirmed_and_escalated() {
        let dir = TempDir::new().unwrap();
        let id = reserve_and_crash(&dir);
        let store = PositionStore::open(dir.path().join("positions.json"));

        // The broker accepted the order before the crash and filled it
        // without ever confirming.
        let broker = PaperBroker::new(dec!(100));
        broker.push_response(PaperResponse::Pending { resolve: None });
        broker
            .place_order(&OrderRequest {
                symbol: "NIFTY".to_string(),
                legs: vec![],
                quantity: dec!(50),
                intent: OrderIntent::Entry,
                tag: id.to_string(),
            })
            .await
            .unwrap();
        broker.set_phantom_fill(dec!(100));

        let (risk, pending) = reopen(&dir);
        let notifier = MemoryNotifier::new();
        reconcile_pending(&pending, &risk, &store, &broker, &notifier)
            .await
            .unwrap();

        // Exposure stays counted rather than released.
        assert_eq!(risk.state().open_positions_count, 1);
        assert!(notifier
            .events()
            .iter()
            .any(|e| matches!(e, EngineEvent::Alert { .. })));
    }
}
