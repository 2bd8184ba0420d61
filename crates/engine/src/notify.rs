//! Notification sinks.

use async_trait::async_trait;
use nifty_algo_core::{EngineEvent, Notifier};
use parking_lot::Mutex;
use tracing::{error, info};

/// Emits every event as a structured log line. Fatal events log at
/// error level so they surface in alerting.
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: &EngineEvent) {
        let payload = serde_json::to_string(event).unwrap_or_else(|_| format!("{event:?}"));
        if event.is_fatal() {
            error!(event = %payload, "engine event");
        } else {
            info!(event = %payload, "engine event");
        }
    }
}

/// Captures events in memory so tests can assert on the decision stream.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    events: Mutex<Vec<EngineEvent>>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, event: &EngineEvent) {
        self.events.lock().push(event.clone());
    }
}
