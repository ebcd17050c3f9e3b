//! Presentation events.
//!
//! The engine never touches a UI directly. Ticks, the lockdown transition and
//! advisory updates are broadcast; renderers subscribe and draw what they get.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::escalation::LockdownEvent;
use crate::simulation::TickReport;

/// Buffered events per subscriber before it starts lagging
pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    Tick(TickReport),
    /// Force the emergency view and show the irreversible notice
    Lockdown(LockdownEvent),
    Advisory { text: String, offline: bool },
}

/// Fan-out to presentation subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SimEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.tx.subscribe()
    }

    /// Publish without waiting. Having no subscribers is not an error.
    pub fn publish(&self, event: SimEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}
