//! Engine lifecycle events
//!
//! Observers subscribe for one-shot notifications about activation outcomes.
//! Channels are bounded; if no subscriber drains them the oldest events are
//! dropped rather than blocking the engine.

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};

/// Channel depth per subscriber
const EVENT_QUEUE_DEPTH: usize = 64;

/// Notifications published by the engine lifecycle controller
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Activation finished and the graph is live
    InitSucceeded {
        sample_rate: u32,
        buffer_size: Option<u32>,
    },
    /// Activation failed terminally; no further retries will happen
    InitFailed { error: String },
}

/// Fan-out publisher for [`EngineEvent`]
///
/// Each subscriber gets its own bounded channel so a stalled observer cannot
/// back-pressure the engine or starve other observers.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: std::sync::Mutex<Vec<Sender<EngineEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = bounded(EVENT_QUEUE_DEPTH);
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber
    pub fn publish(&self, event: EngineEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("engine event dropped, subscriber queue full");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}
