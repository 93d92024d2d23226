//! Downstream delivery of enriched events.

use std::sync::mpsc;

use fanwatch_common::types::EnrichedEvent;

/// Receives enriched events from the monitor loop.
///
/// Called once per non-overflow record, in framing order, on the monitor
/// thread rather than the thread that called `start`. Implementations
/// must return quickly: time spent here is time the kernel queue is not
/// drained, and a full queue drops events.
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn on_event(&self, event: &EnrichedEvent);
}

impl<F> EventSink for F
where
    F: Fn(&EnrichedEvent) + Send + Sync,
{
    fn on_event(&self, event: &EnrichedEvent) {
        self(event);
    }
}

/// Forwards events to a channel. A disconnected receiver drops events.
impl EventSink for mpsc::Sender<EnrichedEvent> {
    fn on_event(&self, event: &EnrichedEvent) {
        if self.send(event.clone()).is_err() {
            tracing::trace!(pid = event.pid, "event receiver gone, dropping event");
        }
    }
}

/// Forwards events to a bounded channel, dropping them when it is full.
impl EventSink for mpsc::SyncSender<EnrichedEvent> {
    fn on_event(&self, event: &EnrichedEvent) {
        if let Err(e) = self.try_send(event.clone()) {
            tracing::debug!(pid = event.pid, error = %e, "event channel unavailable, dropping event");
        }
    }
}
