//! Fire-and-forget forwarding of operational log events.
//!
//! Forwarding never fails or blocks the caller. Events go through a bounded
//! queue to one dedicated publisher thread, off the Tokio blocking pool.
//! When the queue is full the event is dropped and a `warn` is logged. There
//! is no retry or delivery guarantee.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread;

use serde_json::Value as JsonValue;

use usergate_events::{EventPublisher, LogEvent};

/// Events buffered ahead of the publisher thread before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

const THREAD_NAME: &str = "usergate-log-forwarder";

/// Object-safe view of any `EventPublisher<LogEvent>`.
trait ErasedPublisher: Send + Sync {
    fn publish_erased(&self, event: LogEvent) -> Result<(), String>;
}

impl<P> ErasedPublisher for P
where
    P: EventPublisher<LogEvent>,
{
    fn publish_erased(&self, event: LogEvent) -> Result<(), String> {
        self.publish(event).map_err(|e| e.to_string())
    }
}

/// Shared handle for emitting `(pattern, payload)` log events.
///
/// Clones share one queue. The publisher thread exits once every clone is
/// dropped and the queue has drained.
#[derive(Clone)]
pub struct LogForwarder {
    queue: SyncSender<LogEvent>,
}

impl LogForwarder {
    pub fn new<P>(publisher: P) -> std::io::Result<Self>
    where
        P: EventPublisher<LogEvent> + 'static,
    {
        Self::with_capacity(publisher, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity<P>(publisher: P, capacity: usize) -> std::io::Result<Self>
    where
        P: EventPublisher<LogEvent> + 'static,
    {
        let (queue, pending) = mpsc::sync_channel::<LogEvent>(capacity.max(1));
        let publisher: Arc<dyn ErasedPublisher> = Arc::new(publisher);

        thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || publisher_loop(publisher.as_ref(), pending))?;

        Ok(Self { queue })
    }

    /// Queue one event without waiting for delivery.
    pub fn forward(&self, pattern: &str, payload: JsonValue) {
        match self.queue.try_send(LogEvent::new(pattern, payload)) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(pattern = %event.pattern(), "log queue full; event dropped");
            }
            Err(TrySendError::Disconnected(event)) => {
                tracing::warn!(pattern = %event.pattern(), "log publisher stopped; event dropped");
            }
        }
    }
}

impl core::fmt::Debug for LogForwarder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LogForwarder").finish_non_exhaustive()
    }
}

fn publisher_loop(publisher: &dyn ErasedPublisher, pending: Receiver<LogEvent>) {
    for event in pending {
        publish_logged(publisher, event);
    }
    tracing::debug!("log forwarder stopped");
}

fn publish_logged(publisher: &dyn ErasedPublisher, event: LogEvent) {
    let pattern = event.pattern().to_string();
    if let Err(error) = publisher.publish_erased(event) {
        tracing::warn!(%pattern, %error, "failed to forward log event");
    }
}
