//! Event publishing abstraction (mechanics only).
//!
//! Log forwarding is fire-and-forget: producers hand a message to a
//! publisher and move on. There is no acknowledgement, retry, or ordering
//! contract at this layer; whatever the transport offers is what you get.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to a publisher's stream of messages.
///
/// Only in-process publishers hand these out; external transports are
/// consumed by other services.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Transport-agnostic publisher.
///
/// `publish` is synchronous and may block on IO; async callers are expected
/// to move it off the runtime threads. The trait requires `Send + Sync` so a
/// single publisher can be shared by every request.
pub trait EventPublisher<M>: Send + Sync {
    type Error: core::fmt::Debug + core::fmt::Display + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;
}

impl<M, P> EventPublisher<M> for Arc<P>
where
    P: EventPublisher<M> + ?Sized,
{
    type Error = P::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }
}
