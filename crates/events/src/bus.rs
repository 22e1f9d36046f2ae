//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes [`SubjectEvent`](crate::SubjectEvent)s from the event log to
//! projection workers. It promises **at-least-once** delivery and nothing about
//! ordering: the same event may arrive twice, and events of one subject may arrive
//! out of order. The projector's checkpoint filter absorbs both.
//!
//! The bus stores nothing; the event log is the source of truth and can always be
//! replayed after the stored checkpoint.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

/// A subscription to a bus (broadcast: each subscription sees every published message).
///
/// Intended for a single consuming thread. Loop on [`Subscription::recv_timeout`] so the
/// consumer can check for shutdown between messages:
///
/// ```ignore
/// loop {
///     match sub.recv_timeout(Duration::from_millis(250)) {
///         Ok(ev) => handle(ev)?,
///         Err(RecvTimeoutError::Timeout) => continue,
///         Err(RecvTimeoutError::Disconnected) => break,
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Transport-agnostic pub/sub contract.
///
/// ```text
/// EventLog (append) → EventBus (publish) → ProjectionWorker → Projector → StateStore
/// ```
///
/// `publish` may fail; since the event is already durable in the log, the caller can
/// republish or let a catch-up pass pick it up later.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
