//! Notification Event Types
//!
//! The publisher treats event payloads as opaque. Anything cloneable, debuggable
//! and thread-safe can flow through a stream.

use std::sync::Arc;

use crate::notifications::error::NotificationError;

/// Base trait for all notification events
pub trait NotificationEvent: Send + Sync + Clone + std::fmt::Debug + 'static {}

impl<T> NotificationEvent for T where T: Send + Sync + Clone + std::fmt::Debug + 'static {}

/// One signal of a stream, as seen by a queued consumer
#[derive(Debug, Clone)]
pub enum Notification<T> {
    /// A published (or replayed) event
    Next(Arc<T>),

    /// The stream completed; nothing follows
    Completed,

    /// This consumer's delivery failed; nothing follows
    Error(NotificationError),
}

impl<T> Notification<T> {
    /// True for the signals that end a consumer's view of the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Next(_))
    }

    /// The event carried by a `Next` signal
    pub fn event(&self) -> Option<&T> {
        match self {
            Notification::Next(event) => Some(event),
            _ => None,
        }
    }
}
