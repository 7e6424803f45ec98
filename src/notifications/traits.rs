//! Subscriber Contract and Delivery Reporting
//!
//! The capability set every consumer implements, plus the statistics and
//! per-publish reports the publisher hands back to its callers.

use crate::notifications::error::{BoxError, DeliveryFailure, NotificationError};
use crate::notifications::events::NotificationEvent;

/// Consumer of a publisher's event stream
///
/// Callbacks run synchronously on the publishing thread. Implementations must
/// not block indefinitely; a slow `on_next` holds up every later subscriber.
pub trait Subscriber<T>: Send + Sync
where
    T: NotificationEvent,
{
    /// Handle the next event of the stream
    ///
    /// Returning `Err` (or panicking) counts as a delivery failure: the
    /// publisher reports it through [`Subscriber::on_error`] and carries on
    /// with the remaining subscribers.
    fn on_next(&self, event: &T) -> Result<(), BoxError>;

    /// The stream completed; no further `on_next` calls will follow
    fn on_completed(&self) {}

    /// This subscriber's own `on_next` failed
    fn on_error(&self, _failure: &NotificationError) {}

    /// Name used in log lines and failure reports
    fn subscriber_name(&self) -> &str {
        "anonymous"
    }
}

/// Aggregated outcome of a single `publish` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Position of the event in the history log
    pub sequence: usize,

    /// Subscribers whose `on_next` completed successfully
    pub delivered: usize,

    /// Subscribers whose `on_next` failed during this pass
    pub failures: Vec<DeliveryFailure>,

    /// The pass was queued behind an outer publish on the same thread
    pub deferred: bool,
}

impl PublishReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Statistics about notification delivery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Total events published
    pub events_published: u64,

    /// Total live deliveries that completed successfully
    pub events_delivered: u64,

    /// Total events replayed to late subscribers
    pub events_replayed: u64,

    /// Total delivery failures (live and replay)
    pub delivery_failures: u64,

    /// Total subscriptions created
    pub subscriptions: u64,
}
