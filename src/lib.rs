//! In-process publish/subscribe core.
//!
//! One [`Publisher`] per event stream: ordered fan-out to subscribers, replay
//! of the full history to late subscribers, idempotent cancellation and a
//! one-way completion latch. See [`notifications`] for the details.

pub mod config;
pub mod logging;
pub mod notifications;

pub use config::{NotifyConfig, PublisherConfig};
pub use notifications::{
    BoxError, ChannelSubscriber, DeliveryFailure, DeliveryStats, Notification, NotificationError,
    NotificationEvent, NotificationResult, NotificationStream, PublishReport, Publisher, Subscriber,
    Subscription, SubscriptionGuard, SubscriptionId,
};
