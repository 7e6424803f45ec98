//! Replaying Pub/Sub Notification Core
//!
//! A single publisher fans typed events out to its subscribers in a fixed
//! order, replays its history to late subscribers, and closes with a one-way
//! completion signal.
//!
//! # Architecture
//!
//! - **Publisher**: owns the history log and subscriber registry
//! - **Subscribers**: implement `on_next` / `on_completed` / `on_error`
//! - **Subscription**: handle returned by `subscribe`, used only to cancel
//! - **ChannelSubscriber**: queues signals for async consumers
//!
//! # Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use replaycast::notifications::{Publisher, Subscriber, BoxError};
//!
//! struct Printer;
//!
//! impl Subscriber<String> for Printer {
//!     fn on_next(&self, event: &String) -> Result<(), BoxError> {
//!         println!("{}", event);
//!         Ok(())
//!     }
//! }
//!
//! let publisher = Publisher::<String>::new();
//! publisher.publish("before".to_string()).unwrap();
//!
//! // Replays "before" immediately
//! let handle = publisher.subscribe(Arc::new(Printer));
//! publisher.publish("after".to_string()).unwrap();
//!
//! handle.cancel();
//! publisher.complete();
//! assert!(publisher.publish("too late".to_string()).is_err());
//! ```

pub mod channel;
pub mod error;
pub mod events;
pub mod publisher;
pub mod registry;
pub mod subscription;
pub mod traits;


// Re-export core types for convenience
pub use channel::{ChannelSubscriber, NotificationStream};
pub use error::{BoxError, DeliveryFailure, NotificationError, NotificationResult};
pub use events::{Notification, NotificationEvent};
pub use publisher::Publisher;
pub use registry::SubscriptionId;
pub use subscription::{Subscription, SubscriptionGuard};
pub use traits::{DeliveryStats, PublishReport, Subscriber};

/// Module metadata
pub const MODULE_NAME: &str = "Replaying Notification Core";
pub const MODULE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get notification system information
pub fn get_system_info() -> String {
    format!(
        "{} v{} - ordered pub/sub with replay",
        MODULE_NAME,
        MODULE_VERSION
    )
}
