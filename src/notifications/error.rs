//! Notification System Error Types
//!
//! Caller-facing errors of the publisher plus the failure record produced when
//! a subscriber's own handler faults during delivery.

use thiserror::Error;

/// Result type for notification operations
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Error type returned by subscriber callbacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in the notification system
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// Publish was attempted after the stream was completed
    #[error("Publisher has already completed - no further events can be published")]
    AlreadyCompleted,

    /// A subscriber's `on_next` returned an error or panicked
    #[error("Failed to deliver event #{sequence} to '{subscriber}': {message}")]
    DeliveryFailed {
        subscriber: String,
        sequence: usize,
        message: String,
    },
}

impl NotificationError {
    /// Create a delivery failed error
    pub fn delivery_failed(
        subscriber: impl Into<String>,
        sequence: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::DeliveryFailed {
            subscriber: subscriber.into(),
            sequence,
            message: message.into(),
        }
    }

    /// True for faults contained by the publisher rather than caller misuse
    pub fn is_delivery_failure(&self) -> bool {
        matches!(self, Self::DeliveryFailed { .. })
    }
}

/// A single isolated delivery fault, as reported back to the publishing caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub subscriber: String,
    pub sequence: usize,
    pub message: String,
}

impl DeliveryFailure {
    /// The error value handed to the failing subscriber's `on_error`
    pub fn to_error(&self) -> NotificationError {
        NotificationError::delivery_failed(
            self.subscriber.clone(),
            self.sequence,
            self.message.clone(),
        )
    }
}
