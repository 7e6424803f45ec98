//! Channel-backed Subscribers
//!
//! Bridges the synchronous delivery contract to async consumers. Each
//! `ChannelSubscriber` owns an unbounded queue, so the publishing thread never
//! waits on the consumer and every consumer drains in its own order.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use log::trace;
use tokio::sync::mpsc;
use tokio_stream::Stream;

use crate::notifications::error::{BoxError, NotificationError};
use crate::notifications::events::{Notification, NotificationEvent};
use crate::notifications::traits::Subscriber;

/// Subscriber that forwards every signal into its own queue
pub struct ChannelSubscriber<T>
where
    T: NotificationEvent,
{
    name: String,
    sender: mpsc::UnboundedSender<Notification<T>>,
}

impl<T> ChannelSubscriber<T>
where
    T: NotificationEvent,
{
    /// Create a subscriber and the stream its signals arrive on
    pub fn new(name: impl Into<String>) -> (Arc<Self>, NotificationStream<T>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscriber = Arc::new(Self {
            name: name.into(),
            sender,
        });
        let stream = NotificationStream { receiver };
        (subscriber, stream)
    }

    /// The consuming side has been dropped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl<T> Subscriber<T> for ChannelSubscriber<T>
where
    T: NotificationEvent,
{
    fn on_next(&self, event: &T) -> Result<(), BoxError> {
        self.sender
            .send(Notification::Next(Arc::new(event.clone())))
            .map_err(|_| format!("notification stream for '{}' was dropped", self.name).into())
    }

    fn on_completed(&self) {
        if self.sender.send(Notification::Completed).is_err() {
            trace!("Dropped completion for '{}': stream closed", self.name);
        }
    }

    fn on_error(&self, failure: &NotificationError) {
        if self.sender.send(Notification::Error(failure.clone())).is_err() {
            trace!("Dropped error signal for '{}': stream closed", self.name);
        }
    }

    fn subscriber_name(&self) -> &str {
        &self.name
    }
}

/// Receiving side of a [`ChannelSubscriber`]
///
/// Ends after a terminal signal once the subscriber has been dropped by the
/// publisher and every handle to it released.
pub struct NotificationStream<T> {
    receiver: mpsc::UnboundedReceiver<Notification<T>>,
}

impl<T> NotificationStream<T> {
    /// Wait for the next signal
    pub async fn recv(&mut self) -> Option<Notification<T>> {
        self.receiver.recv().await
    }

    /// Take a signal if one is already queued
    pub fn try_recv(&mut self) -> Option<Notification<T>> {
        self.receiver.try_recv().ok()
    }

    /// Drain already queued signals without waiting
    pub fn drain_ready(&mut self) -> Vec<Notification<T>> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

impl<T> Stream for NotificationStream<T> {
    type Item = Notification<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PublisherConfig;
    use crate::notifications::publisher::Publisher;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_channel_subscriber_receives_replay_live_and_completion() {
        let publisher = Publisher::<String>::new();
        publisher.publish("x1".to_string()).unwrap();

        let (subscriber, mut stream) = ChannelSubscriber::new("async-consumer");
        let _handle = publisher.subscribe(subscriber);

        publisher.publish("x2".to_string()).unwrap();
        publisher.complete();

        let mut events = Vec::new();
        while let Some(notification) = stream.next().await {
            match notification {
                Notification::Next(event) => events.push(event.to_string()),
                Notification::Completed => break,
                Notification::Error(error) => panic!("unexpected error: {}", error),
            }
        }
        assert_eq!(events, vec!["x1", "x2"]);
    }

    #[tokio::test]
    async fn test_dropped_stream_unsubscribes() {
        let publisher = Publisher::<u32>::new();
        let (subscriber, stream) = ChannelSubscriber::new("short-lived");
        let handle = publisher.subscribe(subscriber.clone());
        drop(stream);
        assert!(subscriber.is_closed());

        let report = publisher.publish(1).unwrap();
        assert_eq!(report.delivered, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].subscriber, "short-lived");
        assert!(!handle.is_active());
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_terminal_signals_to_closed_stream_are_dropped() {
        let publisher =
            Publisher::<u32>::with_config(PublisherConfig::default().with_catch_panics(false));
        let (subscriber, stream) = ChannelSubscriber::new("gone");
        let _handle = publisher.subscribe(subscriber.clone());
        drop(stream);

        subscriber.on_error(&NotificationError::AlreadyCompleted);
        publisher.complete();

        assert!(publisher.is_completed());
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_drain_ready() {
        let publisher = Publisher::<u32>::new();
        let (subscriber, mut stream) = ChannelSubscriber::new("drainer");
        let _handle = publisher.subscribe(subscriber);

        for value in 0..3 {
            publisher.publish(value).unwrap();
        }

        let drained: Vec<u32> = stream
            .drain_ready()
            .iter()
            .filter_map(|notification| notification.event().copied())
            .collect();
        assert_eq!(drained, vec![0, 1, 2]);
        assert!(stream.try_recv().is_none());
    }
}
