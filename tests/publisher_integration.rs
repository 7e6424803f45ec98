// Integration tests for the publisher through the public API
use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;

use replaycast::{
    BoxError, NotificationError, Publisher, PublisherConfig, Subscriber, Subscription,
};

/// Application record standing in for a domain payload
#[derive(Debug, Clone, PartialEq, Eq)]
struct AppRecord {
    id: u32,
    owner: String,
}

impl AppRecord {
    fn new(id: u32) -> Self {
        Self {
            id,
            owner: format!("owner-{}", id),
        }
    }
}

#[derive(Default)]
struct RecordingSubscriber {
    received: Mutex<Vec<u32>>,
    completed: Mutex<u32>,
}

impl RecordingSubscriber {
    fn ids(&self) -> Vec<u32> {
        self.received.lock().clone()
    }

    fn completions(&self) -> u32 {
        *self.completed.lock()
    }
}

impl Subscriber<AppRecord> for RecordingSubscriber {
    fn on_next(&self, event: &AppRecord) -> Result<(), BoxError> {
        self.received.lock().push(event.id);
        Ok(())
    }

    fn on_completed(&self) {
        *self.completed.lock() += 1;
    }

    fn subscriber_name(&self) -> &str {
        "recorder"
    }
}

#[test]
fn test_records_flow_to_all_subscribers() {
    let publisher = Publisher::<AppRecord>::with_config(
        PublisherConfig::default().with_publisher_id("applications"),
    );
    let first = Arc::new(RecordingSubscriber::default());
    let second = Arc::new(RecordingSubscriber::default());

    let _first = publisher.subscribe(first.clone());
    let _second = publisher.subscribe(second.clone());

    for id in 1..=3 {
        let report = publisher.publish(AppRecord::new(id)).unwrap();
        assert_eq!(report.delivered, 2);
        assert!(report.is_clean());
    }

    assert_eq!(first.ids(), vec![1, 2, 3]);
    assert_eq!(second.ids(), vec![1, 2, 3]);
    assert_eq!(publisher.history()[1].owner, "owner-2");
}

#[test]
fn test_complete_then_publish_fails() {
    let publisher = Publisher::<AppRecord>::new();
    let subscriber = Arc::new(RecordingSubscriber::default());
    let handle: Subscription<AppRecord> = publisher.subscribe(subscriber.clone());

    publisher.publish(AppRecord::new(1)).unwrap();
    publisher.complete();

    let error = publisher.publish(AppRecord::new(2)).unwrap_err();
    assert_eq!(error, NotificationError::AlreadyCompleted);
    assert_eq!(subscriber.ids(), vec![1]);
    assert_eq!(subscriber.completions(), 1);
    assert_eq!(publisher.history_len(), 1);

    handle.cancel();
    publisher.complete();
    assert_eq!(subscriber.completions(), 1);
}

#[test]
fn test_publisher_shared_across_threads() {
    let publisher = Arc::new(Publisher::<AppRecord>::new());
    let subscriber = Arc::new(RecordingSubscriber::default());
    let _handle = publisher.subscribe(subscriber.clone());

    let producers: Vec<_> = (0..3u32)
        .map(|producer| {
            let publisher = Arc::clone(&publisher);
            std::thread::spawn(move || {
                for i in 0..20 {
                    publisher.publish(AppRecord::new(producer * 100 + i)).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let history: Vec<u32> = publisher.history().iter().map(|record| record.id).collect();
    assert_eq!(subscriber.ids(), history);
    assert_eq!(history.len(), 60);
}

proptest! {
    #[test]
    fn prop_every_subscriber_sees_publish_order(
        events in prop::collection::vec(any::<u32>(), 0..40),
        subscribers in 1usize..5,
    ) {
        let publisher = Publisher::<AppRecord>::new();
        let recorders: Vec<Arc<RecordingSubscriber>> =
            (0..subscribers).map(|_| Arc::new(RecordingSubscriber::default())).collect();
        let _handles: Vec<_> = recorders
            .iter()
            .map(|recorder| publisher.subscribe(recorder.clone()))
            .collect();

        for id in &events {
            publisher.publish(AppRecord::new(*id)).unwrap();
        }

        for recorder in &recorders {
            prop_assert_eq!(recorder.ids(), events.clone());
        }
    }

    #[test]
    fn prop_late_subscriber_replays_prefix_then_live(
        events in prop::collection::vec(any::<u32>(), 1..40),
        split in any::<prop::sample::Index>(),
    ) {
        let join_at = split.index(events.len() + 1);
        let publisher = Publisher::<AppRecord>::new();

        for id in &events[..join_at] {
            publisher.publish(AppRecord::new(*id)).unwrap();
        }

        let late = Arc::new(RecordingSubscriber::default());
        let _handle = publisher.subscribe(late.clone());
        prop_assert_eq!(late.ids(), events[..join_at].to_vec());

        for id in &events[join_at..] {
            publisher.publish(AppRecord::new(*id)).unwrap();
        }
        prop_assert_eq!(late.ids(), events.clone());
    }

    #[test]
    fn prop_cancel_stops_delivery(
        events in prop::collection::vec(any::<u32>(), 1..40),
        split in any::<prop::sample::Index>(),
    ) {
        let cancel_at = split.index(events.len() + 1);
        let publisher = Publisher::<AppRecord>::new();
        let leaving = Arc::new(RecordingSubscriber::default());
        let staying = Arc::new(RecordingSubscriber::default());
        let leaving_handle = publisher.subscribe(leaving.clone());
        let _staying_handle = publisher.subscribe(staying.clone());

        for (i, id) in events.iter().enumerate() {
            if i == cancel_at {
                leaving_handle.cancel();
            }
            publisher.publish(AppRecord::new(*id)).unwrap();
        }
        leaving_handle.cancel();

        prop_assert_eq!(leaving.ids(), events[..cancel_at].to_vec());
        prop_assert_eq!(staying.ids(), events.clone());
    }
}
