//! Replaying Publisher
//!
//! Owns the history log and the subscriber registry of one event stream.
//! Delivery is synchronous: every callback runs on the thread that called
//! `subscribe`, `publish` or `complete`, and has finished before that call
//! returns.
//!
//! Two locks guard the state:
//!
//! - the stream lock (reentrant) serializes `subscribe`, `publish` and
//!   `complete` against the history log, and is held while callbacks run;
//! - the registry lock is only ever held for short bookkeeping, never across a
//!   callback, so `Subscription::cancel` works from any thread and from inside
//!   a handler.
//!
//! Handlers may call back into the same publisher. A nested `publish` is
//! appended to the log at once and its pass is queued; whichever call owns
//! dispatch drains the queue in log order before returning.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, trace, warn};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use uuid::Uuid;

use crate::config::PublisherConfig;
use crate::notifications::error::{DeliveryFailure, NotificationError, NotificationResult};
use crate::notifications::events::NotificationEvent;
use crate::notifications::registry::{Registry, RegistryEntry};
use crate::notifications::subscription::Subscription;
use crate::notifications::traits::{DeliveryStats, PublishReport, Subscriber};

struct StreamState<T> {
    history: Vec<Arc<T>>,
    completed: bool,
    /// Some call on this thread is currently running passes
    dispatching: bool,
    /// Number of events whose fan-out pass has started
    dispatched: usize,
    completion_pending: bool,
}

impl<T> StreamState<T> {
    fn new() -> Self {
        Self {
            history: Vec::new(),
            completed: false,
            dispatching: false,
            dispatched: 0,
            completion_pending: false,
        }
    }
}

/// Releases dispatch ownership, including when a handler unwinds
///
/// Passes still queued after an unwind stay queued and are run by the next
/// call that claims dispatch.
struct DispatchGuard<'a, T> {
    state: &'a RefCell<StreamState<T>>,
}

impl<T> Drop for DispatchGuard<'_, T> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.dispatching = false;
        }
    }
}

/// Single-stream publisher with ordered fan-out and replay
pub struct Publisher<T>
where
    T: NotificationEvent,
{
    id: String,
    config: PublisherConfig,
    stream: ReentrantMutex<RefCell<StreamState<T>>>,
    registry: Arc<RwLock<Registry<T>>>,
    stats: Mutex<DeliveryStats>,
}

impl<T> Publisher<T>
where
    T: NotificationEvent,
{
    /// Create a publisher with an empty history and no subscribers
    pub fn new() -> Self {
        Self::with_config(PublisherConfig::default())
    }

    /// Create a publisher with custom delivery policy
    pub fn with_config(config: PublisherConfig) -> Self {
        let id = config
            .publisher_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        debug!("Created publisher '{}'", id);

        Self {
            id,
            config,
            stream: ReentrantMutex::new(RefCell::new(StreamState::new())),
            registry: Arc::new(RwLock::new(Registry::new())),
            stats: Mutex::new(DeliveryStats::default()),
        }
    }

    pub fn publisher_id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Register a subscriber and bring it up to date with the history log
    ///
    /// Replay happens before this returns. Subscribing an already registered
    /// subscriber (same `Arc`) returns a handle to the existing entry without
    /// replaying again. On a completed publisher the history is still replayed,
    /// followed by `on_completed`, and the returned handle is already inert.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) -> Subscription<T> {
        let stream = self.stream.lock();
        let state: &RefCell<StreamState<T>> = &stream;

        let (completed, replay) = {
            let state = state.borrow();
            // Events queued behind the current pass will reach the new
            // subscriber through their own passes.
            let upto = if state.completed {
                state.history.len()
            } else {
                state.dispatched
            };
            let replay = if self.config.replay_on_subscribe {
                state.history[..upto].to_vec()
            } else {
                Vec::new()
            };
            (state.completed, replay)
        };

        if completed {
            return self.subscribe_completed(subscriber, &replay);
        }

        let entry = {
            let mut registry = self.registry.write();
            if let Some(id) = registry.find(&subscriber) {
                debug!(
                    "Subscriber '{}' already registered with '{}' as {}",
                    subscriber.subscriber_name(),
                    self.id,
                    id
                );
                return Subscription::new(id, Arc::downgrade(&self.registry));
            }
            registry.insert(subscriber)
        };
        self.stats.lock().subscriptions += 1;
        debug!(
            "Subscribed '{}' to '{}' as {} (replaying {} events)",
            entry.name(),
            self.id,
            entry.id,
            replay.len()
        );

        let dispatching = self.claim_dispatch(state);
        self.replay(&entry, &replay);
        if dispatching.is_some() {
            self.drain(state);
        }

        Subscription::new(entry.id, Arc::downgrade(&self.registry))
    }

    fn subscribe_completed(
        &self,
        subscriber: Arc<dyn Subscriber<T>>,
        replay: &[Arc<T>],
    ) -> Subscription<T> {
        let entry = self.registry.write().detached(subscriber);
        self.stats.lock().subscriptions += 1;
        debug!(
            "Subscribed '{}' to completed publisher '{}' (replaying {} events)",
            entry.name(),
            self.id,
            replay.len()
        );

        self.replay(&entry, replay);
        if !entry.presence.is_faulted() {
            self.notify_completed(&entry);
        }

        Subscription::new(entry.id, Arc::downgrade(&self.registry))
    }

    /// Append an event to the log and deliver it to every active subscriber
    ///
    /// Fails with [`NotificationError::AlreadyCompleted`] once the stream is
    /// completed. Faults raised by individual subscribers never fail the call;
    /// they are listed in the returned report.
    pub fn publish(&self, event: T) -> NotificationResult<PublishReport> {
        let stream = self.stream.lock();
        let state: &RefCell<StreamState<T>> = &stream;

        let sequence = {
            let mut state = state.borrow_mut();
            if state.completed {
                debug!("Rejected publish to completed publisher '{}'", self.id);
                return Err(NotificationError::AlreadyCompleted);
            }
            state.history.push(Arc::new(event));
            state.history.len() - 1
        };
        self.stats.lock().events_published += 1;

        let Some(_dispatching) = self.claim_dispatch(state) else {
            trace!("Queued event #{} on '{}' behind the current pass", sequence, self.id);
            return Ok(PublishReport {
                sequence,
                deferred: true,
                ..PublishReport::default()
            });
        };

        Ok(self.drain(state).unwrap_or(PublishReport {
            sequence,
            ..PublishReport::default()
        }))
    }

    /// Close the stream
    ///
    /// Idempotent. Every active subscriber receives `on_completed` once, in
    /// registry order, and the registry is then cleared. A completion left
    /// unfinished by a handler that unwound is finished by the next call,
    /// after any passes still queued.
    pub fn complete(&self) {
        let stream = self.stream.lock();
        let state: &RefCell<StreamState<T>> = &stream;

        {
            let mut state = state.borrow_mut();
            if !state.completed {
                state.completed = true;
                state.completion_pending = true;
            } else if !state.completion_pending {
                return;
            }
        }

        let dispatching = self.claim_dispatch(state);
        if dispatching.is_some() {
            self.drain(state);
        } else {
            debug!("Completion of '{}' deferred until queued passes finish", self.id);
        }
    }

    pub fn is_completed(&self) -> bool {
        self.stream.lock().borrow().completed
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Whether this exact subscriber instance is registered
    pub fn has_subscriber(&self, subscriber: &Arc<dyn Subscriber<T>>) -> bool {
        self.registry.read().find(subscriber).is_some()
    }

    pub fn history_len(&self) -> usize {
        self.stream.lock().borrow().history.len()
    }

    /// Copy of the history log in publication order
    pub fn history(&self) -> Vec<Arc<T>> {
        self.stream.lock().borrow().history.clone()
    }

    pub fn stats(&self) -> DeliveryStats {
        self.stats.lock().clone()
    }

    fn claim_dispatch<'a>(
        &self,
        state: &'a RefCell<StreamState<T>>,
    ) -> Option<DispatchGuard<'a, T>> {
        let mut current = state.borrow_mut();
        if current.dispatching {
            return None;
        }
        current.dispatching = true;
        Some(DispatchGuard { state })
    }

    /// Run every pass not yet started, then any deferred completion.
    /// Returns the report of the first pass run.
    fn drain(&self, state: &RefCell<StreamState<T>>) -> Option<PublishReport> {
        let mut first = None;

        loop {
            let next = {
                let mut state = state.borrow_mut();
                if state.dispatched < state.history.len() {
                    let sequence = state.dispatched;
                    state.dispatched += 1;
                    Some((sequence, Arc::clone(&state.history[sequence])))
                } else {
                    None
                }
            };
            let Some((sequence, event)) = next else {
                break;
            };

            let report = self.fan_out(sequence, &event);
            if first.is_none() {
                first = Some(report);
            }
        }

        let completion_pending = std::mem::take(&mut state.borrow_mut().completion_pending);
        if completion_pending {
            self.broadcast_completion();
        }

        first
    }

    fn fan_out(&self, sequence: usize, event: &T) -> PublishReport {
        let snapshot = self.registry.read().snapshot();
        let mut report = PublishReport {
            sequence,
            ..PublishReport::default()
        };

        for entry in &snapshot {
            // Cancelled since the pass started
            if !entry.presence.is_active() {
                trace!("Skipping cancelled subscriber '{}' for event #{}", entry.name(), sequence);
                continue;
            }
            match self.deliver(entry, sequence, event) {
                Ok(()) => report.delivered += 1,
                Err(failure) => report.failures.push(failure),
            }
        }

        {
            let mut stats = self.stats.lock();
            stats.events_delivered += report.delivered as u64;
            stats.delivery_failures += report.failures.len() as u64;
        }

        debug!(
            "Published event #{} on '{}' to {} subscribers ({} successful, {} failed)",
            sequence,
            self.id,
            snapshot.len(),
            report.delivered,
            report.failures.len()
        );
        report
    }

    fn replay(&self, entry: &RegistryEntry<T>, events: &[Arc<T>]) {
        let mut replayed = 0u64;
        for (sequence, event) in events.iter().enumerate() {
            if !entry.presence.is_active() {
                break;
            }
            match self.deliver(entry, sequence, event) {
                Ok(()) => replayed += 1,
                Err(_) => {
                    self.stats.lock().delivery_failures += 1;
                    break;
                }
            }
        }
        self.stats.lock().events_replayed += replayed;
    }

    fn deliver(
        &self,
        entry: &RegistryEntry<T>,
        sequence: usize,
        event: &T,
    ) -> Result<(), DeliveryFailure> {
        let message = match self.guarded(|| entry.subscriber.on_next(event)) {
            Ok(Ok(())) => {
                trace!("Delivered event #{} to '{}'", sequence, entry.name());
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(panicked) => panicked,
        };

        let failure = DeliveryFailure {
            subscriber: entry.name().to_string(),
            sequence,
            message,
        };
        self.isolate_failure(entry, &failure);
        Err(failure)
    }

    fn isolate_failure(&self, entry: &RegistryEntry<T>, failure: &DeliveryFailure) {
        warn!(
            "Subscriber '{}' failed to process event #{} from '{}': {}",
            failure.subscriber, failure.sequence, self.id, failure.message
        );

        if self.config.unsubscribe_on_error && self.registry.write().remove(entry.id) {
            debug!("Removed failing subscriber '{}' ({})", entry.name(), entry.id);
        }

        if entry.presence.mark_faulted() {
            let error = failure.to_error();
            if let Err(panicked) = self.guarded(|| entry.subscriber.on_error(&error)) {
                warn!("Subscriber '{}' failed in on_error: {}", entry.name(), panicked);
            }
        }
    }

    fn broadcast_completion(&self) {
        let snapshot = self.registry.read().snapshot();
        let mut notified = 0usize;

        for entry in &snapshot {
            if !entry.presence.is_active() {
                continue;
            }
            self.notify_completed(entry);
            notified += 1;
        }

        let removed = self.registry.write().clear();
        debug!(
            "Publisher '{}' completed ({} subscribers notified, {} removed)",
            self.id, notified, removed
        );
    }

    fn notify_completed(&self, entry: &RegistryEntry<T>) {
        if let Err(panicked) = self.guarded(|| entry.subscriber.on_completed()) {
            warn!("Subscriber '{}' failed in on_completed: {}", entry.name(), panicked);
        }
    }

    /// Run a subscriber callback, containing panics when configured to
    fn guarded<R>(&self, call: impl FnOnce() -> R) -> Result<R, String> {
        if self.config.catch_panics {
            panic::catch_unwind(AssertUnwindSafe(call)).map_err(panic_message)
        } else {
            Ok(call())
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

impl<T> Default for Publisher<T>
where
    T: NotificationEvent,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Publisher<T>
where
    T: NotificationEvent,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("id", &self.id)
            .field("subscribers", &self.subscriber_count())
            .field("history_len", &self.history_len())
            .field("completed", &self.is_completed())
            .finish()
    }
}
