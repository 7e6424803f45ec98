//! Subscriber Registry
//!
//! Ordered set of active subscriber entries owned by one publisher. Entries are
//! keyed by subscriber identity (the `Arc` allocation), never by value, and the
//! insertion order is the fan-out order.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::notifications::events::NotificationEvent;
use crate::notifications::traits::Subscriber;

/// Key of one registry entry, handed out inside a subscription handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Liveness flags shared between an entry and any snapshot holding it
#[derive(Debug)]
pub(crate) struct Presence {
    active: AtomicBool,
    faulted: AtomicBool,
}

impl Presence {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            faulted: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub(crate) fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Marks the entry faulted, returning true only the first time
    pub(crate) fn mark_faulted(&self) -> bool {
        !self.faulted.swap(true, Ordering::AcqRel)
    }
}

pub(crate) struct RegistryEntry<T>
where
    T: NotificationEvent,
{
    pub(crate) id: SubscriptionId,
    pub(crate) subscriber: Arc<dyn Subscriber<T>>,
    pub(crate) presence: Arc<Presence>,
}

impl<T> Clone for RegistryEntry<T>
where
    T: NotificationEvent,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            subscriber: Arc::clone(&self.subscriber),
            presence: Arc::clone(&self.presence),
        }
    }
}

impl<T> RegistryEntry<T>
where
    T: NotificationEvent,
{
    pub(crate) fn name(&self) -> &str {
        self.subscriber.subscriber_name()
    }
}

/// Identity comparison on the data pointer; vtable pointers are not stable
/// across codegen units.
fn same_subscriber<T>(a: &Arc<dyn Subscriber<T>>, b: &Arc<dyn Subscriber<T>>) -> bool
where
    T: NotificationEvent,
{
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

pub(crate) struct Registry<T>
where
    T: NotificationEvent,
{
    entries: Vec<RegistryEntry<T>>,
    next_id: u64,
}

impl<T> Registry<T>
where
    T: NotificationEvent,
{
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub(crate) fn find(&self, subscriber: &Arc<dyn Subscriber<T>>) -> Option<SubscriptionId> {
        self.entries
            .iter()
            .find(|entry| same_subscriber(&entry.subscriber, subscriber))
            .map(|entry| entry.id)
    }

    /// Append a new entry at the end of the fan-out order
    pub(crate) fn insert(&mut self, subscriber: Arc<dyn Subscriber<T>>) -> RegistryEntry<T> {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let entry = RegistryEntry {
            id,
            subscriber,
            presence: Arc::new(Presence::new()),
        };
        self.entries.push(entry.clone());
        entry
    }

    /// An entry with a fresh id that is never part of the fan-out order
    pub(crate) fn detached(&mut self, subscriber: Arc<dyn Subscriber<T>>) -> RegistryEntry<T> {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        RegistryEntry {
            id,
            subscriber,
            presence: Arc::new(Presence::new()),
        }
    }

    /// Remove an entry; removing an unknown id is a no-op
    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        match self.entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                let entry = self.entries.remove(index);
                entry.presence.deactivate();
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    /// Copy of the current fan-out order
    pub(crate) fn snapshot(&self) -> Vec<RegistryEntry<T>> {
        self.entries.clone()
    }

    /// Remove every entry, returning how many were dropped
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.entries.len();
        for entry in self.entries.drain(..) {
            entry.presence.deactivate();
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
