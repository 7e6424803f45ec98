//! Subscription Handles
//!
//! A handle is the only way to leave a stream before it completes. It holds
//! the entry's key and a weak reference to the registry, so it never keeps the
//! publisher's state alive and stays safe to use after the publisher is gone.

use std::sync::Weak;

use log::debug;
use parking_lot::RwLock;

use crate::notifications::events::NotificationEvent;
use crate::notifications::registry::{Registry, SubscriptionId};

/// Capability to cancel one subscription
pub struct Subscription<T>
where
    T: NotificationEvent,
{
    id: SubscriptionId,
    registry: Weak<RwLock<Registry<T>>>,
}

impl<T> Subscription<T>
where
    T: NotificationEvent,
{
    pub(crate) fn new(id: SubscriptionId, registry: Weak<RwLock<Registry<T>>>) -> Self {
        Self { id, registry }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the subscriber from the publisher
    ///
    /// Idempotent and infallible. Once this returns, no later `publish` will
    /// reach the subscriber, and a pass already in progress skips it if it has
    /// not been visited yet.
    pub fn cancel(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if registry.write().remove(self.id) {
            debug!("Cancelled subscription {}", self.id);
        }
    }

    /// Whether the subscriber is still registered
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.read().contains(self.id))
            .unwrap_or(false)
    }

    /// Convert into a guard that cancels when dropped
    pub fn cancel_on_drop(self) -> SubscriptionGuard<T> {
        SubscriptionGuard { inner: self }
    }
}

impl<T> Clone for Subscription<T>
where
    T: NotificationEvent,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            registry: Weak::clone(&self.registry),
        }
    }
}

impl<T> std::fmt::Debug for Subscription<T>
where
    T: NotificationEvent,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Cancels its subscription when dropped
#[derive(Debug)]
pub struct SubscriptionGuard<T>
where
    T: NotificationEvent,
{
    inner: Subscription<T>,
}

impl<T> SubscriptionGuard<T>
where
    T: NotificationEvent,
{
    pub fn subscription(&self) -> &Subscription<T> {
        &self.inner
    }
}

impl<T> Drop for SubscriptionGuard<T>
where
    T: NotificationEvent,
{
    fn drop(&mut self) {
        self.inner.cancel();
    }
}
