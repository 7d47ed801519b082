//! Sync hub — typed publish/subscribe for store change notifications.
//!
//! DESIGN
//! ======
//! Listeners live in a map keyed by subscription id. `emit` copies the
//! listener set out of the lock before calling anything, so a listener may
//! subscribe, unsubscribe (itself included), or read the store while being
//! notified. A panicking listener is logged and skipped; the rest still
//! receive the event.
//!
//! Delivery order between listeners is unspecified.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::warn;

use crate::types::SyncEvent;

pub type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

#[derive(Default)]
struct HubInner {
    listeners: Mutex<HashMap<u64, Listener>>,
    next_id: AtomicU64,
}

impl HubInner {
    fn listeners(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Listener>> {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[derive(Clone, Default)]
pub struct SyncHub {
    inner: Arc<HubInner>,
}

impl SyncHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. It stays registered until the returned handle is
    /// unsubscribed or dropped.
    pub fn subscribe(&self, listener: impl Fn(&SyncEvent) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners().insert(id, Arc::new(listener));
        Subscription { hub: Arc::downgrade(&self.inner), id: Some(id) }
    }

    pub fn emit(&self, event: &SyncEvent) {
        let snapshot: Vec<(u64, Listener)> = self
            .inner
            .listeners()
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();

        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(subscription = id, ?event, "sync listener panicked");
            }
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }
}

/// Capability to deregister a listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener immediately"]
pub struct Subscription {
    hub: Weak<HubInner>,
    id: Option<u64>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(hub) = self.hub.upgrade() {
            hub.listeners().remove(&id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
