//! Live query subscriptions.
//!
//! Each subscription keeps the last snapshot it delivered together with the
//! store version that produced it.  A snapshot is delivered only when it is
//! newer than that version and differs from the previous one, so a listener
//! never observes the log moving backwards and never sees duplicate
//! notifications.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::debug;

use crate::document::Document;
use crate::error::{Result, StoreError};
use crate::path::CollectionPath;
use crate::query::Query;

/// Callback receiving the full result of a query on every change, or the
/// error that ended the subscription.
pub type SnapshotListener = Box<dyn Fn(Result<Vec<Document>>) + Send + Sync>;

/// Recover the guard even if another thread panicked while holding it; the
/// protected data is only ever replaced wholesale.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct Delivered {
    version: Option<u64>,
    docs: Option<Vec<Document>>,
}

pub(crate) struct Entry {
    query: Query,
    listener: SnapshotListener,
    closed: AtomicBool,
    delivered: Mutex<Delivered>,
}

impl Entry {
    pub(crate) fn query(&self) -> &Query {
        &self.query
    }

    /// Hand `docs` (computed at store `version`) to the listener unless it is
    /// stale, unchanged, or the subscription has been cancelled.
    pub(crate) fn deliver(&self, version: u64, docs: Vec<Document>) {
        let mut delivered = lock(&self.delivered);
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if delivered.version.is_some_and(|v| v >= version) {
            return;
        }
        delivered.version = Some(version);
        if delivered.docs.as_ref() == Some(&docs) {
            return;
        }
        delivered.docs = Some(docs.clone());
        (self.listener)(Ok(docs));
    }

    fn fail(&self, error: StoreError) {
        let _delivered = lock(&self.delivered);
        (self.listener)(Err(error));
    }
}

/// All live subscriptions of one store.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, Arc<Entry>>>,
}

impl ListenerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn register(
        self: &Arc<Self>,
        query: Query,
        listener: SnapshotListener,
    ) -> (Arc<Entry>, Subscription) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = Arc::new(Entry {
            query,
            listener,
            closed: AtomicBool::new(false),
            delivered: Mutex::new(Delivered::default()),
        });
        lock(&self.entries).insert(id, Arc::clone(&entry));
        debug!(subscription = id, collection = %entry.query.collection, "subscription registered");

        let handle = Subscription {
            id,
            registry: Arc::downgrade(self),
            cancelled: AtomicBool::new(false),
        };
        (entry, handle)
    }

    /// Subscriptions whose query reads `collection`.
    pub(crate) fn watching(&self, collection: &CollectionPath) -> Vec<Arc<Entry>> {
        lock(&self.entries)
            .values()
            .filter(|e| &e.query.collection == collection)
            .cloned()
            .collect()
    }

    /// End every subscription with `reason`.
    pub fn terminate_all(&self, reason: &str) {
        let drained: Vec<(u64, Arc<Entry>)> = lock(&self.entries).drain().collect();
        for (id, entry) in drained {
            entry.closed.store(true, Ordering::Release);
            debug!(subscription = id, reason, "subscription terminated");
            entry.fail(StoreError::SubscriptionTerminated(reason.to_string()));
        }
    }

    /// Number of live subscriptions.
    pub fn active_count(&self) -> usize {
        lock(&self.entries).len()
    }

    fn remove(&self, id: u64) -> bool {
        match lock(&self.entries).remove(&id) {
            Some(entry) => {
                entry.closed.store(true, Ordering::Release);
                debug!(subscription = id, "subscription cancelled");
                true
            }
            None => false,
        }
    }
}

/// Handle to a live subscription.
///
/// Cancelling stops delivery and releases the listener.  `cancel` may be
/// called any number of times; dropping the handle cancels as well.  A
/// delivery already running on another thread when `cancel` is called may
/// still complete.
pub struct Subscription {
    id: u64,
    registry: Weak<ListenerRegistry>,
    cancelled: AtomicBool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns `true` if this call ended the subscription.
    pub fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.registry
            .upgrade()
            .map(|registry| registry.remove(self.id))
            .unwrap_or(false)
    }

    /// Whether the store still delivers to this subscription.
    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::Acquire)
            && self
                .registry
                .upgrade()
                .is_some_and(|registry| lock(&registry.entries).contains_key(&self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_listener() -> (Arc<AtomicUsize>, SnapshotListener) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let listener: SnapshotListener = Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (calls, listener)
    }

    fn query() -> Query {
        Query::new(CollectionPath::root("c").unwrap())
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let registry = ListenerRegistry::new();
        let (_calls, listener) = counting_listener();
        let (_entry, sub) = registry.register(query(), listener);

        assert!(sub.is_active());
        assert!(sub.cancel());
        assert!(!sub.cancel());
        assert!(!sub.is_active());
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_drop_cancels() {
        let registry = ListenerRegistry::new();
        let (_calls, listener) = counting_listener();
        let (_entry, sub) = registry.register(query(), listener);
        drop(sub);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_stale_and_duplicate_snapshots_skipped() {
        let registry = ListenerRegistry::new();
        let (calls, listener) = counting_listener();
        let (entry, _sub) = registry.register(query(), listener);

        entry.deliver(2, Vec::new());
        entry.deliver(1, Vec::new());
        entry.deliver(3, Vec::new());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_delivery_after_cancel() {
        let registry = ListenerRegistry::new();
        let (calls, listener) = counting_listener();
        let (entry, sub) = registry.register(query(), listener);
        sub.cancel();
        entry.deliver(1, Vec::new());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_terminate_all_reports_error() {
        let registry = ListenerRegistry::new();
        let errors = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&errors);
        let (_entry, sub) = registry.register(
            query(),
            Box::new(move |result| {
                if matches!(result, Err(StoreError::SubscriptionTerminated(_))) {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );

        registry.terminate_all("maintenance");
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(!sub.is_active());
        assert_eq!(registry.active_count(), 0);
    }
}
