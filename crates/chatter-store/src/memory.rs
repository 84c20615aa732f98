//! In-process store.
//!
//! Behaves like the hosted store (same merge, ordering and notification
//! rules) and can be told to misbehave: go unavailable, reject writes under
//! a path prefix, or cut every live subscription.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::clock::{ServerClock, Timestamp};
use crate::document::{Document, Write};
use crate::engine::{Backend, Engine};
use crate::error::{Result, StoreError};
use crate::listeners::{lock, SnapshotListener, Subscription};
use crate::path::{CollectionPath, DocPath};
use crate::query::Query;
use crate::store::DocumentStore;

#[derive(Default)]
struct MemoryBackend {
    docs: BTreeMap<DocPath, Document>,
}

impl Backend for MemoryBackend {
    fn load(&self, path: &DocPath) -> Result<Option<Document>> {
        Ok(self.docs.get(path).cloned())
    }

    fn save(&mut self, doc: &Document, _written_at: Timestamp) -> Result<()> {
        self.docs.insert(doc.path().clone(), doc.clone());
        Ok(())
    }

    fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>> {
        Ok(self
            .docs
            .values()
            .filter(|doc| &doc.path().parent() == collection)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
struct Faults {
    unavailable: bool,
    failing_prefixes: Vec<String>,
}

/// In-memory [`DocumentStore`].
pub struct MemoryStore {
    engine: Engine<MemoryBackend>,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            engine: Engine::new(MemoryBackend::default(), ServerClock::new(), 0),
            faults: Mutex::new(Faults::default()),
        }
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        info!(unavailable, "memory store availability changed");
        lock(&self.faults).unavailable = unavailable;
    }

    /// Reject writes to any document whose path starts with `prefix`.
    pub fn fail_writes_under(&self, prefix: impl Into<String>) {
        lock(&self.faults).failing_prefixes.push(prefix.into());
    }

    /// Clear every injected fault.
    pub fn heal(&self) {
        *lock(&self.faults) = Faults::default();
    }

    /// End every live subscription with [`StoreError::SubscriptionTerminated`].
    pub fn terminate_subscriptions(&self, reason: &str) {
        self.engine.listeners().terminate_all(reason);
    }

    /// Number of live subscriptions.
    pub fn active_subscriptions(&self) -> usize {
        self.engine.listeners().active_count()
    }

    /// Number of documents directly inside `collection`.
    pub fn document_count(&self, collection: &CollectionPath) -> usize {
        self.engine
            .with_backend(|b| b.list(collection).map(|docs| docs.len()).unwrap_or(0))
    }

    fn check_available(&self) -> Result<()> {
        if lock(&self.faults).unavailable {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }

    fn check_writable(&self, path: &DocPath) -> Result<()> {
        self.check_available()?;
        let faults = lock(&self.faults);
        if faults
            .failing_prefixes
            .iter()
            .any(|prefix| path.as_str().starts_with(prefix.as_str()))
        {
            return Err(StoreError::Unavailable(format!("write to {path} rejected")));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>> {
        self.check_available()?;
        self.engine.get(path)
    }

    async fn set(&self, path: &DocPath, write: Write) -> Result<Document> {
        self.check_writable(path)?;
        self.engine.set(path, &write)
    }

    async fn create(&self, path: &DocPath, write: Write) -> Result<Option<Document>> {
        self.check_writable(path)?;
        self.engine.create(path, &write)
    }

    async fn upsert_merge(&self, path: &DocPath, write: Write) -> Result<Document> {
        self.check_writable(path)?;
        self.engine.upsert_merge(path, &write)
    }

    async fn merge_if_newer(
        &self,
        path: &DocPath,
        write: Write,
        order_field: &str,
    ) -> Result<Option<Document>> {
        self.check_writable(path)?;
        self.engine.merge_if_newer(path, &write, order_field)
    }

    async fn update(&self, path: &DocPath, write: Write) -> Result<Document> {
        self.check_writable(path)?;
        self.engine.update(path, &write)
    }

    async fn append(&self, collection: &CollectionPath, write: Write) -> Result<Document> {
        // Check against the collection itself; the generated id is not known yet.
        self.check_writable(&collection.doc("_")?)?;
        self.engine.append(collection, &write)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        self.check_available()?;
        self.engine.query(query)
    }

    async fn subscribe(&self, query: Query, listener: SnapshotListener) -> Result<Subscription> {
        self.check_available()?;
        self.engine.subscribe(query, listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Direction;
    use serde_json::json;
    use std::sync::Arc;

    fn coll(raw: &str) -> CollectionPath {
        CollectionPath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_merge_is_non_destructive() {
        let store = MemoryStore::new();
        let path = DocPath::parse("chats/u1_u2").unwrap();

        store
            .upsert_merge(&path, Write::new().set("a", 1).set("b", 2))
            .await
            .unwrap();
        let doc = store.upsert_merge(&path, Write::new().set("b", 3)).await.unwrap();

        assert_eq!(doc.get("a"), Some(&json!(1)));
        assert_eq!(doc.get("b"), Some(&json!(3)));
        assert_eq!(store.document_count(&coll("chats")), 1);
    }

    #[tokio::test]
    async fn test_set_replaces_but_keeps_creation_order() {
        let store = MemoryStore::new();
        let path = DocPath::parse("users/u1").unwrap();

        let first = store.set(&path, Write::new().set("a", 1)).await.unwrap();
        let second = store.set(&path, Write::new().set("b", 2)).await.unwrap();

        assert_eq!(second.get("a"), None);
        assert_eq!(second.seq(), first.seq());
    }

    #[tokio::test]
    async fn test_create_only_when_absent() {
        let store = MemoryStore::new();
        let path = DocPath::parse("chats/u1_u2").unwrap();

        let first = store
            .create(&path, Write::new().server_timestamp("createdAt"))
            .await
            .unwrap()
            .unwrap();
        let second = store
            .create(&path, Write::new().server_timestamp("createdAt"))
            .await
            .unwrap();

        assert!(second.is_none());
        let stored = store.get(&path).await.unwrap().unwrap();
        assert_eq!(stored.get_timestamp("createdAt"), first.get_timestamp("createdAt"));
    }

    #[tokio::test]
    async fn test_update_requires_existing_document() {
        let store = MemoryStore::new();
        let path = DocPath::parse("chats/u1_u2").unwrap();
        let err = store.update(&path, Write::new().set("a", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_server_timestamps_increase() {
        let store = MemoryStore::new();
        let messages = coll("chats/u1_u2/messages");
        let a = store
            .append(&messages, Write::new().server_timestamp("createdAt"))
            .await
            .unwrap();
        let b = store
            .append(&messages, Write::new().server_timestamp("createdAt"))
            .await
            .unwrap();
        assert!(b.get_timestamp("createdAt") > a.get_timestamp("createdAt"));
        assert!(b.seq() > a.seq());
    }

    #[tokio::test]
    async fn test_merge_if_newer_is_last_writer_wins() {
        let store = MemoryStore::new();
        let path = DocPath::parse("userChats/u1/items/u1_u2").unwrap();

        let applied = store
            .merge_if_newer(&path, Write::new().set("v", "new").set("at", 20), "at")
            .await
            .unwrap();
        assert!(applied.is_some());

        let stale = store
            .merge_if_newer(&path, Write::new().set("v", "old").set("at", 10), "at")
            .await
            .unwrap();
        assert!(stale.is_none());

        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc.get_str("v"), Some("new"));

        let missing_field = store
            .merge_if_newer(&path, Write::new().set("v", "x"), "at")
            .await;
        assert!(matches!(missing_field, Err(StoreError::InvalidWrite(_))));
    }

    #[tokio::test]
    async fn test_subscription_gets_initial_and_changed_snapshots() {
        let store = MemoryStore::new();
        let messages = coll("chats/u1_u2/messages");
        let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();

        let sink = Arc::clone(&seen);
        let sub = store
            .subscribe(
                Query::new(messages.clone()).order_by("n", Direction::Ascending),
                Box::new(move |snapshot| {
                    let ids = snapshot
                        .unwrap()
                        .iter()
                        .map(|d| d.get("n").unwrap().to_string())
                        .collect();
                    lock(&sink).push(ids);
                }),
            )
            .await
            .unwrap();

        store.append(&messages, Write::new().set("n", 1)).await.unwrap();
        store.append(&messages, Write::new().set("n", 2)).await.unwrap();
        // A write elsewhere does not re-deliver.
        store
            .upsert_merge(&DocPath::parse("chats/u1_u2").unwrap(), Write::new().set("x", 1))
            .await
            .unwrap();

        assert_eq!(
            *lock(&seen),
            vec![vec![], vec!["1".to_string()], vec!["1".to_string(), "2".to_string()]]
        );

        sub.cancel();
        store.append(&messages, Write::new().set("n", 3)).await.unwrap();
        assert_eq!(lock(&seen).len(), 3);
        assert_eq!(store.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_everything() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let path = DocPath::parse("users/u1").unwrap();

        assert!(matches!(store.get(&path).await, Err(StoreError::Unavailable(_))));
        assert!(store.upsert_merge(&path, Write::new()).await.is_err());
        assert!(store
            .subscribe(Query::new(coll("users")), Box::new(|_| {}))
            .await
            .is_err());

        store.heal();
        assert!(store.get(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failing_prefix_only_hits_matching_paths() {
        let store = MemoryStore::new();
        store.fail_writes_under("userChats/u2/");

        let ok = DocPath::parse("userChats/u1/items/u1_u2").unwrap();
        let bad = DocPath::parse("userChats/u2/items/u1_u2").unwrap();
        assert!(store.upsert_merge(&ok, Write::new().set("a", 1)).await.is_ok());
        assert!(store.upsert_merge(&bad, Write::new().set("a", 1)).await.is_err());
        assert!(store.get(&bad).await.unwrap().is_none());
    }
}
