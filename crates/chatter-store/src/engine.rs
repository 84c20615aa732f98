//! Write/read semantics shared by every backend.
//!
//! A backend only knows how to load, save and list raw documents.  The
//! engine wraps it in a mutex and layers on top: server timestamps, creation
//! sequence numbers, merge rules, query evaluation and change notification.
//! Listener snapshots are computed while the backend lock is held, so each
//! one reflects exactly one store version; they are delivered after the lock
//! is released.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::warn;

use crate::clock::{ServerClock, Timestamp};
use crate::document::{Document, FieldValue, Write};
use crate::error::{Result, StoreError};
use crate::listeners::{lock, Entry, ListenerRegistry, SnapshotListener, Subscription};
use crate::path::{CollectionPath, DocPath};
use crate::query::Query;

/// Raw document persistence.
pub(crate) trait Backend: Send {
    fn load(&self, path: &DocPath) -> Result<Option<Document>>;
    fn save(&mut self, doc: &Document, written_at: Timestamp) -> Result<()>;
    fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>>;
}

type Pending = Vec<(Arc<Entry>, Vec<Document>)>;

pub(crate) struct Engine<B> {
    backend: Mutex<B>,
    clock: ServerClock,
    seq: AtomicU64,
    version: AtomicU64,
    listeners: Arc<ListenerRegistry>,
}

enum Mode<'a> {
    Replace,
    Create,
    Merge,
    MergeIfNewer(&'a str),
    Update,
}

impl<B: Backend> Engine<B> {
    pub(crate) fn new(backend: B, clock: ServerClock, last_seq: u64) -> Self {
        Self {
            backend: Mutex::new(backend),
            clock,
            seq: AtomicU64::new(last_seq),
            version: AtomicU64::new(0),
            listeners: ListenerRegistry::new(),
        }
    }

    pub(crate) fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    pub(crate) fn with_backend<T>(&self, f: impl FnOnce(&mut B) -> T) -> T {
        f(&mut lock(&self.backend))
    }

    pub(crate) fn get(&self, path: &DocPath) -> Result<Option<Document>> {
        lock(&self.backend).load(path)
    }

    pub(crate) fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let docs = lock(&self.backend).list(&query.collection)?;
        Ok(query.apply(docs))
    }

    pub(crate) fn set(&self, path: &DocPath, write: &Write) -> Result<Document> {
        self.write(path, write, Mode::Replace).and_then(|doc| written(path, doc))
    }

    pub(crate) fn create(&self, path: &DocPath, write: &Write) -> Result<Option<Document>> {
        self.write(path, write, Mode::Create)
    }

    pub(crate) fn upsert_merge(&self, path: &DocPath, write: &Write) -> Result<Document> {
        self.write(path, write, Mode::Merge).and_then(|doc| written(path, doc))
    }

    pub(crate) fn update(&self, path: &DocPath, write: &Write) -> Result<Document> {
        self.write(path, write, Mode::Update).and_then(|doc| written(path, doc))
    }

    pub(crate) fn merge_if_newer(
        &self,
        path: &DocPath,
        write: &Write,
        order_field: &str,
    ) -> Result<Option<Document>> {
        self.write(path, write, Mode::MergeIfNewer(order_field))
    }

    pub(crate) fn append(&self, collection: &CollectionPath, write: &Write) -> Result<Document> {
        let path = collection.doc(&uuid::Uuid::new_v4().simple().to_string())?;
        self.set(&path, write)
    }

    pub(crate) fn subscribe(&self, query: Query, listener: SnapshotListener) -> Result<Subscription> {
        let (entry, handle, version, docs) = {
            let backend = lock(&self.backend);
            let docs = query.apply(backend.list(&query.collection)?);
            let (entry, handle) = self.listeners.register(query, listener);
            (entry, handle, self.version.load(Ordering::Acquire), docs)
        };
        entry.deliver(version, docs);
        Ok(handle)
    }

    /// Apply one write under the backend lock, then notify listeners.
    /// Returns `None` only when a conditional write was skipped.
    fn write(&self, path: &DocPath, write: &Write, mode: Mode<'_>) -> Result<Option<Document>> {
        let (doc, version, pending) = {
            let mut backend = lock(&self.backend);
            let existing = backend.load(path)?;
            let now = self.clock.now();

            let (fields, seq) = match (&mode, existing) {
                (Mode::Replace, Some(doc)) => (write.resolve(now), doc.seq()),
                (Mode::Create, Some(_)) => return Ok(None),
                (Mode::Update, None) => return Err(StoreError::NotFound(path.to_string())),
                (Mode::MergeIfNewer(field), Some(doc)) => {
                    if !is_newer(write, field, doc.fields(), now)? {
                        return Ok(None);
                    }
                    let mut fields = doc.fields().clone();
                    write.merge_into(&mut fields, now);
                    (fields, doc.seq())
                }
                (_, Some(doc)) => {
                    let mut fields = doc.fields().clone();
                    write.merge_into(&mut fields, now);
                    (fields, doc.seq())
                }
                (Mode::MergeIfNewer(field), None) => {
                    is_newer(write, field, &Map::new(), now)?;
                    (write.resolve(now), self.next_seq())
                }
                (_, None) => (write.resolve(now), self.next_seq()),
            };

            let doc = Document::new(path.clone(), fields, seq);
            backend.save(&doc, now)?;
            let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
            let pending = self.snapshots(&*backend, &path.parent());
            (doc, version, pending)
        };

        for (entry, docs) in pending {
            entry.deliver(version, docs);
        }
        Ok(Some(doc))
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn snapshots(&self, backend: &B, collection: &CollectionPath) -> Pending {
        let watchers = self.listeners.watching(collection);
        if watchers.is_empty() {
            return Vec::new();
        }
        let docs = match backend.list(collection) {
            Ok(docs) => docs,
            Err(e) => {
                warn!(collection = %collection, error = %e, "failed to refresh subscriptions");
                return Vec::new();
            }
        };
        watchers
            .into_iter()
            .map(|entry| {
                let snapshot = entry.query().apply(docs.iter().cloned());
                (entry, snapshot)
            })
            .collect()
    }
}

fn written(path: &DocPath, doc: Option<Document>) -> Result<Document> {
    doc.ok_or_else(|| StoreError::InvalidWrite(format!("write to {path} was skipped")))
}

/// Whether `write` carries a value for `field` greater than the stored one.
/// A missing stored value counts as older than anything.
fn is_newer(write: &Write, field: &str, stored: &Map<String, Value>, now: Timestamp) -> Result<bool> {
    let incoming = match write.get(field) {
        Some(FieldValue::ServerTimestamp) => now.as_micros(),
        Some(FieldValue::Value(v)) => v.as_i64().ok_or_else(|| {
            StoreError::InvalidWrite(format!("ordering field {field} must be an integer"))
        })?,
        None => {
            return Err(StoreError::InvalidWrite(format!(
                "conditional merge without ordering field {field}"
            )))
        }
    };
    Ok(match stored.get(field).and_then(Value::as_i64) {
        Some(current) => incoming > current,
        None => true,
    })
}
