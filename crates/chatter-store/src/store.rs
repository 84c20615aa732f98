//! The capability surface every backend provides.

use async_trait::async_trait;

use crate::document::{Document, Write};
use crate::error::Result;
use crate::listeners::{SnapshotListener, Subscription};
use crate::path::{CollectionPath, DocPath};
use crate::query::Query;

/// A synchronized document store.
///
/// All writes resolve [`Write::server_timestamp`] fields with the store's own
/// clock and return the document as stored, so callers learn the assigned
/// time without a second read.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read.
    async fn get(&self, path: &DocPath) -> Result<Option<Document>>;

    /// Create or fully replace a document.
    async fn set(&self, path: &DocPath, write: Write) -> Result<Document>;

    /// Create the document only if it does not exist yet.  Returns `None`
    /// and leaves the stored document untouched otherwise.
    async fn create(&self, path: &DocPath, write: Write) -> Result<Option<Document>>;

    /// Create the document, or overwrite only the named fields.
    async fn upsert_merge(&self, path: &DocPath, write: Write) -> Result<Document>;

    /// Like [`upsert_merge`](Self::upsert_merge), but only applied when the
    /// write's `order_field` is greater than the stored one.  Returns `None`
    /// when the stored document was newer.
    async fn merge_if_newer(
        &self,
        path: &DocPath,
        write: Write,
        order_field: &str,
    ) -> Result<Option<Document>>;

    /// Overwrite the named fields of an existing document; fails with
    /// `NotFound` if it does not exist.
    async fn update(&self, path: &DocPath, write: Write) -> Result<Document>;

    /// Add a document under a store-generated id.
    async fn append(&self, collection: &CollectionPath, write: Write) -> Result<Document>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>>;

    /// Deliver the current result of `query` to `listener` before returning,
    /// then again after every change to it.
    async fn subscribe(&self, query: Query, listener: SnapshotListener) -> Result<Subscription>;
}
