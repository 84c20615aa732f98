//! # chatter-store
//!
//! The synchronized document store Chatter runs on.
//!
//! Components never reach a global store: they receive an
//! `Arc<dyn DocumentStore>` and talk to it through a small capability
//! surface (point reads, merge upserts, auto-id appends, ordered queries and
//! live subscriptions).  Every write is stamped by the store's own monotonic
//! clock, so clients never order anything by their local time.
//!
//! Two implementations ship with the crate: [`MemoryStore`], an in-process
//! store with fault injection used by tests, and [`SqliteStore`], which keeps
//! documents in a local SQLite file.

pub mod clock;
pub mod database;
pub mod document;
pub mod listeners;
pub mod memory;
pub mod migrations;
pub mod path;
pub mod query;
pub mod store;

mod engine;
mod error;

pub use clock::{ServerClock, Timestamp};
pub use database::SqliteStore;
pub use document::{Document, FieldValue, Write};
pub use error::{Result, StoreError};
pub use listeners::{SnapshotListener, Subscription};
pub use memory::MemoryStore;
pub use path::{CollectionPath, DocPath};
pub use query::{Direction, Filter, FilterOp, OrderBy, Query};
pub use store::DocumentStore;
