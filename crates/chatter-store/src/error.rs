use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached.  Never retried here: retry policy
    /// belongs to the caller.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A live subscription was ended by the store.
    #[error("Subscription terminated: {0}")]
    SubscriptionTerminated(String),

    /// An update targeted a document that does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A path with the wrong shape or an illegal segment.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A write that cannot be applied as requested.
    #[error("Invalid write: {0}")]
    InvalidWrite(String),

    /// Stored fields do not match the requested shape.
    #[error("Failed to decode document {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
