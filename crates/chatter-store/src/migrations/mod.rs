//! Schema migrations.
//!
//! Each step is guarded by `PRAGMA user_version` so it runs exactly once per
//! database file.

pub mod v001_documents;
pub mod v002_write_time_index;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Schema version after every migration below has run.
pub const CURRENT_VERSION: u32 = 2;

/// Bring `conn` up to [`CURRENT_VERSION`].
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tracing::info!(
        current_version = current,
        target_version = CURRENT_VERSION,
        "checking database migrations"
    );

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{current} is newer than this build (v{CURRENT_VERSION})"
        )));
    }

    if current < 1 {
        tracing::info!("applying migration v001_documents");
        v001_documents::up(conn).map_err(|e| StoreError::Migration(e.to_string()))?;
        conn.pragma_update(None, "user_version", 1)?;
    }

    if current < 2 {
        tracing::info!("applying migration v002_write_time_index");
        v002_write_time_index::up(conn).map_err(|e| StoreError::Migration(e.to_string()))?;
        conn.pragma_update(None, "user_version", 2)?;
    }

    Ok(())
}
