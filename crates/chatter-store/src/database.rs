//! SQLite-backed store.
//!
//! Documents live in a single `documents` table keyed by path.  Merge rules,
//! ordering and subscriptions come from the shared engine, so this module
//! only translates between rows and [`Document`]s.  Change notifications are
//! delivered to subscribers of the same `SqliteStore` instance; another
//! process writing the same file is not observed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use crate::clock::{ServerClock, Timestamp};
use crate::document::{Document, Write};
use crate::engine::{Backend, Engine};
use crate::error::{Result, StoreError};
use crate::listeners::{SnapshotListener, Subscription};
use crate::migrations;
use crate::path::{CollectionPath, DocPath};
use crate::query::Query;
use crate::store::DocumentStore;

struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    fn row_to_document(path: &str, fields: &str, seq: i64) -> Result<Document> {
        let path = DocPath::parse(path)?;
        let fields: Map<String, Value> =
            serde_json::from_str(fields).map_err(|source| StoreError::Decode {
                path: path.to_string(),
                source,
            })?;
        Ok(Document::new(path, fields, seq.max(0) as u64))
    }
}

impl Backend for SqliteBackend {
    fn load(&self, path: &DocPath) -> Result<Option<Document>> {
        let row: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT fields, seq FROM documents WHERE path = ?1",
                params![path.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(fields, seq)| Self::row_to_document(path.as_str(), &fields, seq))
            .transpose()
    }

    fn save(&mut self, doc: &Document, written_at: Timestamp) -> Result<()> {
        let fields = serde_json::to_string(doc.fields())?;
        self.conn.execute(
            "INSERT INTO documents (path, collection, doc_id, fields, seq, write_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(path) DO UPDATE SET
                 fields = excluded.fields,
                 write_ts = excluded.write_ts",
            params![
                doc.path().as_str(),
                doc.path().parent().as_str(),
                doc.id(),
                fields,
                doc.seq() as i64,
                written_at.as_micros(),
            ],
        )?;
        Ok(())
    }

    fn list(&self, collection: &CollectionPath) -> Result<Vec<Document>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, fields, seq FROM documents
             WHERE collection = ?1
             ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![collection.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (path, fields, seq) = row?;
            docs.push(Self::row_to_document(&path, &fields, seq)?);
        }
        Ok(docs)
    }
}

/// [`DocumentStore`] persisted in a local SQLite file.
pub struct SqliteStore {
    engine: Engine<SqliteBackend>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the default database in the platform data directory:
    /// - Linux:   `~/.local/share/chatter/chatter.db`
    /// - macOS:   `~/Library/Application Support/app.chatter.chatter/chatter.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\chatter\chatter\data\chatter.db`
    pub fn open_default() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("app", "chatter", "chatter").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        Self::open_at(&data_dir.join("chatter.db"))
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "opening document database");
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn, Some(path.to_path_buf()))
    }

    /// A private, throwaway database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        migrations::run_migrations(&conn)?;

        let (last_ts, last_seq): (Option<i64>, Option<i64>) = conn.query_row(
            "SELECT MAX(write_ts), MAX(seq) FROM documents",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let clock = ServerClock::starting_after(Timestamp::from_micros(last_ts.unwrap_or(0)));

        tracing::debug!(last_seq = last_seq.unwrap_or(0), "document database ready");

        Ok(Self {
            engine: Engine::new(
                SqliteBackend { conn },
                clock,
                last_seq.unwrap_or(0).max(0) as u64,
            ),
            path,
        })
    }

    /// Filesystem path of the open database, if it is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Total number of stored documents.
    pub fn document_count(&self) -> Result<u64> {
        self.engine.with_backend(|b| -> Result<u64> {
            let count: i64 = b
                .conn
                .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>> {
        self.engine.get(path)
    }

    async fn set(&self, path: &DocPath, write: Write) -> Result<Document> {
        self.engine.set(path, &write)
    }

    async fn create(&self, path: &DocPath, write: Write) -> Result<Option<Document>> {
        self.engine.create(path, &write)
    }

    async fn upsert_merge(&self, path: &DocPath, write: Write) -> Result<Document> {
        self.engine.upsert_merge(path, &write)
    }

    async fn merge_if_newer(
        &self,
        path: &DocPath,
        write: Write,
        order_field: &str,
    ) -> Result<Option<Document>> {
        self.engine.merge_if_newer(path, &write, order_field)
    }

    async fn update(&self, path: &DocPath, write: Write) -> Result<Document> {
        self.engine.update(path, &write)
    }

    async fn append(&self, collection: &CollectionPath, write: Write) -> Result<Document> {
        self.engine.append(collection, &write)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        self.engine.query(query)
    }

    async fn subscribe(&self, query: Query, listener: SnapshotListener) -> Result<Subscription> {
        self.engine.subscribe(query, listener)
    }
}
