//! v001 -- the document table.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    path       TEXT PRIMARY KEY NOT NULL,   -- full document path, e.g. chats/a_b
    collection TEXT NOT NULL,               -- parent collection path
    doc_id     TEXT NOT NULL,               -- last path segment
    fields     TEXT NOT NULL,               -- JSON object
    seq        INTEGER NOT NULL,            -- creation order, never reused
    write_ts   INTEGER NOT NULL             -- server time of the last write, micros
);

CREATE INDEX IF NOT EXISTS idx_documents_collection_seq
    ON documents(collection, seq);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
