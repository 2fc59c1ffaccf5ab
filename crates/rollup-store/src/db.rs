use rusqlite::Connection;

use crate::error::Result;

/// Create the checkpoint table. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS project_thread_memory (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            thread_id            TEXT NOT NULL UNIQUE,
            thread_name          TEXT NOT NULL,
            last_seen_message_id TEXT,             -- NULL until first advancing run
            last_summary_at      TEXT,             -- ISO-8601 or NULL
            memory               TEXT,             -- JSON ThreadMemory or NULL
            created_at           TEXT NOT NULL,
            updated_at           TEXT NOT NULL
        );",
    )?;
    Ok(())
}
