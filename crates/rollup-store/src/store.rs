use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, warn};

use rollup_core::ids;
use rollup_core::{ThreadMemory, ThreadState};

use crate::error::{Result, StoreError};

const SELECT_STATE: &str = "SELECT thread_id, thread_name, last_seen_message_id, last_summary_at,
                                   memory, created_at, updated_at
                            FROM project_thread_memory WHERE thread_id = ?1";

/// One checkpoint write, produced after a thread was summarised.
#[derive(Debug, Clone)]
pub struct CheckpointCommit {
    pub thread_id: String,
    pub thread_name: String,
    /// Newest message contained in the summarised window.
    pub newest_message_id: String,
    pub memory: ThreadMemory,
    /// Move the cursor forward. `false` for manual, time-windowed runs.
    pub advance_cursor: bool,
    /// Cursor as it was read at the start of this thread's pass.
    /// The write only lands if the row still holds this value.
    pub expected_cursor: Option<String>,
}

/// Per-thread checkpoint store.
///
/// Wraps one SQLite connection in a `Mutex` and keeps a read-through cache of
/// rows keyed by thread id. The cache is refreshed on every successful commit
/// and dropped on a rejected one; SQLite stays the source of truth across
/// restarts.
pub struct CheckpointStore {
    db: Mutex<Connection>,
    cache: Mutex<HashMap<String, ThreadState>>,
}

impl CheckpointStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Return the thread's checkpoint, inserting a fresh row (null cursor) if absent.
    ///
    /// The insert is `INSERT OR IGNORE` followed by a read-back, so two callers
    /// racing on a new thread both end up with the same row.
    pub fn get_or_create(&self, thread_id: &str, thread_name: &str) -> Result<ThreadState> {
        if let Some(state) = self.get_cached(thread_id) {
            debug!(thread_id, "checkpoint cache hit");
            return Ok(state);
        }

        let db = self.db.lock().unwrap();
        let state = match read_state(&db, thread_id)? {
            Some(state) => state,
            None => {
                let now = Utc::now().to_rfc3339();
                db.execute(
                    "INSERT OR IGNORE INTO project_thread_memory
                     (thread_id, thread_name, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?3)",
                    rusqlite::params![thread_id, thread_name, now],
                )?;
                debug!(thread_id, "checkpoint row created");
                read_state(&db, thread_id)?.ok_or_else(|| StoreError::NotFound {
                    thread_id: thread_id.to_string(),
                })?
            }
        };
        drop(db);

        self.put_cached(&state);
        Ok(state)
    }

    /// Read a checkpoint without creating it.
    pub fn get(&self, thread_id: &str) -> Result<Option<ThreadState>> {
        if let Some(state) = self.get_cached(thread_id) {
            return Ok(Some(state));
        }
        let db = self.db.lock().unwrap();
        let state = read_state(&db, thread_id)?;
        drop(db);
        if let Some(ref s) = state {
            self.put_cached(s);
        }
        Ok(state)
    }

    /// Persist a summary for a thread.
    ///
    /// Always overwrites `memory`, `thread_name`, `last_summary_at` and
    /// `updated_at`. The cursor moves only when `advance_cursor` is set, and
    /// never backwards. The update is conditional on `expected_cursor`: if
    /// another run advanced the row in the meantime the write is rejected with
    /// [`StoreError::StaleCheckpoint`].
    pub fn commit(&self, commit: &CheckpointCommit) -> Result<ThreadState> {
        let now = Utc::now().to_rfc3339();
        let memory_json = commit.memory.encode()?;

        let next_cursor = if commit.advance_cursor {
            Some(match commit.expected_cursor.as_deref() {
                Some(prev) => ids::newest(prev, &commit.newest_message_id).to_string(),
                None => commit.newest_message_id.clone(),
            })
        } else {
            commit.expected_cursor.clone()
        };

        let db = self.db.lock().unwrap();
        let changed = db.execute(
            "UPDATE project_thread_memory
             SET last_seen_message_id = ?1, last_summary_at = ?2, memory = ?3,
                 thread_name = ?4, updated_at = ?2
             WHERE thread_id = ?5 AND last_seen_message_id IS ?6",
            rusqlite::params![
                next_cursor,
                now,
                memory_json,
                commit.thread_name,
                commit.thread_id,
                commit.expected_cursor,
            ],
        )?;

        if changed == 0 {
            let err = rejection(&db, &commit.thread_id, commit.expected_cursor.as_deref())?;
            drop(db);
            self.invalidate(&commit.thread_id);
            return Err(err);
        }

        let state = read_state(&db, &commit.thread_id)?.ok_or_else(|| StoreError::NotFound {
            thread_id: commit.thread_id.clone(),
        })?;
        drop(db);

        debug!(
            thread_id = %commit.thread_id,
            cursor = ?state.last_seen_message_id,
            advanced = commit.advance_cursor,
            "checkpoint committed"
        );
        self.put_cached(&state);
        Ok(state)
    }

    /// Move the cursor past messages that produced no summary (bot or blank
    /// posts), leaving `memory` and `last_summary_at` untouched.
    ///
    /// Same compare-and-swap and monotonic rules as [`commit`](Self::commit).
    pub fn advance_cursor(
        &self,
        thread_id: &str,
        expected_cursor: Option<&str>,
        newest_message_id: &str,
    ) -> Result<ThreadState> {
        let next_cursor = match expected_cursor {
            Some(prev) => ids::newest(prev, newest_message_id),
            None => newest_message_id,
        };

        let db = self.db.lock().unwrap();
        let changed = db.execute(
            "UPDATE project_thread_memory
             SET last_seen_message_id = ?1, updated_at = ?2
             WHERE thread_id = ?3 AND last_seen_message_id IS ?4",
            rusqlite::params![next_cursor, Utc::now().to_rfc3339(), thread_id, expected_cursor],
        )?;

        if changed == 0 {
            let err = rejection(&db, thread_id, expected_cursor)?;
            drop(db);
            self.invalidate(thread_id);
            return Err(err);
        }

        let state = read_state(&db, thread_id)?.ok_or_else(|| StoreError::NotFound {
            thread_id: thread_id.to_string(),
        })?;
        drop(db);

        debug!(thread_id, cursor = ?state.last_seen_message_id, "cursor skipped ahead");
        self.put_cached(&state);
        Ok(state)
    }

    /// Drop a cached row so the next read goes to SQLite.
    pub fn invalidate(&self, thread_id: &str) {
        self.cache.lock().unwrap().remove(thread_id);
    }

    fn get_cached(&self, thread_id: &str) -> Option<ThreadState> {
        self.cache.lock().unwrap().get(thread_id).cloned()
    }

    fn put_cached(&self, state: &ThreadState) {
        self.cache
            .lock()
            .unwrap()
            .insert(state.thread_id.clone(), state.clone());
    }
}

/// Why a conditional update touched no row.
fn rejection(db: &Connection, thread_id: &str, expected: Option<&str>) -> Result<StoreError> {
    let found: Option<Option<String>> = db
        .query_row(
            "SELECT last_seen_message_id FROM project_thread_memory WHERE thread_id = ?1",
            [thread_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(match found {
        None => StoreError::NotFound {
            thread_id: thread_id.to_string(),
        },
        Some(found) => StoreError::StaleCheckpoint {
            thread_id: thread_id.to_string(),
            expected: expected.map(String::from),
            found,
        },
    })
}

fn read_state(db: &Connection, thread_id: &str) -> Result<Option<ThreadState>> {
    let state = db
        .query_row(SELECT_STATE, [thread_id], row_to_state)
        .optional()?;
    Ok(state)
}

fn row_to_state(row: &rusqlite::Row<'_>) -> rusqlite::Result<ThreadState> {
    let thread_id: String = row.get(0)?;
    let memory_raw: Option<String> = row.get(4)?;
    let memory = memory_raw.and_then(|raw| match ThreadMemory::decode(&raw) {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(thread_id = %thread_id, error = %e, "unreadable thread memory, ignoring");
            None
        }
    });
    let last_summary_at: Option<String> = row.get(3)?;

    Ok(ThreadState {
        thread_name: row.get(1)?,
        last_seen_message_id: row.get(2)?,
        last_summary_at: last_summary_at.as_deref().and_then(parse_ts),
        memory,
        created_at: parse_ts(&row.get::<_, String>(5)?).unwrap_or_else(Utc::now),
        updated_at: parse_ts(&row.get::<_, String>(6)?).unwrap_or_else(Utc::now),
        persisted: true,
        thread_id,
    })
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
