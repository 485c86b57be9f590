//! # capture-pipeline-sqlite
//!
//! Durable `QueueStore` backend over SQLite.
//!
//! Single-file database, single process. Every trait call is one
//! statement (one implicit transaction), which is all the pipeline's
//! crash-safety story requires: each single-row write lands atomically,
//! and no operation spans rows. Schema changes ride a `user_version`
//! ladder and are additive only — a production database is never dropped
//! to recover from a version mismatch.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use capture_pipeline_core::{
    FileType, PipelineError, QueueItem, QueueStore, SessionState, UploadStatus,
};

const SCHEMA_VERSION: i64 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS upload_queue (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     TEXT    NOT NULL,
    session_id  TEXT    NOT NULL,
    seq_index   INTEGER NOT NULL,
    trace_id    TEXT    NOT NULL,
    file_path   TEXT    NOT NULL,
    file_type   TEXT    NOT NULL,
    status      TEXT    NOT NULL,
    attempts    INTEGER NOT NULL DEFAULT 0,
    created_at  INTEGER NOT NULL,
    retry_after INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_upload_queue_shard
    ON upload_queue (user_id, session_id, seq_index, file_type);
CREATE INDEX IF NOT EXISTS idx_upload_queue_status
    ON upload_queue (status, created_at);
CREATE TABLE IF NOT EXISTS active_session (
    id             INTEGER PRIMARY KEY CHECK (id = 1),
    user_id        TEXT    NOT NULL,
    session_id     TEXT    NOT NULL,
    start_ts       INTEGER NOT NULL,
    last_seq_index INTEGER NOT NULL,
    is_active      INTEGER NOT NULL
);
";

/// SQLite-backed queue store.
///
/// The connection sits behind a mutex: the store is shared by the session
/// controller, the rotation timer, and both lane workers, and rusqlite
/// connections are not `Sync`. Contention is negligible — every call is a
/// short single-row statement.
pub struct SqliteQueueStore {
    conn: Mutex<Connection>,
}

impl SqliteQueueStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let conn = Connection::open(path).map_err(storage_err)?;
        Self::bootstrap(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database; contents vanish on drop. Tests only.
    pub fn open_in_memory() -> Result<Self, PipelineError> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::bootstrap(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn bootstrap(conn: &Connection) -> Result<(), PipelineError> {
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(storage_err)?;
        if version > SCHEMA_VERSION {
            return Err(PipelineError::Storage(format!(
                "database schema version {} is newer than supported version {}",
                version, SCHEMA_VERSION
            )));
        }
        if version < 1 {
            conn.execute_batch(SCHEMA_V1).map_err(storage_err)?;
        }
        // Future versions append ALTER TABLE steps above this line,
        // gated on `version < N`; existing rows are never dropped.
        if version != SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .map_err(storage_err)?;
            log::info!("queue schema migrated {} -> {}", version, SCHEMA_VERSION);
        }
        Ok(())
    }
}

impl QueueStore for SqliteQueueStore {
    fn insert(&self, item: &QueueItem) -> Result<i64, PipelineError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO upload_queue
                (user_id, session_id, seq_index, trace_id, file_path,
                 file_type, status, attempts, created_at, retry_after)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT (user_id, session_id, seq_index, file_type) DO UPDATE SET
                trace_id    = excluded.trace_id,
                file_path   = excluded.file_path,
                status      = excluded.status,
                attempts    = excluded.attempts,
                created_at  = excluded.created_at,
                retry_after = excluded.retry_after",
            params![
                item.user_id,
                item.session_id,
                item.seq_index,
                item.trace_id,
                item.file_path,
                item.file_type.as_str(),
                item.status.as_str(),
                item.attempts,
                item.created_at.timestamp_millis(),
                item.retry_after.timestamp_millis(),
            ],
        )
        .map_err(storage_err)?;

        conn.query_row(
            "SELECT id FROM upload_queue
             WHERE user_id = ?1 AND session_id = ?2 AND seq_index = ?3 AND file_type = ?4",
            params![
                item.user_id,
                item.session_id,
                item.seq_index,
                item.file_type.as_str()
            ],
            |row| row.get(0),
        )
        .map_err(storage_err)
    }

    fn items_by_status(
        &self,
        status: UploadStatus,
        limit: usize,
    ) -> Result<Vec<QueueItem>, PipelineError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, session_id, seq_index, trace_id, file_path,
                        file_type, status, attempts, created_at, retry_after
                 FROM upload_queue
                 WHERE status = ?1
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?2",
            )
            .map_err(storage_err)?;
        let rows = stmt
            .query_map(params![status.as_str(), limit as i64], read_item)
            .map_err(storage_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
    }

    fn update(&self, item: &QueueItem) -> Result<(), PipelineError> {
        let changed = self
            .conn
            .lock()
            .execute(
                "UPDATE upload_queue SET
                    user_id = ?2, session_id = ?3, seq_index = ?4, trace_id = ?5,
                    file_path = ?6, file_type = ?7, status = ?8, attempts = ?9,
                    created_at = ?10, retry_after = ?11
                 WHERE id = ?1",
                params![
                    item.id,
                    item.user_id,
                    item.session_id,
                    item.seq_index,
                    item.trace_id,
                    item.file_path,
                    item.file_type.as_str(),
                    item.status.as_str(),
                    item.attempts,
                    item.created_at.timestamp_millis(),
                    item.retry_after.timestamp_millis(),
                ],
            )
            .map_err(storage_err)?;
        if changed == 0 {
            return Err(PipelineError::Storage(format!(
                "update of missing queue row id {}",
                item.id
            )));
        }
        Ok(())
    }

    fn active_session(&self) -> Result<Option<SessionState>, PipelineError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT user_id, session_id, start_ts, last_seq_index, is_active
                 FROM active_session WHERE id = 1",
            )
            .map_err(storage_err)?;
        let mut rows = stmt
            .query_map([], |row| {
                Ok(SessionState {
                    user_id: row.get(0)?,
                    session_id: row.get(1)?,
                    start_ts: read_timestamp(row.get(2)?)?,
                    last_seq_index: row.get(3)?,
                    is_active: row.get::<_, i64>(4)? != 0,
                })
            })
            .map_err(storage_err)?;
        match rows.next() {
            Some(state) => Ok(Some(state.map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    fn set_session_state(&self, state: &SessionState) -> Result<(), PipelineError> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO active_session
                    (id, user_id, session_id, start_ts, last_seq_index, is_active)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (id) DO UPDATE SET
                    user_id        = excluded.user_id,
                    session_id     = excluded.session_id,
                    start_ts       = excluded.start_ts,
                    last_seq_index = excluded.last_seq_index,
                    is_active      = excluded.is_active",
                params![
                    state.user_id,
                    state.session_id,
                    state.start_ts.timestamp_millis(),
                    state.last_seq_index,
                    state.is_active as i64,
                ],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    fn clear_session_state(&self) -> Result<(), PipelineError> {
        self.conn
            .lock()
            .execute("DELETE FROM active_session", [])
            .map_err(storage_err)?;
        Ok(())
    }

    fn reset_stuck_uploads(&self) -> Result<u64, PipelineError> {
        let moved = self
            .conn
            .lock()
            .execute(
                "UPDATE upload_queue SET status = ?1 WHERE status = ?2",
                params![
                    UploadStatus::Pending.as_str(),
                    UploadStatus::Uploading.as_str()
                ],
            )
            .map_err(storage_err)?;
        Ok(moved as u64)
    }

    fn count_by_status(&self, status: UploadStatus) -> Result<u64, PipelineError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM upload_queue WHERE status = ?1",
                params![status.as_str()],
                |row| row.get(0),
            )
            .map_err(storage_err)?;
        Ok(count as u64)
    }
}

fn storage_err(err: rusqlite::Error) -> PipelineError {
    PipelineError::Storage(err.to_string())
}

fn read_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueItem> {
    Ok(QueueItem {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        seq_index: row.get(3)?,
        trace_id: row.get(4)?,
        file_path: row.get(5)?,
        file_type: read_file_type(row.get(6)?)?,
        status: read_status(row.get(7)?)?,
        attempts: row.get(8)?,
        created_at: read_timestamp(row.get(9)?)?,
        retry_after: read_timestamp(row.get(10)?)?,
    })
}

fn read_file_type(tag: String) -> rusqlite::Result<FileType> {
    FileType::from_str(&tag).ok_or_else(|| conversion_err(format!("unknown file type '{}'", tag)))
}

fn read_status(tag: String) -> rusqlite::Result<UploadStatus> {
    UploadStatus::from_str(&tag)
        .ok_or_else(|| conversion_err(format!("unknown upload status '{}'", tag)))
}

fn read_timestamp(millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| conversion_err(format!("timestamp {} out of range", millis)))
}

fn conversion_err(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, message.into())
}
