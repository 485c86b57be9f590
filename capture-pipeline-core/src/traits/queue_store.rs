use crate::models::error::PipelineError;
use crate::models::queue_item::{QueueItem, UploadStatus};
use crate::models::session::SessionState;

/// Durable table of queue items plus the singleton active-session record.
///
/// Implemented by:
/// - `SqliteQueueStore` (capture-pipeline-sqlite) — the durable backend.
/// - `MemoryQueueStore` — for tests and embedders that opt out of
///   durability.
///
/// Every call is a short, independent operation; each single-row write is
/// atomic, and a durable backend must survive process death between any
/// two calls. No cross-row transaction exists anywhere in the pipeline.
pub trait QueueStore: Send + Sync {
    /// Insert a row, replacing any existing row with the same
    /// (user_id, session_id, seq_index, file_type); last write wins.
    /// Returns the row id.
    fn insert(&self, item: &QueueItem) -> Result<i64, PipelineError>;

    /// Rows in `status`, ordered by created_at, at most `limit`.
    fn items_by_status(
        &self,
        status: UploadStatus,
        limit: usize,
    ) -> Result<Vec<QueueItem>, PipelineError>;

    /// Whole-row replace by id. Errors if the row does not exist.
    fn update(&self, item: &QueueItem) -> Result<(), PipelineError>;

    fn active_session(&self) -> Result<Option<SessionState>, PipelineError>;

    /// Replace the singleton session row.
    fn set_session_state(&self, state: &SessionState) -> Result<(), PipelineError>;

    fn clear_session_state(&self) -> Result<(), PipelineError>;

    /// Bulk UPLOADING → PENDING; returns how many rows moved. Run once at
    /// process start, before any worker: UPLOADING can never legitimately
    /// survive a restart.
    fn reset_stuck_uploads(&self) -> Result<u64, PipelineError>;

    /// Row count per status. Feeds diagnostics only.
    fn count_by_status(&self, status: UploadStatus) -> Result<u64, PipelineError>;
}
