use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Artifact kind produced by one shard of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    /// Physical telemetry log (`.jsonl`).
    PhysLog,
    /// On-screen activity log (`.jsonl`).
    ScreenLog,
    /// Recorded audio (`.m4a`).
    Audio,
}

impl FileType {
    /// Every artifact type a sealed shard enqueues, in seal order.
    pub const ALL: [FileType; 3] = [FileType::PhysLog, FileType::ScreenLog, FileType::Audio];

    /// Stable tag used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::PhysLog => "PHYS_LOG",
            FileType::ScreenLog => "SCREEN_LOG",
            FileType::Audio => "AUDIO",
        }
    }

    pub fn from_str(tag: &str) -> Option<Self> {
        match tag {
            "PHYS_LOG" => Some(FileType::PhysLog),
            "SCREEN_LOG" => Some(FileType::ScreenLog),
            "AUDIO" => Some(FileType::Audio),
            _ => None,
        }
    }
}

/// Upload lifecycle of a queued artifact.
///
/// ```text
/// pending → uploading → completed
///              ↓
///           pending (attempts+1, retry_after advanced)
///              ↓
///           failed (lane attempt budget exhausted)
/// ```
///
/// UPLOADING never survives a restart: recovery moves every such row back
/// to PENDING before anything else runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UploadStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "PENDING",
            UploadStatus::Uploading => "UPLOADING",
            UploadStatus::Completed => "COMPLETED",
            UploadStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(tag: &str) -> Option<Self> {
        match tag {
            "PENDING" => Some(UploadStatus::Pending),
            "UPLOADING" => Some(UploadStatus::Uploading),
            "COMPLETED" => Some(UploadStatus::Completed),
            "FAILED" => Some(UploadStatus::Failed),
            _ => None,
        }
    }

    /// Terminal rows are never touched by workers again; they await
    /// external garbage collection.
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Failed)
    }
}

/// One artifact awaiting transport to remote storage.
///
/// (user_id, session_id, seq_index, file_type) is unique across the queue;
/// inserting the same key twice replaces the existing row (last write
/// wins), which is what makes re-sealing a shard after a crash idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Store-assigned row id; 0 until first inserted.
    pub id: i64,
    pub user_id: String,
    pub session_id: String,
    pub seq_index: u32,
    /// Shared by all artifacts of one shard, for downstream correlation.
    pub trace_id: String,
    pub file_path: String,
    pub file_type: FileType,
    pub status: UploadStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub retry_after: DateTime<Utc>,
}

impl QueueItem {
    /// Fresh PENDING row as minted by the shard sealer.
    pub fn new_pending(
        user_id: &str,
        session_id: &str,
        seq_index: u32,
        trace_id: &str,
        file_path: String,
        file_type: FileType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            seq_index,
            trace_id: trace_id.to_string(),
            file_path,
            file_type,
            status: UploadStatus::Pending,
            attempts: 0,
            created_at: now,
            retry_after: now,
        }
    }

    /// Whether the retry window has elapsed and the row may be attempted.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.retry_after <= now
    }
}
