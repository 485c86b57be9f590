use parking_lot::Mutex;

use crate::models::error::PipelineError;
use crate::models::queue_item::{QueueItem, UploadStatus};
use crate::models::session::SessionState;
use crate::traits::queue_store::QueueStore;

struct Inner {
    next_id: i64,
    items: Vec<QueueItem>,
    session: Option<SessionState>,
}

/// Non-durable `QueueStore` over plain collections.
///
/// Semantically identical to the SQLite backend — same unique-key replace,
/// same ordering, same singleton session row — minus durability. Used by
/// the core tests and by embedders that explicitly opt out of crash
/// safety.
pub struct MemoryQueueStore {
    inner: Mutex<Inner>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                items: Vec::new(),
                session: None,
            }),
        }
    }
}

impl Default for MemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueStore for MemoryQueueStore {
    fn insert(&self, item: &QueueItem) -> Result<i64, PipelineError> {
        let mut inner = self.inner.lock();
        let existing = inner.items.iter_mut().find(|row| {
            row.user_id == item.user_id
                && row.session_id == item.session_id
                && row.seq_index == item.seq_index
                && row.file_type == item.file_type
        });
        if let Some(row) = existing {
            // Replace-on-conflict keeps the original row id.
            let id = row.id;
            *row = QueueItem { id, ..item.clone() };
            return Ok(id);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.items.push(QueueItem { id, ..item.clone() });
        Ok(id)
    }

    fn items_by_status(
        &self,
        status: UploadStatus,
        limit: usize,
    ) -> Result<Vec<QueueItem>, PipelineError> {
        let inner = self.inner.lock();
        let mut rows: Vec<QueueItem> = inner
            .items
            .iter()
            .filter(|row| row.status == status)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    fn update(&self, item: &QueueItem) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock();
        match inner.items.iter_mut().find(|row| row.id == item.id) {
            Some(row) => {
                *row = item.clone();
                Ok(())
            }
            None => Err(PipelineError::Storage(format!(
                "update of missing queue row id {}",
                item.id
            ))),
        }
    }

    fn active_session(&self) -> Result<Option<SessionState>, PipelineError> {
        Ok(self.inner.lock().session.clone())
    }

    fn set_session_state(&self, state: &SessionState) -> Result<(), PipelineError> {
        self.inner.lock().session = Some(state.clone());
        Ok(())
    }

    fn clear_session_state(&self) -> Result<(), PipelineError> {
        self.inner.lock().session = None;
        Ok(())
    }

    fn reset_stuck_uploads(&self) -> Result<u64, PipelineError> {
        let mut inner = self.inner.lock();
        let mut moved = 0;
        for row in inner.items.iter_mut() {
            if row.status == UploadStatus::Uploading {
                row.status = UploadStatus::Pending;
                moved += 1;
            }
        }
        Ok(moved)
    }

    fn count_by_status(&self, status: UploadStatus) -> Result<u64, PipelineError> {
        let inner = self.inner.lock();
        Ok(inner.items.iter().filter(|row| row.status == status).count() as u64)
    }
}
