use std::path::Path;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};

use crate::models::config::PipelineConfig;
use crate::models::error::PipelineError;
use crate::models::lane::Lane;
use crate::models::queue_item::{QueueItem, UploadStatus};
use crate::policy::{backoff, naming};
use crate::traits::observer::PipelineObserver;
use crate::traits::queue_store::QueueStore;
use crate::traits::transport::UploadTransport;

/// Drains PENDING rows for one (user, lane) and drives their status
/// transitions.
///
/// A worker run goes to completion and is not itself periodic; the
/// dispatcher controls when it runs again. Rows are never deleted —
/// COMPLETED and FAILED rows await external garbage collection.
pub struct LaneWorker {
    store: Arc<dyn QueueStore>,
    transport: Arc<dyn UploadTransport>,
    config: PipelineConfig,
    observer: Option<Arc<dyn PipelineObserver>>,
}

impl LaneWorker {
    pub fn new(
        store: Arc<dyn QueueStore>,
        transport: Arc<dyn UploadTransport>,
        config: PipelineConfig,
        observer: Option<Arc<dyn PipelineObserver>>,
    ) -> Self {
        Self {
            store,
            transport,
            config,
            observer,
        }
    }

    /// One drain pass. Returns how many rows completed.
    pub fn run(&self, user_id: &str, lane: Lane) -> Result<u32, PipelineError> {
        let now = Utc::now();
        let batch: Vec<QueueItem> = self
            .store
            .items_by_status(UploadStatus::Pending, self.config.fetch_limit)?
            .into_iter()
            .filter(|row| {
                row.user_id == user_id
                    && lane.file_types().contains(&row.file_type)
                    && row.is_ready(now)
            })
            .collect();

        if batch.is_empty() {
            return Ok(0);
        }
        log::debug!(
            "{} lane: {} row(s) ready for user {}",
            lane.as_str(),
            batch.len(),
            user_id
        );

        let mut completed = 0;
        for mut row in batch {
            row.status = UploadStatus::Uploading;
            self.store.update(&row)?;

            let file_name = row.file_path.rsplit('/').next().unwrap_or(&row.file_path);
            let folder = naming::cloud_folder_for(file_name);

            match self.transport.upload(Path::new(&row.file_path), folder) {
                Ok(()) => {
                    row.attempts += 1;
                    row.status = UploadStatus::Completed;
                    self.store.update(&row)?;
                    completed += 1;
                    log::debug!(
                        "uploaded {} (trace {}, attempt {})",
                        row.file_path,
                        row.trace_id,
                        row.attempts
                    );
                    if let Some(ref observer) = self.observer {
                        observer.on_item_completed(&row);
                    }
                }
                Err(err) => {
                    row.attempts += 1;
                    let lane_config = self.config.lane(lane);
                    if row.attempts >= lane_config.max_attempts {
                        row.status = UploadStatus::Failed;
                        self.store.update(&row)?;
                        log::warn!(
                            "{} failed permanently after {} attempts: {}",
                            row.file_path,
                            row.attempts,
                            err
                        );
                        if let Some(ref observer) = self.observer {
                            observer.on_item_failed(&row);
                        }
                    } else {
                        let delay = backoff::delay(lane, row.attempts, lane_config);
                        row.retry_after = Utc::now()
                            + TimeDelta::milliseconds(delay.as_millis() as i64);
                        row.status = UploadStatus::Pending;
                        self.store.update(&row)?;
                        log::debug!(
                            "{} attempt {} failed ({}); retrying in {:?}",
                            row.file_path,
                            row.attempts,
                            err,
                            delay
                        );
                    }
                }
            }
        }
        Ok(completed)
    }
}
