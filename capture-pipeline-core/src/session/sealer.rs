use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::dispatch::dispatcher::LaneDispatcher;
use crate::models::error::PipelineError;
use crate::models::queue_item::{FileType, QueueItem};
use crate::policy::naming;
use crate::traits::observer::PipelineObserver;
use crate::traits::queue_store::QueueStore;

/// Finalizes one shard: mints a trace id, enqueues one row per artifact
/// type, and requests dispatch for the user.
///
/// Fire-and-forget regarding file existence — a row whose artifact never
/// materializes fails at the transport until its lane budget runs out.
/// Because inserts replace on the shard's unique key, sealing the same
/// seq_index twice (a resumed pre-persist crash) is idempotent.
pub struct ShardSealer {
    store: Arc<dyn QueueStore>,
    dispatcher: Arc<LaneDispatcher>,
    output_directory: PathBuf,
    observer: Option<Arc<dyn PipelineObserver>>,
}

impl ShardSealer {
    pub fn new(
        store: Arc<dyn QueueStore>,
        dispatcher: Arc<LaneDispatcher>,
        output_directory: PathBuf,
        observer: Option<Arc<dyn PipelineObserver>>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            output_directory,
            observer,
        }
    }

    /// Returns the minted trace id.
    pub fn seal_shard(
        &self,
        user_id: &str,
        session_id: &str,
        seq_index: u32,
        is_final: bool,
    ) -> Result<String, PipelineError> {
        let trace_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        for file_type in FileType::ALL {
            let path =
                naming::artifact_path(&self.output_directory, file_type, session_id, seq_index);
            let item = QueueItem::new_pending(
                user_id,
                session_id,
                seq_index,
                &trace_id,
                path.to_string_lossy().into_owned(),
                file_type,
                now,
            );
            self.store.insert(&item)?;
        }

        log::info!(
            "sealed shard {}#{}{} (trace {})",
            session_id,
            seq_index,
            if is_final { " [final]" } else { "" },
            trace_id
        );
        if let Some(ref observer) = self.observer {
            observer.on_shard_sealed(session_id, seq_index, &trace_id, is_final);
        }

        self.dispatcher.request_all(user_id);
        Ok(trace_id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::Path;

    use super::*;
    use crate::dispatch::worker::LaneWorker;
    use crate::models::config::PipelineConfig;
    use crate::models::lane::Connectivity;
    use crate::models::queue_item::UploadStatus;
    use crate::policy::naming::CloudFolder;
    use crate::storage::memory::MemoryQueueStore;
    use crate::traits::connectivity::ConnectivityProbe;
    use crate::traits::transport::UploadTransport;

    struct NullTransport;

    impl UploadTransport for NullTransport {
        fn upload(&self, _file_path: &Path, _folder: CloudFolder) -> Result<(), PipelineError> {
            Err(PipelineError::Transport("offline".into()))
        }
    }

    // Keeps the dispatched workers from touching rows, so assertions on
    // row state are deterministic.
    struct OfflineProbe;

    impl ConnectivityProbe for OfflineProbe {
        fn current(&self) -> Connectivity {
            Connectivity::Offline
        }
    }

    fn sealer_with(store: Arc<MemoryQueueStore>) -> ShardSealer {
        let worker = Arc::new(LaneWorker::new(
            store.clone(),
            Arc::new(NullTransport),
            PipelineConfig::default(),
            None,
        ));
        let dispatcher = Arc::new(LaneDispatcher::new(worker, Arc::new(OfflineProbe)));
        ShardSealer::new(store, dispatcher, PathBuf::from("/data/capture"), None)
    }

    #[test]
    fn seals_three_rows_sharing_one_trace_id() {
        let store = Arc::new(MemoryQueueStore::new());
        let sealer = sealer_with(store.clone());

        let trace = sealer.seal_shard("u1", "sess", 0, false).unwrap();

        let rows = store.items_by_status(UploadStatus::Pending, 10).unwrap();
        assert_eq!(rows.len(), 3);
        let mut types = HashSet::new();
        for row in &rows {
            assert_eq!(row.trace_id, trace);
            assert_eq!(row.seq_index, 0);
            assert_eq!(row.attempts, 0);
            types.insert(row.file_type);
        }
        assert_eq!(types.len(), 3);
    }

    #[test]
    fn resealing_the_same_index_is_idempotent() {
        let store = Arc::new(MemoryQueueStore::new());
        let sealer = sealer_with(store.clone());

        let first = sealer.seal_shard("u1", "sess", 7, false).unwrap();
        let second = sealer.seal_shard("u1", "sess", 7, false).unwrap();
        assert_ne!(first, second);

        // Three rows, not six, all carrying the most recent trace id.
        let rows = store.items_by_status(UploadStatus::Pending, 10).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.trace_id == second));
    }

    #[test]
    fn artifact_paths_follow_naming_policy() {
        let store = Arc::new(MemoryQueueStore::new());
        let sealer = sealer_with(store.clone());
        sealer.seal_shard("u1", "sess", 2, true).unwrap();

        let rows = store.items_by_status(UploadStatus::Pending, 10).unwrap();
        let paths: Vec<&str> = rows.iter().map(|r| r.file_path.as_str()).collect();
        assert!(paths.contains(&"/data/capture/PHYSICAL_sess_2.jsonl"));
        assert!(paths.contains(&"/data/capture/SCREEN_sess_2.jsonl"));
        assert!(paths.contains(&"/data/capture/AUDIO_sess_2.m4a"));
    }
}
