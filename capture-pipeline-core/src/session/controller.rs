use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::dispatch::dispatcher::LaneDispatcher;
use crate::dispatch::worker::LaneWorker;
use crate::models::config::PipelineConfig;
use crate::models::diagnostics::PipelineDiagnostics;
use crate::models::error::PipelineError;
use crate::models::queue_item::UploadStatus;
use crate::models::session::{mint_session_id, SessionState};
use crate::session::sealer::ShardSealer;
use crate::traits::connectivity::ConnectivityProbe;
use crate::traits::observer::PipelineObserver;
use crate::traits::queue_store::QueueStore;
use crate::traits::transport::UploadTransport;

/// Poll granularity of the rotation timer thread.
const ROTATION_POLL: Duration = Duration::from_millis(50);

/// In-memory view of the running session. The persisted `SessionState`
/// lags this by design: it is written only after a shard is sealed, so a
/// crash in between re-seals the same index instead of skipping it.
#[derive(Debug, Clone)]
struct ActiveSession {
    user_id: String,
    session_id: String,
    start_ts: DateTime<Utc>,
    seq_index: u32,
}

impl ActiveSession {
    fn to_state(&self) -> SessionState {
        SessionState {
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            start_ts: self.start_ts,
            last_seq_index: self.seq_index,
            is_active: true,
        }
    }
}

#[derive(Default)]
struct ControllerInner {
    active: Option<ActiveSession>,
}

/// Owns the session state machine, the shard-rotation timer, and startup
/// crash recovery.
///
/// ```text
/// NONE --start(user)--> ACTIVE --stop()--> NONE
///                          ↻ rotate every shard_duration
/// ```
///
/// The controller is the sole writer of the persisted `SessionState`; the
/// rotation tick and `stop()` both go through `seal_shard`, which is the
/// only creator of queue rows.
pub struct SessionController {
    store: Arc<dyn QueueStore>,
    sealer: Arc<ShardSealer>,
    dispatcher: Arc<LaneDispatcher>,
    config: PipelineConfig,
    observer: Option<Arc<dyn PipelineObserver>>,
    inner: Arc<Mutex<ControllerInner>>,
    timer_running: Arc<AtomicBool>,
    timer_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn QueueStore>,
        transport: Arc<dyn UploadTransport>,
        connectivity: Arc<dyn ConnectivityProbe>,
        config: PipelineConfig,
        observer: Option<Arc<dyn PipelineObserver>>,
    ) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::InvalidConfig)?;

        let worker = Arc::new(LaneWorker::new(
            Arc::clone(&store),
            transport,
            config.clone(),
            observer.clone(),
        ));
        let dispatcher = Arc::new(LaneDispatcher::new(worker, connectivity));
        let sealer = Arc::new(ShardSealer::new(
            Arc::clone(&store),
            Arc::clone(&dispatcher),
            config.output_directory.clone(),
            observer.clone(),
        ));

        Ok(Self {
            store,
            sealer,
            dispatcher,
            config,
            observer,
            inner: Arc::new(Mutex::new(ControllerInner::default())),
            timer_running: Arc::new(AtomicBool::new(false)),
            timer_handle: Mutex::new(None),
        })
    }

    /// Start a capture session for `user_id`.
    ///
    /// No-op if this user's session is already active. Rejected with
    /// `SessionConflict` if a *different* user's session is active — the
    /// running session is never silently reassigned.
    pub fn start(&self, user_id: &str) -> Result<(), PipelineError> {
        let now = Utc::now();
        let state = {
            let mut inner = self.inner.lock();
            if let Some(ref active) = inner.active {
                if active.user_id == user_id {
                    log::debug!("session already active for {}", user_id);
                    return Ok(());
                }
                log::warn!(
                    "session start for {} rejected: {} is already active",
                    user_id,
                    active.user_id
                );
                return Err(PipelineError::SessionConflict {
                    active_user: active.user_id.clone(),
                    requested_user: user_id.to_string(),
                });
            }

            let session = ActiveSession {
                user_id: user_id.to_string(),
                session_id: mint_session_id(now),
                start_ts: now,
                seq_index: 0,
            };
            let state = session.to_state();
            self.store.set_session_state(&state)?;
            inner.active = Some(session);
            state
        };

        self.start_rotation_timer();
        log::info!("session {} started for {}", state.session_id, user_id);
        if let Some(ref observer) = self.observer {
            observer.on_session_started(&state);
        }
        Ok(())
    }

    /// Stop the active session: seal the current shard as final, cancel
    /// the rotation timer, clear the persisted state. Tolerant of being
    /// called with no active session.
    pub fn stop(&self) -> Result<(), PipelineError> {
        // Snapshot and clear under the lock so a concurrently firing tick
        // cannot interleave a partial rotation with the final seal.
        let snapshot = self.inner.lock().active.take();
        self.stop_rotation_timer();

        let Some(active) = snapshot else {
            log::debug!("stop with no active session");
            return Ok(());
        };

        self.sealer
            .seal_shard(&active.user_id, &active.session_id, active.seq_index, true)?;
        self.store.clear_session_state()?;

        log::info!("session {} stopped", active.session_id);
        if let Some(ref observer) = self.observer {
            observer.on_session_stopped(&active.session_id);
        }
        Ok(())
    }

    /// Startup crash recovery. Call once at process start, before any
    /// other operation: moves stuck UPLOADING rows back to PENDING, then
    /// resumes a persisted active session at its saved seq_index so
    /// numbering continues instead of colliding.
    pub fn recover(&self) -> Result<(), PipelineError> {
        let reset = self.store.reset_stuck_uploads()?;
        if reset > 0 {
            log::info!("recovery: reset {} stuck upload(s) to pending", reset);
        }

        let Some(state) = self.store.active_session()? else {
            return Ok(());
        };
        if !state.is_active {
            return Ok(());
        }

        {
            let mut inner = self.inner.lock();
            if inner.active.is_some() {
                log::warn!("recover called while a session is live; ignoring persisted state");
                return Ok(());
            }
            inner.active = Some(ActiveSession {
                user_id: state.user_id.clone(),
                session_id: state.session_id.clone(),
                start_ts: state.start_ts,
                seq_index: state.last_seq_index,
            });
        }

        self.start_rotation_timer();
        // Drain whatever the crashed process left behind.
        self.dispatcher.request_all(&state.user_id);

        log::info!(
            "resumed session {} for {} at shard {}",
            state.session_id,
            state.user_id,
            state.last_seq_index
        );
        if let Some(ref observer) = self.observer {
            observer.on_session_started(&state);
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().active.is_some()
    }

    /// Queue counts plus the persisted session, for embedding UIs.
    pub fn diagnostics(&self) -> Result<PipelineDiagnostics, PipelineError> {
        Ok(PipelineDiagnostics {
            pending: self.store.count_by_status(UploadStatus::Pending)?,
            uploading: self.store.count_by_status(UploadStatus::Uploading)?,
            completed: self.store.count_by_status(UploadStatus::Completed)?,
            failed: self.store.count_by_status(UploadStatus::Failed)?,
            active_session: self.store.active_session()?,
        })
    }

    /// Nudge both lanes for a user without sealing anything, e.g. when
    /// the embedder observes connectivity coming back.
    pub fn request_upload(&self, user_id: &str) {
        self.dispatcher.request_all(user_id);
    }

    // --- rotation timer ---

    fn start_rotation_timer(&self) {
        self.timer_running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.timer_running);
        let inner = Arc::clone(&self.inner);
        let store = Arc::clone(&self.store);
        let sealer = Arc::clone(&self.sealer);
        let shard_duration = self.config.shard_duration;

        let handle = thread::Builder::new()
            .name("shard-rotation".into())
            .spawn(move || {
                let mut next_rotation = Instant::now() + shard_duration;
                while running.load(Ordering::SeqCst) {
                    thread::sleep(ROTATION_POLL);
                    if Instant::now() < next_rotation {
                        continue;
                    }
                    next_rotation += shard_duration;
                    Self::rotate(&store, &sealer, &inner);
                }
            })
            .expect("failed to spawn shard-rotation thread");

        *self.timer_handle.lock() = Some(handle);
    }

    fn stop_rotation_timer(&self) {
        self.timer_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.timer_handle.lock().take() {
            let _ = handle.join();
        }
    }

    /// One rotation: seal the current index, advance, persist — in that
    /// order. A crash after sealing but before persisting makes the next
    /// startup re-seal the same index, which the unique-key replace makes
    /// idempotent (at-least-once, never skipped).
    fn rotate(
        store: &Arc<dyn QueueStore>,
        sealer: &Arc<ShardSealer>,
        inner: &Arc<Mutex<ControllerInner>>,
    ) {
        let Some(active) = inner.lock().active.clone() else {
            return;
        };

        if let Err(err) =
            sealer.seal_shard(&active.user_id, &active.session_id, active.seq_index, false)
        {
            // Leave seq_index untouched; the next tick retries the seal.
            log::error!(
                "rotation seal of {}#{} failed: {}",
                active.session_id,
                active.seq_index,
                err
            );
            return;
        }

        let next_state = {
            let mut guard = inner.lock();
            match guard.active.as_mut() {
                Some(live) if live.session_id == active.session_id => {
                    live.seq_index = active.seq_index + 1;
                    live.to_state()
                }
                // Stopped (or replaced) while we were sealing; the final
                // seal owns cleanup.
                _ => return,
            }
        };

        if let Err(err) = store.set_session_state(&next_state) {
            // Crash-equivalent: the persisted index lags, so the next
            // rotation after a restart re-seals this index.
            log::error!(
                "failed to persist seq {} for {}: {}",
                next_state.last_seq_index,
                next_state.session_id,
                err
            );
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop_rotation_timer();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::Path;

    use super::*;
    use crate::models::lane::Connectivity;
    use crate::models::queue_item::QueueItem;
    use crate::policy::naming::CloudFolder;
    use crate::storage::memory::MemoryQueueStore;
    use crate::traits::transport::UploadTransport;

    // Transport/probe pair that keeps workers away from the queue, so
    // tests observe exactly what the controller wrote.
    struct NeverTransport;

    impl UploadTransport for NeverTransport {
        fn upload(&self, _file_path: &Path, _folder: CloudFolder) -> Result<(), PipelineError> {
            Err(PipelineError::Transport("unreachable".into()))
        }
    }

    struct OfflineProbe;

    impl ConnectivityProbe for OfflineProbe {
        fn current(&self) -> Connectivity {
            Connectivity::Offline
        }
    }

    fn test_config(shard_millis: u64) -> PipelineConfig {
        PipelineConfig {
            shard_duration: Duration::from_millis(shard_millis),
            ..PipelineConfig::default()
        }
    }

    fn controller_with(
        store: Arc<MemoryQueueStore>,
        config: PipelineConfig,
    ) -> SessionController {
        SessionController::new(
            store,
            Arc::new(NeverTransport),
            Arc::new(OfflineProbe),
            config,
            None,
        )
        .unwrap()
    }

    fn pending(store: &MemoryQueueStore) -> Vec<QueueItem> {
        store.items_by_status(UploadStatus::Pending, 100).unwrap()
    }

    #[test]
    fn start_then_stop_seals_one_final_shard() {
        // Scenario A.
        let store = Arc::new(MemoryQueueStore::new());
        let controller = controller_with(store.clone(), test_config(60_000));

        controller.start("u1").unwrap();
        controller.stop().unwrap();

        let rows = pending(&store);
        assert_eq!(rows.len(), 3);
        let traces: HashSet<&str> = rows.iter().map(|r| r.trace_id.as_str()).collect();
        assert_eq!(traces.len(), 1);
        assert!(rows.iter().all(|r| r.seq_index == 0));
        assert!(store.active_session().unwrap().is_none());
        assert!(!controller.is_active());
    }

    #[test]
    fn rotation_advances_and_persists_the_next_index() {
        // Scenario B.
        let store = Arc::new(MemoryQueueStore::new());
        let controller = controller_with(store.clone(), test_config(500));

        controller.start("u1").unwrap();
        // One shard_duration plus poll slack, well short of the second
        // rotation at 1000ms.
        thread::sleep(Duration::from_millis(700));

        let state = store.active_session().unwrap().unwrap();
        assert_eq!(state.last_seq_index, 1);

        let rows = pending(&store);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.seq_index == 0));

        controller.stop().unwrap();
    }

    #[test]
    fn start_is_idempotent_per_user() {
        let store = Arc::new(MemoryQueueStore::new());
        let controller = controller_with(store.clone(), test_config(60_000));

        controller.start("u1").unwrap();
        let first = store.active_session().unwrap().unwrap();
        controller.start("u1").unwrap();
        let second = store.active_session().unwrap().unwrap();
        assert_eq!(first.session_id, second.session_id);

        controller.stop().unwrap();
    }

    #[test]
    fn start_for_another_user_is_rejected() {
        let store = Arc::new(MemoryQueueStore::new());
        let controller = controller_with(store.clone(), test_config(60_000));

        controller.start("u1").unwrap();
        let err = controller.start("u2").unwrap_err();
        assert_eq!(
            err,
            PipelineError::SessionConflict {
                active_user: "u1".into(),
                requested_user: "u2".into(),
            }
        );
        assert_eq!(store.active_session().unwrap().unwrap().user_id, "u1");

        controller.stop().unwrap();
    }

    #[test]
    fn stop_without_a_session_is_tolerated() {
        let store = Arc::new(MemoryQueueStore::new());
        let controller = controller_with(store, test_config(60_000));
        controller.stop().unwrap();
        controller.stop().unwrap();
    }

    #[test]
    fn recover_resumes_numbering_and_resets_stuck_rows() {
        let store = Arc::new(MemoryQueueStore::new());

        // A previous process sealed shard 4, persisted index 5, left one
        // row mid-upload, then died.
        let mut stuck = QueueItem::new_pending(
            "u1",
            "crashed",
            4,
            "trace",
            "AUDIO_crashed_4.m4a".into(),
            crate::models::queue_item::FileType::Audio,
            Utc::now(),
        );
        stuck.id = store.insert(&stuck).unwrap();
        stuck.status = UploadStatus::Uploading;
        store.update(&stuck).unwrap();
        store
            .set_session_state(&SessionState {
                user_id: "u1".into(),
                session_id: "crashed".into(),
                start_ts: Utc::now(),
                last_seq_index: 5,
                is_active: true,
            })
            .unwrap();

        let controller = controller_with(store.clone(), test_config(60_000));
        controller.recover().unwrap();

        assert!(controller.is_active());
        assert_eq!(store.count_by_status(UploadStatus::Uploading).unwrap(), 0);

        // The final seal lands on the resumed index, not on 0.
        controller.stop().unwrap();
        assert!(pending(&store).iter().any(|r| r.seq_index == 5));
    }

    #[test]
    fn recover_without_persisted_session_stays_idle() {
        let store = Arc::new(MemoryQueueStore::new());
        let controller = controller_with(store, test_config(60_000));
        controller.recover().unwrap();
        assert!(!controller.is_active());
    }

    #[test]
    fn resealing_after_simulated_pre_persist_crash_is_idempotent() {
        // Crash between seal and persist means the same index is sealed
        // twice on resume; the queue must hold three rows, not six.
        let store = Arc::new(MemoryQueueStore::new());
        let controller = controller_with(store.clone(), test_config(60_000));

        controller.start("u1").unwrap();
        let session_id = store.active_session().unwrap().unwrap().session_id;
        controller.stop().unwrap();

        // Simulate the resumed process sealing index 0 again.
        let controller = controller_with(store.clone(), test_config(60_000));
        store
            .set_session_state(&SessionState {
                user_id: "u1".into(),
                session_id: session_id.clone(),
                start_ts: Utc::now(),
                last_seq_index: 0,
                is_active: true,
            })
            .unwrap();
        controller.recover().unwrap();
        controller.stop().unwrap();

        let rows = pending(&store);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.session_id == session_id && r.seq_index == 0));
    }

    #[test]
    fn diagnostics_reflect_queue_counts() {
        let store = Arc::new(MemoryQueueStore::new());
        let controller = controller_with(store.clone(), test_config(60_000));

        controller.start("u1").unwrap();
        controller.stop().unwrap();

        let diag = controller.diagnostics().unwrap();
        assert_eq!(diag.pending, 3);
        assert_eq!(diag.uploading, 0);
        assert_eq!(diag.completed, 0);
        assert_eq!(diag.failed, 0);
        assert!(diag.active_session.is_none());
        assert!(diag.to_json().unwrap().contains("\"pending\": 3"));
    }
}
