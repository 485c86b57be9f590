use crate::models::queue_item::QueueItem;
use crate::models::session::SessionState;

/// Event hooks for session and queue transitions.
///
/// All methods are called from pipeline threads (the rotation timer or a
/// lane worker), never from the caller's thread; implementations should
/// marshal to a UI thread if needed. Every method has an empty default so
/// embedders implement only what they observe.
pub trait PipelineObserver: Send + Sync {
    /// A session was started or resumed after a crash.
    fn on_session_started(&self, _state: &SessionState) {}

    /// A shard was sealed and its rows enqueued.
    fn on_shard_sealed(&self, _session_id: &str, _seq_index: u32, _trace_id: &str, _is_final: bool) {
    }

    fn on_session_stopped(&self, _session_id: &str) {}

    /// An artifact finished uploading.
    fn on_item_completed(&self, _item: &QueueItem) {}

    /// An artifact exhausted its lane's attempt budget.
    fn on_item_failed(&self, _item: &QueueItem) {}
}
