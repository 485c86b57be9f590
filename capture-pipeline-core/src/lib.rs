//! # capture-pipeline-core
//!
//! Storage-agnostic core of the capture shard upload pipeline.
//!
//! Turns a continuous capture session into fixed-duration shards and
//! transports each shard's artifacts to remote storage, surviving process
//! crashes and flaky networks. Capture itself, the object-store client,
//! and the durable queue backend are external collaborators plugged in
//! through traits (`UploadTransport`, `ConnectivityProbe`, `QueueStore`).
//!
//! ## Architecture
//!
//! ```text
//! capture-pipeline-core (this crate)
//! ├── traits/    ← QueueStore, UploadTransport, ConnectivityProbe, PipelineObserver
//! ├── models/    ← QueueItem, SessionState, Lane, PipelineConfig, PipelineError
//! ├── policy/    ← two-lane backoff curves, artifact naming rules
//! ├── session/   ← SessionController (state machine + rotation timer), ShardSealer
//! ├── dispatch/  ← LaneDispatcher (append-or-replace slots), LaneWorker
//! └── storage/   ← MemoryQueueStore (non-durable backend)
//! ```
//!
//! Data flow: the controller's rotation timer ticks → the sealer inserts
//! one PENDING row per artifact → the dispatcher schedules a worker per
//! lane → workers upload and advance row status → the next tick, or crash
//! recovery at the next process start, picks up whatever is left.

pub mod dispatch;
pub mod models;
pub mod policy;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use dispatch::dispatcher::LaneDispatcher;
pub use dispatch::worker::LaneWorker;
pub use models::config::{LaneBackoffConfig, PipelineConfig};
pub use models::diagnostics::PipelineDiagnostics;
pub use models::error::PipelineError;
pub use models::lane::{Connectivity, Lane};
pub use models::queue_item::{FileType, QueueItem, UploadStatus};
pub use models::session::SessionState;
pub use policy::naming::CloudFolder;
pub use session::controller::SessionController;
pub use session::sealer::ShardSealer;
pub use storage::memory::MemoryQueueStore;
pub use traits::connectivity::{AlwaysUnmetered, ConnectivityProbe};
pub use traits::observer::PipelineObserver;
pub use traits::queue_store::QueueStore;
pub use traits::transport::UploadTransport;
