use std::path::Path;

use crate::models::error::PipelineError;
use crate::policy::naming::CloudFolder;

/// One-way upload primitive, implemented by the embedder against its
/// object store.
///
/// The pipeline treats every failure as transient: the row goes back to
/// PENDING with an advanced retry_after until the lane's attempt budget
/// runs out. A file that never materializes on disk should simply be
/// reported as a failure here.
pub trait UploadTransport: Send + Sync {
    /// Upload `file_path` into the given remote folder. Timeouts are the
    /// implementer's responsibility; the pipeline imposes none.
    fn upload(&self, file_path: &Path, folder: CloudFolder) -> Result<(), PipelineError>;
}
