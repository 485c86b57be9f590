use serde::Serialize;

use super::error::PipelineError;
use super::session::SessionState;

/// Point-in-time snapshot of the queue, for embedding UIs and debugging.
/// Not used by any scheduling decision.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineDiagnostics {
    pub pending: u64,
    pub uploading: u64,
    pub completed: u64,
    pub failed: u64,
    pub active_session: Option<SessionState>,
}

impl PipelineDiagnostics {
    pub fn to_json(&self) -> Result<String, PipelineError> {
        serde_json::to_string_pretty(self).map_err(|e| PipelineError::Serialization(e.to_string()))
    }
}
