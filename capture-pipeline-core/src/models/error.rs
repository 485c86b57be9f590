use thiserror::Error;

/// Errors that can occur in the shard pipeline.
///
/// Transport failures are deliberately stringly-typed: the worker treats
/// every upload failure as transient, so the variant only needs to carry
/// enough context for logs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("session conflict: user '{requested_user}' requested while '{active_user}' is active")]
    SessionConflict {
        active_user: String,
        requested_user: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}
