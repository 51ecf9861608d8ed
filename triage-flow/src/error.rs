use thiserror::Error;

/// Errors raised by the workflow engine itself.
///
/// Step implementations wrap their own domain errors into
/// [`FlowError::StepFailed`] or [`FlowError::Rejected`] so the engine can tell
/// a failed step (state untouched, retry allowed) from a missing step or
/// session.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Step not found: {0}")]
    StepNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Step execution failed: {0}")]
    StepFailed(String),

    #[error("Step rejected input: {0}")]
    Rejected(String),

    #[error("Session store error: {0}")]
    StoreError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;
