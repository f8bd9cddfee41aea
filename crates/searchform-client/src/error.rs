use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("index not found: {index}")]
    NotFound { index: String },

    #[error("task {task_id} not found on index {index}")]
    TaskNotFound { index: String, task_id: u64 },

    #[error("no host available: {0}")]
    NoHostAvailable(String),

    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

/// How a caller should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The resource does not exist remotely.
    NotFound,
    /// Transient; worth another attempt.
    Retryable,
    /// Anything else. Surface immediately.
    Fatal,
}

impl ApiError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound { .. } | Self::TaskNotFound { .. } => ErrorClass::NotFound,
            Self::NoHostAvailable(_) => ErrorClass::Retryable,
            Self::Rejected { status, .. } if *status == 404 => ErrorClass::NotFound,
            Self::Rejected { .. } | Self::Transport(_) => ErrorClass::Fatal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }

    /// Errors a read may hit while a write it follows is still propagating:
    /// not-found and no-host-available. Nothing else.
    pub fn is_propagation_race(&self) -> bool {
        matches!(self.class(), ErrorClass::NotFound | ErrorClass::Retryable)
    }
}
