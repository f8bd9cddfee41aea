use std::time::Duration;

use thiserror::Error;

use searchform_client::{ApiError, ErrorClass};
use searchform_core::{CoreError, TaskId};

#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("resource not found: {resource_type}/{resource_id}")]
    ResourceNotFound {
        resource_type: String,
        resource_id: String,
    },

    #[error("resource update failed: {0}")]
    UpdateFailed(String),

    #[error(
        "cannot destroy {0} while deletion_protection is enabled; set it to false and apply first"
    )]
    DeletionProtected(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("task {task_id} on {index} failed: {reason}")]
    TaskFailed {
        index: String,
        task_id: TaskId,
        reason: String,
    },

    #[error("timed out after {waited:?} waiting for lock {key}")]
    LockTimeout { key: String, waited: Duration },

    #[error("{addr} did not finish within {timeout:?}")]
    DeadlineExceeded { addr: String, timeout: Duration },

    #[error("invalid manifest: {0}")]
    Manifest(String),

    #[error("state error: {0}")]
    State(String),

    #[error("config error: {0}")]
    Config(String),

    /// Any other error, tagged with the resource whose operation hit it.
    #[error("{label} ({name}): {error}")]
    Resource {
        label: String,
        name: String,
        error: Box<ProvisionerError>,
    },

    #[error("search API error: {0}")]
    Api(#[from] ApiError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionerError {
    /// Attach resource identity. Message-only variants get it prepended;
    /// everything else is wrapped in [`ProvisionerError::Resource`]. Errors
    /// already tagged are left alone.
    pub fn with_resource(self, label: &str, name: &str) -> Self {
        match self {
            Self::UpdateFailed(msg) => Self::UpdateFailed(format!("{label} ({name}): {msg}")),
            Self::PreconditionFailed(msg) => {
                Self::PreconditionFailed(format!("{label} ({name}): {msg}"))
            }
            tagged @ Self::Resource { .. } => tagged,
            other => Self::Resource {
                label: label.to_string(),
                name: name.to_string(),
                error: Box::new(other),
            },
        }
    }

    /// The error beneath any resource tags.
    pub fn root(&self) -> &Self {
        match self {
            Self::Resource { error, .. } => error.root(),
            other => other,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self.root() {
            Self::ResourceNotFound { .. } => ErrorClass::NotFound,
            Self::Api(err) => err.class(),
            _ => ErrorClass::Fatal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }
}

/// Walk the full error chain and join all causes into one string.
pub fn format_err_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
