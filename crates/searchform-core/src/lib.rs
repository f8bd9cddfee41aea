//! searchform-core
//!
//! Pure domain types for search-index provisioning: replica identifiers,
//! membership lists, index settings, mutation tasks, and key conventions.
//! No network or runtime dependency; the shared vocabulary of the other
//! searchform crates.

pub mod error;
pub mod keys;
pub mod models;

pub use crate::error::CoreError;
pub use crate::models::replica::{ReplicaKind, ReplicaRef};
pub use crate::models::settings::IndexSettings;
pub use crate::models::task::{MutationTask, TaskId, TaskStatus};
