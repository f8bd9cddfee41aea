//! searchform-client
//!
//! The remote search-service API as seen by the provisioner: the
//! [`SearchApi`] trait, its error taxonomy, and an in-memory backend with
//! asynchronous write application and delayed read visibility.

pub mod api;
pub mod error;
pub mod memory;

pub use crate::api::{BoxFuture, SearchApi};
pub use crate::error::{ApiError, ErrorClass};
pub use crate::memory::{MemoryBackend, MemoryConfig};
