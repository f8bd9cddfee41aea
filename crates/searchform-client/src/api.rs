use std::future::Future;
use std::pin::Pin;

use searchform_core::{IndexSettings, MutationTask, TaskStatus};

use crate::error::ApiError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The subset of the search service's index API the provisioner drives.
///
/// Writes are asynchronous: they return a [`MutationTask`] as soon as the
/// service accepts them, and the change is only guaranteed to be applied
/// once [`SearchApi::get_task`] reports it published. Reads are eventually
/// consistent; a freshly created index may briefly read as not found.
///
/// Methods return boxed futures for dyn compatibility.
pub trait SearchApi: Send + Sync {
    /// Current settings of `index`, including its membership list.
    fn get_settings<'a>(&'a self, index: &'a str)
    -> BoxFuture<'a, Result<IndexSettings, ApiError>>;

    /// Overwrite the fields present in `settings`, creating the index if it
    /// does not exist. A present `replicas` field replaces the whole list.
    fn set_settings<'a>(
        &'a self,
        index: &'a str,
        settings: &'a IndexSettings,
    ) -> BoxFuture<'a, Result<MutationTask, ApiError>>;

    /// Delete `index`. Deleting an index that does not exist succeeds.
    fn delete_index<'a>(&'a self, index: &'a str) -> BoxFuture<'a, Result<MutationTask, ApiError>>;

    /// Status of a previously returned task.
    fn get_task<'a>(&'a self, task: &'a MutationTask)
    -> BoxFuture<'a, Result<TaskStatus, ApiError>>;
}
