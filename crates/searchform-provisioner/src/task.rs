use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};

use searchform_client::SearchApi;
use searchform_core::{MutationTask, TaskStatus};

use crate::error::ProvisionerError;

/// Blocks until a remote write is applied, not merely accepted.
///
/// The service applies settings asynchronously. Releasing a lock, or reading
/// back what was just written, before the task is published lets the next
/// reader see pre-mutation state.
#[derive(Clone)]
pub struct TaskWaiter {
    api: Arc<dyn SearchApi>,
    poll_min: Duration,
    poll_max: Duration,
}

impl TaskWaiter {
    pub fn new(api: Arc<dyn SearchApi>, poll_min: Duration, poll_max: Duration) -> Self {
        Self {
            api,
            poll_min,
            poll_max: poll_max.max(poll_min),
        }
    }

    /// Poll delays grow from `poll_min` to `poll_max` and then stay there.
    /// No attempt limit; the caller's deadline bounds the wait.
    fn poll_policy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.poll_min)
            .with_max_delay(self.poll_max)
            .with_factor(1.5)
            .with_max_times(usize::MAX)
    }

    pub async fn wait(&self, task: &MutationTask) -> Result<(), ProvisionerError> {
        let mut delays = self.poll_policy().build();
        loop {
            match self.api.get_task(task).await? {
                TaskStatus::Published => {
                    tracing::debug!(index = %task.index, task_id = %task.task_id, "task published");
                    return Ok(());
                }
                TaskStatus::Failed { reason } => {
                    return Err(ProvisionerError::TaskFailed {
                        index: task.index.clone(),
                        task_id: task.task_id,
                        reason,
                    });
                }
                TaskStatus::NotPublished => {}
            }
            let delay = delays.next().unwrap_or(self.poll_max);
            tokio::time::sleep(delay).await;
        }
    }
}
