use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use searchform_core::{IndexSettings, MutationTask, ReplicaRef, TaskId, TaskStatus};

use crate::api::{BoxFuture, SearchApi};
use crate::error::ApiError;

/// Timing knobs of the in-memory service.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Delay before every request is served.
    pub request_latency: Duration,
    /// Delay between a write being accepted and it being applied.
    pub apply_delay: Duration,
    /// How long a newly created index keeps reading as not found.
    pub visibility_lag: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            request_latency: Duration::from_millis(5),
            apply_delay: Duration::from_millis(50),
            visibility_lag: Duration::ZERO,
        }
    }
}

/// In-process stand-in for the remote search service.
///
/// Writes are queued and applied on a spawned task after
/// [`MemoryConfig::apply_delay`], so a read issued right after a write
/// observes the old state until the returned task is published. Changing a
/// primary's membership list creates or detaches the replica indices it
/// names, the way the real service does.
///
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

struct Shared {
    config: MemoryConfig,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    indices: BTreeMap<String, IndexRecord>,
    tasks: HashMap<(String, TaskId), TaskStatus>,
    next_task: u64,
    settings_writes: HashMap<String, usize>,
    failing_tasks: HashSet<String>,
    queued_errors: VecDeque<ApiError>,
}

struct IndexRecord {
    settings: IndexSettings,
    visible_at: Instant,
}

impl MemoryBackend {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    /// Create an index that is immediately applied and visible.
    pub fn seed_index(&self, name: &str, settings: IndexSettings) {
        let mut inner = self.shared.lock();
        let now = Instant::now();
        inner.indices.insert(
            name.to_string(),
            IndexRecord {
                settings: IndexSettings::default(),
                visible_at: now,
            },
        );
        inner.apply_settings(name, &settings, now);
    }

    /// Applied settings of `index`, ignoring read visibility.
    pub fn index_settings(&self, index: &str) -> Option<IndexSettings> {
        self.shared
            .lock()
            .indices
            .get(index)
            .map(|r| r.settings.clone())
    }

    /// Names of every applied index, sorted.
    pub fn index_names(&self) -> Vec<String> {
        self.shared.lock().indices.keys().cloned().collect()
    }

    /// Number of settings writes accepted for `index` so far.
    pub fn settings_writes(&self, index: &str) -> usize {
        self.shared
            .lock()
            .settings_writes
            .get(index)
            .copied()
            .unwrap_or(0)
    }

    /// Make the next write task accepted for `index` report failure instead
    /// of being applied.
    pub fn fail_next_task(&self, index: &str) {
        self.shared.lock().failing_tasks.insert(index.to_string());
    }

    /// Serve `error` in place of the next request, whatever it is.
    pub fn queue_error(&self, error: ApiError) {
        self.shared.lock().queued_errors.push_back(error);
    }

    /// Simulated round trip. Serves a queued error if there is one.
    async fn request(&self) -> Result<(), ApiError> {
        tokio::time::sleep(self.shared.config.request_latency).await;
        let queued = self.shared.lock().queued_errors.pop_front();
        match queued {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn enqueue(&self, inner: &mut Inner, index: &str, op: PendingOp) -> MutationTask {
        inner.next_task += 1;
        let task = MutationTask {
            index: index.to_string(),
            task_id: TaskId(inner.next_task),
        };
        inner
            .tasks
            .insert((index.to_string(), task.task_id), TaskStatus::NotPublished);

        let shared = Arc::clone(&self.shared);
        let key = (index.to_string(), task.task_id);
        tokio::spawn(async move {
            tokio::time::sleep(shared.config.apply_delay).await;
            let mut inner = shared.lock();
            let now = Instant::now();
            let status = if inner.failing_tasks.remove(&key.0) {
                TaskStatus::Failed {
                    reason: "internal error while applying task".into(),
                }
            } else {
                match op {
                    PendingOp::SetSettings(patch) => {
                        let lag = shared.config.visibility_lag;
                        inner.ensure_index(&key.0, now + lag);
                        inner.apply_settings(&key.0, &patch, now + lag);
                    }
                    PendingOp::Delete => inner.delete_index(&key.0),
                }
                TaskStatus::Published
            };
            tracing::debug!(index = %key.0, task_id = %key.1, ?status, "task settled");
            inner.tasks.insert(key, status);
        });

        task
    }
}

enum PendingOp {
    SetSettings(IndexSettings),
    Delete,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn ensure_index(&mut self, name: &str, visible_at: Instant) {
        self.indices
            .entry(name.to_string())
            .or_insert_with(|| IndexRecord {
                settings: IndexSettings::default(),
                visible_at,
            });
    }

    /// Merge `patch` into `name` and reconcile replica indices with any
    /// change to its membership list.
    fn apply_settings(&mut self, name: &str, patch: &IndexSettings, visible_at: Instant) {
        let Some(record) = self.indices.get_mut(name) else {
            return;
        };
        let before = record.settings.membership();
        record.settings.merge(patch);
        let after = record.settings.membership();

        for replica in after.replicas().filter(|r| !before.contains(r)) {
            self.ensure_index(&replica.name, visible_at);
            if let Some(rec) = self.indices.get_mut(&replica.name) {
                rec.settings.primary = Some(name.to_string());
            }
        }
        for replica in before.replicas().filter(|r| !after.contains(r)) {
            self.detach(name, &replica);
        }
    }

    fn detach(&mut self, primary: &str, replica: &ReplicaRef) {
        if let Some(rec) = self.indices.get_mut(&replica.name) {
            if rec.settings.primary.as_deref() == Some(primary) {
                rec.settings.primary = None;
            }
        }
    }

    fn delete_index(&mut self, name: &str) {
        let Some(record) = self.indices.remove(name) else {
            return;
        };
        for replica in record.settings.membership().replicas() {
            self.detach(name, &replica);
        }
    }

    /// The primary that still lists `name` in its membership list, if any.
    fn attached_primary(&self, name: &str) -> Option<String> {
        let primary = self.indices.get(name)?.settings.primary.clone()?;
        let listed = self
            .indices
            .get(&primary)
            .is_some_and(|p| p.settings.membership().replicas().any(|r| r.name == name));
        listed.then_some(primary)
    }
}

impl SearchApi for MemoryBackend {
    fn get_settings<'a>(
        &'a self,
        index: &'a str,
    ) -> BoxFuture<'a, Result<IndexSettings, ApiError>> {
        Box::pin(async move {
            self.request().await?;
            let inner = self.shared.lock();
            match inner.indices.get(index) {
                Some(record) if record.visible_at <= Instant::now() => Ok(record.settings.clone()),
                _ => Err(ApiError::NotFound {
                    index: index.to_string(),
                }),
            }
        })
    }

    fn set_settings<'a>(
        &'a self,
        index: &'a str,
        settings: &'a IndexSettings,
    ) -> BoxFuture<'a, Result<MutationTask, ApiError>> {
        Box::pin(async move {
            self.request().await?;
            let mut inner = self.shared.lock();

            let lists_replicas = settings.replicas.as_ref().is_some_and(|r| !r.is_empty());
            let is_replica = inner
                .indices
                .get(index)
                .is_some_and(|r| r.settings.primary.is_some());
            if lists_replicas && is_replica {
                return Err(ApiError::Rejected {
                    status: 400,
                    message: format!("{index} is a replica and cannot have replicas"),
                });
            }

            *inner.settings_writes.entry(index.to_string()).or_default() += 1;
            let task = self.enqueue(&mut inner, index, PendingOp::SetSettings(settings.clone()));
            tracing::debug!(index, task_id = %task.task_id, "settings write accepted");
            Ok(task)
        })
    }

    fn delete_index<'a>(&'a self, index: &'a str) -> BoxFuture<'a, Result<MutationTask, ApiError>> {
        Box::pin(async move {
            self.request().await?;
            let mut inner = self.shared.lock();
            if let Some(primary) = inner.attached_primary(index) {
                return Err(ApiError::Rejected {
                    status: 400,
                    message: format!("cannot delete {index}: still a replica of {primary}"),
                });
            }
            let task = self.enqueue(&mut inner, index, PendingOp::Delete);
            tracing::debug!(index, task_id = %task.task_id, "delete accepted");
            Ok(task)
        })
    }

    fn get_task<'a>(
        &'a self,
        task: &'a MutationTask,
    ) -> BoxFuture<'a, Result<TaskStatus, ApiError>> {
        Box::pin(async move {
            self.request().await?;
            let inner = self.shared.lock();
            inner
                .tasks
                .get(&(task.index.clone(), task.task_id))
                .cloned()
                .ok_or_else(|| ApiError::TaskNotFound {
                    index: task.index.clone(),
                    task_id: task.task_id.0,
                })
        })
    }
}
