use std::sync::Arc;

use searchform_client::SearchApi;

use crate::config::ProviderConfig;
use crate::kv::KeyedMutex;
use crate::replica::ReplicaReconciler;
use crate::task::TaskWaiter;

/// Everything a syncer needs to act on the service, built once per run and
/// shared by reference with every syncer.
///
/// Whoever shares a context shares its lock registry. Two contexts that must
/// coordinate on the same application are built with
/// [`ProviderContext::with_locks`] over one registry.
pub struct ProviderContext {
    pub config: ProviderConfig,
    pub api: Arc<dyn SearchApi>,
    pub locks: Arc<KeyedMutex>,
}

impl ProviderContext {
    pub fn new(config: ProviderConfig, api: Arc<dyn SearchApi>) -> Self {
        let locks = Arc::new(KeyedMutex::new(config.lock_timeout()));
        Self::with_locks(config, api, locks)
    }

    pub fn with_locks(
        config: ProviderConfig,
        api: Arc<dyn SearchApi>,
        locks: Arc<KeyedMutex>,
    ) -> Self {
        Self { config, api, locks }
    }

    pub fn waiter(&self) -> TaskWaiter {
        TaskWaiter::new(
            Arc::clone(&self.api),
            self.config.task_poll_min(),
            self.config.task_poll_max(),
        )
    }

    pub fn reconciler(&self) -> ReplicaReconciler {
        ReplicaReconciler::new(
            Arc::clone(&self.api),
            Arc::clone(&self.locks),
            self.waiter(),
            self.config.app_id.clone(),
        )
    }
}
