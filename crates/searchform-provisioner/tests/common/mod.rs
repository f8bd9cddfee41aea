#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use searchform_client::{MemoryBackend, MemoryConfig};
use searchform_provisioner::{ProviderConfig, ProviderContext};
use tracing_subscriber::EnvFilter;

pub const APP_ID: &str = "TESTAPP";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

pub fn backend() -> MemoryBackend {
    MemoryBackend::new(MemoryConfig::default())
}

pub fn config() -> ProviderConfig {
    let mut config = ProviderConfig::for_app(APP_ID);
    config.task_poll_min_ms = 10;
    config.task_poll_max_ms = 50;
    config
}

pub fn context(api: &MemoryBackend) -> Arc<ProviderContext> {
    context_with(api, config())
}

pub fn context_with(api: &MemoryBackend, config: ProviderConfig) -> Arc<ProviderContext> {
    init_tracing();
    Arc::new(ProviderContext::new(config, Arc::new(api.clone())))
}

/// Replica entries of `index`, sorted, ignoring read visibility.
pub fn replicas_of(api: &MemoryBackend, index: &str) -> Vec<String> {
    let mut entries = api
        .index_settings(index)
        .map(|s| s.membership().into_inner())
        .unwrap_or_default();
    entries.sort();
    entries
}

pub const SETTLE: Duration = Duration::from_secs(1);
