use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProvisionerError;

/// Current config version. Bump this when adding fields or changing shape.
/// Each bump requires a corresponding entry in [`migrate`].
const CURRENT_VERSION: u32 = 1;

/// Environment variable consulted when the config leaves `app_id` empty.
pub const APP_ID_ENV: &str = "SEARCH_APP_ID";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Schema version. Missing or 0 = pre-versioned config.
    #[serde(default)]
    pub config_version: u32,
    /// Application the managed indices live in. Scopes every lock key.
    #[serde(default)]
    pub app_id: String,
    /// Upper bound on waiting for a per-index lock. `null` waits forever.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: Option<u64>,
    /// How long a read right after a create keeps retrying not-found.
    #[serde(default = "default_read_retry_budget_secs")]
    pub read_retry_budget_secs: u64,
    #[serde(default = "default_task_poll_min_ms")]
    pub task_poll_min_ms: u64,
    #[serde(default = "default_task_poll_max_ms")]
    pub task_poll_max_ms: u64,
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// Deadline for a whole create, update or delete of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_operation_secs")]
    pub create_secs: u64,
    #[serde(default = "default_operation_secs")]
    pub update_secs: u64,
    #[serde(default = "default_operation_secs")]
    pub delete_secs: u64,
}

fn default_lock_timeout_secs() -> Option<u64> {
    Some(300)
}

fn default_read_retry_budget_secs() -> u64 {
    60
}

fn default_task_poll_min_ms() -> u64 {
    100
}

fn default_task_poll_max_ms() -> u64 {
    5_000
}

fn default_operation_secs() -> u64 {
    3_600
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create_secs: default_operation_secs(),
            update_secs: default_operation_secs(),
            delete_secs: default_operation_secs(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_VERSION,
            app_id: String::new(),
            lock_timeout_secs: default_lock_timeout_secs(),
            read_retry_budget_secs: default_read_retry_budget_secs(),
            task_poll_min_ms: default_task_poll_min_ms(),
            task_poll_max_ms: default_task_poll_max_ms(),
            timeouts: Timeouts::default(),
        }
    }
}

impl ProviderConfig {
    pub fn for_app(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            ..Self::default()
        }
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_secs.map(Duration::from_secs)
    }

    pub fn read_retry_budget(&self) -> Duration {
        Duration::from_secs(self.read_retry_budget_secs)
    }

    pub fn task_poll_min(&self) -> Duration {
        Duration::from_millis(self.task_poll_min_ms)
    }

    pub fn task_poll_max(&self) -> Duration {
        Duration::from_millis(self.task_poll_max_ms)
    }

    /// Fill an empty `app_id` from the environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// [`ProviderConfig::apply_env`] with an injectable lookup.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.app_id.is_empty() {
            if let Some(app_id) = lookup(APP_ID_ENV).filter(|v| !v.is_empty()) {
                self.app_id = app_id;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ProvisionerError> {
        if self.app_id.trim().is_empty() {
            return Err(ProvisionerError::Config(format!(
                "app_id is required (set it in the config or via {APP_ID_ENV})"
            )));
        }
        if self.task_poll_min_ms == 0 || self.task_poll_min_ms > self.task_poll_max_ms {
            return Err(ProvisionerError::Config(format!(
                "task_poll_min_ms ({}) must be positive and no larger than task_poll_max_ms ({})",
                self.task_poll_min_ms, self.task_poll_max_ms
            )));
        }
        Ok(())
    }
}

impl Timeouts {
    pub fn create(&self) -> Duration {
        Duration::from_secs(self.create_secs)
    }

    pub fn update(&self) -> Duration {
        Duration::from_secs(self.update_secs)
    }

    pub fn delete(&self) -> Duration {
        Duration::from_secs(self.delete_secs)
    }
}

/// Read, migrate, and validate the config at `path`, then apply
/// environment fallbacks.
pub fn load_config(path: &Path) -> Result<ProviderConfig, ProvisionerError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ProvisionerError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let mut config = parse_config(&contents)?;
    config.apply_env();
    config.validate()?;
    Ok(config)
}

/// Parse and migrate a config document without touching the environment.
pub fn parse_config(contents: &str) -> Result<ProviderConfig, ProvisionerError> {
    // Parse as raw JSON so we can run migrations before deserializing.
    let json: serde_json::Value = serde_json::from_str(contents)?;
    let on_disk_version = match json.get("config_version").and_then(|v| v.as_u64()) {
        Some(v) => u32::try_from(v).map_err(|_| {
            ProvisionerError::Config(format!("config_version {v} is out of range"))
        })?,
        None => 0,
    };

    let migrated = migrate(json, on_disk_version)?;
    Ok(serde_json::from_value(migrated)?)
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
///
/// Each migration is a pure transform on the raw JSON value.
fn migrate(
    mut json: serde_json::Value,
    from_version: u32,
) -> Result<serde_json::Value, ProvisionerError> {
    if from_version > CURRENT_VERSION {
        return Err(ProvisionerError::Config(format!(
            "config_version {from_version} is newer than this build supports ({CURRENT_VERSION})"
        )));
    }

    // v0 → v1: `application_id` renamed to `app_id`
    if from_version < 1 {
        let obj = json
            .as_object_mut()
            .ok_or_else(|| ProvisionerError::Config("config is not a JSON object".into()))?;
        if let Some(legacy) = obj.remove("application_id") {
            obj.entry("app_id").or_insert(legacy);
        }
        obj.insert(
            "config_version".to_string(),
            serde_json::Value::Number(1.into()),
        );
        tracing::info!("migrated config v0 → v1 (application_id → app_id)");
    }

    Ok(json)
}

/// Write `config` to `path` atomically, stamped with the current version.
pub fn save_config(path: &Path, config: &ProviderConfig) -> Result<(), ProvisionerError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Always write the current version, regardless of what was loaded.
    let mut stamped = config.clone();
    stamped.config_version = CURRENT_VERSION;

    let json = serde_json::to_string_pretty(&stamped)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json.as_bytes())?;
    std::fs::rename(&tmp_path, path)?;

    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
