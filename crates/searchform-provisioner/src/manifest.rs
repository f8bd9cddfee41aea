use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use searchform_core::models::replica::validate_index_name;

use crate::addr::ResourceAddr;
use crate::error::ProvisionerError;

pub const INDEX: &str = "index";
pub const VIRTUAL_INDEX: &str = "virtual_index";

/// Setting keys owned by replica reconciliation. Writing either one through
/// plain settings would replace the remote value wholesale.
pub const RESERVED_SETTINGS: &[&str] = &["replicas", "primary"];

/// Every resource in the system is declared as a `ResourceSpec`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// `index` or `virtual_index`
    pub resource_type: String,
    /// The remote index name
    pub resource_name: String,
    /// Data (read-only precondition) or Managed (created/updated/deleted here)
    #[serde(default = "default_lifecycle")]
    pub lifecycle: Lifecycle,
    /// The desired index state; see [`IndexDesired`]
    #[serde(default)]
    pub desired: Value,
}

fn default_lifecycle() -> Lifecycle {
    Lifecycle::Managed
}

/// Desired state of an index or virtual index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDesired {
    /// Makes this index a replica of the named primary. Changing it means a
    /// new resource, never an in-place update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_index_name: Option<String>,
    /// Free-form index settings written as-is, minus [`RESERVED_SETTINGS`].
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default = "default_deletion_protection")]
    pub deletion_protection: bool,
}

fn default_deletion_protection() -> bool {
    true
}

impl ResourceSpec {
    pub fn addr(&self) -> ResourceAddr {
        ResourceAddr {
            resource_type: self.resource_type.clone(),
            resource_name: self.resource_name.clone(),
        }
    }

    /// Rebuild a spec for a resource known only from state, using the
    /// desired document recorded when it was last applied.
    pub fn from_state(addr: &ResourceAddr, desired: Value) -> Self {
        Self {
            resource_type: addr.resource_type.clone(),
            resource_name: addr.resource_name.clone(),
            lifecycle: Lifecycle::Managed,
            desired,
        }
    }

    pub fn index_desired(&self) -> Result<IndexDesired, ProvisionerError> {
        let desired = match &self.desired {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };
        serde_json::from_value(desired).map_err(|e| {
            ProvisionerError::Manifest(format!("{}: invalid desired state: {e}", self.addr()))
        })
    }

    /// The primary this resource is a replica of, if any.
    pub fn primary_name(&self) -> Option<String> {
        self.desired
            .get("primary_index_name")
            .and_then(Value::as_str)
            .map(String::from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Data,
    Managed,
}

/// Structured before/after for a single field that doesn't match desired state.
///
/// Returned by `ResourceSyncer::diff()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDrift {
    /// Machine-readable field name, e.g. "customRanking"
    pub field: String,
    /// What we want
    pub expected: Value,
    /// What the service has
    pub actual: Value,
}

/// The declared configuration: version + all resource specs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "current_version")]
    pub version: u32,
    pub specs: Vec<ResourceSpec>,
}

fn current_version() -> u32 {
    Manifest::VERSION
}

impl Manifest {
    /// Bump when the meaning of a spec field changes.
    pub const VERSION: u32 = 1;

    pub fn new(specs: Vec<ResourceSpec>) -> Self {
        Self {
            version: Self::VERSION,
            specs,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ProvisionerError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ProvisionerError> {
        let manifest: Manifest = serde_json::from_str(contents)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reject unknown types, bad names, duplicate addresses, reserved
    /// setting keys, virtual indices without a primary, and replicas of
    /// replicas.
    pub fn validate(&self) -> Result<(), ProvisionerError> {
        let mut seen = HashSet::new();
        for spec in &self.specs {
            let addr = spec.addr();
            if spec.resource_type != INDEX && spec.resource_type != VIRTUAL_INDEX {
                return Err(ProvisionerError::Manifest(format!(
                    "{addr}: unknown resource type"
                )));
            }
            validate_index_name(&spec.resource_name)?;
            if !seen.insert(addr.clone()) {
                return Err(ProvisionerError::Manifest(format!("{addr}: declared twice")));
            }

            let desired = spec.index_desired()?;
            if let Some(key) = RESERVED_SETTINGS
                .iter()
                .find(|key| desired.settings.contains_key(**key))
            {
                return Err(ProvisionerError::Manifest(format!(
                    "{addr}: settings.{key} is managed through primary_index_name"
                )));
            }
            match (&desired.primary_index_name, spec.resource_type.as_str()) {
                (None, VIRTUAL_INDEX) => {
                    return Err(ProvisionerError::Manifest(format!(
                        "{addr}: primary_index_name is required"
                    )));
                }
                (Some(primary), _) if *primary == spec.resource_name => {
                    return Err(ProvisionerError::Manifest(format!(
                        "{addr}: an index cannot be its own replica"
                    )));
                }
                (Some(primary), _) => validate_index_name(primary)?,
                (None, _) => {}
            }
        }

        for spec in &self.specs {
            let Some(primary) = spec.primary_name() else {
                continue;
            };
            let primary_is_replica = self
                .specs
                .iter()
                .any(|s| s.resource_name == primary && s.primary_name().is_some());
            if primary_is_replica {
                return Err(ProvisionerError::Manifest(format!(
                    "{}: primary {primary} is itself a replica",
                    spec.addr()
                )));
            }
        }
        Ok(())
    }
}
