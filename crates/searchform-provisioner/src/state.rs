use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::addr::ResourceAddr;

/// Provisioner state, persisted as JSON next to the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvisionerState {
    /// Every resource this provisioner has created and not yet destroyed.
    #[serde(default)]
    pub resources: BTreeMap<ResourceAddr, ResourceState>,

    /// Manifest version the state was last applied with.
    #[serde(default)]
    pub manifest_version: Option<u32>,

    /// Application the resources live in.
    #[serde(default)]
    pub app_id: String,
}

/// State for a single managed resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub resource_type: String,
    pub resource_id: String,
    pub status: ResourceStatus,
    /// `{"desired": <spec.desired>, "remote": <last read>}`
    pub properties: serde_json::Value,
    pub updated_at: jiff::Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Created,
    Updated,
    Refreshed,
}

impl ResourceState {
    /// The desired document recorded when the resource was last applied.
    pub fn desired(&self) -> serde_json::Value {
        self.properties
            .get("desired")
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}
