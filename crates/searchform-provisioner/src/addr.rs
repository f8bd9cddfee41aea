use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProvisionerError;

/// Composite key for addressing a resource in state.
///
/// Two resources of the same type but different names (e.g. two
/// `virtual_index` entries) have distinct addresses. Serialized as
/// `{resource_type}.{resource_name}` so it can key a JSON object.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ResourceAddr {
    pub resource_type: String,
    pub resource_name: String,
}

impl ResourceAddr {
    pub fn new(resource_type: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_name: resource_name.into(),
        }
    }
}

impl fmt::Display for ResourceAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.resource_name)
    }
}

impl FromStr for ResourceAddr {
    type Err = ProvisionerError;

    // Resource types never contain a dot; index names may.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((ty, name)) if !ty.is_empty() && !name.is_empty() => Ok(Self::new(ty, name)),
            _ => Err(ProvisionerError::State(format!("malformed resource address: {s:?}"))),
        }
    }
}

impl From<ResourceAddr> for String {
    fn from(addr: ResourceAddr) -> Self {
        addr.to_string()
    }
}

impl TryFrom<String> for ResourceAddr {
    type Error = ProvisionerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
