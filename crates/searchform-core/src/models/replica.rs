use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const VIRTUAL_PREFIX: &str = "virtual(";
const VIRTUAL_SUFFIX: &str = ")";

/// Whether a replica is a full copy of the primary's records (`Standard`)
/// or a settings-only view over them (`Virtual`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaKind {
    Standard,
    Virtual,
}

/// A replica as it is referenced from its primary's membership list.
///
/// The same index name yields two different identifiers depending on the
/// kind: `products_by_price` and `virtual(products_by_price)` are distinct
/// memberships and never match each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaRef {
    pub name: String,
    pub kind: ReplicaKind,
}

impl ReplicaRef {
    pub fn new(name: impl Into<String>, kind: ReplicaKind) -> Result<Self, CoreError> {
        let name = name.into();
        validate_index_name(&name)?;
        Ok(Self { name, kind })
    }

    pub fn standard(name: impl Into<String>) -> Result<Self, CoreError> {
        Self::new(name, ReplicaKind::Standard)
    }

    pub fn virtual_replica(name: impl Into<String>) -> Result<Self, CoreError> {
        Self::new(name, ReplicaKind::Virtual)
    }

    pub fn is_virtual(&self) -> bool {
        self.kind == ReplicaKind::Virtual
    }

    /// The string form stored in a primary's membership list.
    pub fn identifier(&self) -> String {
        self.to_string()
    }

    /// Decode a membership-list entry.
    ///
    /// Anything not fully wrapped in `virtual(...)` is a standard replica
    /// named by the raw entry, so malformed entries such as `virtual(abc`
    /// still round-trip byte-for-byte.
    pub fn parse(entry: &str) -> Result<Self, CoreError> {
        let inner = entry
            .strip_prefix(VIRTUAL_PREFIX)
            .and_then(|rest| rest.strip_suffix(VIRTUAL_SUFFIX));

        match inner {
            Some(name) if !name.is_empty() => Ok(Self {
                name: name.to_string(),
                kind: ReplicaKind::Virtual,
            }),
            Some(_) => Err(CoreError::InvalidReplicaId(entry.to_string())),
            None if entry.is_empty() => Err(CoreError::InvalidReplicaId(entry.to_string())),
            None => Ok(Self {
                name: entry.to_string(),
                kind: ReplicaKind::Standard,
            }),
        }
    }
}

impl fmt::Display for ReplicaRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ReplicaKind::Standard => write!(f, "{}", self.name),
            ReplicaKind::Virtual => write!(f, "{VIRTUAL_PREFIX}{}{VIRTUAL_SUFFIX}", self.name),
        }
    }
}

impl FromStr for ReplicaRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Index names must be non-empty and must not carry the virtual wrapper
/// themselves; the wrapper is derived from [`ReplicaKind`].
pub fn validate_index_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() || (name.starts_with(VIRTUAL_PREFIX) && name.ends_with(VIRTUAL_SUFFIX))
    {
        return Err(CoreError::InvalidIndexName(name.to_string()));
    }
    Ok(())
}
