use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::membership::MembershipList;

/// Settings of one remote index.
///
/// Used both for reads (the full current settings) and for writes, where a
/// field left as `None` / absent is not touched by the remote side. Only the
/// fields this crate reasons about are typed; everything else rides along
/// in `other` as opaque JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Membership list. Only meaningful on a primary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<MembershipList>,

    /// Name of the primary this index is a replica of. Read-only remotely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl IndexSettings {
    /// A write that replaces the membership list and nothing else.
    pub fn replicas_only(replicas: MembershipList) -> Self {
        Self {
            replicas: Some(replicas),
            ..Self::default()
        }
    }

    /// A write carrying only free-form settings.
    pub fn from_other(other: Map<String, Value>) -> Self {
        Self {
            other,
            ..Self::default()
        }
    }

    pub fn membership(&self) -> MembershipList {
        self.replicas.clone().unwrap_or_default()
    }

    /// Overlay the fields present in `patch` onto `self`.
    ///
    /// `primary` is never taken from a patch; it is owned by the primary's
    /// membership list, not by the replica.
    pub fn merge(&mut self, patch: &IndexSettings) {
        if let Some(replicas) = &patch.replicas {
            self.replicas = Some(replicas.clone());
        }
        for (key, value) in &patch.other {
            self.other.insert(key.clone(), value.clone());
        }
    }
}
