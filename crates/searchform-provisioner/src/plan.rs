use serde::{Deserialize, Serialize};

use crate::error::ProvisionerError;
use crate::manifest::{FieldDrift, ResourceSpec};

/// What execution will do with one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Ok,
    Create,
    Modify,
    /// Destroy then create; the primary reference changed.
    Replace,
    Delete,
    PreconditionFailed,
}

/// Why the action was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    InSync,
    FirstProvision,
    Drift,
    ManifestChanged,
    PrimaryChanged,
    Orphaned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    pub spec: ResourceSpec,
    pub action: Action,
    pub cause: Cause,
    pub drift: Vec<FieldDrift>,
}

impl PlanEntry {
    pub fn is_actionable(&self) -> bool {
        matches!(
            self.action,
            Action::Create | Action::Modify | Action::Replace | Action::Delete
        )
    }
}

pub fn has_changes(entries: &[PlanEntry]) -> bool {
    entries.iter().any(PlanEntry::is_actionable)
}

/// Fail if any data source is missing or does not match its declaration.
pub fn check_preconditions(entries: &[PlanEntry]) -> Result<(), ProvisionerError> {
    match entries
        .iter()
        .find(|e| e.action == Action::PreconditionFailed)
    {
        Some(entry) => Err(ProvisionerError::PreconditionFailed(format!(
            "{} does not match the declared data source",
            entry.spec.addr()
        ))),
        None => Ok(()),
    }
}
