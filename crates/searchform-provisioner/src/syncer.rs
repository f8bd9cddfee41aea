use searchform_client::BoxFuture;

use crate::error::ProvisionerError;
use crate::manifest::{FieldDrift, ResourceSpec};

/// One impl per resource type in the manifest.
/// Each impl holds its ResourceSpec + the shared provider context.
pub trait ResourceSyncer: Send + Sync {
    /// The [`ResourceSpec`] this syncer manages.
    fn spec(&self) -> &ResourceSpec;

    /// Read current state from the service. None = doesn't exist.
    ///
    /// This is a steady-state read: not-found is authoritative and is never
    /// retried.
    fn read(&self) -> BoxFuture<'_, Result<Option<serde_json::Value>, ProvisionerError>>;

    /// Compare actual state (from read) against self.spec().desired.
    /// Returns empty vec if in sync, otherwise field-level drifts.
    fn diff(&self, actual: &serde_json::Value) -> Vec<FieldDrift>;

    /// Create the resource to match self.spec().desired.
    fn create(&self) -> BoxFuture<'_, Result<serde_json::Value, ProvisionerError>>;

    /// Update the resource to match self.spec().desired.
    fn update(&self) -> BoxFuture<'_, Result<serde_json::Value, ProvisionerError>>;

    /// Tear down the resource.
    fn destroy(&self) -> BoxFuture<'_, Result<(), ProvisionerError>>;
}
