use std::sync::Arc;

use serde_json::{Value, json};

use searchform_client::{ApiError, BoxFuture};
use searchform_core::{IndexSettings, ReplicaRef};

use crate::context::ProviderContext;
use crate::error::ProvisionerError;
use crate::manifest::{FieldDrift, IndexDesired, RESERVED_SETTINGS, ResourceSpec};
use crate::retry::{self, Retried};
use crate::syncer::ResourceSyncer;

/// Syncs one index: a standalone primary, or a replica of another index.
///
/// A replica's membership in its primary's list is reconciled before its
/// own settings are written on create, and after they stop mattering on
/// destroy. Its own settings never touch the primary.
pub struct IndexSyncer {
    spec: ResourceSpec,
    desired: IndexDesired,
    /// `(primary name, how this index appears in the primary's list)`
    membership: Option<(String, ReplicaRef)>,
    /// Setting keys the service ignores for this kind of index.
    unsupported: &'static [&'static str],
    label: &'static str,
    ctx: Arc<ProviderContext>,
}

impl IndexSyncer {
    pub fn new(spec: ResourceSpec, ctx: Arc<ProviderContext>) -> Result<Self, ProvisionerError> {
        let desired = spec.index_desired()?;
        let membership = match &desired.primary_index_name {
            Some(primary) => Some((
                primary.clone(),
                ReplicaRef::standard(spec.resource_name.as_str())?,
            )),
            None => None,
        };
        Ok(Self {
            spec,
            desired,
            membership,
            unsupported: &[],
            label: "index",
            ctx,
        })
    }

    pub(crate) fn replica_of(
        spec: ResourceSpec,
        desired: IndexDesired,
        primary: String,
        replica: ReplicaRef,
        unsupported: &'static [&'static str],
        label: &'static str,
        ctx: Arc<ProviderContext>,
    ) -> Self {
        Self {
            spec,
            desired,
            membership: Some((primary, replica)),
            unsupported,
            label,
            ctx,
        }
    }

    fn index_name(&self) -> &str {
        &self.spec.resource_name
    }

    fn primary(&self) -> Option<&str> {
        self.membership.as_ref().map(|(primary, _)| primary.as_str())
    }

    fn writable_settings(&self) -> IndexSettings {
        let other = self
            .desired
            .settings
            .iter()
            .filter(|(key, _)| {
                !self.unsupported.contains(&key.as_str())
                    && !RESERVED_SETTINGS.contains(&key.as_str())
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        IndexSettings::from_other(other)
    }

    fn tagged(&self, err: ProvisionerError) -> ProvisionerError {
        err.with_resource(self.label, self.index_name())
    }

    fn not_found(&self) -> ProvisionerError {
        ProvisionerError::ResourceNotFound {
            resource_type: self.spec.resource_type.clone(),
            resource_id: self.index_name().to_string(),
        }
    }

    fn snapshot(&self, settings: &IndexSettings) -> Value {
        json!({
            "primary_index_name": settings.primary,
            "replicas": settings.membership(),
            "settings": settings.other,
        })
    }

    fn properties(&self, remote: Value) -> Value {
        json!({"desired": self.spec.desired, "remote": remote})
    }

    /// Write this index's own settings under its lock key, so that a write
    /// to a primary can never interleave with a membership change on it.
    async fn write_own_settings(&self) -> Result<(), ProvisionerError> {
        let settings = self.writable_settings();
        let _guard = self
            .ctx
            .reconciler()
            .lock_index(self.index_name())
            .await?;
        let task = self
            .ctx
            .api
            .set_settings(self.index_name(), &settings)
            .await?;
        self.ctx.waiter().wait(&task).await
    }

    /// Read back right after creation, riding out propagation delay.
    async fn read_after_create(&self) -> Result<Value, ProvisionerError> {
        let outcome = retry::retry_within(
            self.ctx.config.read_retry_budget(),
            retry::read_after_write_policy(),
            || self.ctx.api.get_settings(self.index_name()),
            ApiError::is_propagation_race,
        )
        .await;
        if let Retried::Exhausted { attempts, .. } = &outcome {
            tracing::warn!(index = %self.index_name(), attempts, "index still not readable after create");
        }
        let settings = outcome.into_result()?;
        Ok(self.snapshot(&settings))
    }

    async fn read_current(&self) -> Result<Option<IndexSettings>, ProvisionerError> {
        match self.ctx.api.get_settings(self.index_name()).await {
            Ok(settings) => Ok(Some(settings)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl ResourceSyncer for IndexSyncer {
    fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    fn read(&self) -> BoxFuture<'_, Result<Option<Value>, ProvisionerError>> {
        Box::pin(async {
            Ok(self
                .read_current()
                .await?
                .map(|settings| self.snapshot(&settings)))
        })
    }

    fn diff(&self, actual: &Value) -> Vec<FieldDrift> {
        let mut drift = Vec::new();

        let expected_primary = json!(self.primary());
        let actual_primary = actual.get("primary_index_name").cloned().unwrap_or(Value::Null);
        if expected_primary != actual_primary {
            drift.push(FieldDrift {
                field: "primary_index_name".into(),
                expected: expected_primary,
                actual: actual_primary,
            });
        }

        for (key, expected) in self.writable_settings().other {
            let actual = actual
                .get("settings")
                .and_then(|s| s.get(&key))
                .cloned()
                .unwrap_or(Value::Null);
            if expected != actual {
                drift.push(FieldDrift {
                    field: key,
                    expected,
                    actual,
                });
            }
        }
        drift
    }

    fn create(&self) -> BoxFuture<'_, Result<Value, ProvisionerError>> {
        Box::pin(async {
            if let Some((primary, replica)) = &self.membership {
                self.ctx
                    .reconciler()
                    .attach(primary, replica)
                    .await
                    .map_err(|e| self.tagged(e))?;
            }

            self.write_own_settings()
                .await
                .map_err(|e| self.tagged(e))?;
            let remote = self.read_after_create().await.map_err(|e| self.tagged(e))?;

            tracing::info!(index = %self.index_name(), kind = self.label, "index created");
            Ok(self.properties(remote))
        })
    }

    fn update(&self) -> BoxFuture<'_, Result<Value, ProvisionerError>> {
        Box::pin(async {
            let current = self
                .read_current()
                .await
                .and_then(|current| current.ok_or_else(|| self.not_found()))
                .map_err(|e| self.tagged(e))?;
            if current.primary.as_deref() != self.primary() {
                return Err(self.tagged(ProvisionerError::UpdateFailed(format!(
                    "primary changed from {:?} to {:?}; the index must be replaced",
                    current.primary,
                    self.primary()
                ))));
            }

            self.write_own_settings()
                .await
                .map_err(|e| self.tagged(e))?;
            let settings = self
                .read_current()
                .await
                .and_then(|settings| settings.ok_or_else(|| self.not_found()))
                .map_err(|e| self.tagged(e))?;

            tracing::info!(index = %self.index_name(), kind = self.label, "index updated");
            Ok(self.properties(self.snapshot(&settings)))
        })
    }

    fn destroy(&self) -> BoxFuture<'_, Result<(), ProvisionerError>> {
        Box::pin(async {
            if self.desired.deletion_protection {
                return Err(ProvisionerError::DeletionProtected(self.spec.addr().to_string()));
            }

            if let Some((primary, replica)) = &self.membership {
                self.ctx
                    .reconciler()
                    .detach(primary, replica)
                    .await
                    .map_err(|e| self.tagged(e))?;
            }

            let task = self
                .ctx
                .api
                .delete_index(self.index_name())
                .await
                .map_err(|e| self.tagged(e.into()))?;
            self.ctx
                .waiter()
                .wait(&task)
                .await
                .map_err(|e| self.tagged(e))?;

            tracing::info!(index = %self.index_name(), kind = self.label, "index deleted");
            Ok(())
        })
    }
}
