//! Idempotent add/remove of one replica in a primary's membership list.
//!
//! The service has no incremental add or remove for the list; the only
//! write is a whole-list replacement. Every change is therefore a
//! read-modify-write, and two of them racing on the same primary lose one
//! of the updates unless they are serialized. Each change here runs as one
//! critical section under the primary's lock key:
//!
//! 1. acquire the lock for `(app_id, primary)`
//! 2. read the primary's current list (never cached between sections)
//! 3. compute the new list; stop if nothing changes
//! 4. write the whole list and wait for the task to be published
//! 5. release the lock
//!
//! Any other code path that writes a primary's settings must take the same
//! lock; see [`ReplicaReconciler::lock_index`].

use std::fmt;
use std::sync::Arc;

use searchform_client::SearchApi;
use searchform_core::keys;
use searchform_core::{IndexSettings, ReplicaRef};

use crate::error::ProvisionerError;
use crate::kv::{KeyGuard, KeyedMutex};
use crate::task::TaskWaiter;

/// Where one replica stands relative to its primary's membership list.
/// `Attaching` and `Detaching` only exist inside a critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaPhase {
    Absent,
    Attaching,
    Attached,
    Detaching,
}

impl fmt::Display for ReplicaPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Absent => "absent",
            Self::Attaching => "attaching",
            Self::Attached => "attached",
            Self::Detaching => "detaching",
        };
        f.write_str(s)
    }
}

/// What a reconcile call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The list was rewritten and the write is published.
    Written,
    /// The list already had the desired shape; nothing was written.
    Unchanged,
    /// The primary no longer exists, so there was nothing to detach from.
    PrimaryMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Attach,
    Detach,
}

#[derive(Clone)]
pub struct ReplicaReconciler {
    api: Arc<dyn SearchApi>,
    locks: Arc<KeyedMutex>,
    waiter: TaskWaiter,
    app_id: String,
}

impl ReplicaReconciler {
    pub fn new(
        api: Arc<dyn SearchApi>,
        locks: Arc<KeyedMutex>,
        waiter: TaskWaiter,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            locks,
            waiter,
            app_id: app_id.into(),
        }
    }

    /// Hold the lock that guards every settings write to `index`.
    pub async fn lock_index(&self, index: &str) -> Result<KeyGuard, ProvisionerError> {
        self.locks
            .acquire(&keys::index_lock(&self.app_id, index))
            .await
    }

    /// Ensure `replica` is listed on `primary`. Fails if the primary does
    /// not exist.
    pub async fn attach(
        &self,
        primary: &str,
        replica: &ReplicaRef,
    ) -> Result<Reconciled, ProvisionerError> {
        self.reconcile(primary, replica, Change::Attach).await
    }

    /// Ensure `replica` is not listed on `primary`. A missing primary is
    /// reported as [`Reconciled::PrimaryMissing`], not as an error.
    pub async fn detach(
        &self,
        primary: &str,
        replica: &ReplicaRef,
    ) -> Result<Reconciled, ProvisionerError> {
        self.reconcile(primary, replica, Change::Detach).await
    }

    async fn reconcile(
        &self,
        primary: &str,
        replica: &ReplicaRef,
        change: Change,
    ) -> Result<Reconciled, ProvisionerError> {
        let _guard = self.lock_index(primary).await?;

        let mut list = match self.api.get_settings(primary).await {
            Ok(settings) => settings.membership(),
            Err(e) if e.is_not_found() && change == Change::Detach => {
                tracing::warn!(primary, replica = %replica, "primary not found, nothing to detach");
                return Ok(Reconciled::PrimaryMissing);
            }
            Err(e) if e.is_not_found() => {
                return Err(ProvisionerError::ResourceNotFound {
                    resource_type: "index".into(),
                    resource_id: primary.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let (from, through, to, changed) = match change {
            Change::Attach => (
                ReplicaPhase::Absent,
                ReplicaPhase::Attaching,
                ReplicaPhase::Attached,
                list.insert(replica),
            ),
            Change::Detach => (
                ReplicaPhase::Attached,
                ReplicaPhase::Detaching,
                ReplicaPhase::Absent,
                list.remove(replica),
            ),
        };
        if !changed {
            tracing::debug!(primary, replica = %replica, phase = %to, "membership already settled");
            return Ok(Reconciled::Unchanged);
        }

        tracing::debug!(primary, replica = %replica, %from, to = %through, "replica phase");
        let task = self
            .api
            .set_settings(primary, &IndexSettings::replicas_only(list))
            .await?;
        self.waiter.wait(&task).await?;

        tracing::info!(primary, replica = %replica, phase = %to, "membership updated");
        Ok(Reconciled::Written)
    }
}
