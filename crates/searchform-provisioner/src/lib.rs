//! searchform-provisioner
//!
//! Keeps search indices and their replicas in line with a declared
//! manifest. The hard part is the primary's replica list: a shared remote
//! value with no server-side compare-and-set, written asynchronously and
//! read back eventually consistently. Every change to it runs as a locked
//! read-modify-write that waits for the write to be applied (see
//! [`replica`]).
//!
//! Public API:
//! - `provision()`: read, plan, execute
//! - `refresh()`: re-read tracked resources, forgetting the ones that are gone
//! - `destroy()`: tear down everything in state, replicas first

pub mod addr;
pub mod config;
pub mod context;
pub mod error;
pub mod kv;
pub mod manifest;
pub mod orchestrate;
pub mod persistence;
pub mod plan;
pub mod replica;
pub mod retry;
pub mod state;
pub mod syncer;
pub mod syncers;
pub mod task;

use std::sync::Arc;

pub use crate::addr::ResourceAddr;
pub use crate::config::ProviderConfig;
pub use crate::context::ProviderContext;
pub use crate::error::{ProvisionerError, format_err_chain};
pub use crate::kv::{KeyGuard, KeyedMutex};
pub use crate::manifest::{Lifecycle, Manifest, ResourceSpec};
pub use crate::persistence::StatePersistence;
pub use crate::plan::{Action, Cause, PlanEntry};
pub use crate::replica::{Reconciled, ReplicaPhase, ReplicaReconciler};
pub use crate::retry::{Retried, retry_within};
pub use crate::state::ProvisionerState;
pub use crate::syncer::ResourceSyncer;
pub use crate::task::TaskWaiter;

/// Full provisioning: read → plan → execute. Returns the plan that was
/// applied.
pub async fn provision(
    ctx: &Arc<ProviderContext>,
    manifest: &Manifest,
    persistence: &StatePersistence,
) -> Result<Vec<PlanEntry>, ProvisionerError> {
    manifest.validate()?;
    let mut state = persistence.load().await?;
    check_app(&state, ctx)?;
    state.app_id = ctx.config.app_id.clone();

    let syncers = syncers::build_all(manifest, ctx)?;
    let entries = orchestrate::plan(&syncers, &state).await?;
    plan::check_preconditions(&entries)?;

    if plan::has_changes(&entries) {
        let count = |action: Action| entries.iter().filter(|e| e.action == action).count();
        tracing::info!(
            creates = count(Action::Create),
            modifies = count(Action::Modify),
            replaces = count(Action::Replace),
            deletes = count(Action::Delete),
            "executing provisioning plan"
        );
        orchestrate::execute(&entries, &syncers, ctx, &mut state, persistence).await?;
    } else {
        tracing::info!("all resources in sync, no changes needed");
    }

    Ok(entries)
}

/// Re-read every tracked resource; returns the ones dropped from state.
pub async fn refresh(
    ctx: &Arc<ProviderContext>,
    persistence: &StatePersistence,
) -> Result<Vec<ResourceAddr>, ProvisionerError> {
    let mut state = persistence.load().await?;
    check_app(&state, ctx)?;
    orchestrate::refresh(ctx, &mut state, persistence).await
}

/// Destroy all managed resources, replicas before primaries.
pub async fn destroy(
    ctx: &Arc<ProviderContext>,
    persistence: &StatePersistence,
) -> Result<(), ProvisionerError> {
    let mut state = persistence.load().await?;
    check_app(&state, ctx)?;
    orchestrate::destroy_all(ctx, &mut state, persistence).await
}

fn check_app(state: &ProvisionerState, ctx: &ProviderContext) -> Result<(), ProvisionerError> {
    if !state.app_id.is_empty() && state.app_id != ctx.config.app_id {
        return Err(ProvisionerError::State(format!(
            "state belongs to application {:?}, not {:?}",
            state.app_id, ctx.config.app_id
        )));
    }
    Ok(())
}
