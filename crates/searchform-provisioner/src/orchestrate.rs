use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;

use crate::addr::ResourceAddr;
use crate::context::ProviderContext;
use crate::error::{ProvisionerError, format_err_chain};
use crate::manifest::{INDEX, Lifecycle, Manifest, ResourceSpec};
use crate::persistence::StatePersistence;
use crate::plan::{self, Action, Cause, PlanEntry};
use crate::state::{ProvisionerState, ResourceState, ResourceStatus};
use crate::syncer::ResourceSyncer;
use crate::syncers;

const PRIMARY_INDEX_NAME: &str = "primary_index_name";

/// Scan all resources and produce an annotated plan.
///
/// One entry per manifest spec, plus orphan entries for resources in state
/// but not in the current manifest. Reads here are steady-state: a missing
/// resource is missing, not still propagating.
pub async fn plan(
    syncers: &[Box<dyn ResourceSyncer>],
    state: &ProvisionerState,
) -> Result<Vec<PlanEntry>, ProvisionerError> {
    let manifest_upgraded = state
        .manifest_version
        .is_none_or(|v| v < Manifest::VERSION);
    let mut entries = Vec::new();

    for syncer in syncers {
        let spec = syncer.spec();
        let addr = spec.addr();
        let tracked = state.resources.get(&addr);
        let actual = syncer.read().await?;

        let entry = match (spec.lifecycle, &actual) {
            (Lifecycle::Data, None) => PlanEntry {
                spec: spec.clone(),
                action: Action::PreconditionFailed,
                cause: Cause::Drift,
                drift: vec![],
            },

            (Lifecycle::Data, Some(actual)) => {
                let drift = syncer.diff(actual);
                PlanEntry {
                    spec: spec.clone(),
                    action: if drift.is_empty() {
                        Action::Ok
                    } else {
                        Action::PreconditionFailed
                    },
                    cause: if drift.is_empty() {
                        Cause::InSync
                    } else {
                        Cause::Drift
                    },
                    drift,
                }
            }

            (Lifecycle::Managed, None) => PlanEntry {
                spec: spec.clone(),
                action: Action::Create,
                cause: if tracked.is_some() {
                    Cause::Drift
                } else {
                    Cause::FirstProvision
                },
                drift: vec![],
            },

            (Lifecycle::Managed, Some(actual)) => {
                let drift = syncer.diff(actual);
                let recorded_desired_changed =
                    tracked.is_some_and(|rs| rs.desired() != spec.desired);

                let (action, cause) = if drift.iter().any(|d| d.field == PRIMARY_INDEX_NAME) {
                    (Action::Replace, Cause::PrimaryChanged)
                } else if !drift.is_empty() {
                    let cause = if manifest_upgraded || recorded_desired_changed {
                        Cause::ManifestChanged
                    } else {
                        Cause::Drift
                    };
                    (Action::Modify, cause)
                } else if recorded_desired_changed || tracked.is_none() {
                    // Remote already matches; only the recorded state is behind.
                    (Action::Modify, Cause::ManifestChanged)
                } else {
                    (Action::Ok, Cause::InSync)
                };
                PlanEntry {
                    spec: spec.clone(),
                    action,
                    cause,
                    drift,
                }
            }
        };
        entries.push(entry);
    }

    let manifest_addrs: HashSet<_> = syncers.iter().map(|s| s.spec().addr()).collect();
    for (addr, rs) in &state.resources {
        if !manifest_addrs.contains(addr) {
            entries.push(PlanEntry {
                spec: ResourceSpec::from_state(addr, rs.desired()),
                action: Action::Delete,
                cause: Cause::Orphaned,
                drift: vec![],
            });
        }
    }

    Ok(entries)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Create,
    Update,
    Destroy,
}

struct Unit<'a> {
    addr: ResourceAddr,
    op: Op,
    syncer: &'a dyn ResourceSyncer,
}

fn is_replica(syncer: &dyn ResourceSyncer) -> bool {
    syncer.spec().primary_name().is_some()
}

/// Execute all actionable entries in the plan.
///
/// Units that do not depend on each other run concurrently, in waves:
///
/// 1. destroys of replicas (orphans and the old half of replacements)
/// 2. destroys of primaries
/// 3. creates of primaries
/// 4. creates of replicas (including the new half of replacements)
/// 5. updates
///
/// State is flushed after every completed unit. A failing unit does not
/// cancel its siblings; the wave settles, the first error is returned and
/// later waves do not run.
pub async fn execute(
    entries: &[PlanEntry],
    syncers: &[Box<dyn ResourceSyncer>],
    ctx: &Arc<ProviderContext>,
    state: &mut ProvisionerState,
    persistence: &StatePersistence,
) -> Result<(), ProvisionerError> {
    plan::check_preconditions(entries)?;

    let syncer_map: HashMap<ResourceAddr, &dyn ResourceSyncer> = syncers
        .iter()
        .map(|s| (s.spec().addr(), s.as_ref()))
        .collect();
    let lookup = |addr: &ResourceAddr| {
        syncer_map
            .get(addr)
            .copied()
            .ok_or_else(|| ProvisionerError::ResourceNotFound {
                resource_type: addr.resource_type.clone(),
                resource_id: addr.resource_name.clone(),
            })
    };

    // Orphans and replacements are torn down as they were last applied.
    let mut teardown = Vec::new();
    for entry in entries
        .iter()
        .filter(|e| matches!(e.action, Action::Delete | Action::Replace))
    {
        let spec = match entry.action {
            Action::Replace => replaced_spec(entry),
            _ => entry.spec.clone(),
        };
        teardown.push((entry.spec.addr(), syncers::build(spec, ctx)?));
    }

    let mut creates = Vec::new();
    let mut updates = Vec::new();
    for entry in entries {
        let addr = entry.spec.addr();
        match entry.action {
            Action::Create | Action::Replace => creates.push(Unit {
                syncer: lookup(&addr)?,
                addr,
                op: Op::Create,
            }),
            Action::Modify => updates.push(Unit {
                syncer: lookup(&addr)?,
                addr,
                op: Op::Update,
            }),
            Action::Ok | Action::Delete | Action::PreconditionFailed => {}
        }
    }
    let destroys: Vec<_> = teardown
        .iter()
        .map(|(addr, s)| Unit {
            addr: addr.clone(),
            op: Op::Destroy,
            syncer: s.as_ref(),
        })
        .collect();

    let (replica_destroys, primary_destroys): (Vec<_>, Vec<_>) =
        destroys.into_iter().partition(|u| is_replica(u.syncer));
    let (replica_creates, primary_creates): (Vec<_>, Vec<_>) =
        creates.into_iter().partition(|u| is_replica(u.syncer));

    for wave in [
        replica_destroys,
        primary_destroys,
        primary_creates,
        replica_creates,
        updates,
    ] {
        run_wave(wave, ctx, state, persistence).await?;
    }

    state.manifest_version = Some(Manifest::VERSION);
    persistence.flush(state).await?;

    Ok(())
}

/// What to destroy for a replacement: the declared resource, still
/// pointing at the primary it is attached to today. A remote with no
/// primary is torn down as a plain index, whatever it is declared as.
fn replaced_spec(entry: &PlanEntry) -> ResourceSpec {
    let mut spec = entry.spec.clone();
    let current_primary = entry
        .drift
        .iter()
        .find(|d| d.field == PRIMARY_INDEX_NAME)
        .map(|d| d.actual.clone())
        .unwrap_or(Value::Null);
    if spec.desired.is_null() {
        spec.desired = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(desired) = &mut spec.desired {
        match current_primary {
            Value::Null => {
                desired.remove(PRIMARY_INDEX_NAME);
                spec.resource_type = INDEX.to_string();
            }
            primary => {
                desired.insert(PRIMARY_INDEX_NAME.into(), primary);
            }
        }
    }
    spec
}

async fn run_unit(
    unit: &Unit<'_>,
    timeout: Duration,
) -> Result<Option<Value>, ProvisionerError> {
    async fn bounded<T>(
        addr: &ResourceAddr,
        timeout: Duration,
        fut: impl Future<Output = Result<T, ProvisionerError>>,
    ) -> Result<T, ProvisionerError> {
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| ProvisionerError::DeadlineExceeded {
                addr: addr.to_string(),
                timeout,
            })?
    }

    match unit.op {
        Op::Create => {
            tracing::info!(addr = %unit.addr, "creating resource");
            bounded(&unit.addr, timeout, unit.syncer.create())
                .await
                .map(Some)
        }
        Op::Update => {
            tracing::info!(addr = %unit.addr, "updating resource");
            bounded(&unit.addr, timeout, unit.syncer.update())
                .await
                .map(Some)
        }
        Op::Destroy => {
            tracing::info!(addr = %unit.addr, "destroying resource");
            bounded(&unit.addr, timeout, unit.syncer.destroy())
                .await
                .map(|()| None)
        }
    }
}

async fn run_wave(
    wave: Vec<Unit<'_>>,
    ctx: &ProviderContext,
    state: &mut ProvisionerState,
    persistence: &StatePersistence,
) -> Result<(), ProvisionerError> {
    if wave.is_empty() {
        return Ok(());
    }

    let timeouts = &ctx.config.timeouts;
    let mut pending: FuturesUnordered<_> = wave
        .iter()
        .map(|unit| async move {
            let timeout = match unit.op {
                Op::Create => timeouts.create(),
                Op::Update => timeouts.update(),
                Op::Destroy => timeouts.delete(),
            };
            (unit, run_unit(unit, timeout).await)
        })
        .collect();

    let mut first_error = None;
    while let Some((unit, result)) = pending.next().await {
        let outcome = match result {
            Ok(properties) => {
                record(state, unit, properties);
                persistence.flush(state).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            tracing::error!(addr = %unit.addr, error = %format_err_chain(&e), "resource operation failed");
            first_error.get_or_insert(e);
        }
    }

    first_error.map_or(Ok(()), Err)
}

fn record(state: &mut ProvisionerState, unit: &Unit<'_>, properties: Option<Value>) {
    let spec = unit.syncer.spec();
    match (unit.op, properties) {
        (Op::Destroy, _) | (_, None) => {
            state.resources.remove(&unit.addr);
        }
        (op, Some(properties)) => {
            state.resources.insert(
                unit.addr.clone(),
                ResourceState {
                    resource_type: spec.resource_type.clone(),
                    resource_id: spec.resource_name.clone(),
                    status: if op == Op::Create {
                        ResourceStatus::Created
                    } else {
                        ResourceStatus::Updated
                    },
                    properties,
                    updated_at: jiff::Timestamp::now(),
                },
            );
        }
    }
}

/// Re-read every tracked resource. Resources that no longer exist remotely
/// are dropped from state and returned.
pub async fn refresh(
    ctx: &Arc<ProviderContext>,
    state: &mut ProvisionerState,
    persistence: &StatePersistence,
) -> Result<Vec<ResourceAddr>, ProvisionerError> {
    let mut gone = Vec::new();
    let tracked: Vec<_> = state
        .resources
        .iter()
        .map(|(addr, rs)| ResourceSpec::from_state(addr, rs.desired()))
        .collect();

    for spec in tracked {
        let addr = spec.addr();
        let syncer = syncers::build(spec, ctx)?;
        match syncer.read().await? {
            Some(remote) => {
                if let Some(rs) = state.resources.get_mut(&addr) {
                    rs.properties = serde_json::json!({
                        "desired": rs.desired(),
                        "remote": remote,
                    });
                    rs.status = ResourceStatus::Refreshed;
                    rs.updated_at = jiff::Timestamp::now();
                }
            }
            None => {
                tracing::warn!(addr = %addr, "resource not found, removing from state");
                state.resources.remove(&addr);
                gone.push(addr);
            }
        }
    }

    persistence.flush(state).await?;
    Ok(gone)
}

/// Destroy every resource in state, replicas before primaries.
pub async fn destroy_all(
    ctx: &Arc<ProviderContext>,
    state: &mut ProvisionerState,
    persistence: &StatePersistence,
) -> Result<(), ProvisionerError> {
    let tracked = state
        .resources
        .iter()
        .map(|(addr, rs)| syncers::build(ResourceSpec::from_state(addr, rs.desired()), ctx))
        .collect::<Result<Vec<_>, _>>()?;

    let (replicas, primaries): (Vec<_>, Vec<_>) = tracked
        .iter()
        .map(|s| Unit {
            addr: s.spec().addr(),
            op: Op::Destroy,
            syncer: s.as_ref(),
        })
        .partition(|u| is_replica(u.syncer));

    run_wave(replicas, ctx, state, persistence).await?;
    run_wave(primaries, ctx, state, persistence).await?;

    state.manifest_version = None;
    persistence.flush(state).await?;

    Ok(())
}
