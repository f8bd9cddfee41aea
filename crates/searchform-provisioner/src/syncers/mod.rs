use std::sync::Arc;

use crate::context::ProviderContext;
use crate::error::ProvisionerError;
use crate::manifest::{INDEX, Manifest, ResourceSpec, VIRTUAL_INDEX};
use crate::syncer::ResourceSyncer;

pub mod index;
pub mod virtual_index;

/// Build the syncer for one spec.
pub fn build(
    spec: ResourceSpec,
    ctx: &Arc<ProviderContext>,
) -> Result<Box<dyn ResourceSyncer>, ProvisionerError> {
    match spec.resource_type.as_str() {
        INDEX => Ok(Box::new(index::IndexSyncer::new(spec, Arc::clone(ctx))?)),
        VIRTUAL_INDEX => Ok(Box::new(virtual_index::new(spec, Arc::clone(ctx))?)),
        other => Err(ProvisionerError::Manifest(format!(
            "{}: unknown resource type {other:?}",
            spec.addr()
        ))),
    }
}

/// Build syncers for every spec, in manifest order.
pub fn build_all(
    manifest: &Manifest,
    ctx: &Arc<ProviderContext>,
) -> Result<Vec<Box<dyn ResourceSyncer>>, ProvisionerError> {
    manifest
        .specs
        .iter()
        .cloned()
        .map(|spec| build(spec, ctx))
        .collect()
}
