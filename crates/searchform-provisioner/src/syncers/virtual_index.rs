use std::sync::Arc;

use searchform_core::ReplicaRef;

use crate::context::ProviderContext;
use crate::error::ProvisionerError;
use crate::manifest::ResourceSpec;
use crate::syncers::index::IndexSyncer;

/// Settings a virtual replica shares with its primary and cannot override.
/// They are dropped from writes and from drift detection.
pub const UNSUPPORTED_SETTINGS: &[&str] = &[
    "searchableAttributes",
    "attributesForFaceting",
    "ranking",
    "disableTypoToleranceOnAttributes",
    "disableTypoToleranceOnWords",
    "separatorsToIndex",
    "attributesToTransliterate",
    "camelCaseAttributes",
    "keepDiacriticsOnCharacters",
    "numericAttributesForFiltering",
    "allowCompressionOfIntegerArray",
    "attributeForDistinct",
];

/// Build the syncer for a virtual replica. It is listed on its primary as
/// `virtual(name)`, distinct from a standard replica of the same name.
pub fn new(spec: ResourceSpec, ctx: Arc<ProviderContext>) -> Result<IndexSyncer, ProvisionerError> {
    let desired = spec.index_desired()?;
    let primary = desired.primary_index_name.clone().ok_or_else(|| {
        ProvisionerError::Manifest(format!("{}: primary_index_name is required", spec.addr()))
    })?;
    let replica = ReplicaRef::virtual_replica(spec.resource_name.as_str())?;

    for key in desired
        .settings
        .keys()
        .filter(|k| UNSUPPORTED_SETTINGS.contains(&k.as_str()))
    {
        tracing::warn!(
            index = %spec.resource_name,
            setting = %key,
            "setting is not supported on virtual indices and will be ignored"
        );
    }

    Ok(IndexSyncer::replica_of(
        spec,
        desired,
        primary,
        replica,
        UNSUPPORTED_SETTINGS,
        "virtual index",
        ctx,
    ))
}
