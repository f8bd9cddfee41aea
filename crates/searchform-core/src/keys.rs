//! Key conventions.
//!
//! Pure string functions. These define the canonical names used to scope
//! locks and to locate persisted provisioner state.

/// Lock key guarding every mutation of one index's settings, including its
/// membership list. Scoped per application so two applications sharing a
/// process never contend on indices that merely share a name.
pub fn index_lock(app_id: &str, index: &str) -> String {
    format!("{app_id}-search-index-{index}")
}

/// Default file name for persisted provisioner state.
pub const PROVISIONER_STATE: &str = "searchform.state.json";

/// Default file name for the provider configuration.
pub const PROVIDER_CONFIG: &str = "searchform.config.json";
