use serde_json::json;

use searchform_core::IndexSettings;
use searchform_core::keys;

#[test]
fn merge_overlays_only_present_fields() {
    let mut current: IndexSettings = serde_json::from_value(json!({
        "replicas": ["a"],
        "primary": null,
        "searchableAttributes": ["title"],
        "hitsPerPage": 20
    }))
    .unwrap();

    let patch: IndexSettings = serde_json::from_value(json!({"hitsPerPage": 50})).unwrap();
    current.merge(&patch);

    assert_eq!(current.membership().entries(), ["a".to_string()]);
    assert_eq!(current.other["hitsPerPage"], json!(50));
    assert_eq!(current.other["searchableAttributes"], json!(["title"]));
}

#[test]
fn merge_never_takes_primary_from_patch() {
    let mut current = IndexSettings::default();
    let patch = IndexSettings {
        primary: Some("elsewhere".into()),
        ..IndexSettings::default()
    };
    current.merge(&patch);
    assert_eq!(current.primary, None);
}

#[test]
fn replicas_only_serializes_just_the_list() {
    let write = IndexSettings::replicas_only(["x", "virtual(y)"].into_iter().collect());
    assert_eq!(
        serde_json::to_value(&write).unwrap(),
        json!({"replicas": ["x", "virtual(y)"]})
    );
}

#[test]
fn lock_key_is_scoped_by_app_and_index() {
    assert_eq!(keys::index_lock("APP1", "products"), "APP1-search-index-products");
    assert_ne!(
        keys::index_lock("APP1", "products"),
        keys::index_lock("APP2", "products")
    );
}
