mod common;

use std::time::Duration;

use searchform_client::{MemoryBackend, MemoryConfig, SearchApi};
use searchform_core::IndexSettings;
use searchform_provisioner::manifest::{INDEX, VIRTUAL_INDEX};
use searchform_provisioner::{Lifecycle, ProvisionerError, ResourceSpec, ResourceSyncer, syncers};
use serde_json::{Value, json};

fn spec(resource_type: &str, name: &str, desired: Value) -> ResourceSpec {
    ResourceSpec {
        resource_type: resource_type.into(),
        resource_name: name.into(),
        lifecycle: Lifecycle::Managed,
        desired,
    }
}

fn replica_spec(name: &str, primary: &str) -> ResourceSpec {
    spec(
        INDEX,
        name,
        json!({
            "primary_index_name": primary,
            "settings": {"customRanking": ["asc(price)"]},
            "deletion_protection": false,
        }),
    )
}

fn seeded(config: MemoryConfig) -> MemoryBackend {
    let api = MemoryBackend::new(config);
    api.seed_index("products", IndexSettings::default());
    api
}

#[tokio::test(start_paused = true)]
async fn virtual_replica_is_attached_and_keeps_supported_settings() {
    let api = seeded(MemoryConfig::default());
    let ctx = common::context(&api);
    let desired = json!({
        "primary_index_name": "products",
        "settings": {
            "customRanking": ["desc(popularity)"],
            "searchableAttributes": ["title"],
        },
        "deletion_protection": false,
    });
    let syncer = syncers::build(spec(VIRTUAL_INDEX, "products_trending", desired.clone()), &ctx).unwrap();

    let props = syncer.create().await.unwrap();

    assert_eq!(common::replicas_of(&api, "products"), ["virtual(products_trending)"]);
    let own = api.index_settings("products_trending").unwrap();
    assert_eq!(own.other["customRanking"], json!(["desc(popularity)"]));
    assert!(!own.other.contains_key("searchableAttributes"));

    assert_eq!(props["desired"], desired);
    assert_eq!(props["remote"]["primary_index_name"], "products");
    assert!(syncer.diff(&props["remote"]).is_empty());
}

#[tokio::test(start_paused = true)]
async fn create_rides_out_propagation_lag() {
    let api = seeded(MemoryConfig {
        visibility_lag: Duration::from_secs(3),
        ..MemoryConfig::default()
    });
    let ctx = common::context(&api);
    let syncer = syncers::build(replica_spec("products_price_asc", "products"), &ctx).unwrap();

    let props = syncer.create().await.unwrap();

    assert_eq!(props["remote"]["settings"]["customRanking"], json!(["asc(price)"]));
}

#[tokio::test(start_paused = true)]
async fn create_gives_up_once_the_read_budget_is_spent() {
    let api = seeded(MemoryConfig {
        visibility_lag: Duration::from_secs(30),
        ..MemoryConfig::default()
    });
    let mut config = common::config();
    config.read_retry_budget_secs = 2;
    let ctx = common::context_with(&api, config);
    let syncer = syncers::build(replica_spec("products_price_asc", "products"), &ctx).unwrap();

    let err = syncer.create().await.unwrap_err();

    assert!(err.is_not_found());
    // The membership change is not rolled back.
    assert_eq!(common::replicas_of(&api, "products"), ["products_price_asc"]);
}

#[tokio::test(start_paused = true)]
async fn create_fails_without_primary() {
    let api = common::backend();
    let ctx = common::context(&api);
    let syncer = syncers::build(replica_spec("products_price_asc", "products"), &ctx).unwrap();

    let err = syncer.create().await.unwrap_err();

    assert!(err.is_not_found());
    assert!(api.index_names().is_empty());
}

#[tokio::test(start_paused = true)]
async fn steady_state_read_does_not_retry() {
    let api = common::backend();
    let ctx = common::context(&api);
    let syncer = syncers::build(replica_spec("products_price_asc", "products"), &ctx).unwrap();

    assert!(syncer.read().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn update_rewrites_only_the_replica_settings() {
    let api = seeded(MemoryConfig::default());
    let ctx = common::context(&api);
    syncers::build(replica_spec("products_price_asc", "products"), &ctx)
        .unwrap()
        .create()
        .await
        .unwrap();
    assert_eq!(api.settings_writes("products"), 1);

    let changed = spec(
        INDEX,
        "products_price_asc",
        json!({
            "primary_index_name": "products",
            "settings": {"customRanking": ["asc(price)", "desc(rating)"]},
            "deletion_protection": false,
        }),
    );
    let props = syncers::build(changed, &ctx).unwrap().update().await.unwrap();

    assert_eq!(api.settings_writes("products"), 1);
    assert_eq!(
        props["remote"]["settings"]["customRanking"],
        json!(["asc(price)", "desc(rating)"])
    );
}

#[tokio::test(start_paused = true)]
async fn own_settings_never_carry_the_replica_list() {
    let api = seeded(MemoryConfig::default());
    let ctx = common::context(&api);
    syncers::build(replica_spec("products_price_asc", "products"), &ctx)
        .unwrap()
        .create()
        .await
        .unwrap();

    let primary = syncers::build(
        spec(
            INDEX,
            "products",
            json!({"settings": {"replicas": [], "primary": "catalog", "hitsPerPage": 5}}),
        ),
        &ctx,
    )
    .unwrap();
    primary.update().await.unwrap();

    let settings = api.index_settings("products").unwrap();
    assert_eq!(settings.other["hitsPerPage"], 5);
    assert!(settings.primary.is_none());
    assert!(!settings.other.contains_key("replicas"));
    assert!(!settings.other.contains_key("primary"));
    assert_eq!(common::replicas_of(&api, "products"), ["products_price_asc"]);
}

#[tokio::test(start_paused = true)]
async fn update_refuses_primary_change() {
    let api = seeded(MemoryConfig::default());
    api.seed_index("catalog", IndexSettings::default());
    let ctx = common::context(&api);
    syncers::build(replica_spec("products_price_asc", "products"), &ctx)
        .unwrap()
        .create()
        .await
        .unwrap();

    let moved = syncers::build(replica_spec("products_price_asc", "catalog"), &ctx).unwrap();
    let err = moved.update().await.unwrap_err();

    assert!(matches!(err, ProvisionerError::UpdateFailed(_)));
    assert_eq!(common::replicas_of(&api, "products"), ["products_price_asc"]);
    assert!(common::replicas_of(&api, "catalog").is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_attach_names_the_replica() {
    let api = seeded(MemoryConfig::default());
    let ctx = common::context(&api);
    let syncer = syncers::build(
        spec(
            VIRTUAL_INDEX,
            "products_trending",
            json!({"primary_index_name": "products", "deletion_protection": false}),
        ),
        &ctx,
    )
    .unwrap();
    api.fail_next_task("products");

    let err = syncer.create().await.unwrap_err();

    assert!(err.to_string().contains("products_trending"), "{err}");
    assert!(matches!(
        err.root(),
        ProvisionerError::TaskFailed { index, .. } if index == "products"
    ));
}

#[tokio::test(start_paused = true)]
async fn failed_delete_names_the_index() {
    let api = seeded(MemoryConfig::default());
    let ctx = common::context(&api);
    let syncer = syncers::build(replica_spec("products_price_asc", "products"), &ctx).unwrap();
    syncer.create().await.unwrap();
    api.fail_next_task("products_price_asc");

    let err = syncer.destroy().await.unwrap_err();

    assert!(err.to_string().contains("index (products_price_asc)"), "{err}");
    assert!(matches!(err.root(), ProvisionerError::TaskFailed { .. }));
    assert!(common::replicas_of(&api, "products").is_empty());
}

#[tokio::test(start_paused = true)]
async fn destroy_respects_deletion_protection() {
    let api = seeded(MemoryConfig::default());
    let ctx = common::context(&api);
    let syncer = syncers::build(
        spec(INDEX, "products_price_asc", json!({"primary_index_name": "products"})),
        &ctx,
    )
    .unwrap();
    syncer.create().await.unwrap();

    let err = syncer.destroy().await.unwrap_err();

    assert!(matches!(err, ProvisionerError::DeletionProtected(_)));
    assert_eq!(common::replicas_of(&api, "products"), ["products_price_asc"]);
}

#[tokio::test(start_paused = true)]
async fn destroy_detaches_then_deletes() {
    let api = seeded(MemoryConfig::default());
    let ctx = common::context(&api);
    let syncer = syncers::build(replica_spec("products_price_asc", "products"), &ctx).unwrap();
    syncer.create().await.unwrap();

    syncer.destroy().await.unwrap();

    assert!(common::replicas_of(&api, "products").is_empty());
    assert_eq!(api.index_names(), ["products"]);
}

#[tokio::test(start_paused = true)]
async fn destroy_skips_detach_when_primary_is_gone() {
    let api = seeded(MemoryConfig::default());
    let ctx = common::context(&api);
    let syncer = syncers::build(replica_spec("products_price_asc", "products"), &ctx).unwrap();
    syncer.create().await.unwrap();

    let task = api.delete_index("products").await.unwrap();
    ctx.waiter().wait(&task).await.unwrap();

    syncer.destroy().await.unwrap();
    assert!(api.index_names().is_empty());
}

#[tokio::test(start_paused = true)]
async fn concurrent_replica_creates_share_the_primary() {
    let api = seeded(MemoryConfig::default());
    let ctx = common::context(&api);
    let a = syncers::build(replica_spec("products_price_asc", "products"), &ctx).unwrap();
    let b = syncers::build(replica_spec("products_price_desc", "products"), &ctx).unwrap();

    let (ra, rb) = tokio::join!(a.create(), b.create());
    ra.unwrap();
    rb.unwrap();

    assert_eq!(
        common::replicas_of(&api, "products"),
        ["products_price_asc", "products_price_desc"]
    );
}

#[tokio::test(start_paused = true)]
async fn primary_settings_write_waits_for_membership_lock() {
    let api = seeded(MemoryConfig::default());
    let ctx = common::context(&api);
    let primary: Box<dyn ResourceSyncer> = syncers::build(
        spec(INDEX, "products", json!({"settings": {"hitsPerPage": 50}})),
        &ctx,
    )
    .unwrap();

    let guard = ctx.reconciler().lock_index("products").await.unwrap();
    let update = tokio::spawn(async move { primary.update().await });

    tokio::time::sleep(common::SETTLE).await;
    assert!(!update.is_finished());
    assert_eq!(api.settings_writes("products"), 0);

    drop(guard);
    update.await.unwrap().unwrap();
    assert_eq!(api.index_settings("products").unwrap().other["hitsPerPage"], 50);
}

#[test]
fn virtual_index_requires_a_primary() {
    let api = common::backend();
    let ctx = common::context(&api);
    let built = syncers::build(spec(VIRTUAL_INDEX, "orphan", json!({})), &ctx);
    assert!(matches!(built, Err(ProvisionerError::Manifest(_))));

    let built = syncers::build(spec("bucket", "b", json!({})), &ctx);
    assert!(matches!(built, Err(ProvisionerError::Manifest(_))));
}
