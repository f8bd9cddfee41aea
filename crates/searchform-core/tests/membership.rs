use searchform_core::models::membership::MembershipList;
use searchform_core::{ReplicaKind, ReplicaRef};

fn list(entries: &[&str]) -> MembershipList {
    entries.iter().copied().collect()
}

#[test]
fn contains_standard_replica() {
    let replicas = list(&["abc", "def", "virtual(ghi)"]);
    assert!(replicas.contains(&ReplicaRef::standard("abc").unwrap()));
}

#[test]
fn contains_virtual_replica() {
    let replicas = list(&["abc", "def", "virtual(ghi)"]);
    assert!(replicas.contains(&ReplicaRef::virtual_replica("ghi").unwrap()));
}

#[test]
fn virtual_entry_does_not_match_standard_lookup() {
    let replicas = list(&["abc", "def", "virtual(ghi)"]);
    assert!(!replicas.contains(&ReplicaRef::standard("ghi").unwrap()));
}

#[test]
fn standard_entry_does_not_match_virtual_lookup() {
    let replicas = list(&["abc", "def", "virtual(ghi)"]);
    assert!(!replicas.contains(&ReplicaRef::virtual_replica("abc").unwrap()));
}

#[test]
fn remove_standard_keeps_virtual_of_same_name() {
    let mut replicas = list(&["target", "virtual(abc)", "virtual(target)"]);
    assert!(replicas.remove(&ReplicaRef::standard("target").unwrap()));
    assert_eq!(replicas, list(&["virtual(abc)", "virtual(target)"]));
}

#[test]
fn remove_virtual_keeps_standard_of_same_name() {
    let mut replicas = list(&["target", "virtual(abc)", "virtual(target)"]);
    assert!(replicas.remove(&ReplicaRef::virtual_replica("target").unwrap()));
    assert_eq!(replicas, list(&["target", "virtual(abc)"]));
}

#[test]
fn remove_absent_leaves_list_untouched() {
    let mut replicas = list(&["abc", "def", "virtual(target)"]);
    assert!(!replicas.remove(&ReplicaRef::standard("target").unwrap()));
    assert_eq!(replicas, list(&["abc", "def", "virtual(target)"]));

    let mut replicas = list(&["virtual(abc)", "virtual(def)", "target", "virtual(target"]);
    assert!(!replicas.remove(&ReplicaRef::virtual_replica("target").unwrap()));
    assert_eq!(
        replicas,
        list(&["virtual(abc)", "virtual(def)", "target", "virtual(target"])
    );
}

#[test]
fn insert_is_idempotent() {
    let mut replicas = MembershipList::default();
    let r = ReplicaRef::standard("R").unwrap();
    assert!(replicas.insert(&r));
    assert!(!replicas.insert(&r));
    assert_eq!(replicas, list(&["R"]));
}

#[test]
fn both_forms_of_one_name_coexist() {
    let mut replicas = MembershipList::default();
    assert!(replicas.insert(&ReplicaRef::standard("foo").unwrap()));
    assert!(replicas.insert(&ReplicaRef::virtual_replica("foo").unwrap()));
    assert_eq!(replicas, list(&["foo", "virtual(foo)"]));
}

#[test]
fn parse_decodes_both_forms() {
    let v: ReplicaRef = "virtual(prices)".parse().unwrap();
    assert_eq!(v.name, "prices");
    assert_eq!(v.kind, ReplicaKind::Virtual);
    assert_eq!(v.identifier(), "virtual(prices)");

    let s: ReplicaRef = "prices".parse().unwrap();
    assert_eq!(s.kind, ReplicaKind::Standard);
    assert_eq!(s.identifier(), "prices");
}

#[test]
fn parse_treats_unterminated_wrapper_as_standard() {
    let r = ReplicaRef::parse("virtual(target").unwrap();
    assert_eq!(r.kind, ReplicaKind::Standard);
    assert_eq!(r.identifier(), "virtual(target");
}

#[test]
fn parse_rejects_empty_entries() {
    assert!(ReplicaRef::parse("").is_err());
    assert!(ReplicaRef::parse("virtual()").is_err());
}

#[test]
fn names_must_not_carry_the_wrapper() {
    assert!(ReplicaRef::virtual_replica("virtual(foo)").is_err());
    assert!(ReplicaRef::standard("  ").is_err());
}
