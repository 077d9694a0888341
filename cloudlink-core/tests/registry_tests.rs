//! Tests for the on-disk registry store.

use cloudlink_core::registry::{GroupRow, MembershipRow, Registry};

fn group(name: &str) -> GroupRow {
    GroupRow {
        name: name.to_string(),
        latitude: 47.37,
        longitude: 8.54,
    }
}

fn membership(userid: &str, group: &str) -> MembershipRow {
    MembershipRow {
        userid: userid.to_string(),
        membership: group.to_string(),
        latitude: 47.37,
        longitude: 8.54,
    }
}

#[test]
fn test_registry_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");

    {
        let registry = Registry::open(&path).unwrap();
        registry.add_group(&group("hikers")).unwrap();
        registry.add_membership(&membership("user-1", "hikers")).unwrap();
    }

    let registry = Registry::open(&path).unwrap();
    assert_eq!(registry.groups().unwrap(), vec![group("hikers")]);
    assert_eq!(
        registry.memberships().unwrap(),
        vec![membership("user-1", "hikers")]
    );
}

#[test]
fn test_duplicate_group_names_allowed() {
    let registry = Registry::open_in_memory().unwrap();
    registry.add_group(&group("hikers")).unwrap();

    let mut elsewhere = group("hikers");
    elsewhere.latitude = 46.95;
    registry.add_group(&elsewhere).unwrap();

    assert_eq!(registry.groups().unwrap().len(), 2);
}

#[test]
fn test_remove_group_matches_all_fields() {
    let registry = Registry::open_in_memory().unwrap();
    registry.add_group(&group("hikers")).unwrap();

    // Same name but different location is a different row.
    assert!(!registry.remove_group("hikers", 0.0, 0.0).unwrap());
    assert_eq!(registry.groups().unwrap().len(), 1);

    assert!(registry.remove_group("hikers", 47.37, 8.54).unwrap());
    assert!(registry.groups().unwrap().is_empty());
}

#[test]
fn test_membership_lifecycle() {
    let registry = Registry::open_in_memory().unwrap();
    registry.add_membership(&membership("user-1", "hikers")).unwrap();
    registry.add_membership(&membership("user-2", "hikers")).unwrap();

    let moved = MembershipRow {
        membership: "runners".to_string(),
        ..membership("user-1", "hikers")
    };
    assert!(registry.update_membership(&moved).unwrap());

    let rows = registry.memberships().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.contains(&moved));
    assert!(rows.contains(&membership("user-2", "hikers")));

    assert!(registry.remove_membership("user-1").unwrap());
    assert_eq!(registry.memberships().unwrap(), vec![membership("user-2", "hikers")]);
}
