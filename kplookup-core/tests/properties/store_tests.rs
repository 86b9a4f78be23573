//! Tests for the persisted identity store

use kplookup_core::store::{Identity, IdentityStore};

#[test]
fn load_on_fresh_path_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = IdentityStore::new(dir.path().join("assoc.json"));
    assert!(store.load().is_none());
}

#[test]
fn save_replaces_prior_identity_wholesale() {
    let dir = tempfile::tempdir().unwrap();
    let store = IdentityStore::new(dir.path().join("assoc.json"));

    store.save(&Identity::from_blob("first")).unwrap();
    store.save(&Identity::from_blob("second")).unwrap();

    assert_eq!(store.load().unwrap().expose_blob(), "second");
}

#[test]
fn save_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let store = IdentityStore::new(dir.path().join("nested/deeper/assoc.json"));
    store.save(&Identity::from_blob("blob")).unwrap();
    assert_eq!(store.load().unwrap().expose_blob(), "blob");
}

#[test]
fn interrupted_write_leaves_prior_identity_intact() {
    // A crash mid-save means the temporary file exists but the rename
    // never happened. The prior blob must still load, and a later save
    // must succeed over the leftover.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("assoc.json");
    let store = IdentityStore::new(&path);

    store.save(&Identity::from_blob("valid")).unwrap();

    let tmp = dir.path().join("assoc.json.tmp");
    std::fs::write(&tmp, "trunca").unwrap();

    assert_eq!(store.load().unwrap().expose_blob(), "valid");

    store.save(&Identity::from_blob("replacement")).unwrap();
    assert_eq!(store.load().unwrap().expose_blob(), "replacement");
}

#[test]
fn unreadable_store_is_treated_as_no_identity() {
    // A directory at the identity path makes the read fail with
    // something other than NotFound.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("assoc.json");
    std::fs::create_dir(&path).unwrap();

    let store = IdentityStore::new(&path);
    assert!(store.load().is_none());
}
