use access_portal::{
    client::{
        CredentialStorage, FileStorage, MemoryStorage, SessionContext, SessionStore, StoredPair,
        session::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY},
    },
    models::{PrincipalSnapshot, SessionCredential},
};
use std::sync::Arc;
use uuid::Uuid;

fn credential(tag: &str) -> SessionCredential {
    SessionCredential {
        access: format!("access-{tag}"),
        refresh: format!("refresh-{tag}"),
    }
}

fn principal() -> PrincipalSnapshot {
    PrincipalSnapshot {
        id: Uuid::new_v4(),
        email: "u@x.com".to_string(),
        is_superuser: false,
        permissions: vec![],
    }
}

// --- Session Store ---

#[test]
fn test_session_pair_overwrites_and_clears_together() {
    let store = SessionStore::new(Arc::new(MemoryStorage::new()));
    assert!(store.access_token().is_none());

    store.set_session(&credential("one")).unwrap();
    store.set_session(&credential("two")).unwrap();
    assert_eq!(store.credential(), Some(credential("two")));
    assert_eq!(store.bearer_header().as_deref(), Some("Bearer access-two"));

    store.clear_session();
    store.clear_session();
    assert!(store.access_token().is_none());
    assert!(store.refresh_token().is_none());
}

#[test]
fn test_half_present_pair_counts_as_no_session() {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .set_all(&[(ACCESS_TOKEN_KEY, "orphaned-access")])
        .unwrap();
    let store = SessionStore::new(storage.clone());

    assert_eq!(store.stored(), StoredPair::Partial);
    assert!(!store.has_session());
    // Reading through the store leaves storage alone
    assert!(storage.get(ACCESS_TOKEN_KEY).unwrap().is_some());
}

#[test]
fn test_half_present_pair_ends_the_session() {
    let storage = Arc::new(MemoryStorage::new());
    let context = SessionContext::new(storage.clone());
    context.establish(&credential("a"), principal()).unwrap();
    let before = context.epoch();

    // The refresh half disappears underneath the running session
    storage.remove_all(&[REFRESH_TOKEN_KEY]).unwrap();

    assert!(context.credential().is_none());
    assert!(context.current().is_none());
    assert!(context.epoch() > before);
    assert!(storage.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    assert!(storage.get(REFRESH_TOKEN_KEY).unwrap().is_none());
}

// --- File Storage ---

#[test]
fn test_file_storage_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.json");

    SessionStore::new(Arc::new(FileStorage::new(&path).unwrap()))
        .set_session(&credential("persisted"))
        .unwrap();

    let reopened = SessionStore::new(Arc::new(FileStorage::new(&path).unwrap()));
    assert_eq!(reopened.credential(), Some(credential("persisted")));

    reopened.clear_session();
    let again = SessionStore::new(Arc::new(FileStorage::new(&path).unwrap()));
    assert!(!again.has_session());
}

#[test]
fn test_file_storage_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path().join("absent.json")).unwrap();

    assert!(storage.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    // Removing from a missing file does not create it
    storage.remove_all(&[ACCESS_TOKEN_KEY]).unwrap();
    assert!(!storage.path().exists());
}

#[test]
fn test_file_storage_rejects_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{ not json").unwrap();
    let storage = FileStorage::new(&path).unwrap();

    assert!(storage.get(ACCESS_TOKEN_KEY).is_err());
    // The store treats unreadable storage as signed out
    assert!(!SessionStore::new(Arc::new(storage)).has_session());
}

#[test]
fn test_corrupt_file_is_replaced_by_the_next_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{ not json").unwrap();
    let context = SessionContext::new(Arc::new(FileStorage::new(&path).unwrap()));

    context.establish(&credential("fresh"), principal()).unwrap();
    assert_eq!(context.credential(), Some(credential("fresh")));

    context.teardown();
    let reopened = FileStorage::new(&path).unwrap();
    assert!(reopened.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    assert!(reopened.get(REFRESH_TOKEN_KEY).unwrap().is_none());
}

#[test]
fn test_logout_repairs_a_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{ not json").unwrap();
    let context = SessionContext::new(Arc::new(FileStorage::new(&path).unwrap()));

    context.teardown();

    // Readable again, and empty
    let reopened = FileStorage::new(&path).unwrap();
    assert!(reopened.get(ACCESS_TOKEN_KEY).unwrap().is_none());
}

// --- Session Context ---

#[test]
fn test_establish_and_teardown_move_together() {
    let context = SessionContext::in_memory();
    let before = context.epoch();

    context.establish(&credential("a"), principal()).unwrap();
    assert!(context.current().is_some());
    assert!(context.session().has_session());
    assert!(context.epoch() > before);

    context.teardown();
    assert!(context.current().is_none());
    assert!(!context.session().has_session());
    // Explicit logout raises no notice
    assert!(context.take_notice().is_none());
}

#[test]
fn test_stale_expiry_is_ignored() {
    let context = SessionContext::in_memory();
    context.establish(&credential("old"), principal()).unwrap();
    let stale = context.epoch();
    context.establish(&credential("new"), principal()).unwrap();

    assert!(!context.expire(stale));
    assert_eq!(context.session().credential(), Some(credential("new")));

    assert!(context.expire(context.epoch()));
    assert!(context.current().is_none());
    assert!(context.take_notice().is_some());
}

#[test]
fn test_refresh_identity_requires_same_session() {
    let context = SessionContext::in_memory();
    context.establish(&credential("a"), principal()).unwrap();
    let fetched_at = context.epoch();
    context.teardown();

    assert!(!context.refresh_identity(principal(), fetched_at));
    assert!(context.current().is_none());
}
