use super::*;
use crate::identity::persistence::MemoryPersistence;

fn patch_all() -> ProfilePatch {
    ProfilePatch {
        name: Some("Aida Bekova".into()),
        email: Some("aida@astanait.edu.kz".into()),
        id: Some("17".into()),
        avatar_ref: Some("http://127.0.0.1:8000/media/avatars/a.png".into()),
    }
}

#[test]
fn empty_credential_clears_derived_fields() {
    let store = SessionStore::in_memory();
    store.set_credential("tok-1");
    store.set_derived_profile(&patch_all());
    assert!(store.set_privileged_if_current("tok-1", true));
    assert!(store.get().is_privileged);

    store.set_credential("");
    let s = store.get();
    assert!(!s.is_privileged);
    assert!(s.name.is_empty() && s.email.is_empty() && s.user_id.is_empty() && s.avatar_ref.is_empty());
    assert!(s.holds_invariant());
}

#[test]
fn derived_writes_ignored_while_signed_out() {
    let store = SessionStore::in_memory();
    assert!(!store.set_derived_profile(&patch_all()));
    assert!(!store.set_privileged_if_current("", true));
    assert!(!store.set_identity_label("someone"));
    assert_eq!(store.get(), Session::default());
}

#[test]
fn empty_patch_is_identity() {
    let store = SessionStore::in_memory();
    store.set_credential("tok-1");
    store.set_derived_profile(&patch_all());
    let before = store.get();
    let mut rx = store.subscribe();
    rx.borrow_and_update();
    assert!(!store.set_derived_profile(&ProfilePatch::default()));
    assert_eq!(store.get(), before);
    assert!(!rx.has_changed().unwrap());
}

#[test]
fn partial_patch_keeps_other_fields() {
    let store = SessionStore::in_memory();
    store.set_credential("tok-1");
    store.set_derived_profile(&patch_all());
    store.set_derived_profile(&ProfilePatch { email: Some("new@astanait.edu.kz".into()), ..Default::default() });
    let s = store.get();
    assert_eq!(s.email, "new@astanait.edu.kz");
    assert_eq!(s.name, "Aida Bekova");
    assert_eq!(s.user_id, "17");
}

#[test]
fn changes_persist_per_key_immediately() {
    let mem = Arc::new(MemoryPersistence::new());
    let store = SessionStore::open(mem.clone());
    store.set_credential("tok-1");
    assert_eq!(mem.get(KEY_CREDENTIAL).as_deref(), Some("tok-1"));
    store.set_identity_label("aida");
    store.set_derived_profile(&ProfilePatch { name: Some("Aida".into()), ..Default::default() });
    assert_eq!(mem.get(KEY_NAME).as_deref(), Some("Aida"));
    assert_eq!(mem.get(KEY_IDENTITY).as_deref(), Some("aida"));

    store.clear_all();
    assert_eq!(mem.get(KEY_CREDENTIAL), None);
    assert_eq!(mem.get(KEY_NAME), None);
    assert_eq!(mem.get(KEY_IDENTITY), None);
}

#[test]
fn hydrates_from_partial_storage() {
    let mem = Arc::new(MemoryPersistence::with_entries([
        (KEY_CREDENTIAL, "tok-9"),
        (KEY_PRIVILEGED, "true"),
        (KEY_NAME, "Staff Member"),
    ]));
    let s = SessionStore::open(mem).get();
    assert_eq!(s.credential, "tok-9");
    assert!(s.is_privileged);
    assert_eq!(s.name, "Staff Member");
    assert_eq!(s.email, "");
}

#[test]
fn hydration_enforces_invariant_without_credential() {
    let mem = Arc::new(MemoryPersistence::with_entries([(KEY_PRIVILEGED, "true"), (KEY_EMAIL, "left@over")]));
    let s = SessionStore::open(mem).get();
    assert!(s.holds_invariant());
    assert!(!s.is_privileged);
    assert_eq!(s.email, "");
}

#[test]
fn persistence_failure_is_not_fatal() {
    let mem = Arc::new(MemoryPersistence::new());
    mem.set_fail_writes(true);
    let store = SessionStore::open(mem.clone());
    store.set_credential("tok-1");
    assert_eq!(store.credential(), "tok-1");
    assert!(mem.is_empty());
}

#[test]
fn new_credential_drops_previous_profile() {
    let store = SessionStore::in_memory();
    store.set_credential("tok-1");
    store.set_derived_profile(&patch_all());
    store.set_credential("tok-2");
    let s = store.get();
    assert_eq!(s.credential, "tok-2");
    assert_eq!(s.name, "");
    assert!(!store.apply_profile_if_current("tok-1", &patch_all()));
    assert!(store.apply_profile_if_current("tok-2", &patch_all()));
}

#[test]
fn logout_is_all_or_nothing_for_subscribers() {
    let store = SessionStore::in_memory();
    store.set_credential("tok-1");
    store.set_identity_label("aida");
    store.set_derived_profile(&patch_all());
    let mut rx = store.subscribe();
    rx.borrow_and_update();
    store.clear_all();
    assert!(rx.has_changed().unwrap());
    let seen = rx.borrow_and_update().clone();
    assert_eq!(seen, Session::default());
}
