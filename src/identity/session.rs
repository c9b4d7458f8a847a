use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::persistence::{MemoryPersistence, SessionPersistence};
use crate::tprintln;

pub const KEY_CREDENTIAL: &str = "complaint_token";
pub const KEY_PRIVILEGED: &str = "complaint_is_admin";
pub const KEY_IDENTITY: &str = "complaint_user_identifier";
pub const KEY_NAME: &str = "complaint_user_name";
pub const KEY_EMAIL: &str = "complaint_user_email";
pub const KEY_USER_ID: &str = "complaint_user_id";
pub const KEY_AVATAR: &str = "complaint_user_avatar";

/// Snapshot of the client session. Derived fields are empty/false whenever `credential` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub credential: String,
    pub is_privileged: bool,
    /// Identifier the user typed at login (username or email).
    pub identity_label: String,
    pub name: String,
    pub email: String,
    pub user_id: String,
    pub avatar_ref: String,
}

impl Session {
    pub fn is_authenticated(&self) -> bool { !self.credential.is_empty() }

    /// Empty credential implies no privilege and no cached profile.
    pub fn holds_invariant(&self) -> bool {
        self.is_authenticated()
            || (!self.is_privileged && self.name.is_empty() && self.email.is_empty() && self.user_id.is_empty() && self.avatar_ref.is_empty())
    }

    fn reset_derived(&mut self) {
        self.is_privileged = false;
        self.name.clear();
        self.email.clear();
        self.user_id.clear();
        self.avatar_ref.clear();
    }
}

/// Partial profile update; only `Some` fields are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub id: Option<String>,
    pub avatar_ref: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.id.is_none() && self.avatar_ref.is_none()
    }

    fn apply(&self, s: &mut Session) {
        if let Some(v) = &self.name { s.name = v.clone(); }
        if let Some(v) = &self.email { s.email = v.clone(); }
        if let Some(v) = &self.id { s.user_id = v.clone(); }
        if let Some(v) = &self.avatar_ref { s.avatar_ref = v.clone(); }
    }
}

struct Inner {
    state: RwLock<Session>,
    persistence: Arc<dyn SessionPersistence>,
    tx: watch::Sender<Session>,
}

/// Owner of the one mutable session. Readers take snapshots; writers go through the merge API,
/// which persists every changed key immediately and notifies subscribers.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Hydrate from persistence. Each key is independently optional; unreadable keys count as empty.
    pub fn open(persistence: Arc<dyn SessionPersistence>) -> Self {
        let read = |key: &str| match persistence.load(key) {
            Ok(v) => v.unwrap_or_default(),
            Err(e) => {
                warn!(target: "complaint_desk::session", "could not read {}: {}", key, e);
                String::new()
            }
        };
        let mut s = Session {
            credential: read(KEY_CREDENTIAL),
            is_privileged: read(KEY_PRIVILEGED).trim() == "true",
            identity_label: read(KEY_IDENTITY),
            name: read(KEY_NAME),
            email: read(KEY_EMAIL),
            user_id: read(KEY_USER_ID),
            avatar_ref: read(KEY_AVATAR),
        };
        if !s.is_authenticated() {
            s.reset_derived();
            s.identity_label.clear();
        }
        debug!(target: "complaint_desk::session", "hydrated session authenticated={} privileged={}", s.is_authenticated(), s.is_privileged);
        let (tx, _rx) = watch::channel(s.clone());
        Self { inner: Arc::new(Inner { state: RwLock::new(s), persistence, tx }) }
    }

    pub fn in_memory() -> Self { Self::open(Arc::new(MemoryPersistence::new())) }

    pub fn get(&self) -> Session { self.inner.state.read().clone() }

    pub fn credential(&self) -> String { self.inner.state.read().credential.clone() }

    pub fn is_current(&self, credential: &str) -> bool {
        let s = self.inner.state.read();
        !credential.is_empty() && s.credential == credential
    }

    /// Receiver that sees every committed change.
    pub fn subscribe(&self) -> watch::Receiver<Session> { self.inner.tx.subscribe() }

    /// Set the credential. A different credential drops all derived fields (they belong to
    /// whoever held the old one); an empty credential resets them synchronously.
    pub fn set_credential(&self, token: &str) {
        let changed = self.commit(|s| {
            if s.credential == token { return; }
            s.credential = token.to_string();
            s.reset_derived();
            if token.is_empty() { s.identity_label.clear(); }
        });
        if changed {
            info!(target: "complaint_desk::session", "credential {} (len={})", if token.is_empty() { "cleared" } else { "set" }, token.len());
            tprintln!("session.set_credential len={}", token.len());
        }
    }

    pub fn set_identity_label(&self, label: &str) -> bool {
        self.commit(|s| {
            if s.is_authenticated() { s.identity_label = label.to_string(); }
        })
    }

    /// Merge the provided profile fields. Ignored while signed out. An empty patch is a no-op.
    pub fn set_derived_profile(&self, patch: &ProfilePatch) -> bool {
        if patch.is_empty() { return false; }
        self.commit(|s| {
            if s.is_authenticated() { patch.apply(s); }
        })
    }

    /// Merge only if `credential` is still the active one. Returns false for stale results.
    pub fn apply_profile_if_current(&self, credential: &str, patch: &ProfilePatch) -> bool {
        if patch.is_empty() { return false; }
        let mut applied = false;
        self.commit(|s| {
            if !credential.is_empty() && s.credential == credential {
                patch.apply(s);
                applied = true;
            }
        });
        applied
    }

    pub fn set_privileged_if_current(&self, credential: &str, privileged: bool) -> bool {
        let mut applied = false;
        self.commit(|s| {
            if !credential.is_empty() && s.credential == credential {
                s.is_privileged = privileged;
                applied = true;
            }
        });
        applied
    }

    /// Logout: every field cleared under one lock, so no reader ever sees a half-cleared session.
    pub fn clear_all(&self) {
        if self.commit(|s| *s = Session::default()) {
            info!(target: "complaint_desk::session", "session cleared");
        }
    }

    /// Clear only if `credential` is still active; a late 401 for an old credential must not end a newer session.
    pub fn clear_if_current(&self, credential: &str) -> bool {
        let mut hit = false;
        self.commit(|s| {
            if !credential.is_empty() && s.credential == credential {
                *s = Session::default();
                hit = true;
            }
        });
        hit
    }

    /// Apply `mutate` under the write lock, persist changed keys, notify. Returns whether anything changed.
    fn commit(&self, mutate: impl FnOnce(&mut Session)) -> bool {
        let mut guard = self.inner.state.write();
        let before = guard.clone();
        mutate(&mut *guard);
        if *guard == before { return false; }
        debug_assert!(guard.holds_invariant());
        let after = guard.clone();
        self.persist_diff(&before, &after);
        self.inner.tx.send_replace(after);
        true
    }

    fn persist_diff(&self, before: &Session, after: &Session) {
        let flag = |b: bool| if b { "true" } else { "false" };
        let fields: [(&str, String, String); 7] = [
            (KEY_CREDENTIAL, before.credential.clone(), after.credential.clone()),
            (KEY_PRIVILEGED, flag(before.is_privileged).to_string(), flag(after.is_privileged).to_string()),
            (KEY_IDENTITY, before.identity_label.clone(), after.identity_label.clone()),
            (KEY_NAME, before.name.clone(), after.name.clone()),
            (KEY_EMAIL, before.email.clone(), after.email.clone()),
            (KEY_USER_ID, before.user_id.clone(), after.user_id.clone()),
            (KEY_AVATAR, before.avatar_ref.clone(), after.avatar_ref.clone()),
        ];
        for (key, old, new) in fields.iter() {
            if old == new { continue; }
            // Non-fatal: the in-memory session stays authoritative for this process.
            if let Err(e) = self.inner.persistence.save(key, new) {
                warn!(target: "complaint_desk::session", "failed to persist {}: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
