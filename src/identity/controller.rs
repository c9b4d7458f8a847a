use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::auth::AuthClient;
use super::privilege::PrivilegeProber;
use super::profile::ProfileSynchronizer;
use super::session::SessionStore;
use crate::config::ClientConfig;
use crate::error::AppResult;
use crate::gateway::Gateway;

/// Wires the derived-field producers to credential changes.
pub struct SessionController {
    store: SessionStore,
    prober: PrivilegeProber,
    synchronizer: ProfileSynchronizer,
    auth: AuthClient,
}

impl SessionController {
    pub fn new(gateway: Gateway, config: Arc<ClientConfig>) -> Self {
        Self {
            store: gateway.session().clone(),
            prober: PrivilegeProber::new(gateway.clone(), config.privilege_downgrade_after),
            synchronizer: ProfileSynchronizer::new(gateway.clone(), config.clone()),
            auth: AuthClient::new(gateway, config),
        }
    }

    pub fn store(&self) -> &SessionStore { &self.store }
    pub fn prober(&self) -> &PrivilegeProber { &self.prober }
    pub fn synchronizer(&self) -> &ProfileSynchronizer { &self.synchronizer }
    pub fn auth(&self) -> &AuthClient { &self.auth }

    /// Re-derive privilege and profile for the active credential. Both round trips run
    /// concurrently; failures are logged and leave the affected fields as they were.
    pub async fn refresh(&self) {
        if !self.store.get().is_authenticated() { return; }
        let (probe, sync) = tokio::join!(self.prober.probe(), self.synchronizer.sync());
        debug!(target: "complaint_desk::session", "refresh probe={:?}", probe);
        if let Err(e) = sync {
            warn!(target: "complaint_desk::profile", "profile sync failed: {}", e);
        }
    }

    /// Assign a credential and re-derive. An empty token clears the derived fields synchronously.
    pub async fn set_credential(&self, token: &str) {
        self.store.set_credential(token);
        if token.is_empty() { return; }
        self.prober.restore_cached();
        self.refresh().await;
    }

    pub async fn login(&self, identifier: &str, password: &str) -> AppResult<()> {
        self.auth.login(identifier, password).await?;
        self.prober.restore_cached();
        self.refresh().await;
        Ok(())
    }

    pub fn logout(&self) {
        let credential = self.store.credential();
        self.auth.logout();
        self.prober.forget(&credential);
    }

    /// Background re-derivation for long-lived hosts: every time the stored credential changes
    /// to a non-empty value, privilege and profile are refreshed. Runs until the handle is aborted.
    pub fn watch(self: Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.store.subscribe();
        let mut last = rx.borrow_and_update().credential.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let current = rx.borrow_and_update().credential.clone();
                if current == last { continue; }
                last = current;
                if last.is_empty() { continue; }
                self.prober.restore_cached();
                self.refresh().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayResponse, Method, ScriptedTransport};
    use crate::identity::{PROBE_PATH, SessionStore};
    use serde_json::json;

    fn setup() -> (Arc<ScriptedTransport>, SessionController) {
        let t = Arc::new(ScriptedTransport::new());
        let gw = Gateway::new(t.clone(), SessionStore::in_memory());
        (t, SessionController::new(gw, Arc::new(ClientConfig::default())))
    }

    fn profile() -> serde_json::Value {
        json!({"id": 3, "username": "staff1", "email": "staff@astanait.edu.kz", "first_name": "", "last_name": ""})
    }

    #[tokio::test]
    async fn login_derives_privilege_and_profile() {
        let (t, ctl) = setup();
        t.reply(Method::Post, "auth/login/", GatewayResponse::success(200, Some(json!({"token": "tok-s"}))));
        t.reply(Method::Head, PROBE_PATH, GatewayResponse::success(200, None));
        t.reply(Method::Get, "auth/me/", GatewayResponse::success(200, Some(profile())));
        ctl.login("staff1", "secret123").await.unwrap();
        let s = ctl.store().get();
        assert!(s.is_privileged);
        assert_eq!(s.name, "staff1");
        assert_eq!(s.user_id, "3");
    }

    #[tokio::test]
    async fn failed_profile_sync_keeps_privilege() {
        let (t, ctl) = setup();
        t.reply(Method::Head, PROBE_PATH, GatewayResponse::success(200, None));
        t.reply(Method::Get, "auth/me/", GatewayResponse::failure(500, None));
        ctl.set_credential("tok-1").await;
        let s = ctl.store().get();
        assert!(s.is_privileged);
        assert_eq!(s.name, "");
    }

    #[tokio::test]
    async fn clearing_credential_needs_no_round_trip() {
        let (t, ctl) = setup();
        ctl.set_credential("").await;
        assert_eq!(t.call_count(), 0);
        assert!(!ctl.store().get().is_privileged);
    }

    #[tokio::test]
    async fn watcher_refreshes_on_credential_change() {
        let (t, ctl) = setup();
        let ctl = Arc::new(ctl);
        t.reply(Method::Head, PROBE_PATH, GatewayResponse::failure(403, None));
        t.reply(Method::Get, "auth/me/", GatewayResponse::success(200, Some(profile())));
        let handle = ctl.clone().watch();
        let mut rx = ctl.store().subscribe();
        ctl.store().set_credential("tok-1");
        while ctl.store().get().user_id.is_empty() {
            rx.changed().await.unwrap();
        }
        assert_eq!(t.calls_to(Method::Head, PROBE_PATH), 1);
        assert!(!ctl.store().get().is_privileged);
        handle.abort();
    }
}
