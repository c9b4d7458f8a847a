use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::transport::{decode, Body, GatewayResponse, Method, RequestOptions, Transport};
use crate::error::{AppError, AppResult};
use crate::identity::SessionStore;

/// Session-aware front of the transport. All authenticated calls pass through `send_as`.
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    session: SessionStore,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>, session: SessionStore) -> Self { Self { transport, session } }

    pub fn session(&self) -> &SessionStore { &self.session }

    /// Authenticated call with the currently active credential.
    pub async fn send(&self, method: Method, path: &str, body: Option<Body>) -> AppResult<Option<Value>> {
        let credential = self.session.credential();
        self.send_as(&credential, method, path, body).await
    }

    /// Authenticated call with an explicit credential, captured by the caller before issuing so it
    /// can later tell whether the session moved on while the request was in flight.
    /// A 401 clears the session, but only if `credential` is still the active one.
    pub async fn send_as(&self, credential: &str, method: Method, path: &str, body: Option<Body>) -> AppResult<Option<Value>> {
        if credential.is_empty() {
            return Err(AppError::session_expired("no_credential", "not signed in"));
        }
        let opts = RequestOptions::new(method).with_credential(credential).with_body(body);
        let resp = self.transport.request(path, opts).await;
        debug!(target: "complaint_desk::gateway", "{} {} -> {}", method, path, resp.status);
        if resp.ok { return Ok(resp.data); }
        let err = AppError::from_status(resp.status, resp.error.as_deref());
        if err.clears_session() && self.session.clear_if_current(credential) {
            warn!(target: "complaint_desk::gateway", "credential rejected on {} {}; session cleared", method, path);
        }
        Err(err)
    }

    pub async fn send_json<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<Body>) -> AppResult<T> {
        decode(self.send(method, path, body).await?)
    }

    pub async fn send_json_as<T: DeserializeOwned>(&self, credential: &str, method: Method, path: &str, body: Option<Body>) -> AppResult<T> {
        decode(self.send_as(credential, method, path, body).await?)
    }

    /// Unauthenticated call (login, registration, password reset). No session side effects.
    pub async fn anonymous(&self, method: Method, path: &str, body: Option<Body>) -> AppResult<Option<Value>> {
        let resp = self.transport.request(path, RequestOptions::new(method).with_body(body)).await;
        debug!(target: "complaint_desk::gateway", "{} {} (anonymous) -> {}", method, path, resp.status);
        resp.into_result()
    }

    /// Zero-body HEAD probe. The raw response is returned untouched: the caller interprets
    /// it, and a 401 here must not clear the session.
    pub async fn probe(&self, credential: &str, path: &str) -> GatewayResponse {
        let resp = self.transport.request(path, RequestOptions::new(Method::Head).with_credential(credential)).await;
        debug!(target: "complaint_desk::gateway", "HEAD {} (probe) -> {}", path, resp.status);
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ScriptedTransport;
    use serde_json::json;

    fn setup(token: &str) -> (Arc<ScriptedTransport>, Gateway) {
        let t = Arc::new(ScriptedTransport::new());
        let store = SessionStore::in_memory();
        store.set_credential(token);
        (t.clone(), Gateway::new(t, store))
    }

    #[tokio::test]
    async fn attaches_active_credential() {
        let (t, gw) = setup("tok-1");
        t.reply(Method::Get, "complaints/3/", GatewayResponse::success(200, Some(json!({"id": 3}))));
        let v = gw.send(Method::Get, "complaints/3/", None).await.unwrap();
        assert_eq!(v.unwrap()["id"], 3);
        assert_eq!(t.calls()[0].credential.as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn unauthorized_clears_session_forbidden_does_not() {
        let (t, gw) = setup("tok-1");
        t.reply(Method::Get, "complaints/3/", GatewayResponse::failure(403, Some(json!({"detail": "nope"}))));
        let e = gw.send(Method::Get, "complaints/3/", None).await.unwrap_err();
        assert!(matches!(e, AppError::Forbidden { .. }));
        assert_eq!(gw.session().credential(), "tok-1");

        t.reply(Method::Get, "complaints/3/", GatewayResponse::failure(401, None));
        let e = gw.send(Method::Get, "complaints/3/", None).await.unwrap_err();
        assert!(matches!(e, AppError::SessionExpired { .. }));
        assert_eq!(gw.session().credential(), "");
    }

    #[tokio::test]
    async fn stale_unauthorized_leaves_newer_session() {
        let (t, gw) = setup("tok-new");
        t.reply(Method::Get, "complaints/3/", GatewayResponse::failure(401, None));
        let e = gw.send_as("tok-old", Method::Get, "complaints/3/", None).await.unwrap_err();
        assert!(e.clears_session());
        assert_eq!(gw.session().credential(), "tok-new");
    }

    #[tokio::test]
    async fn no_credential_fails_locally() {
        let (t, gw) = setup("");
        let e = gw.send(Method::Get, "complaints/", None).await.unwrap_err();
        assert!(matches!(e, AppError::SessionExpired { .. }));
        assert_eq!(t.call_count(), 0);
    }
}
