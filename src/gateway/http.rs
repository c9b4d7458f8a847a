use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::future::BoxFuture;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Url;
use tracing::debug;

use super::transport::{Body, GatewayResponse, Method, RequestOptions, Transport};

/// reqwest-backed transport. Timeouts and connection errors surface as status 0.
#[derive(Clone)]
pub struct HttpTransport {
    base: Url,
    client: reqwest::Client,
    auth_scheme: String,
}

impl HttpTransport {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base).context("invalid base URL")?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { base, client, auth_scheme: "Bearer".to_string() })
    }

    /// Authorization scheme placed before the credential (`Bearer` unless the server wants `Token`).
    pub fn with_auth_scheme(mut self, scheme: &str) -> Self { self.auth_scheme = scheme.to_string(); self }

    pub fn base(&self) -> &Url { &self.base }

    async fn send(&self, path: &str, opts: RequestOptions) -> GatewayResponse {
        let url = match self.base.join(path.trim_start_matches('/')) {
            Ok(u) => u,
            Err(e) => return GatewayResponse::network(format!("invalid request path '{}': {}", path, e)),
        };
        let method = match opts.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
        };
        let mut rb = self.client.request(method, url).header(ACCEPT, "application/json");
        if let Some(c) = &opts.credential {
            rb = rb.header(AUTHORIZATION, format!("{} {}", self.auth_scheme, c));
        }
        match opts.body {
            Some(Body::Json(v)) => { rb = rb.json(&v); }
            Some(Body::Multipart { field, file_name, bytes }) => {
                let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
                rb = rb.multipart(reqwest::multipart::Form::new().part(field, part));
            }
            None => {}
        }
        let resp = match rb.send().await {
            Ok(r) => r,
            Err(e) => {
                let kind = if e.is_timeout() { "timeout" } else if e.is_connect() { "connect" } else { "transport" };
                debug!(target: "complaint_desk::gateway", "{} {} failed ({}): {}", opts.method, path, kind, e);
                return GatewayResponse::network(format!("{} error: {}", kind, e));
            }
        };
        let status = resp.status();
        // HEAD answers carry no body; skip the read entirely.
        let data = if opts.method == Method::Head {
            None
        } else {
            match resp.text().await {
                Ok(text) if !text.trim().is_empty() => serde_json::from_str::<serde_json::Value>(&text).ok(),
                Ok(_) => None,
                Err(e) => return GatewayResponse::network(format!("body read error: {}", e)),
            }
        };
        if status.is_success() {
            GatewayResponse::success(status.as_u16(), data)
        } else {
            GatewayResponse::failure(status.as_u16(), data)
        }
    }
}

impl Transport for HttpTransport {
    fn request<'a>(&'a self, path: &'a str, opts: RequestOptions) -> BoxFuture<'a, GatewayResponse> {
        Box::pin(self.send(path, opts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_base() {
        assert!(HttpTransport::new("not a url", Duration::from_secs(1)).is_err());
        let t = HttpTransport::new("http://127.0.0.1:8000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(t.base().join("complaints/").unwrap().as_str(), "http://127.0.0.1:8000/api/complaints/");
    }

    #[tokio::test]
    async fn unreachable_host_is_network_failure() {
        // Port 9 (discard) on localhost is closed in test environments.
        let t = HttpTransport::new("http://127.0.0.1:9/api/", Duration::from_millis(500)).unwrap();
        let r = t.request("complaints/", RequestOptions::new(Method::Get)).await;
        assert!(!r.ok);
        assert_eq!(r.status, 0);
        assert!(r.error.is_some());
    }
}
