use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::{Display, Formatter};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    /// Zero-body request used by the capability probe.
    Head,
    Post,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Patch => "PATCH",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    /// Single-file multipart upload (avatar replacement).
    Multipart { field: String, file_name: String, bytes: Vec<u8> },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub credential: Option<String>,
    pub method: Method,
    pub body: Option<Body>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self { Self { credential: None, method, body: None } }
    pub fn with_credential(mut self, credential: &str) -> Self {
        if !credential.is_empty() { self.credential = Some(credential.to_string()); }
        self
    }
    pub fn with_body(mut self, body: Option<Body>) -> Self { self.body = body; self }
}

/// Uniform result of one round trip. `status` is 0 when no HTTP answer arrived
/// (connection refused, DNS failure, timeout).
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub ok: bool,
    pub status: u16,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl GatewayResponse {
    pub fn success(status: u16, data: Option<Value>) -> Self { Self { ok: true, status, data, error: None } }

    pub fn failure(status: u16, data: Option<Value>) -> Self {
        let error = data.as_ref().and_then(extract_error).or_else(|| Some(format!("HTTP {}", status)));
        Self { ok: false, status, data, error }
    }

    pub fn network<S: Into<String>>(msg: S) -> Self { Self { ok: false, status: 0, data: None, error: Some(msg.into()) } }

    pub fn into_result(self) -> AppResult<Option<Value>> {
        if self.ok { Ok(self.data) } else { Err(AppError::from_status(self.status, self.error.as_deref())) }
    }
}

/// Decode a success payload into `T`; a missing body is a decode failure.
pub(crate) fn decode<T: DeserializeOwned>(data: Option<Value>) -> AppResult<T> {
    let v = data.ok_or_else(|| AppError::decode("empty_body", "response had no body"))?;
    Ok(serde_json::from_value(v)?)
}

/// Pull a human-readable error out of a REST error body: `detail`, `error`, `non_field_errors`,
/// or the first string found under any field.
pub(crate) fn extract_error(v: &Value) -> Option<String> {
    fn first_string(v: &Value) -> Option<String> {
        match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Array(arr) => arr.iter().find_map(first_string),
            Value::Object(map) => map.values().find_map(first_string),
            _ => None,
        }
    }
    match v {
        Value::Object(map) => {
            for k in ["detail", "error", "non_field_errors"] {
                if let Some(s) = map.get(k).and_then(first_string) { return Some(s); }
            }
            first_string(v)
        }
        other => first_string(other),
    }
}

/// Moves one request to the service and reports the outcome. Never fails: transport problems
/// come back as `GatewayResponse::network`.
pub trait Transport: Send + Sync {
    fn request<'a>(&'a self, path: &'a str, opts: RequestOptions) -> BoxFuture<'a, GatewayResponse>;
}
