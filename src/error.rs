//! Unified client error model and mapping helpers.
//! Every failure the core can produce lands in `AppError`, whether it was detected
//! locally (pre-flight validation, impossible status transitions) or reported by the
//! server through the request gateway. Nothing here is fatal to the process.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Transport unreachable or timed out. Retryable by user action.
    NetworkFailure { code: String, message: String },
    /// HTTP 401: the credential itself was rejected. The session must be cleared.
    SessionExpired { code: String, message: String },
    /// HTTP 403: valid credential, insufficient access to this one resource.
    Forbidden { code: String, message: String },
    NotFound { code: String, message: String },
    RateLimited { code: String, message: String },
    /// Local pre-flight failure; never reaches the network.
    ValidationFailed { code: String, message: String },
    /// Local pre-flight failure: target status is not downstream of the current one.
    InvalidTransition { code: String, message: String },
    /// Any other non-success HTTP status.
    Remote { code: String, message: String },
    /// Response body did not have the expected shape.
    Decode { code: String, message: String },
}

/// Tone of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Info,
    Warning,
    Success,
}

/// User-facing message derived from an error category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub tone: Tone,
    pub message: String,
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::NetworkFailure { code, .. }
            | AppError::SessionExpired { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::RateLimited { code, .. }
            | AppError::ValidationFailed { code, .. }
            | AppError::InvalidTransition { code, .. }
            | AppError::Remote { code, .. }
            | AppError::Decode { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::NetworkFailure { message, .. }
            | AppError::SessionExpired { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::RateLimited { message, .. }
            | AppError::ValidationFailed { message, .. }
            | AppError::InvalidTransition { message, .. }
            | AppError::Remote { message, .. }
            | AppError::Decode { message, .. } => message.as_str(),
        }
    }

    pub fn network(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::NetworkFailure { code: code.into(), message: msg.into() } }
    pub fn session_expired(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::SessionExpired { code: code.into(), message: msg.into() } }
    pub fn forbidden(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn not_found(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn rate_limited(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::RateLimited { code: code.into(), message: msg.into() } }
    pub fn validation(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::ValidationFailed { code: code.into(), message: msg.into() } }
    pub fn invalid_transition(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::InvalidTransition { code: code.into(), message: msg.into() } }
    pub fn remote(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Remote { code: code.into(), message: msg.into() } }
    pub fn decode(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Decode { code: code.into(), message: msg.into() } }

    /// Classify a non-success gateway status. Status 0 means the transport never got an answer.
    pub fn from_status(status: u16, error: Option<&str>) -> Self {
        let detail = error.unwrap_or("").to_string();
        match status {
            0 => AppError::network("network_failure".to_string(), detail),
            401 => AppError::session_expired("unauthorized".to_string(), detail),
            403 => AppError::forbidden("forbidden".to_string(), detail),
            404 => AppError::not_found("not_found".to_string(), detail),
            429 => AppError::rate_limited("rate_limited".to_string(), detail),
            s => AppError::remote(format!("http_{}", s), detail),
        }
    }

    /// Best-effort reverse mapping, used for logging and the CLI exit summary.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::NetworkFailure { .. } => 0,
            AppError::SessionExpired { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::NotFound { .. } => 404,
            AppError::RateLimited { .. } => 429,
            AppError::ValidationFailed { .. } | AppError::InvalidTransition { .. } => 400,
            AppError::Remote { code, .. } => code.strip_prefix("http_").and_then(|s| s.parse().ok()).unwrap_or(500),
            AppError::Decode { .. } => 502,
        }
    }

    /// Errors detected before any request was issued.
    pub fn is_local(&self) -> bool {
        matches!(self, AppError::ValidationFailed { .. } | AppError::InvalidTransition { .. })
    }

    /// Whether the user can sensibly try the same action again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::NetworkFailure { .. } | AppError::RateLimited { .. } | AppError::Remote { .. })
    }

    /// Only a rejected credential ends the session; a 403 blocks just the one action.
    pub fn clears_session(&self) -> bool { matches!(self, AppError::SessionExpired { .. }) }

    /// Generic category message for display. Server detail is only shown for local validation,
    /// where the text was produced by this crate.
    pub fn notice(&self) -> Notice {
        let (tone, message) = match self {
            AppError::NetworkFailure { .. } => (Tone::Warning, "Unable to reach the service. Check your connection and try again.".to_string()),
            AppError::SessionExpired { .. } => (Tone::Warning, "Your session has expired. Please sign in again.".to_string()),
            AppError::Forbidden { code, .. } if code == "invalid_credentials" => (Tone::Warning, "Invalid username or password.".to_string()),
            AppError::Forbidden { .. } => (Tone::Warning, "You do not have access to this item.".to_string()),
            AppError::NotFound { .. } => (Tone::Warning, "The requested item was not found.".to_string()),
            AppError::RateLimited { .. } => (Tone::Warning, "Too many attempts. Please wait a moment and try again.".to_string()),
            AppError::ValidationFailed { message, .. } => (Tone::Warning, message.clone()),
            AppError::InvalidTransition { .. } => (Tone::Info, "That status change is not available for this complaint.".to_string()),
            AppError::Remote { .. } | AppError::Decode { .. } => (Tone::Warning, "Something went wrong. Please try again.".to_string()),
        };
        Notice { tone, message }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Remote { code: "client_error".into(), message: err.to_string() }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode { code: "decode_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
