use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::{AppError, AppResult};
use crate::gateway::{Body, Gateway, Method};

pub const LOGIN_PATH: &str = "auth/login/";
pub const REGISTER_PATH: &str = "auth/register/";
pub const RESET_REQUEST_PATH: &str = "auth/password-reset/";
pub const RESET_CONFIRM_PATH: &str = "auth/password-reset/confirm/";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Normalize (trim, lowercase) and check an institutional email address.
pub fn validate_email(value: &str, allowed_domains: &[String]) -> AppResult<String> {
    let email = value.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::validation("email_required", "Email is required."));
    }
    if !EMAIL_RE.is_match(&email) {
        return Err(AppError::validation("email_invalid", "Enter a valid email address."));
    }
    let domain = email.rsplit('@').next().unwrap_or("");
    if !allowed_domains.is_empty() && !allowed_domains.iter().any(|d| d == domain) {
        return Err(AppError::validation("email_domain", format!("Use your university email ({}).", allowed_domains.join(", "))));
    }
    Ok(email)
}

/// At least 8 characters with one letter and one digit.
pub fn validate_password(value: &str) -> AppResult<()> {
    if value.is_empty() {
        return Err(AppError::validation("password_required", "Password is required."));
    }
    if value.chars().count() < 8 {
        return Err(AppError::validation("password_length", "Password must be at least 8 characters."));
    }
    if !value.chars().any(|c| c.is_ascii_alphabetic()) || !value.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::validation("password_complexity", "Password must contain a letter and a digit."));
    }
    Ok(())
}

/// First word is the first name; everything after it is the last name.
pub fn split_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or("").to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");
    (first, rest)
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub full_name: String,
    pub email: String,
    /// Optional; used as the username when present.
    pub student_id: String,
    pub password: String,
    pub confirm_password: String,
    pub accepted_terms: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl RegistrationForm {
    /// Local pre-flight; on success yields the exact body sent to the server.
    pub fn validate(&self, allowed_domains: &[String]) -> AppResult<RegistrationRequest> {
        if self.full_name.trim().is_empty() {
            return Err(AppError::validation("full_name_required", "Full name is required."));
        }
        let email = validate_email(&self.email, allowed_domains)?;
        validate_password(&self.password)?;
        if self.confirm_password.is_empty() {
            return Err(AppError::validation("confirm_required", "Confirm your password."));
        }
        if self.password != self.confirm_password {
            return Err(AppError::validation("confirm_mismatch", "Passwords do not match."));
        }
        if !self.accepted_terms {
            return Err(AppError::validation("terms_required", "You must accept the terms to register."));
        }
        let (first, last) = split_name(&self.full_name);
        let student_id = self.student_id.trim();
        Ok(RegistrationRequest {
            username: if student_id.is_empty() { email.clone() } else { student_id.to_string() },
            password: self.password.clone(),
            email,
            first_name: Some(first).filter(|s| !s.is_empty()),
            last_name: Some(last).filter(|s| !s.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LoginReply {
    token: String,
}

/// Anonymous credential flows. Only `login` and `logout` touch the session.
#[derive(Clone)]
pub struct AuthClient {
    gateway: Gateway,
    config: Arc<ClientConfig>,
}

impl AuthClient {
    pub fn new(gateway: Gateway, config: Arc<ClientConfig>) -> Self { Self { gateway, config } }

    /// Exchange username/email + password for a credential and store it. Returns the credential.
    pub async fn login(&self, identifier: &str, password: &str) -> AppResult<String> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(AppError::validation("identifier_required", "Enter your username or email."));
        }
        if password.is_empty() {
            return Err(AppError::validation("password_required", "Password is required."));
        }
        let body = Body::Json(json!({ "username": identifier, "password": password }));
        let data = match self.gateway.anonymous(Method::Post, LOGIN_PATH, Some(body)).await {
            Ok(data) => data,
            Err(AppError::SessionExpired { .. }) | Err(AppError::Forbidden { .. }) => {
                warn!(target: "complaint_desk::session", "login rejected for '{}'", identifier);
                return Err(AppError::forbidden("invalid_credentials", "invalid username or password"));
            }
            Err(e) => return Err(e),
        };
        let reply: LoginReply = crate::gateway::decode(data)?;
        if reply.token.is_empty() {
            return Err(AppError::decode("empty_token", "login response carried no token"));
        }
        let session = self.gateway.session();
        session.set_credential(&reply.token);
        session.set_identity_label(identifier);
        info!(target: "complaint_desk::session", "signed in as '{}'", identifier);
        Ok(reply.token)
    }

    pub fn logout(&self) { self.gateway.session().clear_all(); }

    pub async fn register(&self, form: &RegistrationForm) -> AppResult<()> {
        let req = form.validate(&self.config.allowed_email_domains)?;
        let body = Body::Json(serde_json::to_value(&req)?);
        self.gateway.anonymous(Method::Post, REGISTER_PATH, Some(body)).await?;
        info!(target: "complaint_desk::session", "registered '{}'", req.username);
        Ok(())
    }

    pub async fn request_password_reset(&self, email: &str) -> AppResult<()> {
        let email = validate_email(email, &self.config.allowed_email_domains)?;
        self.gateway.anonymous(Method::Post, RESET_REQUEST_PATH, Some(Body::Json(json!({ "email": email })))).await?;
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, password: &str, confirm_password: &str) -> AppResult<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::validation("reset_token_missing", "This reset link is invalid or incomplete."));
        }
        validate_password(password)?;
        if password != confirm_password {
            return Err(AppError::validation("confirm_mismatch", "Passwords do not match."));
        }
        let body = Body::Json(json!({ "token": token, "password": password }));
        self.gateway.anonymous(Method::Post, RESET_CONFIRM_PATH, Some(body)).await?;
        Ok(())
    }
}
