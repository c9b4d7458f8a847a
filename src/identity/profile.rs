use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::session::ProfilePatch;
use crate::config::ClientConfig;
use crate::error::{AppError, AppResult};
use crate::gateway::{Body, Gateway, Method};

pub const PROFILE_PATH: &str = "auth/me/";

/// Canonical profile as returned by `auth/me/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, deserialize_with = "id_text")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub date_joined: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
}

fn id_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s,
        _ => String::new(),
    })
}

impl UserProfile {
    /// "First Last", falling back to the username.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name).trim().to_string();
        if full.is_empty() { self.username.clone() } else { full }
    }

    pub fn avatar_ref(&self) -> &str {
        self.avatar_url.as_deref().filter(|s| !s.is_empty()).or(self.avatar.as_deref()).unwrap_or("")
    }

    /// Full patch: every field is replaced, so a removed avatar really clears.
    pub fn to_patch(&self, config: &ClientConfig) -> ProfilePatch {
        ProfilePatch {
            name: Some(self.display_name()),
            email: Some(self.email.clone()),
            id: Some(self.id.clone()),
            avatar_ref: Some(config.media_url(self.avatar_ref())),
        }
    }
}

/// Editable profile fields; unset fields are left out of the PATCH body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.first_name.is_none() && self.last_name.is_none()
    }
}

/// Keeps the session's cached profile fields in step with the server.
#[derive(Clone)]
pub struct ProfileSynchronizer {
    gateway: Gateway,
    config: Arc<ClientConfig>,
}

impl ProfileSynchronizer {
    pub fn new(gateway: Gateway, config: Arc<ClientConfig>) -> Self { Self { gateway, config } }

    /// Fetch the canonical profile for the active credential and merge it. Returns whether it
    /// was applied; a result for a credential that is no longer active is dropped.
    pub async fn sync(&self) -> AppResult<bool> {
        let credential = self.gateway.session().credential();
        if credential.is_empty() { return Ok(false); }
        let profile: UserProfile = self.gateway.send_json_as(&credential, Method::Get, PROFILE_PATH, None).await?;
        Ok(self.apply(&credential, &profile))
    }

    /// Read-only fetch for account screens; does not touch the session.
    pub async fn fetch(&self) -> AppResult<UserProfile> {
        self.gateway.send_json(Method::Get, PROFILE_PATH, None).await
    }

    /// PATCH profile fields; the response is merged directly instead of re-fetching.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> AppResult<UserProfile> {
        if update.is_empty() {
            return Err(AppError::validation("empty_update", "Nothing to update."));
        }
        let credential = self.gateway.session().credential();
        let body = Body::Json(serde_json::to_value(update)?);
        let profile: UserProfile = self.gateway.send_json_as(&credential, Method::Patch, PROFILE_PATH, Some(body)).await?;
        self.apply(&credential, &profile);
        Ok(profile)
    }

    /// Multipart avatar replacement; the response is merged directly.
    pub async fn replace_avatar(&self, file_name: &str, bytes: Vec<u8>) -> AppResult<UserProfile> {
        if bytes.is_empty() {
            return Err(AppError::validation("empty_file", "Choose an image to upload."));
        }
        let credential = self.gateway.session().credential();
        let body = Body::Multipart { field: "avatar".to_string(), file_name: file_name.to_string(), bytes };
        let profile: UserProfile = self.gateway.send_json_as(&credential, Method::Patch, PROFILE_PATH, Some(body)).await?;
        self.apply(&credential, &profile);
        Ok(profile)
    }

    fn apply(&self, credential: &str, profile: &UserProfile) -> bool {
        let applied = self.gateway.session().apply_profile_if_current(credential, &profile.to_patch(&self.config));
        if applied {
            info!(target: "complaint_desk::profile", "profile synced for user id={}", profile.id);
        } else {
            debug!(target: "complaint_desk::profile", "stale profile result dropped");
        }
        applied
    }
}
