use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::status::Status;

pub const DEFAULT_CATEGORY: &str = "General";

/// A complaint as the service reports it. `id` is positive and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    #[serde(deserialize_with = "positive_id")]
    pub id: u64,
    #[serde(default)]
    pub text: String,
    pub status: Status,
    /// Foreign key or name; normalized to text.
    #[serde(default, deserialize_with = "category_text")]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "user", default, deserialize_with = "owner_text")]
    pub owner_user_id: Option<String>,
}

impl Complaint {
    pub fn category_label(&self) -> &str { self.category.as_deref().unwrap_or(DEFAULT_CATEGORY) }

    /// Case-insensitive match against id (as text), category and text.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() { return true; }
        self.id.to_string().contains(&term)
            || self.category_label().to_lowercase().contains(&term)
            || self.text.to_lowercase().contains(&term)
    }
}

/// Body for `POST complaints/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewComplaint {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

fn positive_id<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let id = u64::deserialize(d)?;
    if id == 0 {
        return Err(serde::de::Error::custom("complaint id must be positive"));
    }
    Ok(id)
}

fn category_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Object(map)) => map.get("name").and_then(|v| v.as_str()).map(|s| s.to_string()),
        _ => None,
    })
}

fn owner_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
