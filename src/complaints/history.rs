//! Append-only lifecycle log of a complaint, and the rule that reconciles it with the
//! complaint's own status when the two were fetched independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::Complaint;
use super::status::Status;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Created,
    StatusChanged,
    AdminResponse,
    Feedback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Admin,
    Client,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("status change needs both old and new status")]
    MissingStatus,
    #[error("status change from {0} to itself")]
    Unchanged(Status),
    #[error("{from} cannot move to {to}")]
    NotForward { from: Status, to: Status },
}

impl From<HistoryError> for AppError {
    fn from(e: HistoryError) -> Self { AppError::validation("invalid_history_entry", e.to_string()) }
}

/// One immutable lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    #[serde(rename = "complaint")]
    pub complaint_id: u64,
    pub action: Action,
    #[serde(rename = "user_role", default)]
    pub actor_role: Option<ActorRole>,
    #[serde(default)]
    pub old_status: Option<Status>,
    #[serde(default)]
    pub new_status: Option<Status>,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Build a validated `STATUS_CHANGED` entry.
    pub fn status_changed(
        id: u64,
        complaint_id: u64,
        old_status: Status,
        new_status: Status,
        actor_role: Option<ActorRole>,
        comment: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, HistoryError> {
        let entry = Self {
            id,
            complaint_id,
            action: Action::StatusChanged,
            actor_role,
            old_status: Some(old_status),
            new_status: Some(new_status),
            comment,
            created_at,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Only `STATUS_CHANGED` carries constraints: both ends present, different, and forward.
    pub fn validate(&self) -> Result<(), HistoryError> {
        if self.action != Action::StatusChanged { return Ok(()); }
        let (from, to) = match (self.old_status, self.new_status) {
            (Some(f), Some(t)) => (f, t),
            _ => return Err(HistoryError::MissingStatus),
        };
        if from == to { return Err(HistoryError::Unchanged(from)); }
        if !from.can_transition_to(to) { return Err(HistoryError::NotForward { from, to }); }
        Ok(())
    }

    pub fn is_valid(&self) -> bool { self.validate().is_ok() }

    pub fn action_label(&self) -> &'static str {
        match (self.action, self.actor_role) {
            (Action::Created, _) => "Created",
            (Action::StatusChanged, _) => "Status changed",
            (Action::AdminResponse, _) => "Staff response",
            (Action::Feedback, Some(ActorRole::Admin)) => "Staff feedback",
            (Action::Feedback, _) => "Client feedback",
        }
    }
}

/// How a detail snapshot and a history snapshot relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    Consistent,
    /// The complaint has moved on; history has not caught up yet.
    HistoryLagging { implied: Status },
    /// History already shows a later status than the complaint snapshot.
    HistoryAhead { implied: Status },
    /// Neither is downstream of the other.
    Divergent { implied: Status },
}

/// Ordered, append-only view over a complaint's history (oldest first).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    entries: Vec<HistoryEntry>,
}

impl Timeline {
    /// Sort by `created_at` ascending; ties keep server order. Server rows are kept as delivered,
    /// including ones that fail local validation; those are reported through `anomalies`.
    pub fn from_entries(mut entries: Vec<HistoryEntry>) -> Self {
        for e in &entries {
            if let Err(err) = e.validate() {
                tracing::warn!(target: "complaint_desk::complaints", "history entry {} does not fit the status lattice: {}", e.id, err);
            }
        }
        entries.sort_by_key(|e| e.created_at);
        Self { entries }
    }

    /// Ingested rows that fail validation, with the reason.
    pub fn anomalies(&self) -> Vec<(u64, HistoryError)> {
        self.entries.iter().filter_map(|e| e.validate().err().map(|err| (e.id, err))).collect()
    }

    pub fn entries(&self) -> &[HistoryEntry] { &self.entries }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Append a newer entry. Existing entries are never rewritten; an id already present is ignored.
    pub fn append(&mut self, entry: HistoryEntry) -> Result<bool, HistoryError> {
        entry.validate()?;
        if self.entries.iter().any(|e| e.id == entry.id) { return Ok(false); }
        let at = self.entries.partition_point(|e| e.created_at <= entry.created_at);
        self.entries.insert(at, entry);
        Ok(true)
    }

    /// Status implied by the last `STATUS_CHANGED` row, or `SUBMITTED` if there is none.
    pub fn implied_status(&self) -> Status {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.action == Action::StatusChanged)
            .find_map(|e| e.new_status)
            .unwrap_or(Status::Submitted)
    }

    pub fn reconcile(&self, complaint: &Complaint) -> Consistency {
        let implied = self.implied_status();
        if implied == complaint.status {
            Consistency::Consistent
        } else if implied.can_transition_to(complaint.status) {
            Consistency::HistoryLagging { implied }
        } else if complaint.status.can_transition_to(implied) {
            Consistency::HistoryAhead { implied }
        } else {
            Consistency::Divergent { implied }
        }
    }
}
