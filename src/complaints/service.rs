use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info};

use super::history::{HistoryEntry, Timeline};
use super::listing::{ComplaintFeed, ComplaintPage, ListFilter, ListScope};
use super::model::{Complaint, NewComplaint};
use super::status::Status;
use crate::error::{AppError, AppResult};
use crate::gateway::{Body, Gateway, Method};

pub fn detail_path(id: u64) -> String { format!("complaints/{}/", id) }
pub fn history_path(id: u64) -> String { format!("complaints/{}/history/", id) }
pub fn status_path(id: u64) -> String { format!("admin/complaints/{}/status/", id) }
pub fn responses_path(id: u64) -> String { format!("admin/complaints/{}/responses/", id) }
pub fn feedback_path(id: u64) -> String { format!("complaints/{}/feedback/", id) }
pub const CREATE_PATH: &str = "complaints/";

/// Last status seen per complaint, valid only for the credential that fetched it.
#[derive(Debug, Default)]
struct StatusCache {
    owner: String,
    by_id: HashMap<u64, Status>,
}

impl StatusCache {
    /// Entries of any other credential are discarded.
    fn for_owner(&mut self, credential: &str) -> &mut HashMap<u64, Status> {
        if self.owner != credential {
            self.owner = credential.to_string();
            self.by_id.clear();
        }
        &mut self.by_id
    }
}

/// Complaint operations over the gateway. Remembers the last status seen per complaint so
/// impossible transitions can be refused before any request is made.
pub struct ComplaintService {
    gateway: Gateway,
    statuses: Mutex<StatusCache>,
}

impl ComplaintService {
    pub fn new(gateway: Gateway) -> Self { Self { gateway, statuses: Mutex::new(StatusCache::default()) } }

    pub fn gateway(&self) -> &Gateway { &self.gateway }

    /// Last status seen for `id` under the active credential.
    pub fn cached_status(&self, id: u64) -> Option<Status> {
        let credential = self.gateway.session().credential();
        self.statuses.lock().for_owner(&credential).get(&id).copied()
    }

    /// Record `c` as fetched with `credential`. Ignored once that credential is no longer active.
    pub fn remember(&self, credential: &str, c: &Complaint) {
        let mut cache = self.statuses.lock();
        if credential.is_empty() || !self.gateway.session().is_current(credential) { return; }
        cache.for_owner(credential).insert(c.id, c.status);
    }

    /// One page of `scope`, narrowed by `filter` on the client.
    pub async fn list(&self, scope: ListScope, filter: &ListFilter, page: u32) -> AppResult<ComplaintPage> {
        let credential = self.gateway.session().credential();
        let data = self.gateway.send_as(&credential, Method::Get, &scope.path(page), None).await?;
        let mut page = ComplaintPage::from_value(data.unwrap_or_else(|| json!([])))?;
        for c in &page.items { self.remember(&credential, c); }
        page.items.retain(|c| filter.matches(c));
        debug!(target: "complaint_desk::complaints", "{} page -> {} items (has_more={})", scope.base_path(), page.items.len(), page.has_more);
        Ok(page)
    }

    /// Fetch the next page into `feed`. Returns false when nothing more was appended.
    pub async fn load_more(&self, scope: ListScope, feed: &mut ComplaintFeed) -> AppResult<bool> {
        if !feed.has_more() { return Ok(false); }
        let generation = feed.generation();
        let page = self.list(scope, &ListFilter::default(), feed.next_page()).await?;
        Ok(feed.push_page(generation, page))
    }

    pub async fn get_detail(&self, id: u64) -> AppResult<Complaint> {
        check_id(id)?;
        let credential = self.gateway.session().credential();
        let c: Complaint = self.gateway.send_json_as(&credential, Method::Get, &detail_path(id), None).await?;
        self.remember(&credential, &c);
        Ok(c)
    }

    pub async fn get_history(&self, id: u64) -> AppResult<Timeline> {
        check_id(id)?;
        let entries: Vec<HistoryEntry> = self.gateway.send_json(Method::Get, &history_path(id), None).await?;
        Ok(Timeline::from_entries(entries))
    }

    /// Staff status change. Fails locally with `InvalidTransition` when `target` is not downstream
    /// of the last known status; with no known status the server decides.
    pub async fn transition_status(&self, id: u64, target: Status, comment: Option<&str>) -> AppResult<Complaint> {
        check_id(id)?;
        if let Some(current) = self.cached_status(id) {
            if !current.can_transition_to(target) {
                return Err(AppError::invalid_transition(
                    "not_downstream",
                    format!("complaint {} cannot move from {} to {}", id, current, target),
                ));
            }
        }
        let mut body = json!({ "status": target });
        if let Some(text) = comment.map(str::trim).filter(|s| !s.is_empty()) {
            body["comment"] = json!(text);
        }
        let credential = self.gateway.session().credential();
        let c: Complaint = self.gateway.send_json_as(&credential, Method::Patch, &status_path(id), Some(Body::Json(body))).await?;
        self.remember(&credential, &c);
        info!(target: "complaint_desk::complaints", "complaint {} -> {}", id, c.status);
        Ok(c)
    }

    pub async fn add_response(&self, id: u64, comment: &str) -> AppResult<HistoryEntry> {
        check_id(id)?;
        let comment = required_comment(comment)?;
        self.gateway.send_json(Method::Post, &responses_path(id), Some(Body::Json(json!({ "comment": comment })))).await
    }

    /// Owner feedback, only once the complaint has been decided.
    pub async fn submit_feedback(&self, id: u64, comment: &str) -> AppResult<HistoryEntry> {
        check_id(id)?;
        let comment = required_comment(comment)?;
        if let Some(current) = self.cached_status(id) {
            if !current.accepts_feedback() {
                return Err(AppError::validation("feedback_not_open", format!("feedback opens once the complaint is decided (now {})", current.label())));
            }
        }
        self.gateway.send_json(Method::Post, &feedback_path(id), Some(Body::Json(json!({ "comment": comment })))).await
    }

    /// Clients only: staff sessions are refused before any request.
    pub async fn create(&self, new: &NewComplaint) -> AppResult<Complaint> {
        if self.gateway.session().get().is_privileged {
            return Err(AppError::forbidden("staff_cannot_create", "staff accounts cannot submit complaints"));
        }
        let text = new.text.trim();
        if text.is_empty() {
            return Err(AppError::validation("text_required", "Describe your complaint."));
        }
        let body = NewComplaint {
            text: text.to_string(),
            category: new.category.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from),
        };
        let credential = self.gateway.session().credential();
        let c: Complaint = self.gateway.send_json_as(&credential, Method::Post, CREATE_PATH, Some(Body::Json(serde_json::to_value(&body)?))).await?;
        self.remember(&credential, &c);
        info!(target: "complaint_desk::complaints", "created complaint {}", c.id);
        Ok(c)
    }
}

fn check_id(id: u64) -> AppResult<()> {
    if id == 0 { Err(AppError::validation("invalid_id", "complaint id must be positive")) } else { Ok(()) }
}

fn required_comment(comment: &str) -> AppResult<&str> {
    let c = comment.trim();
    if c.is_empty() { Err(AppError::validation("comment_required", "Write a comment first.")) } else { Ok(c) }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod service_tests;
