use serde::Deserialize;
use serde_json::Value;

use super::model::Complaint;
use super::status::Status;
use crate::error::{AppError, AppResult};

/// Client-side list filter. Status matches exactly; the search term is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub status: Option<Status>,
    pub search: Option<String>,
}

impl ListFilter {
    pub fn matches(&self, c: &Complaint) -> bool {
        if let Some(s) = self.status {
            if c.status != s { return false; }
        }
        match &self.search {
            Some(term) => c.matches_search(term),
            None => true,
        }
    }
}

/// Which listing endpoint a feed pages through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// The signed-in owner's complaints.
    Own,
    /// Every complaint, staff only.
    StaffQueue,
}

impl ListScope {
    pub fn base_path(&self) -> &'static str {
        match self {
            ListScope::Own => "complaints/",
            ListScope::StaffQueue => "admin/complaints/",
        }
    }

    pub fn path(&self, page: u32) -> String { format!("{}?page={}", self.base_path(), page.max(1)) }
}

/// One page of results as delivered by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplaintPage {
    pub items: Vec<Complaint>,
    pub has_more: bool,
}

#[derive(Deserialize)]
struct Envelope {
    results: Vec<Complaint>,
    #[serde(default)]
    next: Option<String>,
}

impl ComplaintPage {
    /// Accept a bare array (single page) or a `{results, next}` envelope.
    pub fn from_value(v: Value) -> AppResult<Self> {
        match v {
            Value::Array(_) => Ok(Self { items: serde_json::from_value(v)?, has_more: false }),
            Value::Object(_) => {
                let env: Envelope = serde_json::from_value(v)?;
                Ok(Self { items: env.results, has_more: env.next.is_some() })
            }
            _ => Err(AppError::decode("unexpected_listing", "listing was neither an array nor a page envelope")),
        }
    }
}

/// Accumulated, append-only list for one filter. Changing the filter resets it to page 1.
#[derive(Debug, Clone, Default)]
pub struct ComplaintFeed {
    filter: ListFilter,
    items: Vec<Complaint>,
    next_page: u32,
    has_more: bool,
    generation: u64,
}

impl ComplaintFeed {
    pub fn new(filter: ListFilter) -> Self { Self { filter, items: Vec::new(), next_page: 1, has_more: true, generation: 0 } }

    pub fn filter(&self) -> &ListFilter { &self.filter }
    pub fn generation(&self) -> u64 { self.generation }
    pub fn next_page(&self) -> u32 { self.next_page }
    pub fn has_more(&self) -> bool { self.has_more }
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Returns true if the filter changed and the feed was reset.
    pub fn set_filter(&mut self, filter: ListFilter) -> bool {
        if filter == self.filter { return false; }
        self.filter = filter;
        self.items.clear();
        self.next_page = 1;
        self.has_more = true;
        self.generation += 1;
        true
    }

    /// Append a page fetched under `generation`. Pages from an older filter are dropped.
    pub fn push_page(&mut self, generation: u64, page: ComplaintPage) -> bool {
        if generation != self.generation { return false; }
        for c in page.items {
            if !self.items.iter().any(|x| x.id == c.id) { self.items.push(c); }
        }
        self.has_more = page.has_more;
        self.next_page += 1;
        true
    }

    /// Items passing the filter, newest first.
    pub fn visible(&self) -> Vec<&Complaint> {
        let mut out: Vec<&Complaint> = self.items.iter().filter(|c| self.filter.matches(c)).collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> Value {
        json!([
            {"id": 42, "text": "Invoice charged twice", "status": "RESOLVED", "category": "Billing", "created_at": "2025-10-02T10:00:00Z"},
            {"id": 7, "text": "Late reply", "status": "RESOLVED", "created_at": "2025-10-03T10:00:00Z"},
            {"id": 8, "text": "Room 42 heater", "status": "IN_PROGRESS", "created_at": "2025-10-04T10:00:00Z"}
        ])
    }

    #[test]
    fn status_and_search_filter() {
        let page = ComplaintPage::from_value(fixture()).unwrap();
        assert!(!page.has_more);
        let mut feed = ComplaintFeed::new(ListFilter { status: Some(Status::Resolved), search: Some("42".into()) });
        feed.push_page(0, page);
        let ids: Vec<u64> = feed.visible().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![42]);
    }

    #[test]
    fn envelope_sets_has_more() {
        let v = json!({"count": 30, "next": "http://x/api/complaints/?page=2", "previous": null, "results": fixture()});
        let page = ComplaintPage::from_value(v).unwrap();
        assert!(page.has_more);
        assert_eq!(page.items.len(), 3);
        assert!(ComplaintPage::from_value(json!("oops")).is_err());
    }

    #[test]
    fn filter_change_resets_and_drops_stale_pages() {
        let mut feed = ComplaintFeed::new(ListFilter::default());
        let g0 = feed.generation();
        assert!(feed.push_page(g0, ComplaintPage::from_value(fixture()).unwrap()));
        assert_eq!(feed.next_page(), 2);
        let ids: Vec<u64> = feed.visible().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![8, 7, 42]);

        assert!(feed.set_filter(ListFilter { status: Some(Status::InProgress), search: None }));
        assert!(feed.is_empty());
        assert_eq!(feed.next_page(), 1);
        assert!(!feed.push_page(g0, ComplaintPage::from_value(fixture()).unwrap()));
        assert!(!feed.set_filter(ListFilter { status: Some(Status::InProgress), search: None }));
    }

    #[test]
    fn page_path_is_one_based() {
        assert_eq!(ListScope::Own.path(0), "complaints/?page=1");
        assert_eq!(ListScope::StaffQueue.path(3), "admin/complaints/?page=3");
    }
}
