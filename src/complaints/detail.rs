//! Detail screen model: the complaint and its history are fetched as two independent round
//! trips and kept side by side. The complaint's own `status` is what the screen shows as
//! current; history only feeds the timeline and the consistency verdict.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::guard::{RequestTracker, Ticket, ViewScope};
use super::history::{Consistency, Timeline};
use super::model::Complaint;
use super::service::ComplaintService;
use super::status::Status;
use crate::error::{AppError, AppResult, Notice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Part {
    Detail,
    History,
}

/// Load state of one independently fetched part.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Idle,
    Loading,
    Ready(T),
    Failed(Notice),
}

impl<T> Default for Slot<T> {
    fn default() -> Self { Slot::Idle }
}

impl<T> Slot<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Slot::Ready(v) => Some(v),
            _ => None,
        }
    }
    pub fn is_loading(&self) -> bool { matches!(self, Slot::Loading) }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailState {
    pub id: u64,
    pub complaint: Slot<Complaint>,
    pub history: Slot<Timeline>,
}

impl DetailState {
    /// Current status always comes from the complaint record, never from the last history row.
    pub fn current_status(&self) -> Option<Status> { self.complaint.value().map(|c| c.status) }

    pub fn consistency(&self) -> Option<Consistency> {
        match (self.complaint.value(), self.history.value()) {
            (Some(c), Some(h)) => Some(h.reconcile(c)),
            _ => None,
        }
    }
}

/// One open detail view. Results of superseded requests, or arriving after `close`, are dropped.
/// Tickets are keyed by `(complaint id, part)`; switching to another id supersedes both parts
/// of the previous one.
pub struct ComplaintDetailView {
    service: Arc<ComplaintService>,
    scope: ViewScope,
    tracker: RequestTracker<(u64, Part)>,
    state: Mutex<DetailState>,
}

impl ComplaintDetailView {
    pub fn new(service: Arc<ComplaintService>) -> Self {
        Self { service, scope: ViewScope::new(), tracker: RequestTracker::new(), state: Mutex::new(DetailState::default()) }
    }

    pub fn snapshot(&self) -> DetailState { self.state.lock().clone() }

    pub fn is_open(&self) -> bool { self.scope.is_open() }

    /// Tear down. Later completions become no-ops.
    pub fn close(&self) {
        self.scope.close();
        let id = self.state.lock().id;
        self.invalidate_id(id);
    }

    /// Fetch the complaint. Returns whether this call's result was applied.
    pub async fn load_detail(&self, id: u64) -> bool {
        if !self.scope.is_open() { return false; }
        let ticket = self.tracker.issue((id, Part::Detail));
        self.begin(id, |s| s.complaint = Slot::Loading);
        let result = self.service.get_detail(id).await;
        let mut state = self.state.lock();
        if !self.accepts(&state, id, &ticket) {
            debug!(target: "complaint_desk::complaints", "dropping superseded detail result for {}", id);
            return false;
        }
        state.complaint = slot_from(result);
        true
    }

    pub async fn load_history(&self, id: u64) -> bool {
        if !self.scope.is_open() { return false; }
        let ticket = self.tracker.issue((id, Part::History));
        self.begin(id, |s| s.history = Slot::Loading);
        let result = self.service.get_history(id).await;
        let mut state = self.state.lock();
        if !self.accepts(&state, id, &ticket) {
            debug!(target: "complaint_desk::complaints", "dropping superseded history result for {}", id);
            return false;
        }
        state.history = slot_from(result);
        true
    }

    /// Both parts concurrently; each part's failure is kept separately.
    pub async fn load(&self, id: u64) -> DetailState {
        tokio::join!(self.load_detail(id), self.load_history(id));
        self.snapshot()
    }

    /// Staff transition from the detail view; on success both parts are refreshed.
    pub async fn transition(&self, target: Status, comment: Option<&str>) -> AppResult<Complaint> {
        let id = self.state.lock().id;
        if id == 0 {
            return Err(AppError::validation("no_complaint", "no complaint is open"));
        }
        let c = self.service.transition_status(id, target, comment).await?;
        if self.scope.is_open() {
            self.load(id).await;
        }
        Ok(c)
    }

    /// Switching to another id discards whatever belonged to the previous one, including its
    /// in-flight requests.
    fn begin(&self, id: u64, mark: impl FnOnce(&mut DetailState)) {
        let mut state = self.state.lock();
        if state.id != id {
            self.invalidate_id(state.id);
            *state = DetailState { id, ..Default::default() };
        }
        mark(&mut state);
    }

    fn accepts(&self, state: &DetailState, id: u64, ticket: &Ticket<(u64, Part)>) -> bool {
        self.scope.is_open() && state.id == id && self.tracker.is_current(ticket)
    }

    fn invalidate_id(&self, id: u64) {
        self.tracker.invalidate(&(id, Part::Detail));
        self.tracker.invalidate(&(id, Part::History));
    }
}

fn slot_from<T>(result: AppResult<T>) -> Slot<T> {
    match result {
        Ok(v) => Slot::Ready(v),
        Err(e) => Slot::Failed(e.notice()),
    }
}
