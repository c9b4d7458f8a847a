//! Complaint lifecycle: the status lattice, the append-only history, listings and the
//! detail view model, plus the service that talks to the gateway for all of them.

mod status;
mod model;
mod history;
mod listing;
mod guard;
mod service;
mod detail;

pub use status::{BadgeTone, Status};
pub use model::{Complaint, NewComplaint, DEFAULT_CATEGORY};
pub use history::{Action, ActorRole, Consistency, HistoryEntry, HistoryError, Timeline};
pub use listing::{ComplaintFeed, ComplaintPage, ListFilter, ListScope};
pub use guard::{RequestTracker, Ticket, ViewScope};
pub use service::{detail_path, feedback_path, history_path, responses_path, status_path, ComplaintService, CREATE_PATH};
pub use detail::{ComplaintDetailView, DetailState, Slot};
