use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Complaint lifecycle status. `NEW` is accepted on ingress as a synonym for `SUBMITTED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[serde(alias = "NEW")]
    Submitted,
    InReview,
    InProgress,
    Resolved,
    Rejected,
    Accepted,
    Closed,
}

/// Visual weight of a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeTone {
    Default,
    Info,
    Success,
    Warning,
}

impl Status {
    pub const ALL: [Status; 7] = [
        Status::Submitted,
        Status::InReview,
        Status::InProgress,
        Status::Resolved,
        Status::Rejected,
        Status::Accepted,
        Status::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Submitted => "SUBMITTED",
            Status::InReview => "IN_REVIEW",
            Status::InProgress => "IN_PROGRESS",
            Status::Resolved => "RESOLVED",
            Status::Rejected => "REJECTED",
            Status::Accepted => "ACCEPTED",
            Status::Closed => "CLOSED",
        }
    }

    /// Direct successors in the lattice.
    pub fn next(&self) -> &'static [Status] {
        match self {
            Status::Submitted => &[Status::InReview],
            Status::InReview => &[Status::InProgress],
            Status::InProgress => &[Status::Resolved, Status::Rejected],
            Status::Resolved => &[Status::Accepted, Status::Closed],
            Status::Rejected | Status::Accepted | Status::Closed => &[],
        }
    }

    /// Every state strictly downstream of `self`, in lattice order.
    pub fn reachable(&self) -> Vec<Status> {
        let mut out: Vec<Status> = Vec::new();
        let mut frontier: Vec<Status> = self.next().to_vec();
        while let Some(s) = frontier.pop() {
            if out.contains(&s) { continue; }
            out.push(s);
            frontier.extend_from_slice(s.next());
        }
        out.sort();
        out
    }

    pub fn can_transition_to(&self, target: Status) -> bool { self.reachable().contains(&target) }

    pub fn is_terminal(&self) -> bool { self.next().is_empty() }

    /// Owners may leave feedback once the complaint has been decided.
    pub fn accepts_feedback(&self) -> bool {
        matches!(self, Status::Resolved | Status::Accepted | Status::Closed | Status::Rejected)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Submitted => "Submitted",
            Status::InReview => "In review",
            Status::InProgress => "In progress",
            Status::Resolved => "Resolved",
            Status::Rejected => "Rejected",
            Status::Accepted => "Accepted",
            Status::Closed => "Closed",
        }
    }

    pub fn tone(&self) -> BadgeTone {
        match self {
            Status::Resolved | Status::Accepted | Status::Closed => BadgeTone::Success,
            Status::Rejected => BadgeTone::Warning,
            Status::InReview | Status::InProgress => BadgeTone::Info,
            Status::Submitted => BadgeTone::Default,
        }
    }

    /// Transitions worth presenting: staff see every downstream state, clients see none.
    pub fn available_transitions(&self, privileged: bool) -> Vec<Status> {
        if privileged { self.reachable() } else { Vec::new() }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Status {
    type Err = AppError;

    /// Case-insensitive; accepts `-` or space in place of `_`, and the `NEW` alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match norm.as_str() {
            "NEW" | "SUBMITTED" => Ok(Status::Submitted),
            "IN_REVIEW" => Ok(Status::InReview),
            "IN_PROGRESS" => Ok(Status::InProgress),
            "RESOLVED" => Ok(Status::Resolved),
            "REJECTED" => Ok(Status::Rejected),
            "ACCEPTED" => Ok(Status::Accepted),
            "CLOSED" => Ok(Status::Closed),
            _ => Err(AppError::validation("unknown_status", format!("unknown status '{}'", s.trim()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_an_alias_for_submitted() {
        let s: Status = serde_json::from_str("\"NEW\"").unwrap();
        assert_eq!(s, Status::Submitted);
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"SUBMITTED\"");
        assert_eq!("new".parse::<Status>().unwrap(), Status::Submitted);
        assert_eq!("in review".parse::<Status>().unwrap(), Status::InReview);
        assert!("pending".parse::<Status>().is_err());
    }

    #[test]
    fn reachability_is_transitive_and_forward_only() {
        assert_eq!(
            Status::Submitted.reachable(),
            vec![Status::InReview, Status::InProgress, Status::Resolved, Status::Rejected, Status::Accepted, Status::Closed]
        );
        assert_eq!(Status::InProgress.reachable(), vec![Status::Resolved, Status::Rejected, Status::Accepted, Status::Closed]);
        assert_eq!(Status::Resolved.reachable(), vec![Status::Accepted, Status::Closed]);
        for s in Status::ALL {
            assert!(!s.can_transition_to(s));
            for t in s.reachable() {
                assert!(!t.can_transition_to(s), "{} -> {} would allow a cycle", t, s);
            }
        }
        assert!(!Status::Resolved.can_transition_to(Status::InReview));
        assert!(!Status::Rejected.can_transition_to(Status::Closed));
    }

    #[test]
    fn terminal_states() {
        let terminal: Vec<Status> = Status::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![Status::Rejected, Status::Accepted, Status::Closed]);
        assert!(Status::Resolved.accepts_feedback());
        assert!(!Status::InProgress.accepts_feedback());
    }

    #[test]
    fn labels_and_transitions_by_role() {
        assert_eq!(Status::InReview.label(), "In review");
        assert_eq!(Status::Rejected.tone(), BadgeTone::Warning);
        assert!(Status::Submitted.available_transitions(false).is_empty());
        assert_eq!(Status::Resolved.available_transitions(true), vec![Status::Accepted, Status::Closed]);
    }
}
