//! Privilege inference. The service has no "who am I allowed to be" endpoint, so staff
//! capability is discovered by a HEAD against a staff-only listing: authorized means staff,
//! 401/403 means not staff, anything else tells us nothing. A stale positive is preferred
//! over a stale negative, so ambiguous failures keep the previous answer.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::complaints::RequestTracker;
use crate::gateway::Gateway;

/// Staff-only resource used as the capability probe target.
pub const PROBE_PATH: &str = "admin/complaints/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Granted,
    Denied,
    /// Network error, timeout, 5xx, rate limiting: says nothing about privilege.
    Ambiguous,
}

impl ProbeOutcome {
    pub fn classify(ok: bool, status: u16) -> Self {
        if ok { return ProbeOutcome::Granted; }
        match status {
            401 | 403 => ProbeOutcome::Denied,
            _ => ProbeOutcome::Ambiguous,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CacheEntry {
    privileged: bool,
    ambiguous_streak: u32,
}

/// Probes and caches the privilege flag per credential. Overlapping probes for one credential
/// resolve in issue order: only the most recently issued one may write.
pub struct PrivilegeProber {
    gateway: Gateway,
    cache: Mutex<HashMap<String, CacheEntry>>,
    tracker: RequestTracker<String>,
    downgrade_after: Option<u32>,
}

impl PrivilegeProber {
    pub fn new(gateway: Gateway, downgrade_after: Option<u32>) -> Self {
        Self { gateway, cache: Mutex::new(HashMap::new()), tracker: RequestTracker::new(), downgrade_after }
    }

    pub fn cached(&self, credential: &str) -> Option<bool> { self.cache.lock().get(credential).map(|e| e.privileged) }

    /// Re-apply a previously learned answer for the active credential without a round trip.
    pub fn restore_cached(&self) -> bool {
        let credential = self.gateway.session().credential();
        match self.cached(&credential) {
            Some(v) => self.gateway.session().set_privileged_if_current(&credential, v),
            None => false,
        }
    }

    /// Drop the cached answer and supersede any probe still in flight for `credential`.
    pub fn forget(&self, credential: &str) {
        let mut cache = self.cache.lock();
        self.tracker.invalidate(&credential.to_string());
        cache.remove(credential);
    }

    /// Probe for the active credential and fold the result into the session.
    /// Signed out: nothing to probe, privilege is already false. Safe to call repeatedly.
    pub async fn probe(&self) -> Option<ProbeOutcome> {
        let session = self.gateway.session();
        let credential = session.credential();
        if credential.is_empty() {
            session.set_privileged_if_current(&credential, false);
            return None;
        }
        let ticket = self.tracker.issue(credential.clone());
        let resp = self.gateway.probe(&credential, PROBE_PATH).await;
        let outcome = ProbeOutcome::classify(resp.ok, resp.status);

        // Held through the session write: ticket check, cache update and session update are one step.
        let mut cache = self.cache.lock();
        if !self.tracker.is_current(&ticket) {
            debug!(target: "complaint_desk::privilege", "probe {:?} superseded by a later probe; discarded", outcome);
            return Some(outcome);
        }
        let seed = CacheEntry { privileged: session.get().is_privileged && session.is_current(&credential), ambiguous_streak: 0 };
        let entry = cache.entry(credential.clone()).or_insert(seed);
        match outcome {
            ProbeOutcome::Granted => { entry.privileged = true; entry.ambiguous_streak = 0; }
            ProbeOutcome::Denied => { entry.privileged = false; entry.ambiguous_streak = 0; }
            ProbeOutcome::Ambiguous => {
                entry.ambiguous_streak += 1;
                if let Some(n) = self.downgrade_after {
                    if entry.ambiguous_streak >= n && entry.privileged {
                        warn!(target: "complaint_desk::privilege", "{} consecutive ambiguous probes; downgrading", entry.ambiguous_streak);
                        entry.privileged = false;
                    }
                }
            }
        }
        let privileged = entry.privileged;

        if outcome == ProbeOutcome::Ambiguous {
            debug!(target: "complaint_desk::privilege", "probe ambiguous (status={} error={:?}); keeping privileged={}", resp.status, resp.error, privileged);
        }
        if session.set_privileged_if_current(&credential, privileged) {
            info!(target: "complaint_desk::privilege", "probe {:?} -> privileged={}", outcome, privileged);
        } else {
            debug!(target: "complaint_desk::privilege", "probe result discarded; credential changed while in flight");
        }
        drop(cache);
        Some(outcome)
    }
}
