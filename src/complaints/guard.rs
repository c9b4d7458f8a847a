use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Issue-order guard: each request against a key takes a ticket, and only the most recently
/// issued ticket may write its result. Arrival order does not matter.
#[derive(Debug)]
pub struct RequestTracker<K> {
    latest: Mutex<HashMap<K, u64>>,
}

impl<K> Default for RequestTracker<K> {
    fn default() -> Self { Self { latest: Mutex::new(HashMap::new()) } }
}

/// Proof that a request was issued; checked when its result arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket<K> {
    pub key: K,
    pub generation: u64,
}

impl<K: Eq + Hash + Clone> RequestTracker<K> {
    pub fn new() -> Self { Self::default() }

    pub fn issue(&self, key: K) -> Ticket<K> {
        let mut latest = self.latest.lock();
        let slot = latest.entry(key.clone()).or_insert(0);
        *slot += 1;
        Ticket { key, generation: *slot }
    }

    pub fn is_current(&self, ticket: &Ticket<K>) -> bool {
        self.latest.lock().get(&ticket.key).copied() == Some(ticket.generation)
    }

    /// Supersede every outstanding ticket for `key`.
    pub fn invalidate(&self, key: &K) {
        if let Some(slot) = self.latest.lock().get_mut(key) { *slot += 1; }
    }
}

/// Lifetime of a view. Once closed, every late completion becomes a no-op.
#[derive(Debug, Clone, Default)]
pub struct ViewScope {
    closed: Arc<AtomicBool>,
}

impl ViewScope {
    pub fn new() -> Self { Self::default() }
    pub fn close(&self) { self.closed.store(true, Ordering::SeqCst); }
    pub fn is_open(&self) -> bool { !self.closed.load(Ordering::SeqCst) }
}
