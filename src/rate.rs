//! Debounce/throttle bookkeeping.
//!
//! Both debounce and throttle are backed by the same flat triple-registry
//! shape: `(identity, timer token, work)` entries, looked up linearly. A
//! map keyed by identity would also satisfy cancel-by-timer-id as long as
//! that stays a linear scan; at the small N this orchestrator expects (a
//! handful of rate-limited call sites per host) a flat `Vec` wins on cache
//! locality with no real downside.

use std::cell::RefCell;

use crate::platform::TimerToken;
use crate::work_item::Work;

/// Caller-supplied identity for a `(target, method)` pair. Rust has no
/// runtime reflection to derive this automatically, so callers pick a
/// stable key (e.g. hash of an `Rc` pointer plus a method discriminant) at
/// the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateKey(pub u64);

/// One flat entry: identity, its armed host timer, and the work to run when
/// that timer fires. The third slot generalizes from a bare timer id to
/// the closure the id stands in for, since there's no separate global work
/// table to join against.
struct Entry {
    key: RateKey,
    token: TimerToken,
    work: Work,
}

#[derive(Default)]
pub struct RateRegistry {
    entries: RefCell<Vec<Entry>>,
}

impl RateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, key: RateKey) -> Option<TimerToken> {
        self.entries
            .borrow()
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.token)
    }

    pub fn insert(&self, key: RateKey, token: TimerToken, work: Work) {
        self.entries.borrow_mut().push(Entry { key, token, work });
    }

    pub fn remove_by_key(&self, key: RateKey) -> Option<TimerToken> {
        let mut entries = self.entries.borrow_mut();
        let idx = entries.iter().position(|e| e.key == key)?;
        Some(entries.remove(idx).token)
    }

    /// Scan the third slot of every triple for a matching timer id, for
    /// `cancel(handle)` given a bare timer id. Returns the identity and
    /// the work that would have run.
    pub fn remove_by_token(&self, token: TimerToken) -> Option<(RateKey, Work)> {
        let mut entries = self.entries.borrow_mut();
        let idx = entries.iter().position(|e| e.token == token)?;
        let entry = entries.remove(idx);
        Some((entry.key, entry.work))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) -> Vec<TimerToken> {
        self.entries
            .borrow_mut()
            .drain(..)
            .map(|e| e.token)
            .collect()
    }
}
