//! Sorted timer heap backing delayed execution. A flat, sorted `Vec`
//! rather than a real binary heap: entries must be drained in
//! ascending-deadline order and the earliest entry's deadline is checked
//! on every mutation, so a sorted vector with `partition_point` inserts/
//! removes in the right place directly.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use crate::error::RunLoopResult;

pub type TimerFn = Rc<dyn Fn() -> RunLoopResult<()>>;

#[derive(Default)]
pub struct TimerHeap {
    entries: RefCell<Vec<(Instant, TimerFn)>>,
}

impl TimerHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn earliest(&self) -> Option<Instant> {
        self.entries.borrow().first().map(|(at, _)| *at)
    }

    /// Insert `work` to fire at `at`. Returns `true` if it became the new
    /// earliest entry, meaning the host's single armed timer must be
    /// re-armed.
    pub fn insert(&self, at: Instant, work: TimerFn) -> bool {
        let mut entries = self.entries.borrow_mut();
        let idx = entries.partition_point(|(deadline, _)| *deadline <= at);
        entries.insert(idx, (at, work));
        idx == 0
    }

    /// Cancel by function identity (a `later` handle). Returns `true`, and
    /// whether index 0 was removed (caller must re-arm), if found.
    pub fn cancel(&self, work: &TimerFn) -> Option<bool> {
        let mut entries = self.entries.borrow_mut();
        let idx = entries.iter().position(|(_, w)| Rc::ptr_eq(w, work))?;
        entries.remove(idx);
        Some(idx == 0)
    }

    /// Remove and return every entry whose deadline has passed, earliest
    /// first.
    pub fn drain_expired(&self, now: Instant) -> Vec<TimerFn> {
        let mut entries = self.entries.borrow_mut();
        let split = entries.partition_point(|(deadline, _)| *deadline <= now);
        entries.drain(..split).map(|(_, work)| work).collect()
    }

    /// Drop every pending entry without running it.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    #[cfg(test)]
    fn is_sorted(&self) -> bool {
        self.entries.borrow().windows(2).all(|w| w[0].0 <= w[1].0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn noop() -> TimerFn {
        Rc::new(|| Ok(()))
    }

    #[test]
    fn stays_sorted_after_arbitrary_inserts() {
        let heap = TimerHeap::new();
        let base = Instant::now();
        let offsets = [30, 10, 20, 5, 25];
        for ms in offsets {
            heap.insert(base + Duration::from_millis(ms), noop());
        }
        assert!(heap.is_sorted());
        assert_eq!(heap.earliest(), Some(base + Duration::from_millis(5)));
    }

    #[test]
    fn insert_reports_new_earliest() {
        let heap = TimerHeap::new();
        let base = Instant::now();
        assert!(heap.insert(base + Duration::from_millis(10), noop()));
        assert!(!heap.insert(base + Duration::from_millis(20), noop()));
        assert!(heap.insert(base + Duration::from_millis(1), noop()));
    }

    #[test]
    fn drain_expired_returns_earliest_first_and_stops_at_boundary() {
        let heap = TimerHeap::new();
        let base = Instant::now();
        heap.insert(base + Duration::from_millis(5), noop());
        heap.insert(base + Duration::from_millis(10), noop());
        heap.insert(base + Duration::from_millis(15), noop());

        let fired = heap.drain_expired(base + Duration::from_millis(10));
        assert_eq!(fired.len(), 2);
        assert!(!heap.is_empty());
        assert_eq!(heap.earliest(), Some(base + Duration::from_millis(15)));
    }

    #[test]
    fn cancel_by_identity_reports_whether_head_changed() {
        let heap = TimerHeap::new();
        let base = Instant::now();
        let a = noop();
        let b = noop();
        heap.insert(base + Duration::from_millis(5), a.clone());
        heap.insert(base + Duration::from_millis(10), b.clone());
        assert_eq!(heap.cancel(&a), Some(true));
        assert_eq!(heap.cancel(&a), None);
        assert_eq!(heap.earliest(), Some(base + Duration::from_millis(10)));
    }
}
