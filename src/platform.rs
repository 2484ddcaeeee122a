//! Host platform adapter.
//!
//! The orchestrator never owns a real event loop. It asks the embedding
//! host to wake it up at a deadline (`arm_timeout`) or on the next turn of
//! the host's own loop (`arm_next_turn`), and later drains whichever tokens
//! came due via `poll_fired`. This is a `setTimeout` / `clearTimeout` /
//! `next` / `clearNext` host bundle kept behind a trait so the orchestrator
//! stays single-threaded and lock-free regardless of the embedding host.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Opaque token identifying an armed timeout or next-turn request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(pub u64);

/// Injected bundle of host timer primitives.
///
/// Implementors must never invoke orchestrator state directly from a
/// foreign thread; `arm_*` only promises that the token will eventually
/// show up in [`Platform::poll_fired`], which the orchestrator drains on
/// its own thread.
pub trait Platform {
    /// Current monotonic time as seen by the host.
    fn now(&self) -> Instant;

    /// Arm a wakeup for `deadline`. Fires at most once unless re-armed.
    fn arm_timeout(&self, deadline: Instant, token: TimerToken);

    /// Cancel a previously armed timeout. No-op if already fired or unknown.
    fn disarm_timeout(&self, token: TimerToken);

    /// Arm a wakeup on the next turn of the host's own loop (e.g. the next
    /// microtask/tick boundary). Used for the autorun.
    fn arm_next_turn(&self, token: TimerToken);

    /// Cancel a previously armed next-turn wakeup.
    fn disarm_next_turn(&self, token: TimerToken);

    /// Drain and return every token that has fired since the last call.
    /// Must not block.
    fn poll_fired(&self) -> Vec<TimerToken>;
}

/// A deterministic fake-clock platform for tests.
///
/// Time only moves when [`ManualPlatform::advance`] is called; nothing is
/// armed against a real clock.
#[derive(Default)]
pub struct ManualPlatform {
    now: Cell<Instant>,
    timeouts: RefCell<Vec<(Instant, TimerToken)>>,
    next_turns: RefCell<VecDeque<TimerToken>>,
    fired: RefCell<Vec<TimerToken>>,
}

impl ManualPlatform {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::now()),
            timeouts: RefCell::new(Vec::new()),
            next_turns: RefCell::new(VecDeque::new()),
            fired: RefCell::new(Vec::new()),
        }
    }

    /// Advance the fake clock by `by`, firing every timeout whose deadline
    /// has now passed (earliest first) and flushing any pending next-turn
    /// wakeups. Returns nothing; fired tokens are picked up by the next
    /// [`Platform::poll_fired`] call, exactly as a real host would deliver
    /// them asynchronously.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
        self.drain_next_turns();
        let now = self.now.get();
        let mut due = self.timeouts.borrow_mut();
        due.sort_by_key(|(deadline, _)| *deadline);
        let split = due.partition_point(|(deadline, _)| *deadline <= now);
        let ready: Vec<_> = due.drain(..split).map(|(_, token)| token).collect();
        drop(due);
        self.fired.borrow_mut().extend(ready);
    }

    /// Fire every armed next-turn wakeup immediately, as a real host does
    /// at the boundary of its own turn.
    pub fn run_next_turn(&self) {
        self.drain_next_turns();
    }

    fn drain_next_turns(&self) {
        let mut turns = self.next_turns.borrow_mut();
        self.fired.borrow_mut().extend(turns.drain(..));
    }
}

impl Platform for ManualPlatform {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn arm_timeout(&self, deadline: Instant, token: TimerToken) {
        self.timeouts.borrow_mut().push((deadline, token));
    }

    fn disarm_timeout(&self, token: TimerToken) {
        self.timeouts.borrow_mut().retain(|(_, t)| *t != token);
    }

    fn arm_next_turn(&self, token: TimerToken) {
        self.next_turns.borrow_mut().push_back(token);
    }

    fn disarm_next_turn(&self, token: TimerToken) {
        self.next_turns.borrow_mut().retain(|t| *t != token);
    }

    fn poll_fired(&self) -> Vec<TimerToken> {
        std::mem::take(&mut *self.fired.borrow_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_fires_due_timeouts_in_order() {
        let platform = ManualPlatform::new();
        let base = platform.now();
        platform.arm_timeout(base + Duration::from_millis(10), TimerToken(1));
        platform.arm_timeout(base + Duration::from_millis(5), TimerToken(2));

        platform.advance(Duration::from_millis(5));
        assert_eq!(platform.poll_fired(), vec![TimerToken(2)]);

        platform.advance(Duration::from_millis(5));
        assert_eq!(platform.poll_fired(), vec![TimerToken(1)]);
    }

    #[test]
    fn disarm_prevents_future_fire() {
        let platform = ManualPlatform::new();
        let base = platform.now();
        platform.arm_timeout(base + Duration::from_millis(10), TimerToken(1));
        platform.disarm_timeout(TimerToken(1));
        platform.advance(Duration::from_millis(20));
        assert!(platform.poll_fired().is_empty());
    }

    #[test]
    fn next_turn_fires_on_run_next_turn() {
        let platform = ManualPlatform::new();
        platform.arm_next_turn(TimerToken(7));
        platform.run_next_turn();
        assert_eq!(platform.poll_fired(), vec![TimerToken(7)]);
    }
}
