//! Real-clock [`Platform`] backed by `tokio::time`.
//!
//! Arming a timeout spawns a local task that sleeps until the deadline and
//! then sends the token back over an unbounded channel; cancelling aborts
//! the task. No orchestrator state ever crosses a thread boundary — only
//! the `TimerToken` (plain `Copy`) travels through the channel, the same
//! shape as the corpus's `tokio::sync::mpsc`-based event sidecar.
//!
//! Requires a `tokio::task::LocalSet` in scope, since the orchestrator
//! itself is `!Send` and must stay on one OS thread.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::platform::{Platform, TimerToken};

pub struct TokioPlatform {
    tx: UnboundedSender<TimerToken>,
    rx: RefCell<UnboundedReceiver<TimerToken>>,
    timeouts: RefCell<HashMap<TimerToken, JoinHandle<()>>>,
    next_turns: RefCell<HashMap<TimerToken, JoinHandle<()>>>,
}

impl TokioPlatform {
    /// Must be called from inside a `tokio::task::LocalSet::run_until`
    /// (or an equivalent single-threaded tokio context), since every armed
    /// timer is spawned with `spawn_local`.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: RefCell::new(rx),
            timeouts: RefCell::new(HashMap::new()),
            next_turns: RefCell::new(HashMap::new()),
        }
    }
}

impl Default for TokioPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for TokioPlatform {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn arm_timeout(&self, deadline: Instant, token: TimerToken) {
        let tx = self.tx.clone();
        let sleep_until = tokio::time::Instant::from_std(deadline);
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep_until(sleep_until).await;
            let _ = tx.send(token);
        });
        self.timeouts.borrow_mut().insert(token, handle);
    }

    fn disarm_timeout(&self, token: TimerToken) {
        if let Some(handle) = self.timeouts.borrow_mut().remove(&token) {
            handle.abort();
        }
    }

    fn arm_next_turn(&self, token: TimerToken) {
        let tx = self.tx.clone();
        let handle = tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            let _ = tx.send(token);
        });
        self.next_turns.borrow_mut().insert(token, handle);
    }

    fn disarm_next_turn(&self, token: TimerToken) {
        if let Some(handle) = self.next_turns.borrow_mut().remove(&token) {
            handle.abort();
        }
    }

    fn poll_fired(&self) -> Vec<TimerToken> {
        let mut rx = self.rx.borrow_mut();
        let mut fired = Vec::new();
        while let Ok(token) = rx.try_recv() {
            fired.push(token);
        }
        fired
    }
}
