//! Error types for the run-loop orchestrator.

use std::fmt;
use thiserror::Error;

/// Result type returned by all fallible orchestrator operations.
pub type RunLoopResult<T> = Result<T, RunLoopError>;

/// A work item that threw. Kept as a boxed `std::error::Error` so callers can
/// schedule closures returning any error type without the orchestrator
/// having to know about it.
pub type WorkError = Box<dyn std::error::Error + 'static>;

/// Errors surfaced by the orchestrator itself.
///
/// These are split from [`WorkError`]: misuse of the public API (calling
/// `end` without `begin`, referencing an unknown event) is always a bug in
/// the caller and is represented here; exceptions thrown by *scheduled*
/// work are routed through `on_error` or wrapped in [`RunLoopError::Work`].
#[derive(Error, Debug)]
pub enum RunLoopError {
    /// `end()` was called while no instance was current.
    #[error("end() called without a matching begin()")]
    EndWithoutBegin,

    /// `on`/`off` referenced an event name other than `begin`/`end`.
    #[error("unknown event `{0}`, expected `begin` or `end`")]
    UnknownEvent(String),

    /// `off(event, callback)` could not find a registered callback to remove.
    /// Also covers spec.md §4.8's "`off` with no callback" case: this API's
    /// `off` always requires a `&EventCallback` argument, so that case is
    /// rejected at compile time rather than needing its own runtime variant.
    #[error("callback not registered for event `{0}`")]
    UnknownCallback(String),

    /// A scheduled work item returned an error and no `on_error` handler was
    /// configured, so the current flush is aborted and the error surfaces
    /// to the caller of `run`/`join`/`end`.
    #[error("scheduled work failed: {0}")]
    Work(#[source] WorkError),

    /// The named queue does not exist in this orchestrator's `queue_names`.
    #[error("no such queue `{0}`")]
    UnknownQueue(String),
}

impl RunLoopError {
    /// Wraps any error type into the `Work` variant, for callers building a
    /// work item closure that wants to report failure without depending on
    /// this crate's internals.
    pub fn work(err: impl Into<WorkError>) -> Self {
        RunLoopError::Work(err.into())
    }
}

/// Lightweight string error for closures that want to report failure
/// without defining their own error type.
#[derive(Debug)]
pub struct Message(pub String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message(s.to_string())
    }
}
