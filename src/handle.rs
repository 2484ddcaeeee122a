//! Unified cancellation token returned by every scheduling call. A closed
//! enum rather than an opaque boxed callback, so `Orchestrator::cancel` can
//! dispatch on which subsystem produced it without a trait object per call
//! site.

use crate::platform::TimerToken;
use crate::queue::ItemId;
use crate::timer::TimerFn;

/// A cancellable handle to previously scheduled work. Constructed by
/// [`crate::orchestrator::Orchestrator::schedule`],
/// [`crate::orchestrator::Orchestrator::later`],
/// [`crate::orchestrator::Orchestrator::debounce`], and
/// [`crate::orchestrator::Orchestrator::throttle`].
#[derive(Clone)]
pub enum Handle {
    /// A `later` timer, identified by the closure identity the timer heap
    /// indexes on.
    Later(TimerFn),
    /// A debounce or throttle timer, identified by its host-wake token in
    /// whichever [`crate::rate::RateRegistry`] created it.
    Rate(TimerToken),
    /// An item still sitting in a named queue, awaiting flush.
    Queued { queue_idx: usize, id: ItemId },
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handle::Later(_) => f.debug_tuple("Later").field(&"<timer fn>").finish(),
            Handle::Rate(token) => f.debug_tuple("Rate").field(token).finish(),
            Handle::Queued { queue_idx, id } => f
                .debug_struct("Queued")
                .field("queue_idx", queue_idx)
                .field("id", id)
                .finish(),
        }
    }
}
