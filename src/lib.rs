//! A cooperative run-loop scheduler for single-threaded, event-driven
//! hosts.
//!
//! Coordinates deferred work across a fixed, ordered set of named queues,
//! guarantees that work scheduled from within running work is flushed in
//! the same logical tick before control returns to the host, and
//! multiplexes several deferral primitives — immediate run, schedule into
//! a queue, scheduled-once, delayed execution, debounce, and throttle — on
//! top of the same instance lifecycle.
//!
//! The orchestrator never owns a real event loop: it asks an injected
//! [`Platform`](platform::Platform) to wake it up at a deadline or on the
//! next host turn, and is itself `!Send + !Sync` so "no locks, single
//! thread" is a compile-time property rather than a documentation note.
//!
//! ```no_run
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! use deferred_runloop::config::OrchestratorBuilder;
//! use deferred_runloop::platform::ManualPlatform;
//!
//! let orchestrator = Rc::new(
//!     OrchestratorBuilder::new(["actions", "render"])
//!         .platform(ManualPlatform::new())
//!         .build()
//!         .unwrap(),
//! );
//!
//! orchestrator.schedule("actions", Rc::new(|| {
//!     println!("flushed");
//!     Ok(())
//! })).unwrap();
//!
//! orchestrator.pump().unwrap();
//! let _ = Duration::from_millis(0);
//! ```

pub mod args;
pub mod config;
pub mod deferred_queues;
pub mod error;
pub mod events;
pub mod handle;
pub mod orchestrator;
pub mod platform;
pub mod queue;
pub mod rate;
pub mod timer;
pub mod tokio_platform;
pub mod work_item;

pub use config::OrchestratorBuilder;
pub use error::{RunLoopError, RunLoopResult};
pub use handle::Handle;
pub use orchestrator::{InstanceId, Orchestrator};
pub use platform::{ManualPlatform, Platform, TimerToken};
pub use tokio_platform::TokioPlatform;
pub use work_item::{OnceTag, Work};
