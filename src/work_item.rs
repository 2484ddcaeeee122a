//! The unit of deferred work.

use std::backtrace::Backtrace;
use std::rc::Rc;

use crate::error::RunLoopResult;

/// A boxed, owned, run-once-or-more closure. Unlike a JS-style
/// `(target, method, args)` triple, Rust closures already bind their
/// receiver and arguments at creation time, so a single `Fn` trait object
/// stands in for the whole triple.
pub type Work = Rc<dyn Fn() -> RunLoopResult<()>>;

/// Identity used to deduplicate `once` scheduling. The caller supplies this
/// (typically derived from a receiver's address and a method discriminant)
/// since Rust has no runtime `(target, method)` reflection to fall back on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OnceTag(pub u64);

/// One pending item in a [`Queue`](crate::queue::Queue).
pub struct WorkItem {
    pub(crate) work: Work,
    pub(crate) once_tag: Option<OnceTag>,
    pub(crate) stack: Option<Backtrace>,
}

impl WorkItem {
    pub fn new(work: Work, once_tag: Option<OnceTag>, capture_stack: bool) -> Self {
        Self {
            work,
            once_tag,
            stack: capture_stack.then(Backtrace::force_capture),
        }
    }

    pub fn run(&self) -> RunLoopResult<()> {
        (self.work)()
    }
}
