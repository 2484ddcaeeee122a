//! Builder for [`crate::orchestrator::Orchestrator`].

use std::rc::Rc;

use crate::error::{RunLoopError, RunLoopResult, WorkError};
use crate::orchestrator::{BeginHook, EndHook, ErrorHandler, Orchestrator};
use crate::platform::Platform;

/// Constructs an [`Orchestrator`] from an options bag, split into a fluent
/// builder assembled incrementally before a single `build()` call.
pub struct OrchestratorBuilder<P: Platform> {
    queue_names: Vec<String>,
    default_queue: Option<String>,
    on_begin: Option<BeginHook>,
    on_end: Option<EndHook>,
    on_error: Option<ErrorHandler>,
    on_error_resolver: Option<Rc<dyn Fn() -> Option<ErrorHandler>>>,
    platform: Option<P>,
    debug: bool,
}

impl<P: Platform> OrchestratorBuilder<P> {
    /// `queue_names` fixes the declared queue order for the lifetime of the
    /// resulting orchestrator; it cannot change after `build()`.
    pub fn new(queue_names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            queue_names: queue_names.into_iter().map(Into::into).collect(),
            default_queue: None,
            on_begin: None,
            on_end: None,
            on_error: None,
            on_error_resolver: None,
            platform: None,
            debug: false,
        }
    }

    /// Queue that absorbs expired `later` fires. Defaults to `queue_names[0]`.
    pub fn default_queue(mut self, name: impl Into<String>) -> Self {
        self.default_queue = Some(name.into());
        self
    }

    /// Invoked after every `begin`, including the implicit autorun one.
    pub fn on_begin(mut self, hook: BeginHook) -> Self {
        self.on_begin = Some(hook);
        self
    }

    /// Invoked after every non-paused `end`.
    pub fn on_end(mut self, hook: EndHook) -> Self {
        self.on_end = Some(hook);
        self
    }

    /// Fixed error diversion target. Mutually exclusive in effect with
    /// [`Self::on_error_resolver`] — when both are set the resolver wins,
    /// since a fixed handler can always degenerate to one that always
    /// resolves to it.
    pub fn on_error(mut self, handler: ErrorHandler) -> Self {
        self.on_error = Some(handler);
        self
    }

    /// Dynamic error diversion: re-evaluated on every work invocation
    /// instead of captured once at build time. Generalizes the common
    /// "resolve a handler by name on a target" idea to an arbitrary
    /// resolver, since Rust has no runtime method lookup by name.
    pub fn on_error_resolver(mut self, resolver: Rc<dyn Fn() -> Option<ErrorHandler>>) -> Self {
        self.on_error_resolver = Some(resolver);
        self
    }

    pub fn platform(mut self, platform: P) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Enable scheduling-site backtrace capture on every work item.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn build(self) -> RunLoopResult<Orchestrator<P>> {
        let Some(platform) = self.platform else {
            let err: WorkError = Box::new(crate::error::Message(
                "OrchestratorBuilder::build called without a platform".to_string(),
            ));
            return Err(RunLoopError::Work(err));
        };
        if self.queue_names.is_empty() {
            let err: WorkError = Box::new(crate::error::Message(
                "OrchestratorBuilder::build called with no queue names".to_string(),
            ));
            return Err(RunLoopError::Work(err));
        }
        let default_queue_idx = match &self.default_queue {
            Some(name) => self
                .queue_names
                .iter()
                .position(|q| q == name)
                .ok_or_else(|| RunLoopError::UnknownQueue(name.clone()))?,
            None => 0,
        };
        let resolver = self.on_error_resolver.or_else(|| {
            self.on_error
                .map(|handler| -> Rc<dyn Fn() -> Option<ErrorHandler>> {
                    Rc::new(move || Some(handler.clone()))
                })
        });
        Ok(Orchestrator::new(
            self.queue_names,
            default_queue_idx,
            self.on_begin,
            self.on_end,
            resolver,
            platform,
            self.debug,
        ))
    }
}
