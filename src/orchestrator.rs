//! The top-level scheduler.
//!
//! Owns the instance stack, the autorun, the timer heap, the debounce/
//! throttle registries, and the event-callback table, and exposes the
//! public scheduling API. Every method takes `&self`: state lives behind
//! `Cell`/`RefCell` so a work item running inside a flush can call back
//! into `schedule`/`cancel`/`begin` on this same orchestrator without a
//! `&mut` re-borrow ever being live across that call.
//! `schedule_iterable`/`debounce`/`throttle` additionally need to store a
//! handle to the orchestrator itself inside a stored closure (to call back
//! in on a later tick), so those three take `self: &Rc<Self>` — callers
//! are expected to hold the orchestrator as an `Rc` for exactly this
//! reason.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::args::{self, LaterArg, RateArg};
use crate::deferred_queues::DeferredActionQueues;
use crate::error::{RunLoopError, RunLoopResult, WorkError};
use crate::events::{EventCallback, EventTable};
use crate::handle::Handle;
use crate::platform::{Platform, TimerToken};
use crate::queue::{FlushOutcome, ItemId};
use crate::rate::{RateKey, RateRegistry};
use crate::timer::TimerHeap;
use crate::work_item::{OnceTag, Work, WorkItem};

/// Identifies one entry of the instance stack. Opaque beyond equality/
/// ordering of creation — callers only ever compare it to what
/// `on`/`on_begin`/`on_end` hand back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceId(pub u64);

pub type BeginHook = Rc<dyn Fn(InstanceId, Option<InstanceId>)>;
pub type EndHook = Rc<dyn Fn(InstanceId, Option<InstanceId>)>;
/// Diverts a work error instead of letting it abort the current flush.
pub type ErrorHandler = Rc<dyn Fn(&WorkError)>;

pub struct Orchestrator<P: Platform> {
    queue_names: Vec<String>,
    default_queue_idx: usize,
    on_begin: Option<BeginHook>,
    on_end: Option<EndHook>,
    on_error_resolver: Option<Rc<dyn Fn() -> Option<ErrorHandler>>>,
    platform: P,
    debug: bool,

    events: EventTable,
    current: RefCell<Option<(InstanceId, Rc<DeferredActionQueues>)>>,
    stack: RefCell<Vec<(InstanceId, Rc<DeferredActionQueues>)>>,

    next_instance_id: Cell<u64>,
    next_item_id: Cell<u64>,
    next_token: Cell<u64>,

    autorun_token: Cell<Option<TimerToken>>,
    timers: TimerHeap,
    timer_expiry_token: Cell<Option<TimerToken>>,
    debounce: RateRegistry,
    throttle: RateRegistry,
}

impl<P: Platform> Orchestrator<P> {
    pub(crate) fn new(
        queue_names: Vec<String>,
        default_queue_idx: usize,
        on_begin: Option<BeginHook>,
        on_end: Option<EndHook>,
        on_error_resolver: Option<Rc<dyn Fn() -> Option<ErrorHandler>>>,
        platform: P,
        debug: bool,
    ) -> Self {
        Self {
            queue_names,
            default_queue_idx,
            on_begin,
            on_end,
            on_error_resolver,
            platform,
            debug,
            events: EventTable::new(&["begin".to_string(), "end".to_string()]),
            current: RefCell::new(None),
            stack: RefCell::new(Vec::new()),
            next_instance_id: Cell::new(0),
            next_item_id: Cell::new(0),
            next_token: Cell::new(0),
            autorun_token: Cell::new(None),
            timers: TimerHeap::new(),
            timer_expiry_token: Cell::new(None),
            debounce: RateRegistry::new(),
            throttle: RateRegistry::new(),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn current_instance(&self) -> Option<InstanceId> {
        self.current.borrow().as_ref().map(|(id, _)| *id)
    }

    fn alloc_instance_id(&self) -> InstanceId {
        let id = self.next_instance_id.get();
        self.next_instance_id.set(id + 1);
        InstanceId(id)
    }

    fn alloc_item_id(&self) -> ItemId {
        let id = self.next_item_id.get();
        self.next_item_id.set(id + 1);
        ItemId(id)
    }

    fn alloc_token(&self) -> TimerToken {
        let id = self.next_token.get();
        self.next_token.set(id + 1);
        TimerToken(id)
    }

    fn queue_idx(&self, name: &str) -> RunLoopResult<usize> {
        self.queue_names
            .iter()
            .position(|q| q == name)
            .ok_or_else(|| RunLoopError::UnknownQueue(name.to_string()))
    }

    /// Apply the `on_error` diversion policy to a fallible invocation: if
    /// a handler resolves, the error is forwarded to it and swallowed;
    /// otherwise it propagates and aborts the current pump.
    fn guard(&self, f: impl FnOnce() -> RunLoopResult<()>) -> RunLoopResult<()> {
        match f() {
            Ok(()) => Ok(()),
            Err(err) => self.divert(err),
        }
    }

    fn divert(&self, err: RunLoopError) -> RunLoopResult<()> {
        if let Some(resolver) = &self.on_error_resolver {
            if let Some(handler) = resolver() {
                let boxed: WorkError = Box::new(err);
                handler(&boxed);
                return Ok(());
            }
        }
        Err(err)
    }

    // ---- instance lifecycle ------------------------------------------------

    pub fn begin(&self) -> RunLoopResult<InstanceId> {
        let previous_id = self.current.borrow().as_ref().map(|(id, _)| *id);

        if let Some(token) = self.autorun_token.take() {
            self.platform.disarm_next_turn(token);
            // Normally an armed autorun token implies `previous_id` is
            // `Some`. It can be stale (e.g. the instance it was guarding
            // was already torn down by a direct `end()` call that bypassed
            // the autorun dispatch path) — fall through to the fresh-begin
            // path below instead of joining a nonexistent instance.
            if let Some(id) = previous_id {
                if let Some(hook) = &self.on_begin {
                    hook(id, previous_id);
                }
                tracing::trace!(instance = id.0, "begin: joined pending autorun instance");
                return Ok(id);
            }
        }

        if let Some(entry) = self.current.borrow_mut().take() {
            self.stack.borrow_mut().push(entry);
        }
        let id = self.alloc_instance_id();
        let dq = Rc::new(DeferredActionQueues::new(&self.queue_names));
        *self.current.borrow_mut() = Some((id, dq));
        self.events.fire("begin", id, previous_id)?;
        if let Some(hook) = &self.on_begin {
            hook(id, previous_id);
        }
        tracing::debug!(instance = id.0, previous = ?previous_id, "begin: opened new instance");
        Ok(id)
    }

    pub fn end(&self) -> RunLoopResult<()> {
        let Some((id, dq)) = self
            .current
            .borrow()
            .as_ref()
            .map(|(id, dq)| (*id, dq.clone()))
        else {
            return Err(RunLoopError::EndWithoutBegin);
        };

        let outcome = dq.flush(|item| self.invoke_item(item))?;
        match outcome {
            FlushOutcome::Paused => {
                let token = self.alloc_token();
                self.platform.arm_next_turn(token);
                self.autorun_token.set(Some(token));
                tracing::trace!(instance = id.0, "end: flush paused, armed resume");
                Ok(())
            }
            FlushOutcome::Drained => {
                *self.current.borrow_mut() = None;
                // This instance is gone; any autorun token still armed to
                // resume it (set by a prior paused flush) is now stale.
                if let Some(token) = self.autorun_token.take() {
                    self.platform.disarm_next_turn(token);
                }
                let next = self.stack.borrow_mut().pop();
                let next_id = next.as_ref().map(|(id, _)| *id);
                if let Some(entry) = next {
                    *self.current.borrow_mut() = Some(entry);
                }
                self.events.fire("end", id, next_id)?;
                if let Some(hook) = &self.on_end {
                    hook(id, next_id);
                }
                tracing::debug!(instance = id.0, next = ?next_id, "end: instance drained");
                Ok(())
            }
        }
    }

    fn invoke_item(&self, item: &WorkItem) -> RunLoopResult<()> {
        self.guard(|| item.run())
    }

    /// Opens an instance if none is current and arms the autorun so it
    /// flushes on the next host turn without the caller ever calling
    /// `begin`/`end` itself (spec.md §4.1 `_ensureInstance`).
    pub fn ensure_instance(&self) -> RunLoopResult<InstanceId> {
        if let Some((id, _)) = self.current.borrow().as_ref() {
            return Ok(*id);
        }
        let id = self.begin()?;
        let token = self.alloc_token();
        self.platform.arm_next_turn(token);
        self.autorun_token.set(Some(token));
        Ok(id)
    }

    // ---- immediate execution -----------------------------------------------

    pub fn run(&self, work: Work) -> RunLoopResult<()> {
        self.begin()?;
        let result = self.guard(|| work());
        self.end()?;
        result
    }

    pub fn join(&self, work: Work) -> RunLoopResult<()> {
        if self.current.borrow().is_none() {
            return self.run(work);
        }
        self.guard(|| work())
    }

    // ---- queue scheduling -------------------------------------------------

    fn schedule_with(
        &self,
        queue_idx: usize,
        work: Work,
        once_tag: Option<OnceTag>,
    ) -> RunLoopResult<Handle> {
        let dq = self
            .current
            .borrow()
            .as_ref()
            .map(|(_, dq)| dq.clone())
            .expect("schedule_with requires a current instance");
        let id = self.alloc_item_id();
        let item = WorkItem::new(work, once_tag, self.debug);
        let assigned = dq.schedule(queue_idx, id, item);
        Ok(Handle::Queued { queue_idx, id: assigned })
    }

    pub fn schedule(&self, queue: &str, work: Work) -> RunLoopResult<Handle> {
        let idx = self.queue_idx(queue)?;
        self.ensure_instance()?;
        self.schedule_with(idx, work, None)
    }

    pub fn schedule_once(&self, queue: &str, tag: OnceTag, work: Work) -> RunLoopResult<Handle> {
        let idx = self.queue_idx(queue)?;
        self.ensure_instance()?;
        self.schedule_with(idx, work, Some(tag))
    }

    #[deprecated(note = "use schedule")]
    pub fn defer(&self, queue: &str, work: Work) -> RunLoopResult<Handle> {
        self.schedule(queue, work)
    }

    #[deprecated(note = "use schedule_once")]
    pub fn defer_once(&self, queue: &str, tag: OnceTag, work: Work) -> RunLoopResult<Handle> {
        self.schedule_once(queue, tag, work)
    }

    /// Enqueues a sentinel that pulls one item at a time from `iter` and
    /// re-schedules both the pulled work and itself onto the same queue,
    /// bounding how much of a long sequence is consumed per flush pass
    /// (spec.md §1's "iterator-drain" collaborator, §4.4).
    pub fn schedule_iterable(
        self: &Rc<Self>,
        queue: &str,
        iter: impl Iterator<Item = Work> + 'static,
    ) -> RunLoopResult<Handle> {
        let idx = self.queue_idx(queue)?;
        self.ensure_instance()?;
        let iter_cell = Rc::new(RefCell::new(Box::new(iter) as Box<dyn Iterator<Item = Work>>));
        self.schedule_iterable_step(idx, iter_cell)
    }

    fn schedule_iterable_step(
        self: &Rc<Self>,
        queue_idx: usize,
        iter_cell: Rc<RefCell<Box<dyn Iterator<Item = Work>>>>,
    ) -> RunLoopResult<Handle> {
        let orchestrator = Rc::clone(self);
        let step_cell = iter_cell.clone();
        let step: Work = Rc::new(move || {
            let next = step_cell.borrow_mut().next();
            if let Some(item_work) = next {
                orchestrator.schedule_with(queue_idx, item_work, None)?;
                orchestrator.schedule_iterable_step(queue_idx, step_cell.clone())?;
            }
            Ok(())
        });
        self.schedule_with(queue_idx, step, None)
    }

    // ---- delayed execution ------------------------------------------------

    pub fn later(&self, wait: Duration, work: Work) -> Handle {
        let at = self.platform.now() + wait;
        let became_earliest = self.timers.insert(at, work.clone());
        if became_earliest {
            self.rearm_expiry_timer();
        }
        Handle::Later(work)
    }

    /// Entry point for callers that build the trailing `wait` argument
    /// dynamically instead of calling [`Self::later`] with a typed
    /// `Duration` directly (spec.md §4.5's polymorphic argument list,
    /// resolved once at this boundary per spec.md §9's design note).
    pub fn later_args(&self, args: &[LaterArg], work: Work) -> Handle {
        let parsed = args::parse_later_args(args);
        self.later(parsed.wait, work)
    }

    fn rearm_expiry_timer(&self) {
        if let Some(old) = self.timer_expiry_token.take() {
            self.platform.disarm_timeout(old);
        }
        if let Some(at) = self.timers.earliest() {
            let token = self.alloc_token();
            self.platform.arm_timeout(at, token);
            self.timer_expiry_token.set(Some(token));
        }
    }

    /// Folds every expired `later` timer into the default queue, earliest
    /// first, wrapping the fold itself in its own instance (spec.md §4.5
    /// `_runExpiredTimers`).
    fn run_expired_timers(&self) -> RunLoopResult<()> {
        self.timer_expiry_token.set(None);
        self.begin()?;
        let now = self.platform.now();
        let expired = self.timers.drain_expired(now);
        for work in expired {
            self.schedule_with(self.default_queue_idx, work, None)?;
        }
        self.rearm_expiry_timer();
        self.end()
    }

    // ---- debounce / throttle ----------------------------------------------

    pub fn debounce(
        self: &Rc<Self>,
        key: RateKey,
        wait: Duration,
        immediate: bool,
        work: Work,
    ) -> RunLoopResult<Handle> {
        let had_prior = match self.debounce.remove_by_key(key) {
            Some(token) => {
                self.platform.disarm_timeout(token);
                true
            }
            None => false,
        };
        let token = self.alloc_token();
        self.platform.arm_timeout(self.platform.now() + wait, token);
        let orchestrator = Rc::clone(self);
        let fire_work = work.clone();
        let on_fire: Work = Rc::new(move || {
            if immediate {
                Ok(())
            } else {
                orchestrator.run(fire_work.clone())
            }
        });
        self.debounce.insert(key, token, on_fire);
        if immediate && !had_prior {
            self.join(work)?;
        }
        Ok(Handle::Rate(token))
    }

    /// Entry point for callers that build the trailing `wait [, immediate]`
    /// argument dynamically (spec.md §4.6): a bare number is `wait` with
    /// `immediate` defaulting to `false` for debounce; a trailing bool
    /// overrides it.
    pub fn debounce_args(
        self: &Rc<Self>,
        key: RateKey,
        args: &[RateArg],
        work: Work,
    ) -> RunLoopResult<Handle> {
        let parsed = args::parse_rate_args(args, false);
        self.debounce(key, parsed.wait, parsed.immediate, work)
    }

    pub fn throttle(
        self: &Rc<Self>,
        key: RateKey,
        wait: Duration,
        immediate: bool,
        work: Work,
    ) -> RunLoopResult<Handle> {
        if let Some(token) = self.throttle.find(key) {
            tracing::trace!(key = key.0, "throttle: suppressed, entry already armed");
            return Ok(Handle::Rate(token));
        }
        let token = self.alloc_token();
        self.platform.arm_timeout(self.platform.now() + wait, token);
        let orchestrator = Rc::clone(self);
        let fire_work = work.clone();
        let on_fire: Work = Rc::new(move || {
            if immediate {
                Ok(())
            } else {
                orchestrator.run(fire_work.clone())
            }
        });
        self.throttle.insert(key, token, on_fire);
        if immediate {
            self.join(work)?;
        }
        Ok(Handle::Rate(token))
    }

    /// Entry point for callers that build the trailing `wait [, immediate]`
    /// argument dynamically (spec.md §4.6): a bare number is `wait` with
    /// `immediate` defaulting to `true` for throttle; a trailing bool
    /// overrides it.
    pub fn throttle_args(
        self: &Rc<Self>,
        key: RateKey,
        args: &[RateArg],
        work: Work,
    ) -> RunLoopResult<Handle> {
        let parsed = args::parse_rate_args(args, true);
        self.throttle(key, parsed.wait, parsed.immediate, work)
    }

    // ---- cancellation -------------------------------------------------------

    pub fn cancel(&self, handle: Handle) -> bool {
        match handle {
            Handle::Later(work) => match self.timers.cancel(&work) {
                Some(head_changed) => {
                    if head_changed {
                        self.rearm_expiry_timer();
                    }
                    true
                }
                None => false,
            },
            Handle::Rate(token) => {
                if self.throttle.remove_by_token(token).is_some() {
                    self.platform.disarm_timeout(token);
                    return true;
                }
                if self.debounce.remove_by_token(token).is_some() {
                    self.platform.disarm_timeout(token);
                    return true;
                }
                false
            }
            Handle::Queued { queue_idx, id } => self
                .current
                .borrow()
                .as_ref()
                .map(|(_, dq)| dq.cancel(queue_idx, id))
                .unwrap_or(false),
        }
    }

    /// Clears every registry and the timer heap, disarms the single expiry
    /// timer and the autorun, but does NOT touch queued items (spec.md §9
    /// Open Question (a): preserved as documented behavior).
    pub fn cancel_timers(&self) {
        for token in self.throttle.clear() {
            self.platform.disarm_timeout(token);
        }
        for token in self.debounce.clear() {
            self.platform.disarm_timeout(token);
        }
        self.timers.clear();
        if let Some(token) = self.timer_expiry_token.take() {
            self.platform.disarm_timeout(token);
        }
        if let Some(token) = self.autorun_token.take() {
            self.platform.disarm_next_turn(token);
        }
        tracing::warn!("cancel_timers: cleared all timers, debounce, throttle, and autorun");
    }

    pub fn has_timers(&self) -> bool {
        !self.timers.is_empty()
            || !self.debounce.is_empty()
            || !self.throttle.is_empty()
            || self.autorun_token.get().is_some()
    }

    // ---- event subscription -----------------------------------------------

    pub fn on(&self, name: &str, callback: EventCallback) -> RunLoopResult<()> {
        self.events.on(name, callback)
    }

    pub fn off(&self, name: &str, callback: &EventCallback) -> RunLoopResult<()> {
        self.events.off(name, callback)
    }

    // ---- host pump ---------------------------------------------------------

    /// Drains whatever host wakeups have fired since the last call and
    /// dispatches each to the right internal handler. Hosts call this after
    /// observing their own event-loop tick (spec.md §2's "control flow").
    pub fn pump(&self) -> RunLoopResult<()> {
        for token in self.platform.poll_fired() {
            self.dispatch_token(token)?;
        }
        Ok(())
    }

    fn dispatch_token(&self, token: TimerToken) -> RunLoopResult<()> {
        if self.autorun_token.get() == Some(token) {
            self.autorun_token.set(None);
            return self.end();
        }
        if self.timer_expiry_token.get() == Some(token) {
            return self.run_expired_timers();
        }
        if let Some((_, on_fire)) = self.debounce.remove_by_token(token) {
            return on_fire();
        }
        if let Some((_, on_fire)) = self.throttle.remove_by_token(token) {
            return on_fire();
        }
        Ok(())
    }
}
