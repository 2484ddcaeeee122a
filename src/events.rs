//! Synchronous `begin`/`end` lifecycle event table.
//!
//! A small synchronous pub/sub facility layered on top of the run loop's
//! own instance events; callbacks fire in registration order and a lookup
//! by an unregistered event name is a caller error rather than a silent
//! no-op, so hosts notice a typo in an event name immediately instead of
//! losing the callback forever. Unlike `work_item::Work`, listeners here
//! are typed to one payload shape: `(current, previous)` instance ids.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{RunLoopError, RunLoopResult};
use crate::orchestrator::InstanceId;

pub type EventCallback = Rc<dyn Fn(InstanceId, Option<InstanceId>) -> RunLoopResult<()>>;

struct Listener {
    name: String,
    callback: EventCallback,
}

/// Table of named events, each with an ordered list of listeners. This
/// orchestrator only ever registers `"begin"` and `"end"`.
pub struct EventTable {
    events: Vec<String>,
    listeners: RefCell<Vec<Listener>>,
}

impl EventTable {
    pub fn new(events: &[String]) -> Self {
        Self {
            events: events.to_vec(),
            listeners: RefCell::new(Vec::new()),
        }
    }

    fn known(&self, name: &str) -> bool {
        self.events.iter().any(|e| e == name)
    }

    /// Register `callback` under `name`. Errors if `name` isn't one of the
    /// events this table was constructed with.
    pub fn on(&self, name: &str, callback: EventCallback) -> RunLoopResult<()> {
        if !self.known(name) {
            return Err(RunLoopError::UnknownEvent(name.to_string()));
        }
        self.listeners.borrow_mut().push(Listener {
            name: name.to_string(),
            callback,
        });
        Ok(())
    }

    /// Remove every listener registered under `name` whose callback is the
    /// same `Rc` identity as `callback`. Errors if `name` isn't known, or if
    /// `callback` was never registered under it (spec.md §4.8: unsubscribing
    /// an unregistered callback is a caller error, not a silent no-op).
    pub fn off(&self, name: &str, callback: &EventCallback) -> RunLoopResult<()> {
        if !self.known(name) {
            return Err(RunLoopError::UnknownEvent(name.to_string()));
        }
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| !(l.name == name && Rc::ptr_eq(&l.callback, callback)));
        if listeners.len() == before {
            return Err(RunLoopError::UnknownCallback(name.to_string()));
        }
        Ok(())
    }

    /// Fire every listener registered under `name`, in registration order.
    /// Stops and propagates the first error.
    pub fn fire(
        &self,
        name: &str,
        current: InstanceId,
        previous: Option<InstanceId>,
    ) -> RunLoopResult<()> {
        let callbacks: Vec<EventCallback> = self
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.name == name)
            .map(|l| l.callback.clone())
            .collect();
        for callback in callbacks {
            callback(current, previous)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    #[test]
    fn fires_in_registration_order_with_instance_ids() {
        let table = EventTable::new(&["begin".to_string()]);
        let log = Rc::new(StdRefCell::new(Vec::new()));
        let log_a = log.clone();
        table
            .on(
                "begin",
                Rc::new(move |current, previous| {
                    log_a.borrow_mut().push(("a", current, previous));
                    Ok(())
                }),
            )
            .unwrap();
        let log_b = log.clone();
        table
            .on(
                "begin",
                Rc::new(move |current, previous| {
                    log_b.borrow_mut().push(("b", current, previous));
                    Ok(())
                }),
            )
            .unwrap();
        table.fire("begin", InstanceId(2), Some(InstanceId(1))).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                ("a", InstanceId(2), Some(InstanceId(1))),
                ("b", InstanceId(2), Some(InstanceId(1))),
            ]
        );
    }

    #[test]
    fn unknown_event_is_an_error() {
        let table = EventTable::new(&["begin".to_string()]);
        assert!(table.on("nope", Rc::new(|_, _| Ok(()))).is_err());
        assert!(table.fire("nope", InstanceId(1), None).is_err());
    }

    #[test]
    fn off_removes_only_matching_callback() {
        let table = EventTable::new(&["end".to_string()]);
        let log = Rc::new(StdRefCell::new(Vec::new()));
        let log_a = log.clone();
        let cb_a: EventCallback = Rc::new(move |_, _| {
            log_a.borrow_mut().push("a");
            Ok(())
        });
        let log_b = log.clone();
        let cb_b: EventCallback = Rc::new(move |_, _| {
            log_b.borrow_mut().push("b");
            Ok(())
        });
        table.on("end", cb_a.clone()).unwrap();
        table.on("end", cb_b).unwrap();
        table.off("end", &cb_a).unwrap();
        table.fire("end", InstanceId(1), None).unwrap();
        assert_eq!(*log.borrow(), vec!["b"]);
    }

    #[test]
    fn off_of_unregistered_callback_is_an_error() {
        let table = EventTable::new(&["begin".to_string()]);
        let never_registered: EventCallback = Rc::new(|_, _| Ok(()));
        assert!(matches!(
            table.off("begin", &never_registered),
            Err(RunLoopError::UnknownCallback(_))
        ));
    }
}
