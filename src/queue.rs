//! A single named phase of one flush.
//!
//! Every method takes `&self`: a queue's items live behind a `RefCell` so
//! that a running work item can schedule more work into the *same* queue
//! it's currently being drained from without needing a `&mut` re-borrow.
//! `drain` only ever holds that `RefCell` for the instant it takes to peek
//! or remove an entry — never while a work item's closure is actually
//! executing — so the closure is free to call back into `push`/`cancel`
//! on this same queue.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RunLoopResult;
use crate::work_item::{OnceTag, WorkItem};

/// Unique id assigned to every scheduled item (regardless of `once`), used
/// to support O(n) cancellation that preserves the order of what remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(pub u64);

enum Entry {
    Item(ItemId, Rc<WorkItem>),
    /// A yield point: reaching it pauses the flush, leaving everything
    /// after it in place. Lets a render-style queue defer to the host
    /// before continuing.
    Pause,
}

enum Peek {
    Item(Rc<WorkItem>),
    Pause,
}

/// Outcome of draining a queue to completion or to its first pause point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Paused,
    Drained,
}

/// Ordered buffer of pending work for one named phase.
pub struct Queue {
    name: String,
    items: RefCell<Vec<Entry>>,
    once_index: RefCell<HashMap<OnceTag, usize>>,
    id_index: RefCell<HashMap<ItemId, usize>>,
}

impl Queue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: RefCell::new(Vec::new()),
            once_index: RefCell::new(HashMap::new()),
            id_index: RefCell::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Enqueue `item` with a fresh identity. If the item carries a
    /// `once_tag` already present in this queue, its closure replaces the
    /// existing one in place and the existing item's id is returned
    /// instead of creating a new entry.
    pub fn push(&self, id: ItemId, item: WorkItem) -> ItemId {
        if let Some(tag) = item.once_tag {
            if let Some(&idx) = self.once_index.borrow().get(&tag) {
                let mut items = self.items.borrow_mut();
                if let Entry::Item(existing_id, slot) = &mut items[idx] {
                    *slot = Rc::new(item);
                    return *existing_id;
                }
            }
        }
        let mut items = self.items.borrow_mut();
        let idx = items.len();
        if let Some(tag) = item.once_tag {
            self.once_index.borrow_mut().insert(tag, idx);
        }
        self.id_index.borrow_mut().insert(id, idx);
        items.push(Entry::Item(id, Rc::new(item)));
        id
    }

    /// Insert a pause marker at the tail of the queue.
    pub fn push_pause(&self) {
        self.items.borrow_mut().push(Entry::Pause);
    }

    /// Remove a still-pending item by id, preserving the order of what
    /// remains. Returns `true` if found.
    pub fn cancel(&self, id: ItemId) -> bool {
        let idx = self.id_index.borrow_mut().remove(&id);
        match idx {
            Some(idx) => {
                self.items.borrow_mut().remove(idx);
                self.reindex();
                true
            }
            None => false,
        }
    }

    fn peek(&self, i: usize) -> Option<Peek> {
        let items = self.items.borrow();
        items.get(i).map(|entry| match entry {
            Entry::Pause => Peek::Pause,
            Entry::Item(_, item) => Peek::Item(item.clone()),
        })
    }

    /// Drain every item FIFO, invoking `run` for each. `run` is expected to
    /// already apply the orchestrator's `on_error` policy: returning `Err`
    /// aborts the drain, leaving not-yet-run items in place. A policy where
    /// the pump continues past a failing item is implemented by `run`
    /// itself never returning `Err` in that mode.
    pub fn drain(
        &self,
        mut run: impl FnMut(&WorkItem) -> RunLoopResult<()>,
    ) -> RunLoopResult<FlushOutcome> {
        let mut i = 0;
        while let Some(peek) = self.peek(i) {
            match peek {
                Peek::Pause => {
                    self.items.borrow_mut().drain(0..=i);
                    self.reindex();
                    return Ok(FlushOutcome::Paused);
                }
                Peek::Item(item) => {
                    if let Err(err) = run(&item) {
                        self.items.borrow_mut().drain(0..=i);
                        self.reindex();
                        return Err(err);
                    }
                    i += 1;
                }
            }
        }
        self.items.borrow_mut().clear();
        self.once_index.borrow_mut().clear();
        self.id_index.borrow_mut().clear();
        Ok(FlushOutcome::Drained)
    }

    fn reindex(&self) {
        let items = self.items.borrow();
        let mut once_index = self.once_index.borrow_mut();
        let mut id_index = self.id_index.borrow_mut();
        once_index.clear();
        id_index.clear();
        for (idx, entry) in items.iter().enumerate() {
            if let Entry::Item(id, item) = entry {
                id_index.insert(*id, idx);
                if let Some(tag) = item.once_tag {
                    once_index.insert(tag, idx);
                }
            }
        }
    }
}
