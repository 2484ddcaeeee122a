//! Fixed, ordered collection of [`Queue`]s and the multi-pass flush
//! algorithm that pumps them.

use crate::error::RunLoopResult;
use crate::queue::{FlushOutcome, ItemId, Queue};
use crate::work_item::WorkItem;

/// An ordered, immutable-at-construction sequence of named queues.
pub struct DeferredActionQueues {
    queues: Vec<Queue>,
}

impl DeferredActionQueues {
    pub fn new(queue_names: &[String]) -> Self {
        Self {
            queues: queue_names.iter().map(Queue::new).collect(),
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.queues.iter().position(|q| q.name() == name)
    }

    pub fn schedule(&self, queue_idx: usize, id: ItemId, item: WorkItem) -> ItemId {
        self.queues[queue_idx].push(id, item)
    }

    pub fn push_pause(&self, queue_idx: usize) {
        self.queues[queue_idx].push_pause();
    }

    pub fn cancel(&self, queue_idx: usize, id: ItemId) -> bool {
        self.queues[queue_idx].cancel(id)
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(Queue::is_empty)
    }

    fn first_nonempty_before(&self, before: usize) -> Option<usize> {
        self.queues[..before].iter().position(|q| !q.is_empty())
    }

    /// Pump every queue in declared order. If a queue's drain schedules new
    /// work into an earlier queue, the cursor resets to that earlier index
    /// before proceeding. Returns [`FlushOutcome::Paused`] the instant any
    /// queue yields, leaving everything else untouched so the caller can
    /// resume later.
    pub fn flush(
        &self,
        mut run: impl FnMut(&WorkItem) -> RunLoopResult<()>,
    ) -> RunLoopResult<FlushOutcome> {
        let mut i = 0;
        while i < self.queues.len() {
            if self.queues[i].is_empty() {
                i += 1;
                continue;
            }
            match self.queues[i].drain(&mut run) {
                Ok(FlushOutcome::Paused) => return Ok(FlushOutcome::Paused),
                Ok(FlushOutcome::Drained) => {}
                Err(err) => return Err(err),
            }
            match self.first_nonempty_before(i) {
                Some(reset_to) => i = reset_to,
                None => i += 1,
            }
        }
        Ok(FlushOutcome::Drained)
    }
}
