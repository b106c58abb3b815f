//! Clock and event queue of one simulation tree.

use super::error::SimError;
use super::event::{Event, EventHandle, EventKind, Payload};
use super::id::{NodeId, TreeId};
use super::queue::EventQueue;
use super::time::SimTime;
use tracing::{debug, trace};

/// Owns the tree's clock and pending events. Every node of a tree schedules
/// through the root's `Simulator`.
#[derive(Debug)]
pub struct Simulator {
    now: SimTime,
    queue: EventQueue,
    dispatched: u64,
}

impl Simulator {
    pub fn new(tree: TreeId) -> Self {
        Self {
            now: SimTime::ZERO,
            queue: EventQueue::new(tree),
            dispatched: 0,
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Number of events dispatched so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queue an event for `target` at `at`.
    #[tracing::instrument(level = "trace", skip(self, payload), fields(now = %self.now))]
    pub fn schedule(
        &mut self,
        at: SimTime,
        priority: i32,
        kind: EventKind,
        payload: Payload,
        target: NodeId,
    ) -> Result<EventHandle, SimError> {
        if !at.is_valid() || at < self.now {
            return Err(SimError::InvalidTime { at, now: self.now });
        }
        // normalise -0.0
        let at = SimTime(at.0 + 0.0);
        let handle = self.queue.push(Event {
            time: at,
            priority,
            seq: 0,
            kind,
            target,
            payload,
        });
        debug!(queue_size = self.queue.len(), "event scheduled");
        Ok(handle)
    }

    pub fn cancel(&mut self, handle: EventHandle) -> Result<bool, SimError> {
        self.queue.cancel(handle)
    }

    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.queue.is_pending(handle)
    }

    pub fn peek_time(&mut self) -> Option<SimTime> {
        self.queue.peek_time()
    }

    /// Pop the next event and move the clock to its time.
    pub(crate) fn advance(&mut self) -> Option<Event> {
        let ev = self.queue.pop_next()?;
        debug_assert!(ev.time >= self.now, "event queue went backwards");
        self.now = ev.time;
        self.dispatched += 1;
        trace!(now = %self.now, seq = ev.seq, remaining = self.queue.len(), "advance");
        Some(ev)
    }

    pub(crate) fn drain(&mut self) -> Vec<Event> {
        self.queue.drain()
    }
}
