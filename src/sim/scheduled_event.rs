//! Heap entry
//!
//! Ordering key of a pending event: time, then priority, then insertion
//! sequence. The event itself lives in the queue's slot arena.

use super::time::SimTime;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ScheduledEvent {
    pub(crate) at: SimTime,
    pub(crate) priority: i32,
    pub(crate) seq: u64,
    pub(crate) slot: u32,
}

impl ScheduledEvent {
    fn key(&self) -> (SimTime, i32, u64) {
        (self.at, self.priority, self.seq)
    }
}

// BinaryHeap is a max-heap; reverse so the earliest key is on top.
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key()).reverse()
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ScheduledEvent {}
