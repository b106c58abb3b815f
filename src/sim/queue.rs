//! Event queue
//!
//! A binary heap of ordering keys over an arena of event slots. Cancellation
//! only flips the slot's state; the stale heap entry is discarded when it
//! reaches the top.

use super::error::SimError;
use super::event::{Event, EventHandle};
use super::id::TreeId;
use super::scheduled_event::ScheduledEvent;
use super::time::SimTime;
use std::collections::BinaryHeap;
use tracing::trace;

#[derive(Debug)]
enum SlotState {
    Vacant,
    Pending(Event),
    Cancelled,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    state: SlotState,
}

/// Priority-ordered pending events with O(log n) insert and extract-min.
#[derive(Debug)]
pub struct EventQueue {
    id: TreeId,
    heap: BinaryHeap<ScheduledEvent>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_seq: u64,
    live: usize,
}

impl EventQueue {
    pub fn new(id: TreeId) -> Self {
        Self {
            id,
            heap: BinaryHeap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            next_seq: 0,
            live: 0,
        }
    }

    /// Number of live (not cancelled) pending events.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Insert an event. The queue assigns its sequence number; time
    /// validation against the clock is the caller's job.
    pub fn push(&mut self, mut event: Event) -> EventHandle {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        event.seq = seq;

        let at = event.time;
        let priority = event.priority;
        let slot = match self.free.pop() {
            Some(i) => {
                self.slots[i as usize].state = SlotState::Pending(event);
                i
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    state: SlotState::Pending(event),
                });
                (self.slots.len() - 1) as u32
            }
        };
        self.heap.push(ScheduledEvent {
            at,
            priority,
            seq,
            slot,
        });
        self.live += 1;
        trace!(seq, slot, live = self.live, "event queued");

        EventHandle {
            queue: self.id,
            slot,
            generation: self.slots[slot as usize].generation,
        }
    }

    /// Cancel a pending event. Returns `Ok(true)` if the event was still
    /// pending, `Ok(false)` if it had already been dispatched or cancelled.
    pub fn cancel(&mut self, handle: EventHandle) -> Result<bool, SimError> {
        if handle.queue != self.id {
            return Err(SimError::UnknownHandle(handle));
        }
        let slot = self
            .slots
            .get_mut(handle.slot as usize)
            .ok_or(SimError::UnknownHandle(handle))?;
        if slot.generation != handle.generation {
            return Ok(false);
        }
        match slot.state {
            SlotState::Pending(_) => {
                slot.state = SlotState::Cancelled;
                self.live -= 1;
                trace!(slot = handle.slot, live = self.live, "event cancelled");
                Ok(true)
            }
            SlotState::Cancelled | SlotState::Vacant => Ok(false),
        }
    }

    /// True while the event behind `handle` has neither fired nor been
    /// cancelled.
    pub fn is_pending(&self, handle: EventHandle) -> bool {
        handle.queue == self.id
            && self.slots.get(handle.slot as usize).is_some_and(|s| {
                s.generation == handle.generation && matches!(s.state, SlotState::Pending(_))
            })
    }

    /// Time of the earliest live event, discarding cancelled entries on top.
    pub fn peek_time(&mut self) -> Option<SimTime> {
        loop {
            let top = *self.heap.peek()?;
            if matches!(self.slots[top.slot as usize].state, SlotState::Pending(_)) {
                return Some(top.at);
            }
            self.heap.pop();
            self.release_slot(top.slot);
        }
    }

    /// Remove and return the earliest live event.
    pub fn pop_next(&mut self) -> Option<Event> {
        while let Some(top) = self.heap.pop() {
            let state = std::mem::replace(
                &mut self.slots[top.slot as usize].state,
                SlotState::Vacant,
            );
            self.release_slot(top.slot);
            if let SlotState::Pending(event) = state {
                self.live -= 1;
                return Some(event);
            }
        }
        None
    }

    /// Remove every live event in dispatch order.
    pub(crate) fn drain(&mut self) -> Vec<Event> {
        let mut out = Vec::with_capacity(self.live);
        while let Some(ev) = self.pop_next() {
            out.push(ev);
        }
        out
    }

    fn release_slot(&mut self, slot: u32) {
        let s = &mut self.slots[slot as usize];
        s.state = SlotState::Vacant;
        s.generation = s.generation.wrapping_add(1);
        self.free.push(slot);
    }
}
