//! Waiting lines.
//!
//! A line orders its entries by `(class, sequence)`: the class is the entry's
//! priority under [`Discipline::Priority`] and `0` otherwise. Tail inserts
//! take increasing sequence numbers and head inserts decreasing ones, so a
//! re-queued entry goes in front of everything in its class.

use crate::sim::SimTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Order in which a line serves its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    /// Arrival order.
    Fifo,
    /// Priority value (lower first), then arrival order.
    Priority,
    /// Arrival order, but a freed channel is never filled automatically:
    /// an external controller picks the next request.
    Manual,
}

/// An entry sitting in a line.
#[derive(Debug, Clone, PartialEq)]
pub struct Waiting<T> {
    pub item: T,
    pub priority: i32,
    pub entered: SimTime,
}

#[derive(Debug, Clone)]
pub struct WaitQueue<T> {
    discipline: Discipline,
    /// 0 means unbounded.
    capacity: usize,
    entries: BTreeMap<(i32, i64), Waiting<T>>,
    back: i64,
    front: i64,
}

impl<T> WaitQueue<T> {
    pub fn new(discipline: Discipline) -> Self {
        Self::with_capacity(discipline, 0)
    }

    pub fn with_capacity(discipline: Discipline, capacity: usize) -> Self {
        Self {
            discipline,
            capacity,
            entries: BTreeMap::new(),
            back: 0,
            front: -1,
        }
    }

    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.capacity != 0 && self.entries.len() >= self.capacity
    }

    fn class(&self, priority: i32) -> i32 {
        match self.discipline {
            Discipline::Priority => priority,
            Discipline::Fifo | Discipline::Manual => 0,
        }
    }

    /// Append an entry; a full line hands the item back.
    pub fn push(&mut self, item: T, priority: i32, now: SimTime) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        self.push_unbounded(item, priority, now);
        Ok(())
    }

    /// Append an entry regardless of the capacity limit.
    pub fn push_unbounded(&mut self, item: T, priority: i32, now: SimTime) {
        self.insert_back(Waiting {
            item,
            priority,
            entered: now,
        });
    }

    fn insert_back(&mut self, w: Waiting<T>) {
        let key = (self.class(w.priority), self.back);
        self.back += 1;
        self.entries.insert(key, w);
    }

    /// Put an entry at the head of its class. Ignores the capacity limit.
    pub fn push_front(&mut self, item: T, priority: i32, now: SimTime) {
        let key = (self.class(priority), self.front);
        self.front -= 1;
        self.entries.insert(
            key,
            Waiting {
                item,
                priority,
                entered: now,
            },
        );
    }

    pub fn pop(&mut self) -> Option<Waiting<T>> {
        self.entries.pop_first().map(|(_, w)| w)
    }

    pub fn peek(&self) -> Option<&Waiting<T>> {
        self.entries.first_key_value().map(|(_, w)| w)
    }

    /// Remove the first entry (in service order) matching `pred`.
    pub fn remove_by(&mut self, mut pred: impl FnMut(&T) -> bool) -> Option<Waiting<T>> {
        let key = *self
            .entries
            .iter()
            .find(|(_, w)| pred(&w.item))
            .map(|(k, _)| k)?;
        self.entries.remove(&key)
    }

    /// Give the first entry matching `pred` a new priority. It keeps its
    /// entry time and goes behind the entries already in its new class.
    pub fn reprioritize(&mut self, pred: impl FnMut(&T) -> bool, priority: i32) -> bool {
        match self.remove_by(pred) {
            Some(mut w) => {
                w.priority = priority;
                self.insert_back(w);
                true
            }
            None => false,
        }
    }

    /// Entries in service order.
    pub fn iter(&self) -> impl Iterator<Item = &Waiting<T>> {
        self.entries.values()
    }

    pub fn clear(&mut self) -> Vec<Waiting<T>> {
        std::mem::take(&mut self.entries).into_values().collect()
    }
}
