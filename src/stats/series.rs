//! Small built-in collectors.

use super::types::{Collector, Notification, NotificationKind};
use crate::sim::SimTime;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;

/// Time-weighted mean of one observed level, e.g. `<server>.queue_len`.
#[derive(Debug, Clone, Serialize)]
pub struct TimeAverage {
    key: String,
    start: SimTime,
    last_time: SimTime,
    last_value: f64,
    area: f64,
}

impl TimeAverage {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            start: SimTime::ZERO,
            last_time: SimTime::ZERO,
            last_value: 0.0,
            area: 0.0,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn current(&self) -> f64 {
        self.last_value
    }

    /// Mean over `[start, now]`, where `start` is zero or the warmup time.
    pub fn mean(&self, now: SimTime) -> f64 {
        let span = now.since(self.start);
        if span <= 0.0 {
            return self.last_value;
        }
        let area = self.area + self.last_value * now.since(self.last_time);
        area / span
    }
}

impl Collector for TimeAverage {
    fn notify(&mut self, n: &Notification) {
        if n.kind != NotificationKind::Observe || n.collector != self.key {
            return;
        }
        self.area += self.last_value * n.time.since(self.last_time);
        self.last_time = n.time;
        self.last_value = n.value;
    }

    // the level carries over the reset; only the accumulated area is dropped
    fn warmup_reset(&mut self, at: SimTime) {
        self.area = 0.0;
        self.start = at;
        self.last_time = at;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Sums of every `Count` notification, by collector key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Counters {
    totals: BTreeMap<String, f64>,
}

impl Counters {
    pub fn get(&self, key: &str) -> f64 {
        self.totals.get(key).copied().unwrap_or(0.0)
    }

    pub fn totals(&self) -> &BTreeMap<String, f64> {
        &self.totals
    }
}

impl Collector for Counters {
    fn notify(&mut self, n: &Notification) {
        if n.kind == NotificationKind::Count {
            *self.totals.entry(n.collector.clone()).or_default() += n.value;
        }
    }

    fn warmup_reset(&mut self, _at: SimTime) {
        self.totals.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
