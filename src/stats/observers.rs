use super::types::{Collector, Notification, NotificationKind};
use crate::sim::{EntityId, SimTime};
use std::fmt;

/// Fan-out of notifications to the registered collectors.
///
/// While capturing is on, emitted notifications are also buffered so a
/// stepping controller can read the deltas of the last step.
#[derive(Default)]
pub struct Observers {
    sinks: Vec<Box<dyn Collector>>,
    capture: bool,
    captured: Vec<Notification>,
}

impl Observers {
    pub fn add(&mut self, sink: Box<dyn Collector>) -> usize {
        self.sinks.push(sink);
        self.sinks.len() - 1
    }

    pub fn get<T: Collector>(&self, idx: usize) -> Option<&T> {
        self.sinks.get(idx)?.as_any().downcast_ref::<T>()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn emit(&mut self, n: Notification) {
        for sink in self.sinks.iter_mut() {
            sink.notify(&n);
        }
        if self.capture {
            self.captured.push(n);
        }
    }

    pub fn observe(&mut self, time: SimTime, collector: String, value: f64, entity: Option<EntityId>) {
        self.emit(Notification {
            time,
            collector,
            kind: NotificationKind::Observe,
            value,
            entity,
        });
    }

    pub fn count(&mut self, time: SimTime, collector: String, delta: f64, entity: Option<EntityId>) {
        self.emit(Notification {
            time,
            collector,
            kind: NotificationKind::Count,
            value: delta,
            entity,
        });
    }

    pub fn warmup_reset(&mut self, at: SimTime) {
        for sink in self.sinks.iter_mut() {
            sink.warmup_reset(at);
        }
    }

    pub(crate) fn set_capture(&mut self, on: bool) {
        self.capture = on;
        if !on {
            self.captured.clear();
        }
    }

    pub(crate) fn take_captured(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.captured)
    }

    pub(crate) fn absorb(&mut self, other: Observers) {
        self.sinks.extend(other.sinks);
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("sinks", &self.sinks.len())
            .field("capture", &self.capture)
            .finish()
    }
}
