use crate::sim::{EntityId, SimTime};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

/// How a collector should read a notification's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A sampled value (tallies, time-weighted series).
    Observe,
    /// A counter increment.
    Count,
}

/// One observation emitted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub time: SimTime,
    /// Collector key, `<resource>.<metric>` for primitives.
    pub collector: String,
    pub kind: NotificationKind,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityId>,
}

/// A passive sink for notifications.
pub trait Collector: Any {
    fn notify(&mut self, n: &Notification);

    /// Called once when the clock first reaches the warmup threshold.
    fn warmup_reset(&mut self, _at: SimTime) {}

    fn as_any(&self) -> &dyn Any;
}

/// Keeps every notification in memory; can dump them as JSON.
#[derive(Debug, Default, Clone, Serialize)]
pub struct TraceLog {
    pub entries: Vec<Notification>,
    /// Time of the warmup reset, if it happened.
    pub warmup_at: Option<SimTime>,
}

impl TraceLog {
    pub fn for_collector<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Notification> + 'a {
        self.entries.iter().filter(move |n| n.collector == key)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let f = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(f), &self.entries)?;
        Ok(())
    }
}

impl Collector for TraceLog {
    fn notify(&mut self, n: &Notification) {
        self.entries.push(n.clone());
    }

    // The log is a raw trace: it records the reset point but keeps entries.
    fn warmup_reset(&mut self, at: SimTime) {
        self.warmup_at = Some(at);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
