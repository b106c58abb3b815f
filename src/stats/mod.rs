//! Collector interface
//!
//! The core never computes statistics itself. Resource primitives and model
//! handlers emit [`Notification`]s; collectors are passive sinks that receive
//! them in dispatch order and may be reset once at the end of the warmup
//! period.

mod observers;
mod series;
mod types;

pub use observers::Observers;
pub use series::{Counters, TimeAverage};
pub use types::{Collector, Notification, NotificationKind, TraceLog};
