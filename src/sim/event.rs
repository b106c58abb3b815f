//! Events.
//!
//! An event is plain data: when it fires, which node it targets and what kind
//! it is. The behaviour lives in the handler registered for `(node, kind)`.

use super::id::{NodeId, RequestId, ResourceId, TreeId};
use super::time::SimTime;
use serde::Serialize;
use std::any::Any;
use std::fmt;

/// Default priority for model events.
pub const DEFAULT_PRIORITY: i32 = 0;

/// Priority of resource completions and of the follow-up events they raise.
///
/// Lower is more urgent, so at equal time a release is processed before any
/// arrival that was already queued for that instant.
pub const RELEASE_PRIORITY: i32 = i32::MIN;

/// What an event does when dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// A model event, routed to the handler the target node registered for
    /// this name.
    Named { name: &'static str },
    /// Service completion of a granted request.
    Completion {
        resource: ResourceId,
        request: RequestId,
    },
}

impl EventKind {
    pub const fn named(name: &'static str) -> EventKind {
        EventKind::Named { name }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Named { name } => name,
            EventKind::Completion { .. } => "completion",
        }
    }
}

impl From<&'static str> for EventKind {
    fn from(name: &'static str) -> Self {
        EventKind::Named { name }
    }
}

/// Opaque event payload.
#[derive(Default)]
pub struct Payload(Option<Box<dyn Any>>);

impl Payload {
    pub fn none() -> Payload {
        Payload(None)
    }

    pub fn new<T: Any>(value: T) -> Payload {
        Payload(Some(Box::new(value)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.0.as_ref()?.downcast_ref::<T>()
    }

    /// Take the value out if it has type `T`; otherwise the payload is left
    /// untouched.
    pub fn take<T: Any>(&mut self) -> Option<T> {
        let boxed = self.0.take()?;
        match boxed.downcast::<T>() {
            Ok(v) => Some(*v),
            Err(other) => {
                self.0 = Some(other);
                None
            }
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Payload(..)"),
            None => f.write_str("Payload(None)"),
        }
    }
}

/// A scheduled event as seen by its handler.
#[derive(Debug)]
pub struct Event {
    pub time: SimTime,
    pub priority: i32,
    pub seq: u64,
    pub kind: EventKind,
    pub target: NodeId,
    pub payload: Payload,
}

/// Handle for cancelling a pending event.
///
/// A handle names a slot in the issuing queue together with the slot's
/// generation, so a handle to an event that already left the queue can never
/// hit a newer event reusing the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EventHandle {
    pub(crate) queue: TreeId,
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

/// Record of one dispatched event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dispatched {
    pub time: SimTime,
    pub priority: i32,
    pub seq: u64,
    pub kind: EventKind,
    pub target: NodeId,
    pub decision: bool,
}
