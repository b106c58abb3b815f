//! Error types.

use super::event::EventHandle;
use super::id::{NodeId, RequestId, ResourceId};
use super::time::SimTime;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Scheduling before the current time, or at a non-finite time.
    #[error("cannot schedule at {at}: clock is at {now}")]
    InvalidTime { at: SimTime, now: SimTime },
    #[error("invalid duration {0}")]
    InvalidDuration(f64),
    #[error("{what} rate must be positive and finite, got {rate}")]
    InvalidRate { what: &'static str, rate: f64 },
    /// Reparenting a node that already belongs to a hierarchy.
    #[error("{0} is already composed into a tree")]
    AlreadyComposed(NodeId),
    /// A primitive tried to grant beyond its capacity. Always a bug.
    #[error("{resource}: grant would exceed capacity {capacity}")]
    CapacityExceeded { resource: String, capacity: usize },
    #[error("{0:?} was not issued by this queue")]
    UnknownHandle(EventHandle),
    #[error("stop condition unreachable: {0}")]
    StopConditionUnreachable(String),
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("{node} has no handler for event kind `{kind}`")]
    NoHandler { node: NodeId, kind: &'static str },
    #[error("unknown resource {0}")]
    UnknownResource(ResourceId),
    #[error("{resource} does not support `{op}`")]
    Unsupported { resource: String, op: &'static str },
    #[error("{request} is not held at {resource}")]
    NotHeld { resource: String, request: RequestId },
    #[error("{request} is not waiting at {resource}")]
    NotWaiting { resource: String, request: RequestId },
    #[error("{0} has no free capacity")]
    NoFreeCapacity(String),
    #[error("capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),
    #[error("cannot graft a tree with requests in flight ({0})")]
    SubtreeBusy(String),
    /// Raised by model handlers for their own failures.
    #[error("handler failed: {0}")]
    Handler(String),
}
