//! Simulation core
//!
//! Time, events, the event queue and clock, simulation trees and the run loop.

mod config;
mod context;
mod engine;
mod error;
mod event;
mod id;
mod kernel;
mod node;
mod queue;
mod rng;
mod scheduled_event;
mod simulation;
mod simulator;
mod time;

pub use config::{ConfigError, SimConfig};
pub use context::Ctx;
pub use engine::{RunSummary, StopCondition, StopReason};
pub use error::SimError;
pub use event::{
    DEFAULT_PRIORITY, Dispatched, Event, EventHandle, EventKind, Payload, RELEASE_PRIORITY,
};
pub use id::{EntityId, NodeId, RequestId, ResourceId, TreeId};
pub use kernel::{Kernel, Snapshot};
pub use node::{Handler, Node};
pub use queue::EventQueue;
pub use rng::SimRng;
pub use simulation::Simulation;
pub use simulator::Simulator;
pub use time::SimTime;
