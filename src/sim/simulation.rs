//! Simulation trees.
//!
//! A [`Simulation`] is the root of a tree: it owns the [`Kernel`] every node
//! of the tree delegates to, plus the run configuration. Model code builds the
//! tree here (nodes, handlers, primitives, collectors) and then drives it with
//! [`run`](Simulation::run) or [`step`](Simulation::step).

use super::config::SimConfig;
use super::context::Ctx;
use super::error::SimError;
use super::event::Event;
use super::id::{NodeId, ResourceId};
use super::kernel::Kernel;
use crate::resource::{
    Discipline, Primitive, Queue, Resource, ResourcePool, SelectionPolicy, Server, ServiceTime,
};
use crate::stats::Collector;
use std::any::Any;
use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use tracing::{debug, info};

pub struct Simulation {
    pub(crate) kernel: Kernel,
    root: NodeId,
    config: SimConfig,
    pub(crate) warmup_done: bool,
    pub(crate) decision_kinds: HashSet<&'static str>,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        let mut kernel = Kernel::new(config.seed);
        let root = kernel.add_node(&config.name, None);
        debug!(tree = kernel.tree().0, seed = config.seed, "simulation created");
        Self {
            kernel,
            root,
            config,
            warmup_done: false,
            decision_kinds: HashSet::new(),
        }
    }

    /// Run configuration of this tree.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Root node of the tree.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// New node under `parent`, sharing the tree's clock and queue.
    pub fn create_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId, SimError> {
        self.kernel.node(parent)?;
        let id = self.kernel.add_node(name, Some(parent));
        self.kernel.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// New node with no parent. It can schedule and own primitives right
    /// away, and be attached somewhere later.
    pub fn add_detached(&mut self, name: &str) -> NodeId {
        self.kernel.add_node(name, None)
    }

    /// Make `child` a child of `parent`. Fails with `AlreadyComposed` if
    /// `child` already has a parent, is the root, or is an ancestor of
    /// `parent`.
    pub fn attach_node(&mut self, parent: NodeId, child: NodeId) -> Result<(), SimError> {
        self.kernel.node(parent)?;
        let c = self.kernel.node(child)?;
        if c.parent.is_some() || child == self.root {
            return Err(SimError::AlreadyComposed(child));
        }
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(SimError::AlreadyComposed(child));
            }
            cursor = self.kernel.node(id)?.parent;
        }
        self.kernel.node_mut(child)?.parent = Some(parent);
        self.kernel.node_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Compose a standalone tree into this one under `parent`.
    ///
    /// Node and resource ids of `sub` stay valid. Its pending events move
    /// into this tree's queue in their original order; handles issued by its
    /// old queue are no longer recognised. Its collectors and decision kinds
    /// are kept, its configuration is dropped. Returns the id of `sub`'s root.
    #[tracing::instrument(skip(self, sub), fields(now = %self.now(), sub = %sub.config.name))]
    pub fn graft(&mut self, parent: NodeId, mut sub: Simulation) -> Result<NodeId, SimError> {
        self.kernel.node(parent)?;
        if let Some((_, p)) = sub.kernel.resources.iter().find(|(_, p)| !p.is_idle()) {
            return Err(SimError::SubtreeBusy(p.name().to_string()));
        }
        if let Some(at) = sub.kernel.sim.peek_time() {
            if at < self.now() {
                return Err(SimError::InvalidTime { at, now: self.now() });
            }
        }

        let Simulation {
            mut kernel,
            root,
            decision_kinds,
            ..
        } = sub;
        let events = kernel.sim.drain();
        let moved = events.len();
        for ev in events {
            self.kernel
                .sim
                .schedule(ev.time, ev.priority, ev.kind, ev.payload, ev.target)?;
        }

        self.kernel.nodes.extend(kernel.nodes);
        self.kernel.resources.absorb(kernel.resources);
        self.kernel.obs.absorb(kernel.obs);
        self.kernel.next_entity = self.kernel.next_entity.max(kernel.next_entity);
        self.kernel.next_request = self.kernel.next_request.max(kernel.next_request);
        self.decision_kinds.extend(decision_kinds);

        self.kernel.node_mut(root)?.parent = Some(parent);
        self.kernel.node_mut(parent)?.children.push(root);
        info!(root = %root, events = moved, "🌱 subtree grafted");
        Ok(root)
    }

    /// Register the handler for events of `kind` addressed to `node`.
    /// Replaces any previous handler for the same pair.
    pub fn on<F>(&mut self, node: NodeId, kind: &'static str, handler: F) -> Result<(), SimError>
    where
        F: FnMut(&mut Ctx<'_>, Event) -> Result<(), SimError> + 'static,
    {
        self.kernel
            .node_mut(node)?
            .handlers
            .insert(kind, Some(Box::new(handler)));
        Ok(())
    }

    /// Replace the local state of `node`.
    pub fn set_state<T: Any>(&mut self, node: NodeId, value: T) -> Result<(), SimError> {
        self.kernel.node_mut(node)?.state = Some(Box::new(value));
        Ok(())
    }

    /// Local state of `node`, if it has state of type `T`.
    pub fn state<T: Any>(&self, node: NodeId) -> Option<&T> {
        self.kernel.node(node).ok()?.state.as_ref()?.downcast_ref::<T>()
    }

    pub fn state_mut<T: Any>(&mut self, node: NodeId) -> Option<&mut T> {
        self.kernel
            .node_mut(node)
            .ok()?
            .state
            .as_mut()?
            .downcast_mut::<T>()
    }

    /// Declare a server with `capacity` channels on `owner`. Requests without
    /// a duration are served for a time drawn from `service`.
    pub fn add_server(
        &mut self,
        owner: NodeId,
        name: &str,
        capacity: usize,
        discipline: Discipline,
        service: ServiceTime,
    ) -> Result<ResourceId, SimError> {
        self.kernel.node(owner)?;
        let s = Server::new(name.to_string(), owner, capacity, discipline, service)?;
        Ok(self.kernel.resources.insert(Primitive::Server(s)))
    }

    /// `capacity` 0 means unbounded.
    pub fn add_queue(
        &mut self,
        owner: NodeId,
        name: &str,
        discipline: Discipline,
        capacity: usize,
    ) -> Result<ResourceId, SimError> {
        self.kernel.node(owner)?;
        let q = Queue::new(name.to_string(), owner, discipline, capacity);
        Ok(self.kernel.resources.insert(Primitive::Queue(q)))
    }

    /// Declare a counted resource. With `preemptive` set, a more urgent
    /// request evicts the least urgent holder.
    pub fn add_resource(
        &mut self,
        owner: NodeId,
        name: &str,
        capacity: usize,
        preemptive: bool,
    ) -> Result<ResourceId, SimError> {
        self.kernel.node(owner)?;
        let r = Resource::new(name.to_string(), owner, capacity, preemptive)?;
        Ok(self.kernel.resources.insert(Primitive::Resource(r)))
    }

    /// Declare a pool of named units, handed out by `policy`.
    pub fn add_pool<I, S>(
        &mut self,
        owner: NodeId,
        name: &str,
        units: I,
        discipline: Discipline,
        policy: SelectionPolicy,
    ) -> Result<ResourceId, SimError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kernel.node(owner)?;
        let units = units.into_iter().map(Into::into).collect();
        let p = ResourcePool::new(name.to_string(), owner, units, discipline, policy)?;
        Ok(self.kernel.resources.insert(Primitive::Pool(p)))
    }

    /// Register a collector; the returned index reads it back through
    /// [`Kernel::collector`].
    pub fn add_collector<C: Collector>(&mut self, collector: C) -> usize {
        self.kernel.obs.add(Box::new(collector))
    }

    /// Tag events of `kind` as decision points for
    /// [`StepMode::NextDecision`](crate::env::StepMode).
    pub fn mark_decision(&mut self, kind: &'static str) {
        self.decision_kinds.insert(kind);
    }

    /// Whether events of `kind` are decision points.
    pub fn is_decision(&self, kind: &str) -> bool {
        self.decision_kinds.contains(kind)
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl Deref for Simulation {
    type Target = Kernel;

    fn deref(&self) -> &Kernel {
        &self.kernel
    }
}

impl DerefMut for Simulation {
    fn deref_mut(&mut self) -> &mut Kernel {
        &mut self.kernel
    }
}
