//! Root-owned state of a simulation tree.
//!
//! The kernel holds everything the nodes of a tree share: the clock and event
//! queue, the node table, the resource primitives, the collectors and the
//! random stream. Model handlers reach it through [`Ctx`](super::Ctx); outside
//! of dispatch it is reached through [`Simulation`](super::Simulation).

use super::error::SimError;
use super::event::{DEFAULT_PRIORITY, EventHandle, EventKind, Payload};
use super::id::{EntityId, NodeId, RequestId, ResourceId, TreeId};
use super::node::Node;
use super::rng::SimRng;
use super::simulator::Simulator;
use super::time::SimTime;
use crate::resource::{
    Outcome, Primitive, Queue, Request, Resource, ResourcePool, ResourceSet, ResourceSnapshot,
    Scope, Server,
};
use crate::stats::{Collector, Observers};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, trace};

/// Observable state of a tree between two events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub now: SimTime,
    pub pending_events: usize,
    pub dispatched: u64,
    pub resources: Vec<ResourceSnapshot>,
}

#[derive(Debug)]
pub struct Kernel {
    pub(crate) tree: TreeId,
    pub(crate) sim: Simulator,
    pub(crate) nodes: IndexMap<NodeId, Node>,
    next_node: u32,
    pub(crate) resources: ResourceSet,
    pub(crate) obs: Observers,
    pub(crate) rng: SimRng,
    pub(crate) next_entity: u64,
    pub(crate) next_request: u64,
}

impl Kernel {
    pub(crate) fn new(seed: u64) -> Self {
        let tree = TreeId::fresh();
        Self {
            tree,
            sim: Simulator::new(tree),
            nodes: IndexMap::new(),
            next_node: 0,
            resources: ResourceSet::new(tree),
            obs: Observers::default(),
            rng: SimRng::new(seed),
            next_entity: 0,
            next_request: 0,
        }
    }

    pub(crate) fn add_node(&mut self, name: &str, parent: Option<NodeId>) -> NodeId {
        let id = NodeId {
            tree: self.tree,
            index: self.next_node,
        };
        self.next_node += 1;
        self.nodes.insert(id, Node::new(id, name, parent));
        id
    }

    /// Id of the tree this kernel belongs to.
    pub fn tree(&self) -> TreeId {
        self.tree
    }

    /// Current simulated time of the tree.
    pub fn now(&self) -> SimTime {
        self.sim.now()
    }

    /// Live events still in the queue.
    pub fn pending_events(&self) -> usize {
        self.sim.pending()
    }

    /// Events dispatched since the tree was created.
    pub fn dispatched(&self) -> u64 {
        self.sim.dispatched()
    }

    /// Look up a node of this tree.
    pub fn node(&self, id: NodeId) -> Result<&Node, SimError> {
        self.nodes.get(&id).ok_or(SimError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SimError> {
        self.nodes.get_mut(&id).ok_or(SimError::UnknownNode(id))
    }

    /// Nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// First node with the given name, in creation order.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes.values().find(|n| n.name == name).map(|n| n.id)
    }

    fn check_route(&self, node: NodeId, kind: &'static str) -> Result<(), SimError> {
        if self.node(node)?.handles(kind) {
            Ok(())
        } else {
            Err(SimError::NoHandler { node, kind })
        }
    }

    /// Schedule a model event for `target`. The target must already have a
    /// handler for `kind`.
    pub fn schedule(
        &mut self,
        target: NodeId,
        at: SimTime,
        priority: i32,
        kind: &'static str,
        payload: Payload,
    ) -> Result<EventHandle, SimError> {
        self.check_route(target, kind)?;
        self.sim
            .schedule(at, priority, EventKind::named(kind), payload, target)
    }

    /// Schedule `delay` time units from now at default priority.
    pub fn schedule_after(
        &mut self,
        target: NodeId,
        delay: f64,
        kind: &'static str,
        payload: Payload,
    ) -> Result<EventHandle, SimError> {
        let at = self.now().after(delay);
        self.schedule(target, at, DEFAULT_PRIORITY, kind, payload)
    }

    /// Cancel a pending event. `Ok(false)` if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: EventHandle) -> Result<bool, SimError> {
        self.sim.cancel(handle)
    }

    /// True while the event has neither fired nor been cancelled.
    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.sim.is_pending(handle)
    }

    /// Allocate a fresh entity id.
    pub fn new_entity(&mut self) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        id
    }

    /// The tree's random stream.
    pub fn rng(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    /// Emit an observation to every collector.
    pub fn observe(&mut self, collector: &str, value: f64, entity: Option<EntityId>) {
        let now = self.now();
        self.obs.observe(now, collector.to_string(), value, entity);
    }

    /// Emit a counter increment to every collector.
    pub fn count(&mut self, collector: &str, entity: Option<EntityId>) {
        let now = self.now();
        self.obs.count(now, collector.to_string(), 1.0, entity);
    }

    /// Read back a collector registered with `Simulation::add_collector`.
    pub fn collector<T: Collector>(&self, idx: usize) -> Option<&T> {
        self.obs.get::<T>(idx)
    }

    fn split(&mut self, rid: ResourceId) -> Result<(&mut Primitive, Scope<'_>), SimError> {
        let prim = self.resources.get_mut(rid)?;
        Ok((
            prim,
            Scope {
                sim: &mut self.sim,
                obs: &mut self.obs,
                rng: &mut self.rng,
            },
        ))
    }

    /// Submit a request to a server, resource or pool. Follow-up events go to
    /// `req.notify`, or to the primitive's owner when unset.
    #[tracing::instrument(level = "debug", skip(self, req), fields(now = %self.now(), entity = ?req.entity))]
    pub fn request(&mut self, rid: ResourceId, mut req: Request) -> Result<RequestId, SimError> {
        let owner = self.resources.get(rid)?.owner();
        let notify = *req.notify.get_or_insert(owner);
        for kind in [req.on_grant, req.on_done].into_iter().flatten() {
            self.check_route(notify, kind)?;
        }

        let id = RequestId(self.next_request);
        let (prim, mut scope) = self.split(rid)?;
        match prim {
            Primitive::Server(s) => s.request(&mut scope, rid, id, req)?,
            Primitive::Resource(r) => r.request(&mut scope, rid, id, req)?,
            Primitive::Pool(p) => p.request(&mut scope, rid, id, req)?,
            Primitive::Queue(q) => return Err(unsupported(q.name(), "request")),
        }
        self.next_request += 1;
        debug!(request = %id, "request submitted");
        Ok(id)
    }

    /// Release a held request before its completion (or one that holds with
    /// no duration). The freed capacity is refilled immediately.
    pub fn release(&mut self, rid: ResourceId, request: RequestId) -> Result<Outcome, SimError> {
        self.end_holding(rid, request, false)
    }

    pub(crate) fn complete(&mut self, rid: ResourceId, request: RequestId) -> Result<Outcome, SimError> {
        trace!(resource = %rid, request = %request, "completion");
        self.end_holding(rid, request, true)
    }

    fn end_holding(
        &mut self,
        rid: ResourceId,
        request: RequestId,
        completed: bool,
    ) -> Result<Outcome, SimError> {
        let (prim, mut scope) = self.split(rid)?;
        match prim {
            Primitive::Server(s) => s.release(&mut scope, rid, request, completed),
            Primitive::Resource(r) => r.release(&mut scope, rid, request, completed),
            Primitive::Pool(p) => p.release(&mut scope, rid, request, completed),
            Primitive::Queue(q) => Err(unsupported(q.name(), "release")),
        }
    }

    /// Take a waiting request out of a line (reneging, timeouts).
    pub fn withdraw(&mut self, rid: ResourceId, request: RequestId) -> Result<Request, SimError> {
        let (prim, mut scope) = self.split(rid)?;
        let ticket = match prim {
            Primitive::Server(s) => s.station_mut().withdraw(&mut scope, request)?,
            Primitive::Resource(r) => r.station_mut().withdraw(&mut scope, request)?,
            Primitive::Pool(p) => p.withdraw(&mut scope, rid, request)?,
            Primitive::Queue(q) => return Err(unsupported(q.name(), "withdraw")),
        };
        Ok(ticket.req)
    }

    /// Grant a specific waiting request into free capacity. This is how a
    /// controller serves a [`Discipline::Manual`](crate::resource::Discipline)
    /// line.
    pub fn promote(&mut self, rid: ResourceId, request: RequestId) -> Result<(), SimError> {
        let (prim, mut scope) = self.split(rid)?;
        match prim {
            Primitive::Server(s) => s.station_mut().promote(&mut scope, rid, request),
            Primitive::Resource(r) => r.station_mut().promote(&mut scope, rid, request),
            Primitive::Pool(p) => p.promote(&mut scope, rid, request),
            Primitive::Queue(q) => Err(unsupported(q.name(), "promote")),
        }
    }

    /// Returns `false` if the queue is full.
    pub fn enqueue(&mut self, qid: ResourceId, entity: EntityId, priority: i32) -> Result<bool, SimError> {
        let (prim, mut scope) = self.split(qid)?;
        match prim {
            Primitive::Queue(q) => Ok(q.enqueue(&mut scope, entity, priority)),
            other => Err(unsupported(other.name(), "enqueue")),
        }
    }

    /// Take the head of a queue.
    pub fn dequeue(&mut self, qid: ResourceId) -> Result<Option<EntityId>, SimError> {
        let (prim, mut scope) = self.split(qid)?;
        match prim {
            Primitive::Queue(q) => Ok(q.dequeue(&mut scope)),
            other => Err(unsupported(other.name(), "dequeue")),
        }
    }

    /// Remove `entity` from anywhere in the queue.
    pub fn remove_from_queue(&mut self, qid: ResourceId, entity: EntityId) -> Result<bool, SimError> {
        let (prim, mut scope) = self.split(qid)?;
        match prim {
            Primitive::Queue(q) => Ok(q.remove(&mut scope, entity)),
            other => Err(unsupported(other.name(), "remove")),
        }
    }

    /// Remove every entity from a queue, in service order.
    pub fn clear_queue(&mut self, qid: ResourceId) -> Result<Vec<EntityId>, SimError> {
        let (prim, mut scope) = self.split(qid)?;
        match prim {
            Primitive::Queue(q) => Ok(q.clear(&mut scope)),
            other => Err(unsupported(other.name(), "clear")),
        }
    }

    /// Re-rank a queued entity. Returns `false` if it is not in the queue.
    pub fn reprioritize(
        &mut self,
        qid: ResourceId,
        entity: EntityId,
        priority: i32,
    ) -> Result<bool, SimError> {
        let (prim, mut scope) = self.split(qid)?;
        match prim {
            Primitive::Queue(q) => Ok(q.reprioritize(&mut scope, entity, priority)),
            other => Err(unsupported(other.name(), "reprioritize")),
        }
    }

    /// Typed view of a server.
    pub fn server(&self, rid: ResourceId) -> Result<&Server, SimError> {
        match self.resources.get(rid)? {
            Primitive::Server(s) => Ok(s),
            other => Err(unsupported(other.name(), "server")),
        }
    }

    /// Typed view of a queue.
    pub fn queue(&self, rid: ResourceId) -> Result<&Queue, SimError> {
        match self.resources.get(rid)? {
            Primitive::Queue(q) => Ok(q),
            other => Err(unsupported(other.name(), "queue")),
        }
    }

    /// Typed view of a counted resource.
    pub fn resource(&self, rid: ResourceId) -> Result<&Resource, SimError> {
        match self.resources.get(rid)? {
            Primitive::Resource(r) => Ok(r),
            other => Err(unsupported(other.name(), "resource")),
        }
    }

    /// Typed view of a resource pool.
    pub fn pool(&self, rid: ResourceId) -> Result<&ResourcePool, SimError> {
        match self.resources.get(rid)? {
            Primitive::Pool(p) => Ok(p),
            other => Err(unsupported(other.name(), "pool")),
        }
    }

    /// Occupancy of one primitive.
    pub fn resource_snapshot(&self, rid: ResourceId) -> Result<ResourceSnapshot, SimError> {
        Ok(self.resources.get(rid)?.snapshot(rid))
    }

    /// Clock, queue size and occupancy of every primitive.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            now: self.now(),
            pending_events: self.pending_events(),
            dispatched: self.dispatched(),
            resources: self
                .resources
                .iter()
                .map(|(id, p)| p.snapshot(*id))
                .collect(),
        }
    }
}

fn unsupported(resource: &str, op: &'static str) -> SimError {
    SimError::Unsupported {
        resource: resource.to_string(),
        op,
    }
}
