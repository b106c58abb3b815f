//! Resource primitives
//!
//! `Server`, `Queue`, `Resource` and `ResourcePool` share one request
//! lifecycle: Requested -> Waiting -> (Granted | Preempted) -> Released.
//! A primitive only mutates its state while an event is being dispatched (or
//! while an external controller acts between steps) and schedules its own
//! completion events on the tree's queue. Completion events refer back to the
//! primitive by [`ResourceId`] only.

mod pool;
mod preempt;
mod queue;
mod server;
mod station;
mod wait_queue;

pub use pool::{ResourcePool, SelectFn, SelectionPolicy, UnitView};
pub use preempt::Resource;
pub use queue::Queue;
pub use server::{Server, ServiceTime};
pub use wait_queue::{Discipline, WaitQueue, Waiting};

use crate::sim::{
    EntityId, EventHandle, EventKind, NodeId, Payload, RELEASE_PRIORITY, RequestId, ResourceId,
    SimError, SimRng, SimTime, Simulator, TreeId,
};
use crate::stats::Observers;
use indexmap::IndexMap;
use serde::Serialize;

/// A request for service or for a unit of capacity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub entity: Option<EntityId>,
    /// Lower is more urgent. Orders priority lines and decides preemption.
    pub priority: i32,
    /// Holding time. `None` on a `Server` means "sample the server's service
    /// time"; on a `Resource` or pool it means "hold until released".
    pub duration: Option<f64>,
    /// Node that receives `on_grant` / `on_done` events.
    pub notify: Option<NodeId>,
    pub on_grant: Option<&'static str>,
    pub on_done: Option<&'static str>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, entity: EntityId) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn notify(mut self, node: NodeId) -> Self {
        self.notify = Some(node);
        self
    }

    pub fn on_grant(mut self, kind: &'static str) -> Self {
        self.on_grant = Some(kind);
        self
    }

    pub fn on_done(mut self, kind: &'static str) -> Self {
        self.on_done = Some(kind);
        self
    }
}

/// Payload of `on_grant` / `on_done` events, also returned by `release`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub resource: ResourceId,
    pub request: RequestId,
    pub entity: Option<EntityId>,
    /// Pool unit index, for pools.
    pub unit: Option<usize>,
    pub arrived: SimTime,
    /// Total time spent waiting, across preemptions.
    pub waited: f64,
    /// Total time spent holding, across preemptions.
    pub served: f64,
    pub preemptions: u32,
}

/// Kind of a primitive, for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Server,
    Queue,
    Resource,
    Pool,
}

/// Occupancy of one primitive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSnapshot {
    pub id: ResourceId,
    pub name: String,
    pub kind: PrimitiveKind,
    pub owner: NodeId,
    /// Channels or units; for queues the length limit, `None` if unbounded.
    pub capacity: Option<usize>,
    pub busy: usize,
    pub waiting: usize,
    pub holders: Vec<RequestId>,
    pub waiting_requests: Vec<RequestId>,
    pub waiting_entities: Vec<Option<EntityId>>,
}

/// Progress of a request through a primitive.
#[derive(Debug, Clone)]
pub(crate) struct Ticket {
    pub(crate) id: RequestId,
    pub(crate) req: Request,
    pub(crate) arrived: SimTime,
    pub(crate) queued_at: SimTime,
    pub(crate) remaining: Option<f64>,
    pub(crate) served: f64,
    pub(crate) waited: f64,
    pub(crate) preemptions: u32,
}

impl Ticket {
    pub(crate) fn new(id: RequestId, req: Request, remaining: Option<f64>, now: SimTime) -> Self {
        Self {
            id,
            req,
            arrived: now,
            queued_at: now,
            remaining,
            served: 0.0,
            waited: 0.0,
            preemptions: 0,
        }
    }
}

/// A granted request.
#[derive(Debug, Clone)]
pub(crate) struct Holding {
    pub(crate) ticket: Ticket,
    pub(crate) granted_at: SimTime,
    pub(crate) completion: Option<EventHandle>,
    pub(crate) unit: Option<usize>,
    /// Grant order within the primitive; ties among preemption victims go to
    /// the most recent grant.
    pub(crate) order: u64,
}

/// The parts of a kernel a primitive may touch while it runs.
pub(crate) struct Scope<'a> {
    pub(crate) sim: &'a mut Simulator,
    pub(crate) obs: &'a mut Observers,
    pub(crate) rng: &'a mut SimRng,
}

impl Scope<'_> {
    pub(crate) fn now(&self) -> SimTime {
        self.sim.now()
    }

    pub(crate) fn observe(&mut self, resource: &str, metric: &str, value: f64, entity: Option<EntityId>) {
        let now = self.sim.now();
        self.obs.observe(now, format!("{resource}.{metric}"), value, entity);
    }

    pub(crate) fn count(&mut self, resource: &str, metric: &str, entity: Option<EntityId>) {
        let now = self.sim.now();
        self.obs.count(now, format!("{resource}.{metric}"), 1.0, entity);
    }
}

pub(crate) fn check_duration(d: f64) -> Result<f64, SimError> {
    if d.is_finite() && d >= 0.0 {
        Ok(d)
    } else {
        Err(SimError::InvalidDuration(d))
    }
}

fn outcome(rid: ResourceId, ticket: &Ticket, unit: Option<usize>) -> Outcome {
    Outcome {
        resource: rid,
        request: ticket.id,
        entity: ticket.req.entity,
        unit,
        arrived: ticket.arrived,
        waited: ticket.waited,
        served: ticket.served,
        preemptions: ticket.preemptions,
    }
}

fn follow_up(
    scope: &mut Scope<'_>,
    kind: Option<&'static str>,
    notify: Option<NodeId>,
    out: Outcome,
) -> Result<(), SimError> {
    if let (Some(name), Some(node)) = (kind, notify) {
        let now = scope.now();
        scope.sim.schedule(
            now,
            RELEASE_PRIORITY,
            EventKind::named(name),
            Payload::new(out),
            node,
        )?;
    }
    Ok(())
}

/// Grant a ticket: account its wait, schedule its completion and raise the
/// `on_grant` follow-up.
pub(crate) fn start(
    scope: &mut Scope<'_>,
    rid: ResourceId,
    owner: NodeId,
    name: &str,
    mut ticket: Ticket,
    unit: Option<usize>,
    order: u64,
) -> Result<Holding, SimError> {
    let now = scope.now();
    let wait = now.since(ticket.queued_at);
    ticket.waited += wait;

    let completion = match ticket.remaining {
        Some(d) => Some(scope.sim.schedule(
            now.after(d),
            RELEASE_PRIORITY,
            EventKind::Completion {
                resource: rid,
                request: ticket.id,
            },
            Payload::none(),
            owner,
        )?),
        None => None,
    };

    scope.observe(name, "wait", wait, ticket.req.entity);
    scope.count(name, "grants", ticket.req.entity);
    follow_up(
        scope,
        ticket.req.on_grant,
        ticket.req.notify,
        outcome(rid, &ticket, unit),
    )?;

    Ok(Holding {
        ticket,
        granted_at: now,
        completion,
        unit,
        order,
    })
}

/// End a holding, either because its completion fired or because it was
/// released early. Raises the `on_done` follow-up.
pub(crate) fn finish(
    scope: &mut Scope<'_>,
    rid: ResourceId,
    name: &str,
    holding: Holding,
    completed: bool,
) -> Result<Outcome, SimError> {
    let Holding {
        mut ticket,
        granted_at,
        completion,
        unit,
        ..
    } = holding;

    if completed {
        // the scheduled duration, not the clock difference, keeps the total
        // exact across preemptions
        ticket.served += ticket.remaining.unwrap_or_else(|| scope.now().since(granted_at));
    } else {
        if let Some(h) = completion {
            scope.sim.cancel(h)?;
        }
        ticket.served += scope.now().since(granted_at);
    }
    ticket.remaining = Some(0.0);

    scope.count(name, if completed { "completions" } else { "releases" }, ticket.req.entity);
    scope.observe(name, "served", ticket.served, ticket.req.entity);

    let out = outcome(rid, &ticket, unit);
    follow_up(scope, ticket.req.on_done, ticket.req.notify, out.clone())?;
    Ok(out)
}

/// Checkpoint a preempted holding back into a ticket.
pub(crate) fn suspend(scope: &mut Scope<'_>, holding: Holding) -> Result<Ticket, SimError> {
    let Holding {
        mut ticket,
        granted_at,
        completion,
        ..
    } = holding;
    if let Some(h) = completion {
        scope.sim.cancel(h)?;
    }
    let now = scope.now();
    let elapsed = now.since(granted_at);
    ticket.served += elapsed;
    ticket.remaining = ticket.remaining.map(|r| (r - elapsed).max(0.0));
    ticket.preemptions += 1;
    ticket.queued_at = now;
    Ok(ticket)
}

/// Any primitive, as stored in a tree.
#[derive(Debug)]
pub(crate) enum Primitive {
    Server(Server),
    Queue(Queue),
    Resource(Resource),
    Pool(ResourcePool),
}

impl Primitive {
    pub(crate) fn name(&self) -> &str {
        match self {
            Primitive::Server(s) => s.name(),
            Primitive::Queue(q) => q.name(),
            Primitive::Resource(r) => r.name(),
            Primitive::Pool(p) => p.name(),
        }
    }

    pub(crate) fn owner(&self) -> NodeId {
        match self {
            Primitive::Server(s) => s.station().owner,
            Primitive::Queue(q) => q.owner(),
            Primitive::Resource(r) => r.station().owner,
            Primitive::Pool(p) => p.owner(),
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        let s = self.snapshot_parts();
        s.busy == 0 && s.waiting == 0
    }

    fn snapshot_parts(&self) -> ResourceSnapshotParts {
        match self {
            Primitive::Server(s) => s.station().snapshot_parts(PrimitiveKind::Server),
            Primitive::Resource(r) => r.station().snapshot_parts(PrimitiveKind::Resource),
            Primitive::Queue(q) => q.snapshot_parts(),
            Primitive::Pool(p) => p.snapshot_parts(),
        }
    }

    pub(crate) fn snapshot(&self, id: ResourceId) -> ResourceSnapshot {
        let p = self.snapshot_parts();
        ResourceSnapshot {
            id,
            name: self.name().to_string(),
            kind: p.kind,
            owner: p.owner,
            capacity: p.capacity,
            busy: p.busy,
            waiting: p.waiting,
            holders: p.holders,
            waiting_requests: p.waiting_requests,
            waiting_entities: p.waiting_entities,
        }
    }
}

pub(crate) struct ResourceSnapshotParts {
    pub(crate) kind: PrimitiveKind,
    pub(crate) owner: NodeId,
    pub(crate) capacity: Option<usize>,
    pub(crate) busy: usize,
    pub(crate) waiting: usize,
    pub(crate) holders: Vec<RequestId>,
    pub(crate) waiting_requests: Vec<RequestId>,
    pub(crate) waiting_entities: Vec<Option<EntityId>>,
}

/// Primitives of one tree, in declaration order.
#[derive(Debug)]
pub(crate) struct ResourceSet {
    tree: TreeId,
    next_index: u32,
    items: IndexMap<ResourceId, Primitive>,
}

impl ResourceSet {
    pub(crate) fn new(tree: TreeId) -> Self {
        Self {
            tree,
            next_index: 0,
            items: IndexMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, p: Primitive) -> ResourceId {
        let id = ResourceId {
            tree: self.tree,
            index: self.next_index,
        };
        self.next_index += 1;
        self.items.insert(id, p);
        id
    }

    pub(crate) fn get(&self, id: ResourceId) -> Result<&Primitive, SimError> {
        self.items.get(&id).ok_or(SimError::UnknownResource(id))
    }

    pub(crate) fn get_mut(&mut self, id: ResourceId) -> Result<&mut Primitive, SimError> {
        self.items.get_mut(&id).ok_or(SimError::UnknownResource(id))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&ResourceId, &Primitive)> {
        self.items.iter()
    }

    pub(crate) fn absorb(&mut self, other: ResourceSet) {
        self.items.extend(other.items);
    }
}
