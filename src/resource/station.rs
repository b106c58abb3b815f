//! Channel bank shared by `Server` and `Resource`: `capacity` identical
//! channels in front of one waiting line, with optional preemption.

use super::wait_queue::{Discipline, WaitQueue};
use super::{
    Holding, Outcome, PrimitiveKind, ResourceSnapshotParts, Scope, Ticket, finish, start, suspend,
};
use crate::sim::{NodeId, RequestId, ResourceId, SimError};
use tracing::{debug, trace};

#[derive(Debug)]
pub(crate) struct Station {
    pub(crate) name: String,
    pub(crate) owner: NodeId,
    pub(crate) capacity: usize,
    pub(crate) preemptive: bool,
    pub(crate) line: WaitQueue<Ticket>,
    pub(crate) holders: Vec<Holding>,
    grants: u64,
}

impl Station {
    pub(crate) fn new(
        name: String,
        owner: NodeId,
        capacity: usize,
        discipline: Discipline,
        preemptive: bool,
    ) -> Result<Self, SimError> {
        if capacity == 0 {
            return Err(SimError::InvalidCapacity(capacity));
        }
        Ok(Self {
            name,
            owner,
            capacity,
            preemptive,
            line: WaitQueue::new(discipline),
            holders: Vec::with_capacity(capacity),
            grants: 0,
        })
    }

    pub(crate) fn busy(&self) -> usize {
        self.holders.len()
    }

    /// A request arrives: grant, preempt or wait.
    pub(crate) fn arrive(
        &mut self,
        scope: &mut Scope<'_>,
        rid: ResourceId,
        ticket: Ticket,
    ) -> Result<(), SimError> {
        scope.count(&self.name, "arrivals", ticket.req.entity);

        // a manual line can hold requests next to an idle channel; newcomers
        // queue behind them
        if self.busy() < self.capacity && self.line.is_empty() {
            return self.grant(scope, rid, ticket);
        }

        if self.preemptive {
            if let Some(idx) = self.victim(ticket.req.priority) {
                let evicted = self.holders.remove(idx);
                debug!(
                    resource = %self.name,
                    evicted = %evicted.ticket.id,
                    by = %ticket.id,
                    "preempting holder"
                );
                let entity = evicted.ticket.req.entity;
                let requeued = suspend(scope, evicted)?;
                let prio = requeued.req.priority;
                let now = scope.now();
                self.line.push_front(requeued, prio, now);
                scope.count(&self.name, "preemptions", entity);
                self.report_line(scope);
                return self.grant(scope, rid, ticket);
            }
        }

        let prio = ticket.req.priority;
        let now = scope.now();
        trace!(resource = %self.name, request = %ticket.id, "no free channel, waiting");
        self.line.push_unbounded(ticket, prio, now);
        self.report_line(scope);
        Ok(())
    }

    /// Least urgent holder that `priority` strictly beats; the most recent
    /// grant among equals.
    fn victim(&self, priority: i32) -> Option<usize> {
        let (idx, h) = self
            .holders
            .iter()
            .enumerate()
            .max_by_key(|(_, h)| (h.ticket.req.priority, h.order))?;
        (h.ticket.req.priority > priority).then_some(idx)
    }

    fn grant(
        &mut self,
        scope: &mut Scope<'_>,
        rid: ResourceId,
        ticket: Ticket,
    ) -> Result<(), SimError> {
        if self.busy() >= self.capacity {
            return Err(SimError::CapacityExceeded {
                resource: self.name.clone(),
                capacity: self.capacity,
            });
        }
        self.grants += 1;
        let holding = start(scope, rid, self.owner, &self.name, ticket, None, self.grants)?;
        trace!(resource = %self.name, request = %holding.ticket.id, "granted");
        self.holders.push(holding);
        self.report_busy(scope);
        Ok(())
    }

    /// Free the channel held by `request` and refill it from the line.
    pub(crate) fn release(
        &mut self,
        scope: &mut Scope<'_>,
        rid: ResourceId,
        request: RequestId,
        completed: bool,
    ) -> Result<Outcome, SimError> {
        let idx = self
            .holders
            .iter()
            .position(|h| h.ticket.id == request)
            .ok_or_else(|| SimError::NotHeld {
                resource: self.name.clone(),
                request,
            })?;
        let holding = self.holders.remove(idx);
        let out = finish(scope, rid, &self.name, holding, completed)?;
        self.report_busy(scope);
        self.fill(scope, rid)?;
        Ok(out)
    }

    /// Promote waiting requests into free channels, unless the line is
    /// manually dispatched.
    pub(crate) fn fill(&mut self, scope: &mut Scope<'_>, rid: ResourceId) -> Result<(), SimError> {
        if self.line.discipline() == Discipline::Manual {
            return Ok(());
        }
        while self.busy() < self.capacity {
            let Some(next) = self.line.pop() else {
                break;
            };
            self.report_line(scope);
            self.grant(scope, rid, next.item)?;
        }
        Ok(())
    }

    /// Take a waiting request out of the line.
    pub(crate) fn withdraw(
        &mut self,
        scope: &mut Scope<'_>,
        request: RequestId,
    ) -> Result<Ticket, SimError> {
        let w = self
            .line
            .remove_by(|t| t.id == request)
            .ok_or_else(|| SimError::NotWaiting {
                resource: self.name.clone(),
                request,
            })?;
        scope.count(&self.name, "withdrawals", w.item.req.entity);
        self.report_line(scope);
        Ok(w.item)
    }

    /// Grant a specific waiting request into a free channel.
    pub(crate) fn promote(
        &mut self,
        scope: &mut Scope<'_>,
        rid: ResourceId,
        request: RequestId,
    ) -> Result<(), SimError> {
        if self.busy() >= self.capacity {
            return Err(SimError::NoFreeCapacity(self.name.clone()));
        }
        let w = self
            .line
            .remove_by(|t| t.id == request)
            .ok_or_else(|| SimError::NotWaiting {
                resource: self.name.clone(),
                request,
            })?;
        self.report_line(scope);
        self.grant(scope, rid, w.item)
    }

    fn report_busy(&self, scope: &mut Scope<'_>) {
        scope.observe(&self.name, "busy", self.busy() as f64, None);
    }

    fn report_line(&self, scope: &mut Scope<'_>) {
        scope.observe(&self.name, "queue_len", self.line.len() as f64, None);
    }

    pub(crate) fn snapshot_parts(&self, kind: PrimitiveKind) -> ResourceSnapshotParts {
        ResourceSnapshotParts {
            kind,
            owner: self.owner,
            capacity: Some(self.capacity),
            busy: self.busy(),
            waiting: self.line.len(),
            holders: self.holders.iter().map(|h| h.ticket.id).collect(),
            waiting_requests: self.line.iter().map(|w| w.item.id).collect(),
            waiting_entities: self.line.iter().map(|w| w.item.req.entity).collect(),
        }
    }
}
