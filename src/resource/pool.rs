//! Resource pool: distinguishable units behind one waiting line.
//!
//! A selection policy picks which free unit serves a request. The line is
//! served in discipline order; if the policy declines every free unit for the
//! head request, the line stays blocked until the next release.

use super::wait_queue::{Discipline, WaitQueue};
use super::{
    Holding, Outcome, PrimitiveKind, Request, ResourceSnapshotParts, Scope, Ticket,
    check_duration, finish, start,
};
use crate::sim::{NodeId, RequestId, ResourceId, SimError, SimRng};
use std::fmt;
use tracing::{debug, trace};

/// Read-only view of a unit handed to selection policies.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitView<'a> {
    pub index: usize,
    pub name: &'a str,
    pub busy: bool,
    pub grants: u64,
    pub busy_time: f64,
}

pub type SelectFn = Box<dyn FnMut(&[UnitView<'_>], &Request) -> Option<usize>>;

/// Which free unit a request gets.
pub enum SelectionPolicy {
    /// Lowest-index free unit.
    FirstFree,
    /// Next free unit after the one granted last.
    RoundRobin,
    /// Free unit with the least accumulated busy time.
    LeastUtilized,
    /// Uniformly random free unit, drawn from the tree's stream.
    Random,
    /// Caller-supplied. Must return a free unit or `None`.
    Custom(SelectFn),
}

impl fmt::Debug for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SelectionPolicy::FirstFree => "FirstFree",
            SelectionPolicy::RoundRobin => "RoundRobin",
            SelectionPolicy::LeastUtilized => "LeastUtilized",
            SelectionPolicy::Random => "Random",
            SelectionPolicy::Custom(_) => "Custom(..)",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct PoolUnit {
    name: String,
    holder: Option<Holding>,
    grants: u64,
    busy_time: f64,
}

#[derive(Debug)]
pub struct ResourcePool {
    name: String,
    owner: NodeId,
    units: Vec<PoolUnit>,
    line: WaitQueue<Ticket>,
    policy: SelectionPolicy,
    cursor: usize,
    grants: u64,
}

impl ResourcePool {
    pub(crate) fn new(
        name: String,
        owner: NodeId,
        units: Vec<String>,
        discipline: Discipline,
        policy: SelectionPolicy,
    ) -> Result<Self, SimError> {
        if units.is_empty() {
            return Err(SimError::InvalidCapacity(0));
        }
        Ok(Self {
            name,
            owner,
            units: units
                .into_iter()
                .map(|name| PoolUnit {
                    name,
                    holder: None,
                    grants: 0,
                    busy_time: 0.0,
                })
                .collect(),
            line: WaitQueue::new(discipline),
            policy,
            cursor: 0,
            grants: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn size(&self) -> usize {
        self.units.len()
    }

    pub fn busy(&self) -> usize {
        self.units.iter().filter(|u| u.holder.is_some()).count()
    }

    pub fn waiting(&self) -> usize {
        self.line.len()
    }

    pub fn unit_name(&self, index: usize) -> Option<&str> {
        self.units.get(index).map(|u| u.name.as_str())
    }

    /// Request currently holding `index`.
    pub fn holder_of(&self, index: usize) -> Option<RequestId> {
        self.units.get(index)?.holder.as_ref().map(|h| h.ticket.id)
    }

    fn unit_views(units: &[PoolUnit]) -> Vec<UnitView<'_>> {
        units
            .iter()
            .enumerate()
            .map(|(index, u)| UnitView {
                index,
                name: &u.name,
                busy: u.holder.is_some(),
                grants: u.grants,
                busy_time: u.busy_time,
            })
            .collect()
    }

    /// Ask the policy for a free unit. A policy that names a busy or
    /// non-existent unit breaks the one-holder-per-unit invariant.
    fn select(&mut self, req: &Request, rng: &mut SimRng) -> Result<Option<usize>, SimError> {
        let free: Vec<usize> = (0..self.units.len())
            .filter(|&i| self.units[i].holder.is_none())
            .collect();
        if free.is_empty() {
            return Ok(None);
        }
        let n = self.units.len();
        let cursor = self.cursor;
        let units = &self.units;
        let chosen = match &mut self.policy {
            SelectionPolicy::FirstFree => Some(free[0]),
            SelectionPolicy::RoundRobin => (0..n)
                .map(|k| (cursor + k) % n)
                .find(|&i| units[i].holder.is_none()),
            SelectionPolicy::LeastUtilized => free.iter().copied().min_by(|&a, &b| {
                units[a]
                    .busy_time
                    .total_cmp(&units[b].busy_time)
                    .then(a.cmp(&b))
            }),
            SelectionPolicy::Random => Some(free[rng.index(free.len())]),
            SelectionPolicy::Custom(f) => f(&Self::unit_views(units), req),
        };
        if let Some(i) = chosen {
            if self.units.get(i).is_none_or(|u| u.holder.is_some()) {
                return Err(SimError::CapacityExceeded {
                    resource: self.name.clone(),
                    capacity: self.units.len(),
                });
            }
        }
        Ok(chosen)
    }

    fn grant(
        &mut self,
        scope: &mut Scope<'_>,
        rid: ResourceId,
        unit: usize,
        ticket: Ticket,
    ) -> Result<(), SimError> {
        self.grants += 1;
        let holding = start(scope, rid, self.owner, &self.name, ticket, Some(unit), self.grants)?;
        trace!(pool = %self.name, unit, request = %holding.ticket.id, "unit granted");
        let u = &mut self.units[unit];
        u.holder = Some(holding);
        u.grants += 1;
        self.cursor = (unit + 1) % self.units.len();
        self.report_busy(scope);
        Ok(())
    }

    pub(crate) fn request(
        &mut self,
        scope: &mut Scope<'_>,
        rid: ResourceId,
        id: RequestId,
        req: Request,
    ) -> Result<(), SimError> {
        let duration = req.duration.map(check_duration).transpose()?;
        scope.count(&self.name, "arrivals", req.entity);
        let ticket = Ticket::new(id, req, duration, scope.now());
        if self.line.is_empty() {
            if let Some(unit) = self.select(&ticket.req, scope.rng)? {
                return self.grant(scope, rid, unit, ticket);
            }
        }
        let prio = ticket.req.priority;
        let now = scope.now();
        self.line.push_unbounded(ticket, prio, now);
        self.report_line(scope);
        Ok(())
    }

    pub(crate) fn release(
        &mut self,
        scope: &mut Scope<'_>,
        rid: ResourceId,
        request: RequestId,
        completed: bool,
    ) -> Result<Outcome, SimError> {
        let unit = self
            .units
            .iter()
            .position(|u| u.holder.as_ref().is_some_and(|h| h.ticket.id == request))
            .ok_or_else(|| SimError::NotHeld {
                resource: self.name.clone(),
                request,
            })?;
        let now = scope.now();
        let u = &mut self.units[unit];
        let Some(holding) = u.holder.take() else {
            return Err(SimError::NotHeld {
                resource: self.name.clone(),
                request,
            });
        };
        u.busy_time += now.since(holding.granted_at);
        debug!(pool = %self.name, unit, request = %request, completed, "unit freed");
        let out = finish(scope, rid, &self.name, holding, completed)?;
        self.report_busy(scope);
        self.fill(scope, rid)?;
        Ok(out)
    }

    fn fill(&mut self, scope: &mut Scope<'_>, rid: ResourceId) -> Result<(), SimError> {
        if self.line.discipline() == Discipline::Manual {
            return Ok(());
        }
        loop {
            let Some(head) = self.line.peek() else {
                break;
            };
            let req = head.item.req.clone();
            let Some(unit) = self.select(&req, scope.rng)? else {
                break;
            };
            let Some(next) = self.line.pop() else {
                break;
            };
            self.report_line(scope);
            self.grant(scope, rid, unit, next.item)?;
        }
        Ok(())
    }

    pub(crate) fn withdraw(
        &mut self,
        scope: &mut Scope<'_>,
        rid: ResourceId,
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
        // the withdrawn request may have been a blocked head
        self.fill(scope, rid)?;
        Ok(w.item)
    }

    pub(crate) fn promote(
        &mut self,
        scope: &mut Scope<'_>,
        rid: ResourceId,
        request: RequestId,
    ) -> Result<(), SimError> {
        let req = self
            .line
            .iter()
            .find(|w| w.item.id == request)
            .map(|w| w.item.req.clone())
            .ok_or_else(|| SimError::NotWaiting {
                resource: self.name.clone(),
                request,
            })?;
        let unit = self
            .select(&req, scope.rng)?
            .ok_or_else(|| SimError::NoFreeCapacity(self.name.clone()))?;
        let w = self
            .line
            .remove_by(|t| t.id == request)
            .ok_or_else(|| SimError::NotWaiting {
                resource: self.name.clone(),
                request,
            })?;
        self.report_line(scope);
        self.grant(scope, rid, unit, w.item)
    }

    fn report_busy(&self, scope: &mut Scope<'_>) {
        scope.observe(&self.name, "busy", self.busy() as f64, None);
    }

    fn report_line(&self, scope: &mut Scope<'_>) {
        scope.observe(&self.name, "queue_len", self.line.len() as f64, None);
    }

    pub(crate) fn snapshot_parts(&self) -> ResourceSnapshotParts {
        ResourceSnapshotParts {
            kind: PrimitiveKind::Pool,
            owner: self.owner,
            capacity: Some(self.units.len()),
            busy: self.busy(),
            waiting: self.line.len(),
            holders: self
                .units
                .iter()
                .filter_map(|u| u.holder.as_ref().map(|h| h.ticket.id))
                .collect(),
            waiting_requests: self.line.iter().map(|w| w.item.id).collect(),
            waiting_entities: self.line.iter().map(|w| w.item.req.entity).collect(),
        }
    }
}
