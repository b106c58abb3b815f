//! Counted resource with optional preemption.
//!
//! Holders either bring a duration (a completion event is scheduled) or hold
//! until they release explicitly. With preemption on, an arrival with a
//! strictly lower priority value than the least urgent holder evicts it; the
//! evicted request keeps its remaining duration and goes back to the head of
//! the line.

use super::station::Station;
use super::wait_queue::Discipline;
use super::{Outcome, Request, Scope, Ticket, check_duration};
use crate::sim::{NodeId, RequestId, ResourceId, SimError};

#[derive(Debug)]
pub struct Resource {
    station: Station,
}

impl Resource {
    pub(crate) fn new(
        name: String,
        owner: NodeId,
        capacity: usize,
        preemptive: bool,
    ) -> Result<Self, SimError> {
        Ok(Self {
            station: Station::new(name, owner, capacity, Discipline::Priority, preemptive)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.station.name
    }

    pub fn capacity(&self) -> usize {
        self.station.capacity
    }

    pub fn is_preemptive(&self) -> bool {
        self.station.preemptive
    }

    pub fn busy(&self) -> usize {
        self.station.busy()
    }

    pub(crate) fn station(&self) -> &Station {
        &self.station
    }

    pub(crate) fn station_mut(&mut self) -> &mut Station {
        &mut self.station
    }

    pub(crate) fn request(
        &mut self,
        scope: &mut Scope<'_>,
        rid: ResourceId,
        id: RequestId,
        req: Request,
    ) -> Result<(), SimError> {
        let duration = req.duration.map(check_duration).transpose()?;
        let ticket = Ticket::new(id, req, duration, scope.now());
        self.station.arrive(scope, rid, ticket)
    }

    pub(crate) fn release(
        &mut self,
        scope: &mut Scope<'_>,
        rid: ResourceId,
        request: RequestId,
        completed: bool,
    ) -> Result<Outcome, SimError> {
        self.station.release(scope, rid, request, completed)
    }
}
