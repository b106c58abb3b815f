//! Server: parallel service channels with an internal waiting line.

use super::station::Station;
use super::wait_queue::Discipline;
use super::{Outcome, Request, Scope, Ticket, check_duration};
use crate::sim::{NodeId, RequestId, ResourceId, SimError, SimRng};
use std::fmt;

/// How a server picks the service duration of a request that did not bring
/// its own.
pub enum ServiceTime {
    Fixed(f64),
    Exponential { rate: f64 },
    Sampled(Box<dyn FnMut(&mut SimRng) -> f64>),
}

impl ServiceTime {
    pub fn sample(&mut self, rng: &mut SimRng) -> Result<f64, SimError> {
        let d = match self {
            ServiceTime::Fixed(d) => *d,
            ServiceTime::Exponential { rate } => rng.exponential(*rate),
            ServiceTime::Sampled(f) => f(rng),
        };
        check_duration(d)
    }
}

impl fmt::Debug for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceTime::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            ServiceTime::Exponential { rate } => {
                f.debug_struct("Exponential").field("rate", rate).finish()
            }
            ServiceTime::Sampled(_) => f.write_str("Sampled(..)"),
        }
    }
}

#[derive(Debug)]
pub struct Server {
    station: Station,
    service: ServiceTime,
}

impl Server {
    pub(crate) fn new(
        name: String,
        owner: NodeId,
        capacity: usize,
        discipline: Discipline,
        service: ServiceTime,
    ) -> Result<Self, SimError> {
        Ok(Self {
            station: Station::new(name, owner, capacity, discipline, false)?,
            service,
        })
    }

    pub fn name(&self) -> &str {
        &self.station.name
    }

    pub fn capacity(&self) -> usize {
        self.station.capacity
    }

    pub fn busy(&self) -> usize {
        self.station.busy()
    }

    pub fn waiting(&self) -> usize {
        self.station.line.len()
    }

    pub(crate) fn station(&self) -> &Station {
        &self.station
    }

    pub(crate) fn request(
        &mut self,
        scope: &mut Scope<'_>,
        rid: ResourceId,
        id: RequestId,
        req: Request,
    ) -> Result<(), SimError> {
        // sampled on arrival, not on grant
        let duration = match req.duration {
            Some(d) => check_duration(d)?,
            None => self.service.sample(scope.rng)?,
        };
        let ticket = Ticket::new(id, req, Some(duration), scope.now());
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

    pub(crate) fn station_mut(&mut self) -> &mut Station {
        &mut self.station
    }
}
