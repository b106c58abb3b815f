//! Demo models
//!
//! An M/M/c queue: Poisson arrivals feeding a server with exponential service
//! times. Used by the `mm1` binary and by the steady-state tests.

use crate::resource::{Discipline, Request, ServiceTime};
use crate::sim::{NodeId, Payload, ResourceId, SimError, Simulation};
use crate::stats::{Counters, TimeAverage};

/// M/M/c model options.
#[derive(Debug, Clone)]
pub struct Mm1Opts {
    pub arrival_rate: f64,
    pub service_rate: f64,
    pub servers: usize,
}

impl Default for Mm1Opts {
    fn default() -> Self {
        Self {
            arrival_rate: 0.5,
            service_rate: 1.0,
            servers: 1,
        }
    }
}

impl Mm1Opts {
    /// Offered load per server.
    pub fn rho(&self) -> f64 {
        self.arrival_rate / (self.service_rate * self.servers as f64)
    }

    /// Closed-form mean number waiting, single server only.
    pub fn expected_queue_len(&self) -> Option<f64> {
        let rho = self.rho();
        (self.servers == 1 && rho < 1.0).then(|| rho * rho / (1.0 - rho))
    }
}

/// Handles into a built M/M/c model.
#[derive(Debug, Clone, Copy)]
pub struct Mm1 {
    pub source: NodeId,
    pub server: ResourceId,
    /// Collector index of the time-averaged line length.
    pub queue_len: usize,
    /// Collector index of the event counters.
    pub counters: usize,
}

pub const ARRIVAL: &str = "arrival";

/// Build the model under the root of `sim` and schedule the first arrival.
pub fn build_mm1(sim: &mut Simulation, opts: &Mm1Opts) -> Result<Mm1, SimError> {
    for (what, rate) in [("arrival", opts.arrival_rate), ("service", opts.service_rate)] {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(SimError::InvalidRate { what, rate });
        }
    }
    let root = sim.root();
    let source = sim.create_child(root, "source")?;
    let server = sim.add_server(
        root,
        "server",
        opts.servers,
        Discipline::Fifo,
        ServiceTime::Exponential {
            rate: opts.service_rate,
        },
    )?;
    let queue_len = sim.add_collector(TimeAverage::new("server.queue_len"));
    let counters = sim.add_collector(Counters::default());

    let rate = opts.arrival_rate;
    sim.on(source, ARRIVAL, move |ctx, _ev| {
        let entity = ctx.new_entity();
        ctx.request(server, Request::new().entity(entity))?;
        let gap = ctx.rng().exponential(rate);
        ctx.schedule_in(gap, ARRIVAL, Payload::none())?;
        Ok(())
    })?;

    let first = sim.rng().exponential(rate);
    sim.schedule_after(source, first, ARRIVAL, Payload::none())?;

    Ok(Mm1 {
        source,
        server,
        queue_len,
        counters,
    })
}
