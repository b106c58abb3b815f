//! Step/reset interface for external controllers (RL agents, optimisers).
//!
//! An [`Environment`] owns a tree built by a user-supplied builder. `step`
//! dispatches up to the next event (or the next decision-point event) and
//! returns what changed; between steps the controller applies actions
//! synchronously through [`Environment::act`]. `reset` throws the tree away,
//! re-seeds and builds it again, so the same seed and the same actions give
//! the same trace.

use crate::sim::{Dispatched, SimConfig, SimError, SimTime, Simulation, Snapshot};
use crate::stats::Notification;
use serde::Serialize;
use tracing::debug;

pub type Builder = Box<dyn FnMut(&mut Simulation) -> Result<(), SimError>>;

/// How far one [`Environment::step`] goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    NextEvent,
    /// Until an event whose kind was marked with
    /// [`Simulation::mark_decision`] has been dispatched.
    NextDecision,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    /// Events dispatched during the step, in order.
    pub dispatched: Vec<Dispatched>,
    pub snapshot: Snapshot,
    /// Notifications emitted since the previous step, including those
    /// raised by actions applied in between.
    pub deltas: Vec<Notification>,
    /// No more events, or the next one lies past the horizon.
    pub done: bool,
}

pub struct Environment {
    config: SimConfig,
    mode: StepMode,
    horizon: Option<SimTime>,
    builder: Builder,
    sim: Simulation,
}

impl Environment {
    pub fn new<F>(config: SimConfig, mode: StepMode, builder: F) -> Result<Self, SimError>
    where
        F: FnMut(&mut Simulation) -> Result<(), SimError> + 'static,
    {
        let mut builder: Builder = Box::new(builder);
        let sim = Self::build(&config, &mut builder)?;
        Ok(Self {
            config,
            mode,
            horizon: None,
            builder,
            sim,
        })
    }

    /// Episodes end once the next event lies past `horizon`.
    pub fn with_horizon(mut self, horizon: SimTime) -> Self {
        self.horizon = Some(horizon);
        self
    }

    fn build(config: &SimConfig, builder: &mut Builder) -> Result<Simulation, SimError> {
        let mut sim = Simulation::new(config.clone());
        sim.kernel.obs.set_capture(true);
        builder(&mut sim)?;
        // construction noise is not part of the first step
        sim.kernel.obs.take_captured();
        Ok(sim)
    }

    /// Rebuild the tree. `seed` replaces the configured seed when given.
    pub fn reset(&mut self, seed: Option<u64>) -> Result<Snapshot, SimError> {
        if let Some(seed) = seed {
            self.config.seed = seed;
        }
        self.sim = Self::build(&self.config, &mut self.builder)?;
        debug!(seed = self.config.seed, "environment reset");
        Ok(self.sim.snapshot())
    }

    pub fn step(&mut self) -> Result<StepResult, SimError> {
        let mut dispatched = Vec::new();
        while !self.is_done() {
            let Some(d) = self.sim.step()? else {
                break;
            };
            let decision = d.decision;
            dispatched.push(d);
            if self.mode == StepMode::NextEvent || decision {
                break;
            }
        }
        Ok(StepResult {
            dispatched,
            snapshot: self.sim.snapshot(),
            deltas: self.sim.kernel.obs.take_captured(),
            done: self.is_done(),
        })
    }

    /// Apply an action between steps.
    pub fn act<R>(
        &mut self,
        action: impl FnOnce(&mut Simulation) -> Result<R, SimError>,
    ) -> Result<R, SimError> {
        action(&mut self.sim)
    }

    pub fn is_done(&mut self) -> bool {
        match self.sim.kernel.sim.peek_time() {
            None => true,
            Some(next) => self.horizon.is_some_and(|h| next > h),
        }
    }

    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn mode(&self) -> StepMode {
        self.mode
    }
}
