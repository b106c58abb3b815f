//! Run loop.
//!
//! The engine pulls events in `(time, priority, seq)` order, moves the clock,
//! and dispatches each event to the handler its target node registered for
//! the event's kind. Completion events are handled by the primitive that
//! scheduled them.

use super::context::Ctx;
use super::error::SimError;
use super::event::{Dispatched, Event, EventKind};
use super::simulation::Simulation;
use super::time::SimTime;
use serde::Serialize;
use tracing::{debug, info, trace};

/// When [`Simulation::run`] returns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopCondition {
    /// Dispatch every event with time `<= t`.
    Until(SimTime),
    /// `Until(now + d)`.
    For(f64),
    /// Dispatch this many events.
    Events(u64),
    /// Dispatch until the queue is empty.
    Drained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The next pending event lies past the time bound.
    TimeReached,
    EventLimit,
    /// No events left.
    Drained,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Events dispatched by this run.
    pub events: u64,
    pub now: SimTime,
    /// Where the observed interval ends: the time bound when the run stopped
    /// on it, otherwise the clock.
    pub end: SimTime,
    pub reason: StopReason,
    /// Events still pending.
    pub pending: usize,
}

impl Simulation {
    /// Dispatch events until `stop` is met or the queue runs dry.
    ///
    /// A handler error aborts the run; the clock stays at the failing event's
    /// time and every change made before the error is kept.
    #[tracing::instrument(skip(self), fields(now = %self.now()))]
    pub fn run(&mut self, stop: StopCondition) -> Result<RunSummary, SimError> {
        let (bound, limit) = self.resolve(stop)?;
        info!(pending = self.pending_events(), "▶️  run started");

        let mut events = 0u64;
        let reason = loop {
            if limit.is_some_and(|n| events >= n) {
                break StopReason::EventLimit;
            }
            let Some(next) = self.kernel.sim.peek_time() else {
                break StopReason::Drained;
            };
            if bound.is_some_and(|t| next > t) {
                break StopReason::TimeReached;
            }
            self.step()?;
            events += 1;
        };

        let now = self.now();
        let end = match (reason, bound) {
            (StopReason::TimeReached, Some(t)) => t,
            _ => now,
        };
        let summary = RunSummary {
            events,
            now,
            end,
            reason,
            pending: self.pending_events(),
        };
        info!(
            total_events = summary.events,
            final_time = %summary.now,
            reason = ?summary.reason,
            "✅ run finished"
        );
        Ok(summary)
    }

    /// Time bound and event limit of a stop condition.
    fn resolve(&self, stop: StopCondition) -> Result<(Option<SimTime>, Option<u64>), SimError> {
        let now = self.now();
        match stop {
            StopCondition::Until(t) => {
                if !t.is_valid() || t < now {
                    return Err(SimError::StopConditionUnreachable(format!(
                        "until {t} but the clock is already at {now}"
                    )));
                }
                Ok((Some(t), None))
            }
            StopCondition::For(d) => {
                if !d.is_finite() || d < 0.0 {
                    return Err(SimError::StopConditionUnreachable(format!(
                        "duration {d} is not a non-negative finite time"
                    )));
                }
                Ok((Some(now.after(d)), None))
            }
            StopCondition::Events(0) => Err(SimError::StopConditionUnreachable(
                "event limit of 0".to_string(),
            )),
            StopCondition::Events(n) => Ok((None, Some(n))),
            StopCondition::Drained => Ok((None, None)),
        }
    }

    /// Dispatch exactly one event. Returns `None` if the queue is empty.
    pub fn step(&mut self) -> Result<Option<Dispatched>, SimError> {
        let Some(next) = self.kernel.sim.peek_time() else {
            return Ok(None);
        };
        self.check_warmup(next);

        let Some(ev) = self.kernel.sim.advance() else {
            return Ok(None);
        };
        let record = Dispatched {
            time: ev.time,
            priority: ev.priority,
            seq: ev.seq,
            kind: ev.kind,
            target: ev.target,
            decision: self.decision_kinds.contains(ev.kind.name()),
        };
        debug!(
            event_num = self.dispatched(),
            now = %ev.time,
            seq = ev.seq,
            kind = ev.kind.name(),
            target = %ev.target,
            "dispatch"
        );
        self.dispatch(ev)?;
        Ok(Some(record))
    }

    /// Reset collectors once, right before the clock first reaches the
    /// warmup threshold.
    fn check_warmup(&mut self, next: SimTime) {
        if self.warmup_done {
            return;
        }
        let Some(w) = self.config().warmup_until else {
            return;
        };
        let at = SimTime(w);
        if next >= at {
            self.warmup_done = true;
            info!(at = %at, "warmup over, collectors reset");
            self.kernel.obs.warmup_reset(at);
        }
    }

    fn dispatch(&mut self, ev: Event) -> Result<(), SimError> {
        let target = ev.target;
        let name = match ev.kind {
            EventKind::Completion { resource, request } => {
                self.kernel.complete(resource, request)?;
                return Ok(());
            }
            EventKind::Named { name } => name,
        };

        let node = self.kernel.node_mut(target)?;
        let mut handler = node
            .handlers
            .get_mut(name)
            .and_then(Option::take)
            .ok_or(SimError::NoHandler { node: target, kind: name })?;
        let mut state = node.state.take();

        let result = {
            let mut ctx = Ctx::new(&mut self.kernel, target, &mut state);
            handler(&mut ctx, ev)
        };

        let node = self.kernel.node_mut(target)?;
        node.state = state;
        if let Some(slot) = node.handlers.get_mut(name) {
            *slot = Some(handler);
        }
        if let Err(e) = &result {
            trace!(node = %target, kind = name, error = %e, "handler failed");
        }
        result
    }
}
