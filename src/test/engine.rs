use crate::sim::{
    NodeId, Payload, SimConfig, SimError, SimTime, Simulation, StopCondition, StopReason,
};
use crate::stats::{Collector, Notification, TraceLog};
use std::any::Any;

/// Root with a `tick` handler that reschedules itself every time unit and
/// observes the tick count.
fn ticker(config: SimConfig) -> (Simulation, NodeId) {
    let mut sim = Simulation::new(config);
    let root = sim.root();
    sim.set_state(root, 0u32).expect("state");
    sim.on(root, "tick", |ctx, _ev| {
        let n = {
            let count = ctx.state::<u32>().expect("count");
            *count += 1;
            *count
        };
        ctx.observe("ticks", f64::from(n), None);
        ctx.schedule_in(1.0, "tick", Payload::none())?;
        Ok(())
    })
    .expect("handler");
    sim.schedule(root, SimTime(1.0), 0, "tick", Payload::none())
        .expect("schedule");
    (sim, root)
}

#[test]
fn until_dispatches_events_at_the_bound_and_keeps_later_ones() {
    let (mut sim, root) = ticker(SimConfig::default());
    let summary = sim.run(StopCondition::Until(SimTime(5.0))).expect("run");

    assert_eq!(summary.events, 5);
    assert_eq!(summary.reason, StopReason::TimeReached);
    assert_eq!(summary.pending, 1);
    assert_eq!(sim.now(), SimTime(5.0));
    assert_eq!(sim.state::<u32>(root), Some(&5));
}

#[test]
fn for_is_relative_to_the_current_clock() {
    let (mut sim, root) = ticker(SimConfig::default());
    sim.run(StopCondition::Until(SimTime(3.0))).expect("run");
    let summary = sim.run(StopCondition::For(2.5)).expect("run");

    assert_eq!(summary.events, 2);
    assert_eq!(sim.now(), SimTime(5.0));
    // the clock stops at the last event, the observed interval at the bound
    assert_eq!(summary.now, SimTime(5.0));
    assert_eq!(summary.end, SimTime(5.5));
    assert_eq!(sim.state::<u32>(root), Some(&5));
}

#[test]
fn event_limit_counts_only_this_run() {
    let (mut sim, _root) = ticker(SimConfig::default());
    sim.run(StopCondition::Events(3)).expect("run");
    let summary = sim.run(StopCondition::Events(4)).expect("run");

    assert_eq!(summary.events, 4);
    assert_eq!(summary.reason, StopReason::EventLimit);
    assert_eq!(sim.dispatched(), 7);
    assert_eq!(sim.now(), SimTime(7.0));
}

#[test]
fn unreachable_stop_conditions_are_rejected() {
    let (mut sim, _root) = ticker(SimConfig::default());
    sim.run(StopCondition::Until(SimTime(4.0))).expect("run");

    for stop in [
        StopCondition::Until(SimTime(3.0)),
        StopCondition::Until(SimTime(f64::NAN)),
        StopCondition::For(-1.0),
        StopCondition::For(f64::INFINITY),
        StopCondition::Events(0),
    ] {
        assert!(
            matches!(sim.run(stop), Err(SimError::StopConditionUnreachable(_))),
            "{stop:?}"
        );
    }
    assert_eq!(sim.now(), SimTime(4.0));
    assert_eq!(sim.dispatched(), 4);
}

#[test]
fn drained_on_an_empty_queue_returns_immediately() {
    let mut sim = Simulation::default();
    let summary = sim.run(StopCondition::Drained).expect("run");
    assert_eq!(summary.events, 0);
    assert_eq!(summary.reason, StopReason::Drained);
    assert_eq!(sim.now(), SimTime::ZERO);
}

#[test]
fn until_on_a_drained_queue_stops_without_moving_the_clock() {
    let mut sim = Simulation::default();
    let root = sim.root();
    sim.on(root, "noop", |_ctx, _ev| Ok(())).expect("handler");
    sim.schedule(root, SimTime(2.0), 0, "noop", Payload::none())
        .expect("schedule");

    let summary = sim.run(StopCondition::Until(SimTime(10.0))).expect("run");
    assert_eq!(summary.reason, StopReason::Drained);
    assert_eq!(sim.now(), SimTime(2.0));
    assert_eq!(summary.end, SimTime(2.0));
}

#[test]
fn handler_error_aborts_the_run_at_the_failing_event() {
    let mut sim = Simulation::default();
    let root = sim.root();
    sim.on(root, "ok", |ctx, _ev| {
        ctx.count("ok", None);
        Ok(())
    })
    .expect("handler");
    sim.on(root, "boom", |_ctx, _ev| Err(SimError::Handler("boom".into())))
        .expect("handler");
    let log = sim.add_collector(TraceLog::default());
    sim.schedule(root, SimTime(1.0), 0, "ok", Payload::none()).expect("schedule");
    sim.schedule(root, SimTime(2.0), 0, "boom", Payload::none()).expect("schedule");
    sim.schedule(root, SimTime(3.0), 0, "ok", Payload::none()).expect("schedule");

    let err = sim.run(StopCondition::Drained).expect_err("boom");
    assert_eq!(err, SimError::Handler("boom".into()));
    assert_eq!(sim.now(), SimTime(2.0));
    assert_eq!(sim.pending_events(), 1);
    let trace = sim.collector::<TraceLog>(log).expect("log");
    assert_eq!(trace.for_collector("ok").count(), 1);

    // the handler table survives the failure
    sim.run(StopCondition::Drained).expect("run");
    assert_eq!(sim.collector::<TraceLog>(log).expect("log").for_collector("ok").count(), 2);
}

#[derive(Default)]
struct ResetRecorder {
    resets: Vec<SimTime>,
    seen: Vec<f64>,
}

impl Collector for ResetRecorder {
    fn notify(&mut self, n: &Notification) {
        self.seen.push(n.value);
    }

    fn warmup_reset(&mut self, at: SimTime) {
        self.resets.push(at);
        self.seen.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn warmup_resets_collectors_exactly_once() {
    let config = SimConfig {
        warmup_until: Some(2.5),
        ..SimConfig::default()
    };
    let (mut sim, _root) = ticker(config);
    let recorder = sim.add_collector(ResetRecorder::default());
    let log = sim.add_collector(TraceLog::default());

    sim.run(StopCondition::Until(SimTime(2.0))).expect("run");
    assert!(sim.collector::<ResetRecorder>(recorder).expect("recorder").resets.is_empty());

    sim.run(StopCondition::Until(SimTime(6.0))).expect("run");
    sim.run(StopCondition::Until(SimTime(8.0))).expect("run");
    let p = sim.collector::<ResetRecorder>(recorder).expect("recorder");
    assert_eq!(p.resets, vec![SimTime(2.5)]);
    assert_eq!(p.seen, vec![3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);

    // the raw trace keeps pre-warmup entries and only records the reset point
    let trace = sim.collector::<TraceLog>(log).expect("log");
    assert_eq!(trace.warmup_at, Some(SimTime(2.5)));
    assert_eq!(trace.for_collector("ticks").count(), 8);
}

#[test]
fn dispatch_records_mark_decision_kinds() {
    let (mut sim, root) = ticker(SimConfig::default());
    sim.on(root, "decide", |_ctx, _ev| Ok(())).expect("handler");
    sim.mark_decision("decide");
    sim.schedule(root, SimTime(1.0), 0, "decide", Payload::none())
        .expect("schedule");

    let first = sim.step().expect("step").expect("event");
    let second = sim.step().expect("step").expect("event");
    assert_eq!((first.kind.name(), first.decision), ("tick", false));
    assert_eq!((second.kind.name(), second.decision), ("decide", true));
}
