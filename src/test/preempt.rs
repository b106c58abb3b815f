use super::support::Client;
use crate::sim::{Payload, ResourceId, SimError, SimTime, Simulation, StopCondition};
use crate::stats::TraceLog;

fn resource_sim(capacity: usize, preemptive: bool) -> (Simulation, ResourceId, Client) {
    let mut sim = Simulation::default();
    let root = sim.root();
    let res = sim
        .add_resource(root, "res", capacity, preemptive)
        .expect("resource");
    let client = Client::new(&mut sim, res);
    (sim, res, client)
}

#[test]
fn preempted_holder_resumes_with_its_remaining_work() {
    let (mut sim, _res, client) = resource_sim(1, true);
    let log = sim.add_collector(TraceLog::default());
    client.arrive(&mut sim, 0.0, 1, Some(10.0), 5);
    client.arrive(&mut sim, 4.0, 2, Some(3.0), 0);
    sim.run(StopCondition::Drained).expect("run");

    // B releases at 7, A needs the 6 units it had left
    assert_eq!(client.times("granted"), vec![(1, 0.0), (2, 4.0), (1, 7.0)]);
    assert_eq!(client.times("done"), vec![(2, 7.0), (1, 13.0)]);

    let a = client.outcome("done", 1);
    assert_eq!(a.served, 10.0);
    assert_eq!(a.preemptions, 1);
    assert_eq!(a.waited, 3.0);
    assert_eq!(client.outcome("done", 2).served, 3.0);

    let trace = sim.collector::<TraceLog>(log).expect("log");
    assert_eq!(trace.for_collector("res.preemptions").count(), 1);
}

#[test]
fn equal_priority_does_not_preempt() {
    let (mut sim, _res, client) = resource_sim(1, true);
    client.arrive(&mut sim, 0.0, 1, Some(10.0), 2);
    client.arrive(&mut sim, 4.0, 2, Some(3.0), 2);
    sim.run(StopCondition::Drained).expect("run");

    assert_eq!(client.times("granted"), vec![(1, 0.0), (2, 10.0)]);
    assert_eq!(client.outcome("done", 1).preemptions, 0);
}

#[test]
fn non_preemptive_resource_makes_urgent_requests_wait() {
    let (mut sim, res, client) = resource_sim(1, false);
    client.arrive(&mut sim, 0.0, 1, Some(10.0), 5);
    client.arrive(&mut sim, 4.0, 2, Some(3.0), 0);
    sim.run(StopCondition::Drained).expect("run");

    assert!(!sim.resource(res).expect("res").is_preemptive());
    assert_eq!(client.times("granted"), vec![(1, 0.0), (2, 10.0)]);
}

#[test]
fn least_urgent_holder_is_evicted() {
    let (mut sim, res, client) = resource_sim(2, true);
    client.arrive(&mut sim, 0.0, 1, Some(10.0), 1);
    client.arrive(&mut sim, 0.0, 2, Some(10.0), 3);
    client.arrive(&mut sim, 1.0, 3, Some(2.0), 0);
    sim.run(StopCondition::Until(SimTime(1.0))).expect("run");

    let snap = sim.resource_snapshot(res).expect("snapshot");
    assert_eq!(snap.busy, 2);
    assert_eq!(snap.holders, vec![client.id(1), client.id(3)]);
    assert_eq!(snap.waiting_requests, vec![client.id(2)]);

    sim.run(StopCondition::Drained).expect("run");
    // 2 had 9 units left when it was evicted at 1 and resumed at 3
    assert_eq!(client.times("done"), vec![(3, 3.0), (1, 10.0), (2, 12.0)]);
    assert_eq!(client.outcome("done", 2).served, 10.0);
}

#[test]
fn repeated_preemption_keeps_the_total_service_exact() {
    let (mut sim, _res, client) = resource_sim(1, true);
    client.arrive(&mut sim, 0.0, 1, Some(10.0), 9);
    client.arrive(&mut sim, 2.0, 2, Some(1.0), 0);
    client.arrive(&mut sim, 5.5, 3, Some(0.5), 0);
    sim.run(StopCondition::Drained).expect("run");

    let a = client.outcome("done", 1);
    assert_eq!(a.preemptions, 2);
    assert_eq!(a.served, 10.0);
    assert_eq!(client.times("done").last(), Some(&(1, 11.5)));
}

#[test]
fn holding_without_duration_lasts_until_release() {
    let (mut sim, res, client) = resource_sim(1, false);
    client.arrive(&mut sim, 1.0, 1, None, 0);
    client.arrive(&mut sim, 2.0, 2, None, 0);
    sim.run(StopCondition::Drained).expect("run");
    assert_eq!(sim.resource(res).expect("res").busy(), 1);
    assert_eq!(sim.now(), SimTime(2.0));

    sim.schedule(client.node, SimTime(6.0), 0, "release", Payload::new(client.id(1)))
        .expect("schedule");
    sim.run(StopCondition::Drained).expect("run");

    assert_eq!(client.times("done"), vec![(1, 6.0)]);
    assert_eq!(client.outcome("done", 1).served, 5.0);
    assert_eq!(client.times("granted"), vec![(1, 1.0), (2, 6.0)]);
    assert_eq!(client.outcome("granted", 2).waited, 4.0);

    let out = sim.release(res, client.id(2)).expect("release");
    assert_eq!(out.served, 0.0);
    assert!(matches!(
        sim.release(res, client.id(2)),
        Err(SimError::NotHeld { .. })
    ));
}
