use super::support::Client;
use crate::resource::{Discipline, Request, ServiceTime};
use crate::sim::{EntityId, Payload, ResourceId, SimError, SimTime, Simulation, StopCondition};
use crate::stats::TraceLog;

fn server_sim(capacity: usize, discipline: Discipline) -> (Simulation, ResourceId, Client) {
    let mut sim = Simulation::default();
    let root = sim.root();
    let srv = sim
        .add_server(root, "srv", capacity, discipline, ServiceTime::Fixed(2.0))
        .expect("server");
    let client = Client::new(&mut sim, srv);
    (sim, srv, client)
}

#[test]
fn free_channel_grants_immediately() {
    let (mut sim, srv, client) = server_sim(1, Discipline::Fifo);
    client.arrive(&mut sim, 3.0, 1, Some(4.0), 0);
    sim.run(StopCondition::Drained).expect("run");

    assert_eq!(client.times("granted"), vec![(1, 3.0)]);
    assert_eq!(client.times("done"), vec![(1, 7.0)]);
    let out = client.outcome("done", 1);
    assert_eq!(out.waited, 0.0);
    assert_eq!(out.served, 4.0);
    assert_eq!(sim.server(srv).expect("srv").busy(), 0);
}

#[test]
fn busy_never_exceeds_capacity() {
    let (mut sim, srv, client) = server_sim(2, Discipline::Fifo);
    let log = sim.add_collector(TraceLog::default());
    for (i, at) in [0.0, 0.0, 0.0, 0.5, 1.0, 1.0].into_iter().enumerate() {
        client.arrive(&mut sim, at, i as u64, Some(1.5), 0);
    }

    sim.run(StopCondition::Until(SimTime(0.0))).expect("run");
    let s = sim.server(srv).expect("srv");
    assert_eq!((s.busy(), s.waiting()), (2, 1));

    sim.run(StopCondition::Drained).expect("run");
    let trace = sim.collector::<TraceLog>(log).expect("log");
    assert!(trace.for_collector("srv.busy").all(|n| n.value <= 2.0));
    assert_eq!(trace.for_collector("srv.completions").count(), 6);
    assert_eq!(client.times("done").len(), 6);
}

#[test]
fn waiting_request_is_promoted_at_the_release_time() {
    let (mut sim, _srv, client) = server_sim(1, Discipline::Fifo);
    client.arrive(&mut sim, 0.0, 1, Some(5.0), 0);
    client.arrive(&mut sim, 1.0, 2, Some(1.0), 0);
    sim.run(StopCondition::Drained).expect("run");

    assert_eq!(client.times("granted"), vec![(1, 0.0), (2, 5.0)]);
    assert_eq!(client.outcome("done", 2).waited, 4.0);
    assert_eq!(client.times("done"), vec![(1, 5.0), (2, 6.0)]);
}

#[test]
fn release_runs_before_an_arrival_at_the_same_time() {
    let (mut sim, _srv, client) = server_sim(1, Discipline::Fifo);
    client.arrive(&mut sim, 0.0, 1, Some(5.0), 0);
    client.arrive(&mut sim, 1.0, 2, Some(1.0), 0);
    // queued before the completion at 5 even exists
    client.arrive(&mut sim, 5.0, 3, Some(1.0), 0);
    sim.run(StopCondition::Drained).expect("run");

    assert_eq!(client.times("granted"), vec![(1, 0.0), (2, 5.0), (3, 6.0)]);
}

#[test]
fn missing_duration_is_sampled_from_the_service_time() {
    let (mut sim, _srv, client) = server_sim(1, Discipline::Fifo);
    client.arrive(&mut sim, 1.0, 1, None, 0);
    sim.run(StopCondition::Drained).expect("run");
    assert_eq!(client.times("done"), vec![(1, 3.0)]);
}

#[test]
fn priority_line_serves_urgent_requests_first() {
    let (mut sim, _srv, client) = server_sim(1, Discipline::Priority);
    client.arrive(&mut sim, 0.0, 1, Some(1.0), 0);
    client.arrive(&mut sim, 0.0, 2, Some(1.0), 5);
    client.arrive(&mut sim, 0.0, 3, Some(1.0), 1);
    client.arrive(&mut sim, 0.0, 4, Some(1.0), 1);
    sim.run(StopCondition::Drained).expect("run");

    let order: Vec<u64> = client.times("granted").into_iter().map(|(e, _)| e).collect();
    assert_eq!(order, vec![1, 3, 4, 2]);
}

#[test]
fn manual_line_waits_for_the_controller() {
    let (mut sim, srv, client) = server_sim(1, Discipline::Manual);
    client.arrive(&mut sim, 0.0, 1, Some(1.0), 0);
    client.arrive(&mut sim, 0.0, 2, Some(1.0), 0);
    client.arrive(&mut sim, 0.0, 3, Some(1.0), 0);
    sim.run(StopCondition::Drained).expect("run");

    // the freed channel stays idle
    assert_eq!(sim.now(), SimTime(1.0));
    let snap = sim.resource_snapshot(srv).expect("snapshot");
    assert_eq!((snap.busy, snap.waiting), (0, 2));

    let third = client.id(3);
    sim.promote(srv, third).expect("promote");
    assert_eq!(
        sim.promote(srv, client.id(2)),
        Err(SimError::NoFreeCapacity("srv".into()))
    );
    sim.run(StopCondition::Drained).expect("run");

    assert_eq!(client.times("granted"), vec![(1, 0.0), (3, 1.0)]);
    assert_eq!(client.outcome("done", 3).waited, 1.0);
    assert_eq!(sim.server(srv).expect("srv").waiting(), 1);
}

#[test]
fn withdrawn_request_leaves_the_line() {
    let (mut sim, srv, client) = server_sim(1, Discipline::Fifo);
    client.arrive(&mut sim, 0.0, 1, Some(3.0), 0);
    client.arrive(&mut sim, 0.0, 2, Some(3.0), 0);
    client.arrive(&mut sim, 0.0, 3, Some(3.0), 0);
    sim.run(StopCondition::Until(SimTime(1.0))).expect("run");

    let req = sim.withdraw(srv, client.id(2)).expect("withdraw");
    assert_eq!(req.entity, Some(EntityId(2)));
    assert!(matches!(
        sim.withdraw(srv, client.id(1)),
        Err(SimError::NotWaiting { .. })
    ));
    sim.run(StopCondition::Drained).expect("run");

    assert_eq!(client.times("granted"), vec![(1, 0.0), (3, 3.0)]);
}

#[test]
fn early_release_frees_the_channel_and_cancels_the_completion() {
    let (mut sim, srv, client) = server_sim(1, Discipline::Fifo);
    client.arrive(&mut sim, 0.0, 1, Some(10.0), 0);
    client.arrive(&mut sim, 0.0, 2, Some(1.0), 0);
    sim.run(StopCondition::Until(SimTime(0.0))).expect("run");
    sim.schedule(client.node, SimTime(4.0), 0, "release", Payload::new(client.id(1)))
        .expect("schedule");
    sim.run(StopCondition::Drained).expect("run");

    assert_eq!(client.times("done"), vec![(1, 4.0), (2, 5.0)]);
    assert_eq!(client.outcome("done", 1).served, 4.0);
    assert_eq!(sim.now(), SimTime(5.0));
    assert!(matches!(
        sim.release(srv, client.id(1)),
        Err(SimError::NotHeld { .. })
    ));
}

#[test]
fn invalid_construction_and_operations_are_rejected() {
    let mut sim = Simulation::default();
    let root = sim.root();
    assert_eq!(
        sim.add_server(root, "none", 0, Discipline::Fifo, ServiceTime::Fixed(1.0))
            .map(|_| ()),
        Err(SimError::InvalidCapacity(0))
    );
    let q = sim.add_queue(root, "q", Discipline::Fifo, 0).expect("queue");
    assert_eq!(
        sim.request(q, Request::new()),
        Err(SimError::Unsupported {
            resource: "q".into(),
            op: "request"
        })
    );
    let srv = sim
        .add_server(root, "srv", 1, Discipline::Fifo, ServiceTime::Fixed(1.0))
        .expect("server");
    assert_eq!(
        sim.request(srv, Request::new().duration(-1.0)),
        Err(SimError::InvalidDuration(-1.0))
    );
    assert_eq!(
        sim.request(srv, Request::new().on_grant("nobody_listens")),
        Err(SimError::NoHandler {
            node: root,
            kind: "nobody_listens"
        })
    );
    assert_eq!(sim.server(srv).expect("srv").busy(), 0);
}
