use crate::demo::{Mm1Opts, build_mm1};
use crate::sim::{SimConfig, SimError, SimTime, Simulation, StopCondition};
use crate::stats::{Counters, TimeAverage};

#[test]
fn mm1_mean_queue_length_matches_the_closed_form() {
    let opts = Mm1Opts::default();
    let expected = opts.expected_queue_len().expect("single server");
    assert!((expected - 0.5).abs() < 1e-12);

    let mut sim = Simulation::new(SimConfig {
        name: "mm1".into(),
        seed: 2024,
        warmup_until: Some(1_000.0),
    });
    let model = build_mm1(&mut sim, &opts).expect("model");
    let horizon = 100_000.0;
    let run = sim.run(StopCondition::Until(SimTime(horizon))).expect("run");

    let mean = sim
        .collector::<TimeAverage>(model.queue_len)
        .expect("time average")
        .mean(run.end);
    assert!(
        (mean - expected).abs() < 0.12,
        "mean queue length {mean}, expected {expected}"
    );

    // counters restart at the warmup time
    let counters = sim.collector::<Counters>(model.counters).expect("counters");
    let arrivals = counters.get("server.arrivals");
    let span = horizon - 1_000.0;
    assert!(
        (arrivals / span - opts.arrival_rate).abs() < 0.025,
        "{arrivals} arrivals over {span}"
    );
    let done = counters.get("server.completions");
    assert!((done - arrivals).abs() < 50.0, "{done} completions, {arrivals} arrivals");
    assert!(counters.totals().contains_key("server.grants"));
    assert!(counters.totals().keys().all(|k| k.starts_with("server.")));
}

#[test]
fn time_average_weights_levels_by_duration() {
    use crate::stats::{Collector, Notification, NotificationKind};

    let obs = |t: f64, v: f64| Notification {
        time: SimTime(t),
        collector: "x".into(),
        kind: NotificationKind::Observe,
        value: v,
        entity: None,
    };
    let mut avg = TimeAverage::new("x");
    avg.notify(&obs(0.0, 2.0));
    avg.notify(&obs(1.0, 0.0));
    avg.notify(&obs(3.0, 4.0));
    assert_eq!(avg.mean(SimTime(4.0)), (2.0 + 0.0 + 4.0) / 4.0);

    avg.warmup_reset(SimTime(4.0));
    assert_eq!(avg.mean(SimTime(6.0)), 4.0);
    assert_eq!(avg.current(), 4.0);
}

#[test]
fn invalid_rates_are_rejected() {
    let mut sim = Simulation::default();
    let opts = Mm1Opts {
        arrival_rate: 0.0,
        ..Mm1Opts::default()
    };
    assert_eq!(
        build_mm1(&mut sim, &opts).err(),
        Some(SimError::InvalidRate {
            what: "arrival",
            rate: 0.0
        })
    );
    let slow = Mm1Opts {
        service_rate: -1.0,
        ..Mm1Opts::default()
    };
    assert!(matches!(
        build_mm1(&mut Simulation::default(), &slow),
        Err(SimError::InvalidRate { what: "service", .. })
    ));
    // nothing was built for the rejected model
    assert_eq!(sim.nodes().count(), 1);
    assert!(Mm1Opts { servers: 2, ..Mm1Opts::default() }.expected_queue_len().is_none());
}
