use clap::Parser;
use serde::Serialize;
use simcraft_rs::demo::{Mm1Opts, build_mm1};
use simcraft_rs::sim::{SimConfig, SimTime, Simulation, StopCondition, StopReason};
use simcraft_rs::stats::{Counters, TimeAverage, TraceLog};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "mm1", about = "Run an M/M/c queue and print a JSON summary")]
struct Args {
    /// Mean arrivals per time unit
    #[arg(long, default_value_t = 0.5)]
    arrival_rate: f64,

    /// Mean completions per time unit per server
    #[arg(long, default_value_t = 1.0)]
    service_rate: f64,

    /// Number of parallel servers
    #[arg(long, default_value_t = 1)]
    servers: usize,

    /// Simulated time to run for
    #[arg(long, default_value_t = 10_000.0)]
    until: f64,

    /// Discard statistics collected before this time
    #[arg(long)]
    warmup: Option<f64>,

    /// Seed of the random stream
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Load run config (seed, warmup_until, name) from a JSON file;
    /// command line values for seed/warmup are ignored when set
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write every notification as JSON to this file
    #[arg(long)]
    trace_json: Option<PathBuf>,

    /// Silence logging
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Serialize)]
struct Summary {
    seed: u64,
    rho: f64,
    now: SimTime,
    end: SimTime,
    events: u64,
    reason: StopReason,
    mean_queue_len: f64,
    expected_queue_len: Option<f64>,
    arrivals: f64,
    completions: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if args.quiet {
            tracing_subscriber::EnvFilter::new("off")
        } else {
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        })
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let config = match &args.config {
        Some(path) => SimConfig::load(path)?,
        None => {
            let cfg = SimConfig {
                name: "mm1".to_string(),
                seed: args.seed,
                warmup_until: args.warmup,
            };
            cfg.validate()?;
            cfg
        }
    };
    let opts = Mm1Opts {
        arrival_rate: args.arrival_rate,
        service_rate: args.service_rate,
        servers: args.servers,
    };

    let mut sim = Simulation::new(config);
    let trace = args.trace_json.as_ref().map(|_| sim.add_collector(TraceLog::default()));
    let model = build_mm1(&mut sim, &opts)?;

    let run = sim.run(StopCondition::Until(SimTime(args.until)))?;

    let mean_queue_len = sim
        .collector::<TimeAverage>(model.queue_len)
        .map(|c| c.mean(run.end))
        .unwrap_or(0.0);
    let (arrivals, completions) = sim
        .collector::<Counters>(model.counters)
        .map(|c| (c.get("server.arrivals"), c.get("server.completions")))
        .unwrap_or_default();

    if let (Some(path), Some(idx)) = (&args.trace_json, trace) {
        if let Some(log) = sim.collector::<TraceLog>(idx) {
            log.write_json(path)?;
        }
    }

    let summary = Summary {
        seed: sim.config().seed,
        rho: opts.rho(),
        now: run.now,
        end: run.end,
        events: run.events,
        reason: run.reason,
        mean_queue_len,
        expected_queue_len: opts.expected_queue_len(),
        arrivals,
        completions,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
