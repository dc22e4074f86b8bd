//! Simulated planner driving the front scheduler.
//!
//! Generates a random front list, runs it through activate/pull/finish on
//! the simulated device and prints a summary (or JSON with `--json`).

mod planner;
mod report;
mod workload;

use anyhow::{Context, Result};
use clap::Parser;
use sched_core::backends::sim::{SimConfig, SimDevice};
use sched_core::{Scheduler, SchedulerSettings};
use std::time::Instant;
use tracing::info;

use crate::planner::PlannerConfig;
use crate::report::BenchReport;
use crate::workload::{ActivationOrder, WorkloadSpec};

#[derive(Parser, Debug)]
#[command(name = "sched-bench", version, about = "Front scheduler benchmark on a simulated device")]
struct Args {
    /// Number of fronts.
    #[arg(long, default_value_t = 1000)]
    fronts: usize,

    /// Largest front dimension.
    #[arg(long, default_value_t = 64)]
    max_dim: usize,

    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Cap on simultaneously active fronts.
    #[arg(long, default_value_t = 32)]
    max_active: usize,

    #[arg(long, value_enum, default_value = "natural")]
    order: ActivationOrder,

    /// Longest factorization kernel, in ticks.
    #[arg(long, default_value_t = 8)]
    kernel_ticks: u64,

    /// Fixed cost of one device-to-host copy, in ticks.
    #[arg(long, default_value_t = 2)]
    transfer_latency: u64,

    /// Copy bandwidth in values per tick (0 = unlimited).
    #[arg(long, default_value_t = 512)]
    values_per_tick: usize,

    #[arg(long, default_value_t = 0.3)]
    dense_fraction: f64,

    #[arg(long, default_value_t = 0.2)]
    push_only_fraction: f64,

    #[arg(long, default_value_t = 0.2)]
    staged_fraction: f64,

    /// Give up after this many ticks.
    #[arg(long, default_value_t = 10_000_000)]
    tick_limit: u64,

    /// Always allocate a fresh host mirror on pull.
    #[arg(long)]
    no_reuse: bool,

    /// Log every activation, pull and finish.
    #[arg(long, short)]
    verbose: bool,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut settings = SchedulerSettings::from_env();
    settings.verbose |= args.verbose;
    if args.no_reuse {
        settings.reuse_host_buffers = false;
    }

    let spec = WorkloadSpec {
        fronts: args.fronts,
        max_dim: args.max_dim,
        dense_fraction: args.dense_fraction,
        push_only_fraction: args.push_only_fraction,
        staged_fraction: args.staged_fraction,
        max_kernel_ticks: args.kernel_ticks,
        seed: args.seed,
    };
    let mut workload = workload::generate(&spec);
    let order = workload.activation_order(args.order);
    info!(fronts = workload.fronts.len(), order = ?args.order, "workload generated");

    let sim = SimConfig {
        transfer_latency: args.transfer_latency,
        values_per_tick: args.values_per_tick,
    };
    let planner = PlannerConfig {
        max_active: args.max_active,
        tick_limit: args.tick_limit,
    };

    let start = Instant::now();
    let mut sched = Scheduler::new(&mut workload.fronts, SimDevice::new(sim.clone()), settings.clone());
    let ticks = planner::run(&mut sched, &order, &workload.kernel_ticks, &planner)
        .context("planner run failed")?;
    let scheduler = sched.stats().clone();
    let (device, teardown) = sched.teardown().context("scheduler teardown failed")?;
    let wall_ms = start.elapsed().as_millis() as u64;

    let report = BenchReport {
        fronts: args.fronts,
        seed: args.seed,
        max_active: args.max_active,
        ticks,
        wall_ms,
        sim,
        settings,
        scheduler,
        device: device.stats().clone(),
        teardown,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_summary();
    }
    Ok(())
}
