//! Simulated planner.
//!
//! Plays the roles around the scheduler: the planner that decides which
//! fronts go live, and the kernel subsystem that walks their states and
//! hands over ready signals.

use anyhow::{bail, Result};
use sched_core::backends::sim::SimDevice;
use sched_core::{FrontState, SchedResult, Scheduler};
use tracing::{debug, info};

/// Planner knobs.
#[derive(Debug, Clone, Copy)]
pub struct PlannerConfig {
    /// Cap on simultaneously active fronts.
    pub max_active: usize,
    /// Give up after this many ticks.
    pub tick_limit: u64,
}

/// Drive every front in `order` through activate, pull and finish.
///
/// Returns the number of ticks the run took.
pub fn run(
    sched: &mut Scheduler<'_, SimDevice>,
    order: &[usize],
    kernel_ticks: &[u64],
    config: &PlannerConfig,
) -> Result<u64> {
    let max_active = config.max_active.max(1);
    let mut next = 0;
    let mut ticks = 0;

    loop {
        while next < order.len() && sched.num_active_fronts() < max_active {
            let f = order[next];
            sched.activate_front(f)?;
            launch(sched, f, kernel_ticks[f])?;
            next += 1;
        }

        let active: Vec<usize> = sched.active_set().iter().collect();
        for f in active {
            if !sched.pull_front_data(f)? {
                continue;
            }
            complete(sched, f)?;
            sched.finish_front(f)?;
        }

        if next == order.len() && sched.num_active_fronts() == 0 {
            break;
        }

        sched.device_mut().tick();
        ticks += 1;
        if ticks >= config.tick_limit {
            bail!(
                "planner stalled: {} fronts still active after {} ticks",
                sched.num_active_fronts(),
                ticks
            );
        }
        if ticks % 1000 == 0 {
            debug!(
                ticks,
                active = sched.num_active_fronts(),
                remaining = order.len() - next,
                "planner progress"
            );
        }
    }

    info!(ticks, fronts = order.len(), "all fronts finished");
    Ok(ticks)
}

/// Kernel subsystem side of activation.
fn launch(sched: &mut Scheduler<'_, SimDevice>, f: usize, duration: u64) -> SchedResult<()> {
    match sched.front(f).state {
        FrontState::AssembleS => {
            sched.set_state(f, FrontState::ChildWait)?;
            sched.set_state(f, FrontState::Factorize)?;
        }
        FrontState::ParentWait => {
            // Push-only: contributes to its parent and has nothing to pull.
            sched.set_state(f, FrontState::PushAssemble)?;
            sched.set_state(f, FrontState::Cleanup)?;
            return Ok(());
        }
        _ => {}
    }
    let ready = sched.device_mut().launch_kernel(duration);
    sched.attach_ready_signal(f, ready)
}

/// Kernel subsystem side of a pulled front.
fn complete(sched: &mut Scheduler<'_, SimDevice>, f: usize) -> SchedResult<()> {
    match sched.front(f).state {
        FrontState::Factorize => sched.set_state(f, FrontState::FactorizeComplete),
        FrontState::Cleanup => sched.set_state(f, FrontState::Done),
        _ => Ok(()),
    }
}
