//! Synthetic front lists.

use clap::ValueEnum;
use sched_core::backends::sim::{SimBuffer, SimDevice};
use sched_core::{FrontOf, SparseMeta};

pub type SimFront = FrontOf<SimDevice>;

/// Mix of front kinds in a generated workload.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadSpec {
    pub fronts: usize,
    pub max_dim: usize,
    pub dense_fraction: f64,
    pub push_only_fraction: f64,
    pub staged_fraction: f64,
    /// Upper bound on kernel duration, in ticks.
    pub max_kernel_ticks: u64,
    pub seed: u64,
}

/// Order in which the planner activates fronts.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ActivationOrder {
    /// Front list order.
    Natural,
    /// Biggest transfer first.
    LargestFirst,
}

pub struct Workload {
    pub fronts: Vec<SimFront>,
    /// Factorization kernel duration per front, in ticks.
    pub kernel_ticks: Vec<u64>,
}

impl Workload {
    /// Front ids in activation order.
    pub fn activation_order(&self, order: ActivationOrder) -> Vec<usize> {
        let mut ids: Vec<usize> = (0..self.fronts.len()).collect();
        if let ActivationOrder::LargestFirst = order {
            ids.sort_by_key(|&f| std::cmp::Reverse(self.fronts[f].num_values_to_pull()));
        }
        ids
    }
}

/// Generate a random front list.
pub fn generate(spec: &WorkloadSpec) -> Workload {
    // LCG; top 32 bits mapped to [0, 1)
    let mut rng_state = spec.seed;
    let mut rand = || -> f64 {
        rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((rng_state >> 32) as f64) / (u32::MAX as f64 + 1.0)
    };

    let max_dim = spec.max_dim.max(2);
    let mut fronts = Vec::with_capacity(spec.fronts);
    let mut kernel_ticks = Vec::with_capacity(spec.fronts);

    for fid in 0..spec.fronts {
        let fm = 2 + (rand() * (max_dim - 1) as f64) as usize;
        let fm = fm.min(max_dim);
        let fn_ = 1 + (rand() * fm as f64) as usize;
        let fn_ = fn_.min(fm);
        let cm = fm - fm.min(fn_);

        let kind = rand();
        let front = if kind < spec.dense_fraction {
            SimFront::dense(fid, fm, fn_)
        } else {
            let rest = kind - spec.dense_fraction;
            let push_only = rest < spec.push_only_fraction;
            let is_staged =
                !push_only && rest < spec.push_only_fraction + spec.staged_fraction;
            SimFront::sparse(
                fid,
                fm,
                fn_,
                SparseMeta {
                    cm,
                    push_only,
                    is_staged,
                },
            )
        };

        let values = (0..fm * fn_).map(|_| 2.0 * rand() - 1.0).collect();
        fronts.push(
            front
                .with_fidg(1000 + fid)
                .with_device_buffer(SimBuffer::new(values)),
        );
        kernel_ticks.push(1 + (rand() * spec.max_kernel_ticks as f64) as u64);
    }

    Workload {
        fronts,
        kernel_ticks,
    }
}
