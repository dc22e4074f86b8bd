//! Run summary.

use sched_core::backends::sim::{SimConfig, SimStats};
use sched_core::{SchedulerSettings, SchedulerStats, TeardownReport};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub fronts: usize,
    pub seed: u64,
    pub max_active: usize,
    pub ticks: u64,
    pub wall_ms: u64,
    pub sim: SimConfig,
    pub settings: SchedulerSettings,
    pub scheduler: SchedulerStats,
    pub device: SimStats,
    pub teardown: TeardownReport,
}

impl BenchReport {
    /// Values moved to the host per simulated tick.
    pub fn values_per_tick(&self) -> f64 {
        if self.ticks == 0 {
            return 0.0;
        }
        self.scheduler.values_pulled as f64 / self.ticks as f64
    }

    pub fn print_summary(&self) {
        let s = &self.scheduler;
        println!("\n{}", "=".repeat(60));
        println!("Front scheduler run");
        println!("{}", "=".repeat(60));
        println!("  Fronts:            {} (seed {})", self.fronts, self.seed);
        println!("  Active cap / peak: {} / {}", self.max_active, s.max_active);
        println!("  Ticks:             {}", self.ticks);
        println!("  Wall time:         {} ms", self.wall_ms);
        println!("  Activations:       {}", s.activations);
        println!("  Pulls issued:      {}", s.pulls_issued);
        println!("  Values pulled:     {} ({:.1}/tick)", s.values_pulled, self.values_per_tick());
        println!("  Finishes:          {}", s.finishes);
        println!("  Early pull polls:  {}", s.pull_not_ready);
        println!("  Early finishes:    {}", s.finish_not_ready);
        println!("  Kernels launched:  {}", self.device.kernels_launched);
        println!("  Signals created:   {}", self.device.signals_created);
        if !self.teardown.is_clean() {
            println!("  Left in flight:    {:?}", self.teardown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes() {
        let report = BenchReport {
            fronts: 2,
            seed: 1,
            max_active: 2,
            ticks: 4,
            wall_ms: 0,
            sim: SimConfig::default(),
            settings: SchedulerSettings::default(),
            scheduler: SchedulerStats {
                values_pulled: 10,
                ..Default::default()
            },
            device: SimStats::default(),
            teardown: TeardownReport::default(),
        };
        assert_eq!(report.values_per_tick(), 2.5);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["scheduler"]["values_pulled"], 10);
        assert_eq!(json["sim"]["transfer_latency"], 2);
        assert_eq!(json["teardown"]["still_active"], 0);
    }
}
