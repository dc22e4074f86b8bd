//! Scheduler configuration.

use serde::Serialize;

/// Scheduler settings.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSettings {
    /// Log activations, pulls and finishes at `info` instead of `debug`.
    pub verbose: bool,

    /// Re-verify the active-set permutation after every activate/finish.
    /// O(number of fronts) per call.
    pub check_invariants: bool,

    /// Reuse an existing host mirror when it is large enough; otherwise
    /// always allocate a fresh one on pull.
    pub reuse_host_buffers: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            verbose: false,
            check_invariants: cfg!(debug_assertions),
            reuse_host_buffers: true,
        }
    }
}

impl SchedulerSettings {
    /// Defaults overlaid with environment switches:
    ///
    /// - `FRONTSCHED_VERBOSE=1`
    /// - `FRONTSCHED_CHECK_INVARIANTS=0|1`
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(v) = env_flag("FRONTSCHED_VERBOSE") {
            settings.verbose = v;
        }
        if let Some(v) = env_flag("FRONTSCHED_CHECK_INVARIANTS") {
            settings.check_invariants = v;
        }
        settings
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| parse_flag(&v))
}

fn parse_flag(v: &str) -> bool {
    !matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "off" | "no"
    )
}
