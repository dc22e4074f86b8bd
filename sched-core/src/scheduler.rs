//! Front lifecycle manager.
//!
//! The external planner drives three entry points in a polling loop:
//!
//! 1. [`Scheduler::activate_front`]: put a front in the active set and set
//!    its initial state.
//! 2. [`Scheduler::pull_front_data`]: once the front's ready signal fires,
//!    issue the device-to-host copy of its results.
//! 3. [`Scheduler::finish_front`]: once that copy has landed, drop the front
//!    from the active set.
//!
//! None of them block. A `false` return means "not yet, call again"; the
//! call had no side effects. Accelerator failures come back as `Err` and
//! are fatal to the run.
//!
//! For one front the order ready signal -> pulled signal -> removal holds by
//! construction. Across fronts nothing is ordered.

use crate::active_set::ActiveSet;
use crate::error::{SchedError, SchedResult};
use crate::front::{Front, FrontState};
use crate::settings::SchedulerSettings;
use crate::signal::{CompletionSignal, TransferDevice};
use crate::tracker::CompletionTracker;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

/// Front type for a given transfer backend.
pub type FrontOf<T> = Front<<T as TransferDevice>::DeviceBuffer, <T as TransferDevice>::HostBuffer>;

macro_rules! lifecycle {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+)
        } else {
            debug!($($arg)+)
        }
    };
}

/// Counters kept across one factorization run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SchedulerStats {
    /// Fronts inserted into the active set.
    pub activations: u64,
    /// Device-to-host copies issued.
    pub pulls_issued: u64,
    /// Scalar values those copies moved.
    pub values_pulled: u64,
    /// Fronts removed from the active set.
    pub finishes: u64,
    /// `pull_front_data` calls that found the ready signal pending.
    pub pull_not_ready: u64,
    /// `finish_front` calls that found the transfer pending.
    pub finish_not_ready: u64,
    /// Peak size of the active set.
    pub max_active: usize,
}

/// What was still outstanding when the scheduler was torn down.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    /// Fronts still in the active set.
    pub still_active: usize,
    /// Ready signals never consumed by a pull.
    pub outstanding_ready: usize,
    /// Pulled signals never consumed by a finish.
    pub outstanding_pulled: usize,
}

impl TeardownReport {
    /// Nothing was left in flight.
    pub fn is_clean(&self) -> bool {
        self.still_active == 0 && self.outstanding_ready == 0 && self.outstanding_pulled == 0
    }
}

/// Scheduler context for one factorization run.
///
/// Borrows the engine's front list for the duration of the run and owns the
/// transfer device, the active-set index and every completion signal.
/// Initially no front is active and no flag is set. Dropping the scheduler
/// releases outstanding signals; [`teardown`](Self::teardown) does the same
/// and reports what was left.
pub struct Scheduler<'a, T: TransferDevice> {
    fronts: &'a mut [FrontOf<T>],
    device: T,
    active: ActiveSet,
    tracker: CompletionTracker<T::Signal>,
    /// Fronts that were finished. They are never reactivated.
    retired: Vec<bool>,
    settings: SchedulerSettings,
    stats: SchedulerStats,
}

impl<'a, T: TransferDevice> Scheduler<'a, T> {
    pub fn new(fronts: &'a mut [FrontOf<T>], device: T, settings: SchedulerSettings) -> Self {
        let n = fronts.len();
        Self {
            fronts,
            device,
            active: ActiveSet::new(n),
            tracker: CompletionTracker::new(n),
            retired: vec![false; n],
            settings,
            stats: SchedulerStats::default(),
        }
    }

    pub fn with_defaults(fronts: &'a mut [FrontOf<T>], device: T) -> Self {
        Self::new(fronts, device, SchedulerSettings::default())
    }

    // ------------------------------------------------------------------
    // Planner entry points
    // ------------------------------------------------------------------

    /// Add `f` to the active set and set its initial state.
    ///
    /// No-op if `f` is already active. A front that has been finished stays
    /// retired: activating it again is ignored.
    pub fn activate_front(&mut self, f: usize) -> SchedResult<()> {
        self.check_front(f)?;

        if self.retired[f] {
            warn!(front = f, "ignoring activation of a finished front");
            return Ok(());
        }
        if !self.active.insert(f) {
            return Ok(());
        }

        let front = &mut self.fronts[f];
        front.state = FrontState::initial(front.is_dense(), front.is_push_only());

        self.stats.activations += 1;
        self.stats.max_active = self.stats.max_active.max(self.active.len());
        lifecycle!(
            self.settings.verbose,
            front = f,
            fidg = front.fidg,
            state = %front.state,
            active = self.active.len(),
            "front activated"
        );

        self.verify()
    }

    /// Start (or confirm) the transfer of `f`'s results to the host.
    ///
    /// Returns `Ok(true)` once the copy has been queued, which does not
    /// mean it has completed; [`finish_front`](Self::finish_front) checks
    /// that. Push-only fronts have nothing to pull and return `Ok(true)`
    /// straight away.
    ///
    /// For any other front the kernel launch must have attached the ready
    /// signal first (see [`attach_ready_signal`](Self::attach_ready_signal)),
    /// otherwise this returns [`SchedError::MissingReadySignal`].
    pub fn pull_front_data(&mut self, f: usize) -> SchedResult<bool> {
        self.check_front(f)?;

        let front = &mut self.fronts[f];
        if front.is_push_only() {
            return Ok(true);
        }
        if self.tracker.is_data_pulled(f) {
            return Ok(true);
        }

        let ready = match self.tracker.ready_signal(f) {
            Some(signal) => signal.poll()?,
            None => return Err(SchedError::MissingReadySignal(f)),
        };
        if !ready {
            self.stats.pull_not_ready += 1;
            trace!(front = f, "factorization still running");
            return Ok(false);
        }

        let src = front
            .gpu_f
            .as_ref()
            .ok_or(SchedError::MissingDeviceBuffer(f))?;

        if let Some(signal) = self.tracker.take_ready(f) {
            signal.destroy()?;
        }
        let pulled = self.device.create_signal()?;

        let count = front.num_values_to_pull();
        let mut host = match front.cpu_r.take() {
            Some(h) if self.settings.reuse_host_buffers && self.device.host_len(&h) >= count => h,
            _ => self.device.alloc_host(count)?,
        };
        let issued = self.device.copy_to_host_async(&mut host, src, count);
        front.cpu_r = Some(host);
        issued?;
        self.device.record(&pulled)?;

        self.tracker.set_pulled(f, pulled);
        self.stats.pulls_issued += 1;
        self.stats.values_pulled += count as u64;
        lifecycle!(
            self.settings.verbose,
            front = f,
            fidg = front.fidg,
            values = count,
            staged = front.is_staged(),
            "front data pull issued"
        );
        Ok(true)
    }

    /// Remove `f` from the active set once its results are on the host.
    ///
    /// Returns `Ok(true)` if `f` is (now) inactive. For fronts that are not
    /// push-only, returns `Ok(false)` while the pull has not been issued or
    /// its transfer is still in flight.
    pub fn finish_front(&mut self, f: usize) -> SchedResult<bool> {
        self.check_front(f)?;

        if !self.active.contains(f) {
            return Ok(true);
        }

        let push_only = self.fronts[f].is_push_only();
        if !push_only {
            let landed = match self.tracker.pulled_signal(f) {
                Some(signal) => signal.poll()?,
                None => false,
            };
            if !landed {
                self.stats.finish_not_ready += 1;
                trace!(front = f, pull_issued = self.tracker.is_data_pulled(f), "front data not on host yet");
                return Ok(false);
            }
            if let Some(signal) = self.tracker.take_pulled(f) {
                signal.destroy()?;
            }
        } else if let Some(signal) = self.tracker.take_ready(f) {
            // Never consumed by a pull.
            signal.destroy()?;
        }

        self.active.remove(f);
        self.retired[f] = true;
        self.stats.finishes += 1;
        lifecycle!(
            self.settings.verbose,
            front = f,
            fidg = self.fronts[f].fidg,
            active = self.active.len(),
            "front finished"
        );

        self.verify()?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Kernel-subsystem hooks
    // ------------------------------------------------------------------

    /// Hand over the signal that fires when `f`'s factorization completes.
    ///
    /// Rejected once `f`'s pull has been issued or `f` has been finished;
    /// the signal is dropped in that case.
    pub fn attach_ready_signal(&mut self, f: usize, signal: T::Signal) -> SchedResult<()> {
        self.check_front(f)?;
        if self.tracker.is_data_pulled(f) || self.retired[f] {
            return Err(SchedError::ReadySignalAfterPull(f));
        }
        self.tracker
            .set_ready(f, signal)
            .map_err(|_| SchedError::ReadySignalAlreadyAttached(f))
    }

    /// Record a state change made by the kernel subsystem.
    ///
    /// The scheduler does not interpret the new state; it only checks the
    /// write against [`FrontState::successors`].
    pub fn set_state(&mut self, f: usize, next: FrontState) -> SchedResult<()> {
        self.check_front(f)?;
        if !self.active.contains(f) {
            return Err(SchedError::NotActive(f));
        }
        let front = &mut self.fronts[f];
        if !front.state.can_transition_to(next) {
            return Err(SchedError::IllegalTransition {
                front: f,
                from: front.state,
                to: next,
            });
        }
        trace!(front = f, from = %front.state, to = %next, "state change");
        front.state = next;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn num_fronts(&self) -> usize {
        self.fronts.len()
    }

    pub fn num_active_fronts(&self) -> usize {
        self.active.len()
    }

    pub fn active_set(&self) -> &ActiveSet {
        &self.active
    }

    pub fn is_active(&self, f: usize) -> bool {
        f < self.fronts.len() && self.active.contains(f)
    }

    pub fn is_data_pulled(&self, f: usize) -> bool {
        f < self.fronts.len() && self.tracker.is_data_pulled(f)
    }

    pub fn has_ready_signal(&self, f: usize) -> bool {
        f < self.fronts.len() && self.tracker.has_ready(f)
    }

    pub fn has_pulled_signal(&self, f: usize) -> bool {
        f < self.fronts.len() && self.tracker.has_pulled(f)
    }

    /// Descriptor of front `f`.
    ///
    /// # Panics
    ///
    /// Panics if `f` is not a valid front id, like slice indexing.
    pub fn front(&self, f: usize) -> &FrontOf<T> {
        &self.fronts[f]
    }

    pub fn fronts(&self) -> &[FrontOf<T>] {
        &*self.fronts
    }

    /// Mutable access for the kernel subsystem (buffer handles, etc).
    /// State changes should go through [`set_state`](Self::set_state).
    pub fn fronts_mut(&mut self) -> &mut [FrontOf<T>] {
        &mut *self.fronts
    }

    pub fn device(&self) -> &T {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut T {
        &mut self.device
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// End the run: destroy every outstanding signal and hand the device
    /// back.
    ///
    /// All signals are destroyed even if one of them fails; the first
    /// failure is returned.
    pub fn teardown(mut self) -> SchedResult<(T, TeardownReport)> {
        let (outstanding_ready, outstanding_pulled) = self.tracker.outstanding();
        let report = TeardownReport {
            still_active: self.active.len(),
            outstanding_ready,
            outstanding_pulled,
        };
        if !report.is_clean() {
            warn!(
                still_active = report.still_active,
                outstanding_ready = report.outstanding_ready,
                outstanding_pulled = report.outstanding_pulled,
                "scheduler torn down with fronts in flight"
            );
        }

        let mut first_err = None;
        for signal in self.tracker.drain() {
            if let Err(e) = signal.destroy() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok((self.device, report)),
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn check_front(&self, f: usize) -> SchedResult<()> {
        if f < self.fronts.len() {
            Ok(())
        } else {
            Err(SchedError::UnknownFront {
                front: f,
                len: self.fronts.len(),
            })
        }
    }

    fn verify(&self) -> SchedResult<()> {
        if self.settings.check_invariants {
            self.active.check_invariants()?;
        }
        Ok(())
    }
}
