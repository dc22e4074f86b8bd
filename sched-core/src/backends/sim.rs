//! Deterministic simulated accelerator.
//!
//! Models the two channels the scheduler cares about with a tick clock:
//!
//! - **Compute**: [`SimDevice::launch_kernel`] returns a ready signal that
//!   fires `duration` ticks later. Kernels overlap freely.
//! - **Transfer**: a FIFO channel. Each copy starts when the previous one
//!   finished (or now, if the channel is idle) and takes
//!   `transfer_latency + ceil(count / values_per_tick)` ticks. A signal
//!   recorded on the channel fires when everything queued before it is done.
//!
//! Signals only ever fire inside [`SimDevice::tick`], so a freshly recorded
//! signal is always pending on the first poll. Copy data is written to the
//! host mirror when the copy is issued; readers must still wait for the
//! signal like they would on real hardware.
//!
//! [`SimDevice::manual_signal`] gives tests a signal they fire by hand.

use crate::error::{SchedError, SchedResult};
use crate::signal::{CompletionSignal, TransferDevice};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Timing parameters of the simulated device.
#[derive(Debug, Clone, Serialize)]
pub struct SimConfig {
    /// Fixed cost of one device-to-host copy, in ticks.
    pub transfer_latency: u64,
    /// Copy bandwidth in values per tick; 0 means unlimited.
    pub values_per_tick: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            transfer_latency: 2,
            values_per_tick: 0,
        }
    }
}

/// Counters for the simulated device.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SimStats {
    pub kernels_launched: u64,
    pub signals_created: u64,
    pub copies_issued: u64,
    pub values_copied: u64,
}

/// Accelerator-resident buffer of the simulated device.
#[derive(Debug, Clone, PartialEq)]
pub struct SimBuffer {
    pub data: Vec<f64>,
}

impl SimBuffer {
    pub fn new(data: Vec<f64>) -> Self {
        Self { data }
    }

    pub fn zeros(len: usize) -> Self {
        Self { data: vec![0.0; len] }
    }
}

/// Completion signal of the simulated device.
#[derive(Debug)]
pub struct SimSignal {
    fired: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
}

impl CompletionSignal for SimSignal {
    fn poll(&self) -> SchedResult<bool> {
        Ok(self.fired.load(Ordering::Acquire))
    }
}

impl Drop for SimSignal {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Fires a manual signal.
#[derive(Debug, Clone)]
pub struct SimTrigger {
    fired: Arc<AtomicBool>,
}

impl SimTrigger {
    pub fn fire(&self) {
        self.fired.store(true, Ordering::Release);
    }
}

/// Simulated accelerator.
#[derive(Debug)]
pub struct SimDevice {
    config: SimConfig,
    clock: u64,
    /// Tick at which all queued transfer work is done.
    transfer_tail: u64,
    /// Signals waiting to fire, with their due tick.
    pending: Vec<(u64, Arc<AtomicBool>)>,
    /// Signals created and not yet dropped.
    live: Arc<AtomicUsize>,
    stats: SimStats,
}

impl SimDevice {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            clock: 0,
            transfer_tail: 0,
            pending: Vec::new(),
            live: Arc::new(AtomicUsize::new(0)),
            stats: SimStats::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SimConfig::default())
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Current tick.
    pub fn now(&self) -> u64 {
        self.clock
    }

    /// Signals that have been created and not yet destroyed.
    pub fn live_signals(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Signals recorded or launched but not yet fired.
    pub fn pending_signals(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Launch a factorization kernel on the compute channel. The returned
    /// ready signal fires after `duration` ticks.
    pub fn launch_kernel(&mut self, duration: u64) -> SimSignal {
        let signal = self.new_signal();
        self.pending
            .push((self.clock + duration, Arc::clone(&signal.fired)));
        self.stats.kernels_launched += 1;
        signal
    }

    /// A signal that fires only through its trigger.
    pub fn manual_signal(&mut self) -> (SimSignal, SimTrigger) {
        let signal = self.new_signal();
        let trigger = SimTrigger {
            fired: Arc::clone(&signal.fired),
        };
        (signal, trigger)
    }

    /// Advance the clock by one tick and fire everything now due.
    pub fn tick(&mut self) {
        self.clock += 1;
        let now = self.clock;
        self.pending.retain(|(due, fired)| {
            if *due <= now {
                fired.store(true, Ordering::Release);
                false
            } else {
                true
            }
        });
    }

    pub fn advance(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Tick until no signal is pending. Returns the ticks taken.
    pub fn run_until_idle(&mut self) -> u64 {
        let start = self.clock;
        while !self.pending.is_empty() {
            self.tick();
        }
        self.clock - start
    }

    fn new_signal(&mut self) -> SimSignal {
        self.live.fetch_add(1, Ordering::AcqRel);
        self.stats.signals_created += 1;
        SimSignal {
            fired: Arc::new(AtomicBool::new(false)),
            live: Arc::clone(&self.live),
        }
    }

    fn copy_ticks(&self, count: usize) -> u64 {
        let transfer = match self.config.values_per_tick {
            0 => 0,
            bw => count.div_ceil(bw) as u64,
        };
        self.config.transfer_latency + transfer
    }
}

impl TransferDevice for SimDevice {
    type Signal = SimSignal;
    type DeviceBuffer = SimBuffer;
    type HostBuffer = Vec<f64>;

    fn create_signal(&mut self) -> SchedResult<SimSignal> {
        Ok(self.new_signal())
    }

    fn alloc_host(&mut self, len: usize) -> SchedResult<Vec<f64>> {
        Ok(vec![0.0; len])
    }

    fn host_len(&self, buf: &Vec<f64>) -> usize {
        buf.len()
    }

    fn copy_to_host_async(
        &mut self,
        dst: &mut Vec<f64>,
        src: &SimBuffer,
        count: usize,
    ) -> SchedResult<()> {
        if count > src.data.len() || count > dst.len() {
            return Err(SchedError::Device {
                code: -1,
                context: "copy_to_host_async".to_string(),
                message: format!(
                    "copy of {} values out of bounds (src {}, dst {})",
                    count,
                    src.data.len(),
                    dst.len()
                ),
            });
        }
        dst[..count].copy_from_slice(&src.data[..count]);

        let start = self.transfer_tail.max(self.clock);
        self.transfer_tail = start + self.copy_ticks(count);
        self.stats.copies_issued += 1;
        self.stats.values_copied += count as u64;
        Ok(())
    }

    fn record(&mut self, signal: &SimSignal) -> SchedResult<()> {
        let due = self.transfer_tail.max(self.clock);
        self.pending.push((due, Arc::clone(&signal.fired)));
        Ok(())
    }
}
