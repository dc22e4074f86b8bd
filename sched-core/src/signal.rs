//! Capability traits isolating the accelerator API.
//!
//! The scheduler never touches data bytes. It sees the accelerator through
//! two seams:
//!
//! - [`CompletionSignal`]: an opaque handle for a pending asynchronous
//!   operation that can be queried without blocking.
//! - [`TransferDevice`]: the transfer subsystem, which creates signals,
//!   allocates host mirrors, issues device-to-host copies on its dedicated
//!   channel and records signals on that channel.
//!
//! `backends::sim` implements both for tests and the bench harness;
//! `backends::cuda` implements them on the CUDA runtime.

use crate::error::SchedResult;

/// Opaque completion signal for an asynchronous accelerator operation.
///
/// Dropping a signal releases its resources. [`destroy`](Self::destroy)
/// does the same but reports API failures.
pub trait CompletionSignal {
    /// Non-blocking query. `Ok(false)` means the operation is still pending.
    fn poll(&self) -> SchedResult<bool>;

    /// Release the signal.
    fn destroy(self) -> SchedResult<()>
    where
        Self: Sized,
    {
        drop(self);
        Ok(())
    }
}

/// Transfer subsystem used by `pull_front_data`.
///
/// Copies and recorded signals on the transfer channel complete in issue
/// order; the channel never waits on compute work for other fronts.
pub trait TransferDevice {
    type Signal: CompletionSignal;
    /// Accelerator-resident front storage (owned by the kernel subsystem).
    type DeviceBuffer;
    /// Host-resident mirror the results land in.
    type HostBuffer;

    /// Create a fresh, unrecorded signal.
    fn create_signal(&mut self) -> SchedResult<Self::Signal>;

    /// Allocate a host mirror able to hold `len` scalar values.
    fn alloc_host(&mut self, len: usize) -> SchedResult<Self::HostBuffer>;

    /// Capacity of a host mirror, in scalar values.
    fn host_len(&self, buf: &Self::HostBuffer) -> usize;

    /// Queue an asynchronous copy of the first `count` values of `src`
    /// into `dst` on the transfer channel. Returns once queued.
    fn copy_to_host_async(
        &mut self,
        dst: &mut Self::HostBuffer,
        src: &Self::DeviceBuffer,
        count: usize,
    ) -> SchedResult<()>;

    /// Record `signal` on the transfer channel; it fires once every copy
    /// queued before it has completed.
    fn record(&mut self, signal: &Self::Signal) -> SchedResult<()>;
}
