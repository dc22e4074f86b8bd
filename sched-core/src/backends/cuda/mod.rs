//! CUDA transfer backend.
//!
//! Implements [`TransferDevice`](crate::TransferDevice) on the CUDA runtime:
//!
//! 1. **Signals**: CUDA events created without timing, queried with
//!    `cudaEventQuery` (never `cudaEventSynchronize`).
//! 2. **Transfer channel**: one non-blocking stream dedicated to
//!    device-to-host copies.
//! 3. **Host mirrors**: pinned allocations, so copies run asynchronously.
//!
//! # Feature Gate
//!
//! This module requires the `cuda` feature. The runtime library itself is
//! loaded at run time; without it every constructor returns
//! [`CudaError::LibraryNotFound`].
//!
//! ```toml
//! [dependencies]
//! sched-core = { version = "...", features = ["cuda"] }
//! ```

mod error;
mod ffi;
mod handle;

pub use error::{CudaError, CudaResult};
pub use ffi::{cudaEvent_t, cudaStream_t, is_cuda_available};
pub use handle::{CudaConfig, CudaEvent, CudaTransferDevice, DevicePtr, PinnedBuffer};
