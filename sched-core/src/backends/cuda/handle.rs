//! CUDA transfer device, events and host mirrors.
//!
//! - `CudaTransferDevice`: owns the dedicated device-to-host stream.
//! - `CudaEvent`: completion signal backed by a CUDA event.
//! - `PinnedBuffer`: page-locked host mirror, needed for truly async copies.
//! - `DevicePtr`: non-owning view of front storage on the GPU.

use super::error::{CudaError, CudaResult};
use super::ffi::{
    check_cuda, cudaEvent_t, cudaStream_t, get_cuda_libs, CudaLibraries, CudaMemcpyKind,
    CUDA_ERROR_NOT_READY, CUDA_EVENT_DISABLE_TIMING, CUDA_STREAM_NON_BLOCKING, CUDA_SUCCESS,
};
use crate::error::SchedResult;
use crate::signal::{CompletionSignal, TransferDevice};
use std::ffi::c_void;
use std::ptr;
use tracing::{debug, warn};

/// Configuration for the CUDA transfer device.
#[derive(Debug, Clone)]
pub struct CudaConfig {
    /// CUDA device index (0 for default GPU).
    pub device_index: i32,

    /// Log stream creation and teardown.
    pub verbose: bool,
}

impl Default for CudaConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            verbose: false,
        }
    }
}

// ============================================================================
// CudaEvent
// ============================================================================

/// Completion signal backed by a CUDA event.
pub struct CudaEvent {
    libs: &'static CudaLibraries,
    raw: cudaEvent_t,
}

impl CudaEvent {
    /// Create a timing-free event.
    pub fn new() -> CudaResult<Self> {
        let libs = get_cuda_libs()?;
        let mut raw: cudaEvent_t = ptr::null_mut();
        // SAFETY: raw is a valid out-pointer.
        let err = unsafe { (libs.cuda_event_create_with_flags)(&mut raw, CUDA_EVENT_DISABLE_TIMING) };
        check_cuda(libs, err, "cudaEventCreateWithFlags")?;
        Ok(Self { libs, raw })
    }

    /// Take ownership of an event created by the kernel launch path.
    ///
    /// # Safety
    ///
    /// `raw` must be a live event that nothing else will destroy.
    pub unsafe fn from_raw(raw: cudaEvent_t) -> CudaResult<Self> {
        Ok(Self {
            libs: get_cuda_libs()?,
            raw,
        })
    }

    pub fn as_raw(&self) -> cudaEvent_t {
        self.raw
    }

    /// Record on `stream`.
    ///
    /// # Safety
    ///
    /// `stream` must be a live stream on the current device.
    pub unsafe fn record_on(&self, stream: cudaStream_t) -> CudaResult<()> {
        let err = (self.libs.cuda_event_record)(self.raw, stream);
        check_cuda(self.libs, err, "cudaEventRecord")
    }

    fn release(&mut self) -> CudaResult<()> {
        if self.raw.is_null() {
            return Ok(());
        }
        // SAFETY: raw is a live event owned by self; nulled right after.
        let err = unsafe { (self.libs.cuda_event_destroy)(self.raw) };
        self.raw = ptr::null_mut();
        check_cuda(self.libs, err, "cudaEventDestroy")
    }
}

impl CompletionSignal for CudaEvent {
    fn poll(&self) -> SchedResult<bool> {
        // SAFETY: raw is a live event owned by self.
        let err = unsafe { (self.libs.cuda_event_query)(self.raw) };
        if err == CUDA_ERROR_NOT_READY {
            return Ok(false);
        }
        check_cuda(self.libs, err, "cudaEventQuery")?;
        Ok(true)
    }

    fn destroy(mut self) -> SchedResult<()> {
        self.release()?;
        Ok(())
    }
}

impl Drop for CudaEvent {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "failed to destroy CUDA event");
        }
    }
}

// SAFETY: CUDA events may be queried and destroyed from any thread.
unsafe impl Send for CudaEvent {}

// ============================================================================
// Buffers
// ============================================================================

/// Non-owning handle to `len` f64 values in device memory.
#[derive(Debug, Clone, Copy)]
pub struct DevicePtr {
    ptr: *mut c_void,
    len: usize,
}

impl DevicePtr {
    /// # Safety
    ///
    /// `ptr` must point to at least `len` f64 values of device memory that
    /// stay allocated while any copy from this handle is in flight.
    pub unsafe fn from_raw(ptr: *mut c_void, len: usize) -> Self {
        Self { ptr, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// SAFETY: device addresses are plain integers on the host side.
unsafe impl Send for DevicePtr {}

/// Page-locked host buffer of f64 values.
pub struct PinnedBuffer {
    libs: &'static CudaLibraries,
    ptr: *mut f64,
    len: usize,
}

impl PinnedBuffer {
    pub fn new(len: usize) -> CudaResult<Self> {
        let libs = get_cuda_libs()?;
        let bytes = len * std::mem::size_of::<f64>();
        let mut raw: *mut c_void = ptr::null_mut();
        // SAFETY: raw is a valid out-pointer.
        let err = unsafe { (libs.cuda_malloc_host)(&mut raw, bytes.max(1)) };
        if err != CUDA_SUCCESS || raw.is_null() {
            let reason = check_cuda(libs, err, "cudaMallocHost")
                .err()
                .map_or_else(|| "null pointer".to_string(), |e| e.to_string());
            return Err(CudaError::AllocationFailed { size: bytes, reason });
        }
        // SAFETY: fresh allocation of `bytes` bytes; zero it so reads before
        // the first copy see defined values.
        unsafe { ptr::write_bytes(raw as *mut u8, 0, bytes) };
        Ok(Self {
            libs,
            ptr: raw as *mut f64,
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// View the buffer contents.
    ///
    /// # Safety
    ///
    /// No copy into this buffer may be in flight, i.e. the pulled signal of
    /// the front owning it has fired.
    pub unsafe fn as_slice(&self) -> &[f64] {
        std::slice::from_raw_parts(self.ptr, self.len)
    }
}

impl Drop for PinnedBuffer {
    fn drop(&mut self) {
        // SAFETY: ptr came from cudaMallocHost and is freed once.
        let err = unsafe { (self.libs.cuda_free_host)(self.ptr as *mut c_void) };
        if let Err(e) = check_cuda(self.libs, err, "cudaFreeHost") {
            warn!(error = %e, "failed to free pinned host buffer");
        }
    }
}

// SAFETY: the allocation is owned exclusively by this value.
unsafe impl Send for PinnedBuffer {}

// ============================================================================
// CudaTransferDevice
// ============================================================================

/// Transfer subsystem on a dedicated non-blocking stream.
///
/// The stream does not synchronize with the legacy default stream, so
/// compute work for other fronts is never held up by a pull.
pub struct CudaTransferDevice {
    libs: &'static CudaLibraries,
    config: CudaConfig,
    stream: cudaStream_t,
}

impl CudaTransferDevice {
    pub fn new(config: CudaConfig) -> CudaResult<Self> {
        let libs = get_cuda_libs()?;

        let mut count = 0i32;
        // SAFETY: count is a valid out-pointer.
        let err = unsafe { (libs.cuda_get_device_count)(&mut count) };
        check_cuda(libs, err, "cudaGetDeviceCount")?;
        if count == 0 {
            return Err(CudaError::NoDevice);
        }
        if config.device_index < 0 || config.device_index >= count {
            return Err(CudaError::InvalidDevice {
                index: config.device_index,
                count,
            });
        }

        // SAFETY: index validated above.
        let err = unsafe { (libs.cuda_set_device)(config.device_index) };
        check_cuda(libs, err, "cudaSetDevice")?;

        let mut stream: cudaStream_t = ptr::null_mut();
        // SAFETY: stream is a valid out-pointer.
        let err = unsafe { (libs.cuda_stream_create_with_flags)(&mut stream, CUDA_STREAM_NON_BLOCKING) };
        check_cuda(libs, err, "cudaStreamCreateWithFlags")?;

        if config.verbose {
            debug!(device = config.device_index, "created D2H transfer stream");
        }
        Ok(Self { libs, config, stream })
    }

    pub fn with_defaults() -> CudaResult<Self> {
        Self::new(CudaConfig::default())
    }

    pub fn config(&self) -> &CudaConfig {
        &self.config
    }

    /// The transfer stream.
    pub fn stream(&self) -> cudaStream_t {
        self.stream
    }
}

impl TransferDevice for CudaTransferDevice {
    type Signal = CudaEvent;
    type DeviceBuffer = DevicePtr;
    type HostBuffer = PinnedBuffer;

    fn create_signal(&mut self) -> SchedResult<CudaEvent> {
        Ok(CudaEvent::new()?)
    }

    fn alloc_host(&mut self, len: usize) -> SchedResult<PinnedBuffer> {
        Ok(PinnedBuffer::new(len)?)
    }

    fn host_len(&self, buf: &PinnedBuffer) -> usize {
        buf.len()
    }

    fn copy_to_host_async(
        &mut self,
        dst: &mut PinnedBuffer,
        src: &DevicePtr,
        count: usize,
    ) -> SchedResult<()> {
        if count > src.len || count > dst.len {
            return Err(CudaError::CopyOutOfBounds {
                count,
                src_len: src.len,
                dst_len: dst.len,
            }
            .into());
        }
        let bytes = count * std::mem::size_of::<f64>();
        // SAFETY: both ranges were bounds-checked; dst is pinned so the copy
        // is asynchronous with respect to the host.
        let err = unsafe {
            (self.libs.cuda_memcpy_async)(
                dst.ptr as *mut c_void,
                src.ptr as *const c_void,
                bytes,
                CudaMemcpyKind::DeviceToHost,
                self.stream,
            )
        };
        check_cuda(self.libs, err, "cudaMemcpyAsync(D2H)")?;
        Ok(())
    }

    fn record(&mut self, signal: &CudaEvent) -> SchedResult<()> {
        // SAFETY: self.stream lives as long as self.
        unsafe { signal.record_on(self.stream)? };
        Ok(())
    }
}

impl Drop for CudaTransferDevice {
    fn drop(&mut self) {
        if self.stream.is_null() {
            return;
        }
        // SAFETY: stream was created in new() and is destroyed once.
        let err = unsafe { (self.libs.cuda_stream_destroy)(self.stream) };
        if let Err(e) = check_cuda(self.libs, err, "cudaStreamDestroy") {
            warn!(error = %e, "failed to destroy transfer stream");
        }
    }
}
