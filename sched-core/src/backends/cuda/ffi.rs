//! Dynamic FFI bindings for the CUDA runtime.
//!
//! The runtime is loaded with `libloading` on first use, so the crate
//! builds and runs on machines without CUDA; there every entry point
//! returns [`CudaError::LibraryNotFound`].
//!
//! Only the calls the transfer path needs are bound: streams, events,
//! async copies and pinned host memory.

#![allow(non_camel_case_types)]

use super::error::{CudaError, CudaResult};
use libloading::Library;
use std::ffi::{c_char, c_void};
use std::sync::OnceLock;

// ============================================================================
// CUDA Types
// ============================================================================

/// CUDA error codes
pub type cudaError_t = i32;

/// CUDA stream handle
pub type cudaStream_t = *mut c_void;

/// CUDA event handle
pub type cudaEvent_t = *mut c_void;

pub const CUDA_SUCCESS: cudaError_t = 0;
/// Returned by `cudaEventQuery` while the event is pending.
pub const CUDA_ERROR_NOT_READY: cudaError_t = 600;

/// `cudaStreamNonBlocking`: no implicit sync with the legacy default stream.
pub const CUDA_STREAM_NON_BLOCKING: u32 = 0x01;
/// `cudaEventDisableTiming`: cheapest event flavor, completion only.
pub const CUDA_EVENT_DISABLE_TIMING: u32 = 0x02;

/// CUDA memory copy kind (only device-to-host is issued)
#[repr(i32)]
#[derive(Debug, Clone, Copy)]
pub enum CudaMemcpyKind {
    DeviceToHost = 2,
}

// ============================================================================
// Function pointer types
// ============================================================================

type CudaSetDeviceFn = unsafe extern "C" fn(device: i32) -> cudaError_t;
type CudaGetDeviceCountFn = unsafe extern "C" fn(count: *mut i32) -> cudaError_t;
type CudaStreamCreateWithFlagsFn =
    unsafe extern "C" fn(stream: *mut cudaStream_t, flags: u32) -> cudaError_t;
type CudaStreamDestroyFn = unsafe extern "C" fn(stream: cudaStream_t) -> cudaError_t;
type CudaEventCreateWithFlagsFn =
    unsafe extern "C" fn(event: *mut cudaEvent_t, flags: u32) -> cudaError_t;
type CudaEventDestroyFn = unsafe extern "C" fn(event: cudaEvent_t) -> cudaError_t;
type CudaEventQueryFn = unsafe extern "C" fn(event: cudaEvent_t) -> cudaError_t;
type CudaEventRecordFn =
    unsafe extern "C" fn(event: cudaEvent_t, stream: cudaStream_t) -> cudaError_t;
type CudaMemcpyAsyncFn = unsafe extern "C" fn(
    dst: *mut c_void,
    src: *const c_void,
    count: usize,
    kind: CudaMemcpyKind,
    stream: cudaStream_t,
) -> cudaError_t;
type CudaMallocHostFn = unsafe extern "C" fn(ptr: *mut *mut c_void, size: usize) -> cudaError_t;
type CudaFreeHostFn = unsafe extern "C" fn(ptr: *mut c_void) -> cudaError_t;
type CudaGetErrorStringFn = unsafe extern "C" fn(error: cudaError_t) -> *const c_char;

// ============================================================================
// Library wrapper
// ============================================================================

/// Dynamically loaded CUDA runtime.
pub struct CudaLibraries {
    _cuda_rt: Library,

    pub cuda_set_device: CudaSetDeviceFn,
    pub cuda_get_device_count: CudaGetDeviceCountFn,
    pub cuda_stream_create_with_flags: CudaStreamCreateWithFlagsFn,
    pub cuda_stream_destroy: CudaStreamDestroyFn,
    pub cuda_event_create_with_flags: CudaEventCreateWithFlagsFn,
    pub cuda_event_destroy: CudaEventDestroyFn,
    pub cuda_event_query: CudaEventQueryFn,
    pub cuda_event_record: CudaEventRecordFn,
    pub cuda_memcpy_async: CudaMemcpyAsyncFn,
    pub cuda_malloc_host: CudaMallocHostFn,
    pub cuda_free_host: CudaFreeHostFn,
    pub cuda_get_error_string: CudaGetErrorStringFn,
}

// SAFETY: The function pointers come from the CUDA runtime, which is
// thread-safe; the Library handle is only kept alive, never mutated.
unsafe impl Send for CudaLibraries {}
unsafe impl Sync for CudaLibraries {}

macro_rules! load_symbol {
    ($lib:expr, $ty:ty, $name:literal) => {
        // SAFETY: the symbol type matches the CUDA runtime prototype.
        unsafe {
            *$lib
                .get::<$ty>(concat!($name, "\0").as_bytes())
                .map_err(|e| CudaError::LibraryNotFound(format!("{}: {}", $name, e)))?
        }
    };
}

impl CudaLibraries {
    /// Try to load the CUDA runtime.
    pub fn load() -> CudaResult<Self> {
        let cuda_rt_names: &[&str] = if cfg!(target_os = "windows") {
            &["cudart64_12.dll", "cudart64_11.dll", "cudart64.dll"]
        } else if cfg!(target_os = "macos") {
            &["libcudart.dylib"]
        } else {
            &["libcudart.so.12", "libcudart.so.11", "libcudart.so"]
        };

        let cuda_rt = Self::load_library(cuda_rt_names)?;

        let cuda_set_device = load_symbol!(cuda_rt, CudaSetDeviceFn, "cudaSetDevice");
        let cuda_get_device_count = load_symbol!(cuda_rt, CudaGetDeviceCountFn, "cudaGetDeviceCount");
        let cuda_stream_create_with_flags =
            load_symbol!(cuda_rt, CudaStreamCreateWithFlagsFn, "cudaStreamCreateWithFlags");
        let cuda_stream_destroy = load_symbol!(cuda_rt, CudaStreamDestroyFn, "cudaStreamDestroy");
        let cuda_event_create_with_flags =
            load_symbol!(cuda_rt, CudaEventCreateWithFlagsFn, "cudaEventCreateWithFlags");
        let cuda_event_destroy = load_symbol!(cuda_rt, CudaEventDestroyFn, "cudaEventDestroy");
        let cuda_event_query = load_symbol!(cuda_rt, CudaEventQueryFn, "cudaEventQuery");
        let cuda_event_record = load_symbol!(cuda_rt, CudaEventRecordFn, "cudaEventRecord");
        let cuda_memcpy_async = load_symbol!(cuda_rt, CudaMemcpyAsyncFn, "cudaMemcpyAsync");
        let cuda_malloc_host = load_symbol!(cuda_rt, CudaMallocHostFn, "cudaMallocHost");
        let cuda_free_host = load_symbol!(cuda_rt, CudaFreeHostFn, "cudaFreeHost");
        let cuda_get_error_string = load_symbol!(cuda_rt, CudaGetErrorStringFn, "cudaGetErrorString");

        Ok(Self {
            _cuda_rt: cuda_rt,
            cuda_set_device,
            cuda_get_device_count,
            cuda_stream_create_with_flags,
            cuda_stream_destroy,
            cuda_event_create_with_flags,
            cuda_event_destroy,
            cuda_event_query,
            cuda_event_record,
            cuda_memcpy_async,
            cuda_malloc_host,
            cuda_free_host,
            cuda_get_error_string,
        })
    }

    fn load_library(names: &[&str]) -> CudaResult<Library> {
        let mut last_error = String::from("no candidate names");
        for name in names {
            // SAFETY: loading the CUDA runtime runs only its own initializers.
            match unsafe { Library::new(name) } {
                Ok(lib) => return Ok(lib),
                Err(e) => last_error = e.to_string(),
            }
        }
        Err(CudaError::LibraryNotFound(format!(
            "CUDA runtime library not found ({}). Install the CUDA toolkit.",
            last_error
        )))
    }
}

// ============================================================================
// Global library instance
// ============================================================================

static CUDA_LIBS: OnceLock<CudaResult<CudaLibraries>> = OnceLock::new();

/// Get the global CUDA runtime, loading it on first call.
pub fn get_cuda_libs() -> CudaResult<&'static CudaLibraries> {
    CUDA_LIBS
        .get_or_init(CudaLibraries::load)
        .as_ref()
        .map_err(Clone::clone)
}

/// Check if the CUDA runtime can be loaded.
pub fn is_cuda_available() -> bool {
    get_cuda_libs().is_ok()
}

// ============================================================================
// Helper functions
// ============================================================================

/// Check a CUDA return code and convert to CudaResult.
pub fn check_cuda(libs: &CudaLibraries, err: cudaError_t, context: &str) -> CudaResult<()> {
    if err == CUDA_SUCCESS {
        return Ok(());
    }
    // SAFETY: cudaGetErrorString returns a static NUL-terminated string or null.
    let msg = unsafe {
        let ptr = (libs.cuda_get_error_string)(err);
        if ptr.is_null() {
            format!("Unknown error {}", err)
        } else {
            std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    };
    Err(CudaError::DriverError {
        code: err,
        message: format!("{}: {}", context, msg),
    })
}
