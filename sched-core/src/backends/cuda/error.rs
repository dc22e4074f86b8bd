//! Error types for the CUDA backend.

use crate::error::SchedError;
use std::fmt;

/// Result type for CUDA operations.
pub type CudaResult<T> = Result<T, CudaError>;

/// Errors that can occur in the CUDA backend.
#[derive(Debug, Clone)]
pub enum CudaError {
    /// No CUDA device available.
    NoDevice,

    /// Requested device index does not exist.
    InvalidDevice { index: i32, count: i32 },

    /// CUDA runtime call failed.
    DriverError { code: i32, message: String },

    /// Pinned host allocation failed.
    AllocationFailed { size: usize, reason: String },

    /// Copy larger than one of its buffers.
    CopyOutOfBounds {
        count: usize,
        src_len: usize,
        dst_len: usize,
    },

    /// CUDA runtime library not available.
    LibraryNotFound(String),
}

impl CudaError {
    /// CUDA error code, or -1 for errors raised on the host side.
    pub fn code(&self) -> i32 {
        match self {
            CudaError::DriverError { code, .. } => *code,
            _ => -1,
        }
    }
}

impl fmt::Display for CudaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CudaError::NoDevice => {
                write!(f, "No CUDA device available")
            }
            CudaError::InvalidDevice { index, count } => {
                write!(f, "CUDA device {} requested but only {} present", index, count)
            }
            CudaError::DriverError { code, message } => {
                write!(f, "CUDA runtime error {}: {}", code, message)
            }
            CudaError::AllocationFailed { size, reason } => {
                write!(f, "Failed to allocate {} pinned bytes: {}", size, reason)
            }
            CudaError::CopyOutOfBounds { count, src_len, dst_len } => {
                write!(
                    f,
                    "Copy of {} values out of bounds (src {}, dst {})",
                    count, src_len, dst_len
                )
            }
            CudaError::LibraryNotFound(msg) => {
                write!(f, "CUDA runtime library not found: {}", msg)
            }
        }
    }
}

impl std::error::Error for CudaError {}

impl From<CudaError> for SchedError {
    fn from(e: CudaError) -> Self {
        SchedError::Device {
            code: e.code(),
            context: "cuda".to_string(),
            message: e.to_string(),
        }
    }
}
