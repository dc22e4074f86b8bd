//! Transfer backends.

pub mod sim;

#[cfg(feature = "cuda")]
pub mod cuda;
