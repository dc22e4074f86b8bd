//! Front lifecycle scheduler for GPU-accelerated sparse factorization.
//!
//! A *front* is a dense sub-block of a sparse factorization that is
//! assembled and factorized on the accelerator, then released once its
//! results are safely back in host memory. This crate tracks which fronts
//! are live on the accelerator and moves each one through
//!
//! ```text
//! inactive --activate_front--> active --pull_front_data--> pull issued
//!          <--finish_front---- (pulled signal fired)
//! ```
//!
//! without ever blocking the host thread. Completion is observed through
//! non-blocking [`CompletionSignal`] queries; the concrete accelerator API
//! sits behind [`TransferDevice`].
//!
//! # Example
//!
//! ```
//! use sched_core::backends::sim::{SimBuffer, SimDevice};
//! use sched_core::{Front, FrontState, Scheduler};
//!
//! let mut fronts = vec![Front::dense(0, 4, 4).with_device_buffer(SimBuffer::zeros(16))];
//! let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());
//!
//! sched.activate_front(0)?;
//! assert_eq!(sched.front(0).state, FrontState::Factorize);
//!
//! // The kernel launch hands over the ready signal.
//! let ready = sched.device_mut().launch_kernel(3);
//! sched.attach_ready_signal(0, ready)?;
//!
//! // Planner polling loop.
//! while !sched.pull_front_data(0)? {
//!     sched.device_mut().tick();
//! }
//! while !sched.finish_front(0)? {
//!     sched.device_mut().tick();
//! }
//! assert_eq!(sched.num_active_fronts(), 0);
//! # Ok::<(), sched_core::SchedError>(())
//! ```

#![warn(clippy::all)]

pub mod active_set;
pub mod backends;
pub mod error;
pub mod front;
pub mod scheduler;
pub mod settings;
pub mod signal;
pub mod tracker;

pub use active_set::{ActiveSet, EMPTY};
pub use error::{SchedError, SchedResult};
pub use front::{Front, FrontState, SparseMeta};
pub use scheduler::{FrontOf, Scheduler, SchedulerStats, TeardownReport};
pub use settings::SchedulerSettings;
pub use signal::{CompletionSignal, TransferDevice};
pub use tracker::CompletionTracker;
