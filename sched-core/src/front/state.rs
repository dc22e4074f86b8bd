//! Front lifecycle states.
//!
//! The scheduler only ever writes the initial state of a front (see
//! [`FrontState::initial`]). Every later state is driven by the kernel
//! subsystem; the scheduler stores and exposes those states and checks
//! writes against the transition table below, nothing more.
//!
//! | state               | successors                              |
//! |---------------------|-----------------------------------------|
//! | `AllocateWait`      | `AssembleS`, `Factorize`, `ParentWait`  |
//! | `AssembleS`         | `ChildWait`                             |
//! | `ChildWait`         | `Factorize`                             |
//! | `Factorize`         | `FactorizeComplete`                     |
//! | `FactorizeComplete` | `ParentWait`, `Done`                    |
//! | `ParentWait`        | `PushAssemble`                          |
//! | `PushAssemble`      | `Cleanup`                               |
//! | `Cleanup`           | `Done`                                  |
//! | `Done`              | (none)                                  |

use serde::Serialize;
use std::fmt;

/// Factorization phase of an active front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum FrontState {
    /// Waiting for accelerator memory.
    #[default]
    AllocateWait,
    /// Assembling the sparse rows of S into the front.
    AssembleS,
    /// Waiting on children to push their contribution blocks.
    ChildWait,
    /// Factorization kernels running.
    Factorize,
    /// Factorization finished on the accelerator.
    FactorizeComplete,
    /// Waiting for the parent to accept the contribution block.
    ParentWait,
    /// Pushing the contribution block into the parent.
    PushAssemble,
    /// Releasing accelerator resources.
    Cleanup,
    /// Nothing left to do.
    Done,
}

impl FrontState {
    /// State a front enters on activation.
    ///
    /// Dense fronts have no rows of S to assemble and go straight to
    /// factorization. Sparse push-only fronts only contribute to their
    /// parent. Every other sparse front assembles S first.
    pub fn initial(dense: bool, push_only: bool) -> Self {
        if dense {
            FrontState::Factorize
        } else if push_only {
            FrontState::ParentWait
        } else {
            FrontState::AssembleS
        }
    }

    /// Legal next states.
    pub fn successors(self) -> &'static [FrontState] {
        use FrontState::*;
        match self {
            AllocateWait => &[AssembleS, Factorize, ParentWait],
            AssembleS => &[ChildWait],
            ChildWait => &[Factorize],
            Factorize => &[FactorizeComplete],
            FactorizeComplete => &[ParentWait, Done],
            ParentWait => &[PushAssemble],
            PushAssemble => &[Cleanup],
            Cleanup => &[Done],
            Done => &[],
        }
    }

    pub fn can_transition_to(self, next: FrontState) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self == FrontState::Done
    }
}

impl fmt::Display for FrontState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrontState::AllocateWait => "ALLOCATE_WAIT",
            FrontState::AssembleS => "ASSEMBLE_S",
            FrontState::ChildWait => "CHILD_WAIT",
            FrontState::Factorize => "FACTORIZE",
            FrontState::FactorizeComplete => "FACTORIZE_COMPLETE",
            FrontState::ParentWait => "PARENT_WAIT",
            FrontState::PushAssemble => "PUSH_ASSEMBLE",
            FrontState::Cleanup => "CLEANUP",
            FrontState::Done => "DONE",
        };
        f.write_str(name)
    }
}
