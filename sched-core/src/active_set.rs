//! Active-set index.
//!
//! Permutation / inverse-permutation pair over front ids, giving O(1)
//! membership, append and swap-remove:
//!
//! - `af_perm[0..num_active]` holds exactly the active fronts, in
//!   insertion/swap order (no meaning beyond that).
//! - `af_pinv[f]` is the position of `f` in `af_perm`, or [`EMPTY`].
//!
//! Positions are volatile. Callers should look fronts up by id through
//! [`ActiveSet::position`] and never rely on order in `af_perm`.

use crate::error::{SchedError, SchedResult};

/// Sentinel for "not active" in `af_pinv`.
pub const EMPTY: usize = usize::MAX;

#[derive(Debug, Clone)]
pub struct ActiveSet {
    af_perm: Vec<usize>,
    af_pinv: Vec<usize>,
    num_active: usize,
}

impl ActiveSet {
    /// Empty set over `num_fronts` front ids.
    pub fn new(num_fronts: usize) -> Self {
        Self {
            af_perm: vec![EMPTY; num_fronts],
            af_pinv: vec![EMPTY; num_fronts],
            num_active: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.num_active
    }

    pub fn is_empty(&self) -> bool {
        self.num_active == 0
    }

    /// Number of front ids the index covers.
    pub fn capacity(&self) -> usize {
        self.af_pinv.len()
    }

    pub fn contains(&self, f: usize) -> bool {
        self.af_pinv[f] != EMPTY
    }

    pub fn position(&self, f: usize) -> Option<usize> {
        match self.af_pinv[f] {
            EMPTY => None,
            p => Some(p),
        }
    }

    /// Active fronts, in slot order.
    pub fn as_slice(&self) -> &[usize] {
        &self.af_perm[..self.num_active]
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.as_slice().iter().copied()
    }

    /// Append `f`. Returns `false` if it was already active.
    pub fn insert(&mut self, f: usize) -> bool {
        if self.contains(f) {
            return false;
        }
        self.af_perm[self.num_active] = f;
        self.af_pinv[f] = self.num_active;
        self.num_active += 1;
        true
    }

    /// Swap-remove `f`: the last active front takes its slot.
    /// Returns `false` if `f` was not active.
    pub fn remove(&mut self, f: usize) -> bool {
        let position = match self.position(f) {
            Some(p) => p,
            None => return false,
        };

        self.num_active -= 1;
        if self.num_active > 0 {
            let replacer = self.af_perm[self.num_active];
            self.af_perm[position] = replacer;
            self.af_pinv[replacer] = position;
        }
        self.af_perm[self.num_active] = EMPTY;
        self.af_pinv[f] = EMPTY;
        true
    }

    /// Verify the permutation invariants. O(number of front ids).
    pub fn check_invariants(&self) -> SchedResult<()> {
        for (p, &f) in self.as_slice().iter().enumerate() {
            if f >= self.af_pinv.len() {
                return Err(SchedError::InvariantViolation(format!(
                    "slot {} holds out-of-range front {}",
                    p, f
                )));
            }
            if self.af_pinv[f] != p {
                return Err(SchedError::InvariantViolation(format!(
                    "af_pinv[{}] = {} but front sits in slot {}",
                    f, self.af_pinv[f], p
                )));
            }
        }

        let mut active = 0;
        for (f, &p) in self.af_pinv.iter().enumerate() {
            if p == EMPTY {
                continue;
            }
            active += 1;
            if p >= self.num_active || self.af_perm[p] != f {
                return Err(SchedError::InvariantViolation(format!(
                    "front {} maps to slot {} outside the active prefix",
                    f, p
                )));
            }
        }

        if active != self.num_active {
            return Err(SchedError::InvariantViolation(format!(
                "{} fronts marked active but num_active = {}",
                active, self.num_active
            )));
        }
        Ok(())
    }
}
