//! Front descriptors.
//!
//! A front is one rectangular dense block of a sparse factorization. The
//! engine builds the front list once per run from the symbolic analysis;
//! the scheduler reads the classification predicates and buffer handles and
//! writes only `state` and the host mirror.

mod state;

pub use state::FrontState;

/// Sparse metadata attached to fronts that come from a sparse problem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SparseMeta {
    /// Rows of the contribution block.
    pub cm: usize,
    /// Only contributes to its parent; never factorized or pulled itself.
    pub push_only: bool,
    /// Has a contribution block that must be pulled along with R.
    pub is_staged: bool,
}

/// One factorization task.
///
/// `D` and `H` are the device and host buffer handles of the transfer
/// backend (see [`crate::TransferDevice`]).
#[derive(Debug)]
pub struct Front<D, H> {
    /// Local front id (index into the front list).
    pub fid: usize,
    /// Global front id, for diagnostics.
    pub fidg: usize,
    /// Row extent.
    pub fm: usize,
    /// Column extent.
    pub fn_: usize,
    /// Present iff the front came from a sparse problem.
    pub sparse_meta: Option<SparseMeta>,
    /// Current lifecycle state; meaningful only while active.
    pub state: FrontState,
    /// Accelerator-resident front values.
    pub gpu_f: Option<D>,
    /// Host mirror for R (and the contribution block when staged).
    pub cpu_r: Option<H>,
}

impl<D, H> Front<D, H> {
    /// A dense front with no sparse metadata.
    pub fn dense(fid: usize, fm: usize, fn_: usize) -> Self {
        Self {
            fid,
            fidg: fid,
            fm,
            fn_,
            sparse_meta: None,
            state: FrontState::default(),
            gpu_f: None,
            cpu_r: None,
        }
    }

    /// A sparse front.
    pub fn sparse(fid: usize, fm: usize, fn_: usize, meta: SparseMeta) -> Self {
        Self {
            sparse_meta: Some(meta),
            ..Self::dense(fid, fm, fn_)
        }
    }

    pub fn with_fidg(mut self, fidg: usize) -> Self {
        self.fidg = fidg;
        self
    }

    pub fn with_device_buffer(mut self, buf: D) -> Self {
        self.gpu_f = Some(buf);
        self
    }

    pub fn is_sparse(&self) -> bool {
        self.sparse_meta.is_some()
    }

    pub fn is_dense(&self) -> bool {
        !self.is_sparse()
    }

    pub fn is_push_only(&self) -> bool {
        self.sparse_meta.is_some_and(|m| m.push_only)
    }

    pub fn is_staged(&self) -> bool {
        self.sparse_meta.is_some_and(|m| m.is_staged)
    }

    /// Rows of the contribution block (0 for dense fronts).
    pub fn cm(&self) -> usize {
        self.sparse_meta.map_or(0, |m| m.cm)
    }

    pub fn rank(&self) -> usize {
        self.fm.min(self.fn_)
    }

    pub fn num_front_values(&self) -> usize {
        self.fm * self.fn_
    }

    /// Values in the R factor: `rank` rows of `fn_` columns.
    pub fn num_r_values(&self) -> usize {
        self.rank() * self.fn_
    }

    /// Values `pull_front_data` moves to the host: R, plus the
    /// contribution block rows when the front is staged.
    pub fn num_values_to_pull(&self) -> usize {
        let mut n = self.num_r_values();
        if self.is_staged() {
            n += self.cm() * self.fn_;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestFront = Front<(), Vec<f64>>;

    #[test]
    fn test_classification() {
        let d = TestFront::dense(0, 4, 3);
        assert!(d.is_dense());
        assert!(!d.is_push_only());
        assert!(!d.is_staged());

        let meta = SparseMeta { cm: 2, push_only: true, is_staged: false };
        let p = TestFront::sparse(1, 4, 3, meta);
        assert!(!p.is_dense());
        assert!(p.is_push_only());
    }

    #[test]
    fn test_pull_sizes() {
        // Tall front: rank = fn
        let d = TestFront::dense(0, 6, 4);
        assert_eq!(d.num_r_values(), 16);
        assert_eq!(d.num_values_to_pull(), 16);
        assert_eq!(d.num_front_values(), 24);

        // Wide front: rank = fm
        let w = TestFront::dense(1, 2, 5);
        assert_eq!(w.num_r_values(), 10);

        let meta = SparseMeta { cm: 3, push_only: false, is_staged: true };
        let s = TestFront::sparse(2, 6, 4, meta);
        assert_eq!(s.num_values_to_pull(), 16 + 3 * 4);

        // cm only counts when staged
        let meta = SparseMeta { cm: 3, push_only: false, is_staged: false };
        let u = TestFront::sparse(3, 6, 4, meta);
        assert_eq!(u.num_values_to_pull(), 16);
    }
}
