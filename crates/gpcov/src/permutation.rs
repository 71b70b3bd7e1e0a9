//! Cyclic block permutations of symmetric matrices rows and columns.
//!
//! Incremental updates only handle the last subject block of a time point set, so a
//! subject block has to be moved at the end before being removed, and the order restored
//! afterwards.

use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2};

/// Move the `len` indices starting at `start` to the end, shifting the following ones back.
///
/// Index `i` of the permuted matrix takes the row (and column) `source(i)` where:
/// * `source(i) = i` for `i < start`,
/// * `source(i) = i + len` for `start <= i < n - len`,
/// * `source(i) = start + i - (n - len)` for the last `len` indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockPermutation {
    start: usize,
    len: usize,
}

impl BlockPermutation {
    /// Constructor of the permutation moving the `[start, start + len)` block at the end
    pub fn new(start: usize, len: usize) -> Self {
        BlockPermutation { start, len }
    }

    /// First index of the moved block
    pub fn start(&self) -> usize {
        self.start
    }

    /// Length of the moved block
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the permutation moves nothing
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Source index of index `i` within a set of `n` indices
    pub fn source(&self, i: usize, n: usize) -> usize {
        debug_assert!(self.start + self.len <= n, "block out of range");
        if i < self.start {
            i
        } else if i < n - self.len {
            i + self.len
        } else {
            self.start + i - (n - self.len)
        }
    }

    /// Permutation restoring the original order of a set of `n` indices:
    /// the trailing `len` block goes back to `start`.
    pub fn inverse(&self, n: usize) -> BlockPermutation {
        BlockPermutation {
            start: self.start,
            len: n - self.start - self.len,
        }
    }

    /// Permute rows and columns of the square matrix `mat`
    pub fn apply<F: Float>(&self, mat: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        let n = mat.nrows();
        let src = (0..n).map(|i| self.source(i, n)).collect::<Vec<_>>();
        Array2::from_shape_fn((n, n), |(i, j)| mat[[src[i], src[j]]])
    }

    /// Permute the time points consistently with [`BlockPermutation::apply`]
    pub fn apply_to_times<F: Float>(
        &self,
        times: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array1<F> {
        let n = times.len();
        Array1::from_shape_fn(n, |i| times[self.source(i, n)])
    }
}

/// Permute `mat` rows and columns moving the `len` block starting at `start` at the end,
/// see [`BlockPermutation`].
pub fn permute<F: Float>(
    mat: &ArrayBase<impl Data<Elem = F>, Ix2>,
    start: usize,
    len: usize,
) -> Array2<F> {
    BlockPermutation::new(start, len).apply(mat)
}
