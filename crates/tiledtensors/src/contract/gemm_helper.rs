//! Matrix folding of block contractions.
//!
//! A contraction `C = op(A) * op(B)` over `k` shared dimensions is folded
//! into one GEMM:
//!
//! - `m` = product of A's outer (uncontracted) extents
//! - `k` = product of the contracted extents
//! - `n` = product of B's outer extents
//!
//! With `NoTrans`, the contracted dimensions are the trailing dimensions of
//! A and the leading dimensions of B. `Trans` and `ConjTrans` swap which end
//! of the operand is contracted. The result range is A's outer dimensions
//! followed by B's outer dimensions.

use crate::error::TiledError;
use crate::range::Range;

/// Operand transform applied before multiplication.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlasOp {
    #[default]
    NoTrans,
    Trans,
    ConjTrans,
}

impl BlasOp {
    #[inline]
    pub fn is_transposed(self) -> bool {
        !matches!(self, BlasOp::NoTrans)
    }
}

/// Describes how two blocks fold into a matrix product.
///
/// # Example
///
/// ```
/// use tiledtensors::contract::{BlasOp, GemmHelper};
///
/// // C[i, j, l] = A[i, j, k] * B[k, l]
/// let h = GemmHelper::new(BlasOp::NoTrans, BlasOp::NoTrans, 3, 3, 2).unwrap();
/// assert_eq!(h.num_contract_ranks(), 1);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GemmHelper {
    left_op: BlasOp,
    right_op: BlasOp,
    result_rank: usize,
    left_rank: usize,
    right_rank: usize,
}

impl GemmHelper {
    /// # Errors
    ///
    /// Returns `InvalidConstruction` if the ranks cannot describe a
    /// contraction: `left_rank + right_rank - result_rank` must be even and
    /// no larger than twice the smaller operand rank.
    pub fn new(
        left_op: BlasOp,
        right_op: BlasOp,
        result_rank: usize,
        left_rank: usize,
        right_rank: usize,
    ) -> Result<Self, TiledError> {
        let total = left_rank + right_rank;
        if result_rank > total || (total - result_rank) % 2 != 0 {
            return Err(TiledError::construction(format!(
                "ranks {} x {} cannot contract into rank {}",
                left_rank, right_rank, result_rank
            )));
        }
        let num_contract = (total - result_rank) / 2;
        if num_contract > left_rank || num_contract > right_rank {
            return Err(TiledError::construction(format!(
                "cannot contract {} dimensions of ranks {} and {}",
                num_contract, left_rank, right_rank
            )));
        }
        Ok(Self {
            left_op,
            right_op,
            result_rank,
            left_rank,
            right_rank,
        })
    }

    #[inline]
    pub fn left_op(&self) -> BlasOp {
        self.left_op
    }

    #[inline]
    pub fn right_op(&self) -> BlasOp {
        self.right_op
    }

    #[inline]
    pub fn result_rank(&self) -> usize {
        self.result_rank
    }

    #[inline]
    pub fn left_rank(&self) -> usize {
        self.left_rank
    }

    #[inline]
    pub fn right_rank(&self) -> usize {
        self.right_rank
    }

    #[inline]
    pub fn num_contract_ranks(&self) -> usize {
        (self.left_rank + self.right_rank - self.result_rank) / 2
    }

    /// Dimension indices of the left operand: (outer, inner).
    fn left_split(&self) -> (std::ops::Range<usize>, std::ops::Range<usize>) {
        let outer = self.left_rank - self.num_contract_ranks();
        if self.left_op.is_transposed() {
            (self.num_contract_ranks()..self.left_rank, 0..self.num_contract_ranks())
        } else {
            (0..outer, outer..self.left_rank)
        }
    }

    /// Dimension indices of the right operand: (outer, inner).
    fn right_split(&self) -> (std::ops::Range<usize>, std::ops::Range<usize>) {
        let inner = self.num_contract_ranks();
        if self.right_op.is_transposed() {
            (0..self.right_rank - inner, self.right_rank - inner..self.right_rank)
        } else {
            (inner..self.right_rank, 0..inner)
        }
    }

    fn check_ranks(&self, left: &Range, right: &Range) -> Result<(), TiledError> {
        if left.rank() != self.left_rank || right.rank() != self.right_rank {
            return Err(TiledError::DimensionMismatch {
                expected: vec![self.left_rank, self.right_rank],
                actual: vec![left.rank(), right.rank()],
            });
        }
        Ok(())
    }

    /// `(m, n, k)` of the folded product.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` for wrong operand ranks or contracted
    /// extents that do not agree.
    pub fn compute_matrix_sizes(
        &self,
        left: &Range,
        right: &Range,
    ) -> Result<(usize, usize, usize), TiledError> {
        self.check_ranks(left, right)?;
        let le = left.extent();
        let re = right.extent();
        let (l_outer, l_inner) = self.left_split();
        let (r_outer, r_inner) = self.right_split();

        let l_inner_ext = &le[l_inner];
        let r_inner_ext = &re[r_inner];
        if l_inner_ext != r_inner_ext {
            return Err(TiledError::DimensionMismatch {
                expected: l_inner_ext.to_vec(),
                actual: r_inner_ext.to_vec(),
            });
        }

        let m = le[l_outer].iter().product();
        let n = re[r_outer].iter().product();
        let k = l_inner_ext.iter().product();
        Ok((m, n, k))
    }

    /// Range of the product: left outer bounds followed by right outer bounds.
    pub fn make_result_range(&self, left: &Range, right: &Range) -> Result<Range, TiledError> {
        self.check_ranks(left, right)?;
        let (l_outer, _) = self.left_split();
        let (r_outer, _) = self.right_split();
        let lo: Vec<usize> = left.lobound()[l_outer.clone()]
            .iter()
            .chain(&right.lobound()[r_outer.clone()])
            .copied()
            .collect();
        let up: Vec<usize> = left.upbound()[l_outer]
            .iter()
            .chain(&right.upbound()[r_outer])
            .copied()
            .collect();
        Range::new(&lo, &up)
    }
}
