//! GEMM-based block contraction using faer.
//!
//! Blocks are folded to matrices with [`GemmHelper`] and multiplied with
//! faer's `matmul`. Column-major storage means no data movement is needed for
//! `NoTrans` and `Trans`; `ConjTrans` conjugates a copy of the operand first.

use std::borrow::Cow;

use faer::linalg::matmul::matmul;
use faer::{Accum, MatRef, Par};

use crate::backend::AsFaerMat;
use crate::contract::gemm_helper::{BlasOp, GemmHelper};
use crate::error::TiledError;
use crate::operations::conj;
use crate::scalar::Scalar;
use crate::tensor::Tensor;

/// `factor * op(left) * op(right)`.
///
/// # Errors
///
/// Returns `DimensionMismatch` if the operand ranks differ from `helper` or
/// the contracted extents do not agree.
///
/// # Example
///
/// ```
/// use tiledtensors::Tensor;
/// use tiledtensors::contract::{BlasOp, GemmHelper, gemm};
///
/// let a = Tensor::<f64>::ones(tiledtensors::Range::from_extent(&[2, 3]));
/// let b = Tensor::<f64>::ones(tiledtensors::Range::from_extent(&[3, 4]));
/// let h = GemmHelper::new(BlasOp::NoTrans, BlasOp::NoTrans, 2, 2, 2).unwrap();
///
/// let c = gemm(&a, &b, 2.0, &h).unwrap();
/// assert_eq!(c.shape().as_slice(), &[2, 4]);
/// assert_eq!(c.data()[0], 6.0);
/// ```
pub fn gemm<T: Scalar>(
    left: &Tensor<T>,
    right: &Tensor<T>,
    factor: T,
    helper: &GemmHelper,
) -> Result<Tensor<T>, TiledError> {
    let range = helper.make_result_range(left.range(), right.range())?;
    let mut result = Tensor::zeros(range);
    gemm_with(&mut result, left, right, factor, helper, Accum::Replace)?;
    Ok(result)
}

/// `result += factor * op(left) * op(right)`.
///
/// # Errors
///
/// Returns `DimensionMismatch` if `result` does not have the product's extents
/// or the operands are incongruent.
pub fn gemm_into<T: Scalar>(
    result: &mut Tensor<T>,
    left: &Tensor<T>,
    right: &Tensor<T>,
    factor: T,
    helper: &GemmHelper,
) -> Result<(), TiledError> {
    if result.ndim() != helper.result_rank() {
        return Err(TiledError::DimensionMismatch {
            expected: vec![helper.result_rank()],
            actual: vec![result.ndim()],
        });
    }
    let expected = helper.make_result_range(left.range(), right.range())?;
    if expected.extent() != result.shape() {
        return Err(TiledError::DimensionMismatch {
            expected: expected.extent().to_vec(),
            actual: result.shape().to_vec(),
        });
    }
    gemm_with(result, left, right, factor, helper, Accum::Add)
}

fn operand<'a, T: Scalar>(
    tensor: &'a Tensor<T>,
    op: BlasOp,
) -> Cow<'a, Tensor<T>> {
    match op {
        BlasOp::ConjTrans => Cow::Owned(conj(tensor)),
        BlasOp::NoTrans | BlasOp::Trans => Cow::Borrowed(tensor),
    }
}

fn view<'a, T: Scalar>(tensor: &'a Tensor<T>, op: BlasOp, rows: usize, cols: usize) -> MatRef<'a, T> {
    if op.is_transposed() {
        tensor.as_faer_mat(cols, rows).transpose()
    } else {
        tensor.as_faer_mat(rows, cols)
    }
}

fn gemm_with<T: Scalar>(
    result: &mut Tensor<T>,
    left: &Tensor<T>,
    right: &Tensor<T>,
    factor: T,
    helper: &GemmHelper,
    accum: Accum,
) -> Result<(), TiledError> {
    let (m, n, k) = helper.compute_matrix_sizes(left.range(), right.range())?;
    if m == 0 || n == 0 {
        return Ok(());
    }

    let left = operand(left, helper.left_op());
    let right = operand(right, helper.right_op());
    let a = view(&left, helper.left_op(), m, k);
    let b = view(&right, helper.right_op(), k, n);
    let mut c = result.as_faer_mat_mut(m, n);

    // C = factor * A * B (+ C)
    matmul(c.as_mut(), accum, a, b, factor, Par::Seq);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;
    use crate::scalar::c64;
    use approx::assert_relative_eq;

    fn naive<T: Scalar>(a: &[T], b: &[T], m: usize, n: usize, k: usize) -> Vec<T> {
        let mut c = vec![T::zero(); m * n];
        for i in 0..m {
            for j in 0..n {
                for l in 0..k {
                    c[i + j * m] = c[i + j * m] + a[i + l * m] * b[l + j * k];
                }
            }
        }
        c
    }

    #[test]
    fn test_gemm_matrix_multiply() {
        let a = Tensor::from_shape_vec(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = Tensor::from_fn(Range::from_extent(&[3, 4]), |i| (i[0] + 3 * i[1]) as f64 + 1.0);
        let h = GemmHelper::new(BlasOp::NoTrans, BlasOp::NoTrans, 2, 2, 2).unwrap();

        let c = gemm(&a, &b, 2.0, &h).unwrap();
        let expected = naive(a.data(), b.data(), 2, 4, 3);
        for (x, y) in c.data().iter().zip(expected.iter()) {
            assert_relative_eq!(*x, 2.0 * y, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_gemm_into_accumulates() {
        let a = Tensor::<f64>::ones(Range::from_extent(&[2, 2]));
        let b = Tensor::<f64>::ones(Range::from_extent(&[2, 2]));
        let h = GemmHelper::new(BlasOp::NoTrans, BlasOp::NoTrans, 2, 2, 2).unwrap();
        let mut c = Tensor::filled(Range::from_extent(&[2, 2]), 1.0);
        gemm_into(&mut c, &a, &b, 0.5, &h).unwrap();
        assert!(c.data().iter().all(|&x| (x - 2.0).abs() < 1e-12));

        let mut wrong = Tensor::<f64>::zeros(Range::from_extent(&[3, 2]));
        assert!(gemm_into(&mut wrong, &a, &b, 1.0, &h).is_err());
    }

    #[test]
    fn test_gemm_transposed_operands() {
        let a = Tensor::from_fn(Range::from_extent(&[3, 2]), |i| (i[0] * 2 + i[1]) as f64);
        let b = Tensor::from_fn(Range::from_extent(&[4, 3]), |i| (i[0] + i[1] * 5) as f64);
        let h = GemmHelper::new(BlasOp::Trans, BlasOp::Trans, 2, 2, 2).unwrap();
        let c = gemm(&a, &b, 1.0, &h).unwrap();
        assert_eq!(c.shape().as_slice(), &[2, 4]);
        for i in 0..2 {
            for j in 0..4 {
                let expected: f64 = (0..3)
                    .map(|l| a.get(&[l, i]).unwrap() * b.get(&[j, l]).unwrap())
                    .sum();
                assert_relative_eq!(*c.get(&[i, j]).unwrap(), expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_gemm_conj_trans() {
        let a = Tensor::from_shape_vec(&[1, 2], vec![c64::new(0.0, 1.0), c64::new(1.0, 1.0)]).unwrap();
        let h = GemmHelper::new(BlasOp::ConjTrans, BlasOp::NoTrans, 2, 2, 2).unwrap();
        // a^H a
        let c = gemm(&a, &a, c64::new(1.0, 0.0), &h).unwrap();
        assert_eq!(c.shape().as_slice(), &[2, 2]);
        let c01 = c.get(&[0, 1]).unwrap();
        // conj(i) * (1 + i) = -i * (1 + i) = 1 - i
        assert_relative_eq!(c01.re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(c01.im, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gemm_rank3_by_matrix() {
        let a = Tensor::<f64>::ones(Range::from_extent(&[2, 3, 4]));
        let b = Tensor::<f64>::ones(Range::from_extent(&[4, 5]));
        let h = GemmHelper::new(BlasOp::NoTrans, BlasOp::NoTrans, 3, 3, 2).unwrap();
        let c = gemm(&a, &b, 1.0, &h).unwrap();
        assert_eq!(c.shape().as_slice(), &[2, 3, 5]);
        assert!(c.data().iter().all(|&x| (x - 4.0).abs() < 1e-12));
    }

    #[test]
    fn test_gemm_dimension_mismatch() {
        let a = Tensor::<f64>::ones(Range::from_extent(&[2, 3]));
        let b = Tensor::<f64>::ones(Range::from_extent(&[4, 5]));
        let h = GemmHelper::new(BlasOp::NoTrans, BlasOp::NoTrans, 2, 2, 2).unwrap();
        assert!(matches!(
            gemm(&a, &b, 1.0, &h),
            Err(TiledError::DimensionMismatch { .. })
        ));
    }
}
