//! Block reductions.

use crate::error::TiledError;
use crate::math::vector_op::{reduce_vector_op, reduce_vector_op2};
use crate::operations::elementwise::check_same_range;
use crate::scalar::{RealOf, RealScalar, Scalar};
use crate::tensor::Tensor;

/// Sum of all elements.
pub fn sum<T: Scalar>(arg: &Tensor<T>) -> T {
    let mut acc = T::zero();
    reduce_vector_op(arg.data(), &mut acc, |s, x| *s = *s + x);
    acc
}

/// Product of all elements.
pub fn product<T: Scalar>(arg: &Tensor<T>) -> T {
    let mut acc = T::one();
    reduce_vector_op(arg.data(), &mut acc, |s, x| *s = *s * x);
    acc
}

/// Sum of `|x|^2`.
pub fn squared_norm<T: Scalar>(arg: &Tensor<T>) -> RealOf<T> {
    let mut acc = <RealOf<T> as Scalar>::zero();
    reduce_vector_op(arg.data(), &mut acc, |s, x| *s = *s + x.abs_sqr());
    acc
}

/// Frobenius norm.
///
/// # Example
///
/// ```
/// use tiledtensors::Tensor;
/// use tiledtensors::operations::norm;
///
/// let t = Tensor::from_shape_vec(&[2], vec![3.0, 4.0]).unwrap();
/// assert_eq!(norm(&t), 5.0);
/// ```
pub fn norm<T: Scalar>(arg: &Tensor<T>) -> RealOf<T> {
    squared_norm(arg).sqrt_real()
}

/// `sum(left[i] * right[i])`, no conjugation.
pub fn dot<T: Scalar>(left: &Tensor<T>, right: &Tensor<T>) -> Result<T, TiledError> {
    check_same_range(left.range(), right.range())?;
    let mut acc = T::zero();
    reduce_vector_op2(left.data(), right.data(), &mut acc, |s, l, r| *s = *s + l * r);
    Ok(acc)
}

/// `sum(conj(left[i]) * right[i])`.
pub fn inner_product<T: Scalar>(left: &Tensor<T>, right: &Tensor<T>) -> Result<T, TiledError> {
    check_same_range(left.range(), right.range())?;
    let mut acc = T::zero();
    reduce_vector_op2(left.data(), right.data(), &mut acc, |s, l, r| {
        *s = *s + l.conjugate() * r
    });
    Ok(acc)
}

/// Sum of the elements whose global coordinates are all equal.
///
/// A block away from the array diagonal has trace zero.
pub fn trace<T: Scalar>(arg: &Tensor<T>) -> T {
    let range = arg.range();
    if range.rank() == 0 {
        return arg.data().first().copied().unwrap_or_else(T::zero);
    }
    let start = range.lobound().iter().copied().max().unwrap_or(0);
    let end = range.upbound().iter().copied().min().unwrap_or(0);
    let mut acc = T::zero();
    let mut diag = vec![0usize; range.rank()];
    for k in start..end {
        diag.fill(k);
        if let Some(&x) = arg.get(&diag) {
            acc = acc + x;
        }
    }
    acc
}

fn fold_first<T, F>(data: &[T], mut pick: F) -> Option<T>
where
    T: Copy,
    F: FnMut(T, T) -> T,
{
    let (&first, rest) = data.split_first()?;
    let mut acc = first;
    reduce_vector_op(rest, &mut acc, |s, x| *s = pick(*s, x));
    Some(acc)
}

/// Largest element; `None` for an empty block.
pub fn max<T: RealScalar>(arg: &Tensor<T>) -> Option<T> {
    fold_first(arg.data(), |a, b| if b > a { b } else { a })
}

/// Smallest element; `None` for an empty block.
pub fn min<T: RealScalar>(arg: &Tensor<T>) -> Option<T> {
    fold_first(arg.data(), |a, b| if b < a { b } else { a })
}

/// Largest modulus.
pub fn abs_max<T: Scalar>(arg: &Tensor<T>) -> RealOf<T> {
    let mut acc = <RealOf<T> as Scalar>::zero();
    reduce_vector_op(arg.data(), &mut acc, |s, x| {
        let m = x.modulus();
        if m > *s {
            *s = m;
        }
    });
    acc
}

/// Smallest modulus; `None` for an empty block.
pub fn abs_min<T: Scalar>(arg: &Tensor<T>) -> Option<RealOf<T>> {
    let (first, rest) = arg.data().split_first()?;
    let mut acc = first.modulus();
    reduce_vector_op(rest, &mut acc, |s, x| {
        let m = x.modulus();
        if m < *s {
            *s = m;
        }
    });
    Some(acc)
}
