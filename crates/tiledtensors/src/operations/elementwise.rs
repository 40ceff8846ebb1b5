//! Element-wise block arithmetic.
//!
//! Each binary operator comes as a full ladder:
//!
//! ```text
//! op(l, r)                         l op r
//! op_scaled(l, r, f)               (l op r) * f
//! op_permuted(l, r, p)             p ^ (l op r)
//! op_scaled_permuted(l, r, f, p)   p ^ ((l op r) * f)
//! op_to(x, a)                      x = x op a
//! op_to_scaled(x, a, f)            x = (x op a) * f
//! op_to_permuted(x, a, p)          x = x op (p ^ a)
//! op_to_scaled_permuted(x, a, f, p)
//! ```
//!
//! Out-of-place permuted forms evaluate the operation in the operand layout
//! and then permute; in-place permuted forms permute the argument into the
//! result's layout first.

use crate::error::TiledError;
use crate::math::vector_op::{
    binary_vector_op, binary_vector_op_in_place, unary_vector_op, unary_vector_op_in_place,
};
use crate::operations::permute::permute;
use crate::permutation::Permutation;
use crate::range::Range;
use crate::scalar::Scalar;
use crate::tensor::Tensor;

pub(crate) fn check_same_range(left: &Range, right: &Range) -> Result<(), TiledError> {
    if left != right {
        return Err(TiledError::DimensionMismatch {
            expected: left.lobound().iter().chain(left.upbound()).copied().collect(),
            actual: right.lobound().iter().chain(right.upbound()).copied().collect(),
        });
    }
    Ok(())
}

fn binary<T, F>(left: &Tensor<T>, right: &Tensor<T>, op: F) -> Result<Tensor<T>, TiledError>
where
    T: Scalar,
    F: FnMut(T, T) -> T,
{
    check_same_range(left.range(), right.range())?;
    let mut result = Tensor::zeros(left.range().clone());
    binary_vector_op(left.data(), right.data(), result.data_mut(), op);
    Ok(result)
}

fn binary_to<T, F>(result: &mut Tensor<T>, arg: &Tensor<T>, op: F) -> Result<(), TiledError>
where
    T: Scalar,
    F: FnMut(&mut T, T),
{
    check_same_range(result.range(), arg.range())?;
    binary_vector_op_in_place(arg.data(), result.data_mut(), op);
    Ok(())
}

fn unary<T, F>(arg: &Tensor<T>, op: F) -> Tensor<T>
where
    T: Scalar,
    F: FnMut(T) -> T,
{
    let mut result = Tensor::zeros(arg.range().clone());
    unary_vector_op(arg.data(), result.data_mut(), op);
    result
}

macro_rules! binary_ladder {
    (
        $verb:literal, $op:tt,
        $plain:ident, $scaled:ident, $permuted:ident, $scaled_permuted:ident,
        $to:ident, $to_scaled:ident, $to_permuted:ident, $to_scaled_permuted:ident
    ) => {
        #[doc = concat!("Element-wise ", $verb, " of two blocks over the same range.")]
        ///
        /// # Errors
        ///
        /// Returns `DimensionMismatch` if the ranges differ.
        pub fn $plain<T: Scalar>(left: &Tensor<T>, right: &Tensor<T>) -> Result<Tensor<T>, TiledError> {
            binary(left, right, |l, r| l $op r)
        }

        #[doc = concat!("Element-wise ", $verb, " scaled by `factor`.")]
        pub fn $scaled<T: Scalar>(
            left: &Tensor<T>,
            right: &Tensor<T>,
            factor: T,
        ) -> Result<Tensor<T>, TiledError> {
            binary(left, right, |l, r| (l $op r) * factor)
        }

        #[doc = concat!("Element-wise ", $verb, ", permuted.")]
        pub fn $permuted<T: Scalar>(
            left: &Tensor<T>,
            right: &Tensor<T>,
            perm: &Permutation,
        ) -> Result<Tensor<T>, TiledError> {
            permute(&$plain(left, right)?, perm)
        }

        #[doc = concat!("Element-wise ", $verb, ", scaled and permuted.")]
        pub fn $scaled_permuted<T: Scalar>(
            left: &Tensor<T>,
            right: &Tensor<T>,
            factor: T,
            perm: &Permutation,
        ) -> Result<Tensor<T>, TiledError> {
            permute(&$scaled(left, right, factor)?, perm)
        }

        #[doc = concat!("In-place element-wise ", $verb, " of `arg` into `result`.")]
        pub fn $to<T: Scalar>(result: &mut Tensor<T>, arg: &Tensor<T>) -> Result<(), TiledError> {
            binary_to(result, arg, |x, a| *x = *x $op a)
        }

        #[doc = concat!("In-place element-wise ", $verb, " followed by scaling.")]
        pub fn $to_scaled<T: Scalar>(
            result: &mut Tensor<T>,
            arg: &Tensor<T>,
            factor: T,
        ) -> Result<(), TiledError> {
            binary_to(result, arg, |x, a| *x = (*x $op a) * factor)
        }

        #[doc = concat!("In-place element-wise ", $verb, " of the permuted `arg`.")]
        pub fn $to_permuted<T: Scalar>(
            result: &mut Tensor<T>,
            arg: &Tensor<T>,
            perm: &Permutation,
        ) -> Result<(), TiledError> {
            $to(result, &permute(arg, perm)?)
        }

        #[doc = concat!("In-place element-wise ", $verb, " of the permuted `arg`, then scaling.")]
        pub fn $to_scaled_permuted<T: Scalar>(
            result: &mut Tensor<T>,
            arg: &Tensor<T>,
            factor: T,
            perm: &Permutation,
        ) -> Result<(), TiledError> {
            $to_scaled(result, &permute(arg, perm)?, factor)
        }
    };
}

binary_ladder!(
    "addition", +,
    add, add_scaled, add_permuted, add_scaled_permuted,
    add_to, add_to_scaled, add_to_permuted, add_to_scaled_permuted
);

binary_ladder!(
    "subtraction", -,
    subt, subt_scaled, subt_permuted, subt_scaled_permuted,
    subt_to, subt_to_scaled, subt_to_permuted, subt_to_scaled_permuted
);

binary_ladder!(
    "multiplication", *,
    mult, mult_scaled, mult_permuted, mult_scaled_permuted,
    mult_to, mult_to_scaled, mult_to_permuted, mult_to_scaled_permuted
);

/// `arg + value` for every element.
pub fn add_value<T: Scalar>(arg: &Tensor<T>, value: T) -> Tensor<T> {
    unary(arg, |x| x + value)
}

pub fn add_value_permuted<T: Scalar>(
    arg: &Tensor<T>,
    value: T,
    perm: &Permutation,
) -> Result<Tensor<T>, TiledError> {
    permute(&add_value(arg, value), perm)
}

pub fn add_value_to<T: Scalar>(result: &mut Tensor<T>, value: T) {
    unary_vector_op_in_place(result.data_mut(), |x| *x = *x + value);
}

/// `arg - value` for every element.
pub fn subt_value<T: Scalar>(arg: &Tensor<T>, value: T) -> Tensor<T> {
    unary(arg, |x| x - value)
}

pub fn subt_value_permuted<T: Scalar>(
    arg: &Tensor<T>,
    value: T,
    perm: &Permutation,
) -> Result<Tensor<T>, TiledError> {
    permute(&subt_value(arg, value), perm)
}

pub fn subt_value_to<T: Scalar>(result: &mut Tensor<T>, value: T) {
    unary_vector_op_in_place(result.data_mut(), |x| *x = *x - value);
}

/// Multiply every element by `factor`.
///
/// # Example
///
/// ```
/// use tiledtensors::Tensor;
/// use tiledtensors::operations::scale;
///
/// let t = Tensor::from_shape_vec(&[3], vec![1.0, -2.0, 0.5]).unwrap();
/// assert_eq!(scale(&t, 2.0).data(), &[2.0, -4.0, 1.0]);
/// ```
pub fn scale<T: Scalar>(arg: &Tensor<T>, factor: T) -> Tensor<T> {
    unary(arg, |x| x * factor)
}

pub fn scale_permuted<T: Scalar>(
    arg: &Tensor<T>,
    factor: T,
    perm: &Permutation,
) -> Result<Tensor<T>, TiledError> {
    permute(&scale(arg, factor), perm)
}

pub fn scale_to<T: Scalar>(result: &mut Tensor<T>, factor: T) {
    unary_vector_op_in_place(result.data_mut(), |x| *x = *x * factor);
}

/// Negate every element.
pub fn neg<T: Scalar>(arg: &Tensor<T>) -> Tensor<T> {
    unary(arg, |x| -x)
}

pub fn neg_permuted<T: Scalar>(arg: &Tensor<T>, perm: &Permutation) -> Result<Tensor<T>, TiledError> {
    permute(&neg(arg), perm)
}

pub fn neg_to<T: Scalar>(result: &mut Tensor<T>) {
    unary_vector_op_in_place(result.data_mut(), |x| *x = -*x);
}

/// Element-wise complex conjugate; a copy for real types.
pub fn conj<T: Scalar>(arg: &Tensor<T>) -> Tensor<T> {
    unary(arg, |x| x.conjugate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::c64;
    use approx::assert_relative_eq;

    fn pair() -> (Tensor<f64>, Tensor<f64>) {
        let range = Range::new(&[1, 0], &[3, 3]).unwrap();
        let a = Tensor::from_fn(range.clone(), |i| (i[0] * 3 + i[1]) as f64);
        let b = Tensor::from_fn(range, |i| 1.0 + i[1] as f64);
        (a, b)
    }

    #[test]
    fn test_plain_ops() {
        let (a, b) = pair();
        let s = add(&a, &b).unwrap();
        let d = subt(&a, &b).unwrap();
        let m = mult(&a, &b).unwrap();
        for i in 0..a.len() {
            let (x, y) = (a.data()[i], b.data()[i]);
            assert_eq!(s.data()[i], x + y);
            assert_eq!(d.data()[i], x - y);
            assert_eq!(m.data()[i], x * y);
        }
        assert_eq!(s.range(), a.range());
    }

    #[test]
    fn test_scaled_ops() {
        let (a, b) = pair();
        let s = subt_scaled(&a, &b, 0.5).unwrap();
        for i in 0..a.len() {
            assert_relative_eq!(s.data()[i], (a.data()[i] - b.data()[i]) * 0.5);
        }
    }

    #[test]
    fn test_permuted_matches_permute_of_plain() {
        let (a, b) = pair();
        let p = Permutation::new(vec![1, 0]).unwrap();
        let direct = add_scaled_permuted(&a, &b, 3.0, &p).unwrap();
        let expected = permute(&add_scaled(&a, &b, 3.0).unwrap(), &p).unwrap();
        assert_eq!(direct, expected);
        for ord in 0..a.len() {
            let idx = a.range().index(ord).unwrap();
            let pidx = p.apply(&idx).unwrap();
            assert_relative_eq!(
                *direct.get(&pidx).unwrap(),
                (a.get(&idx).unwrap() + b.get(&idx).unwrap()) * 3.0
            );
        }
    }

    #[test]
    fn test_in_place_ladder() {
        let (a, b) = pair();
        let mut x = a.clone();
        add_to(&mut x, &b).unwrap();
        assert_eq!(x, add(&a, &b).unwrap());

        let mut x = a.clone();
        mult_to_scaled(&mut x, &b, 2.0).unwrap();
        assert_eq!(x, mult_scaled(&a, &b, 2.0).unwrap());

        // accumulate a permuted argument into the permuted layout
        let p = Permutation::new(vec![1, 0]).unwrap();
        let mut x = permute(&a, &p).unwrap();
        subt_to_permuted(&mut x, &b, &p).unwrap();
        assert_eq!(x, subt_permuted(&a, &b, &p).unwrap());

        let mut x = permute(&a, &p).unwrap();
        add_to_scaled_permuted(&mut x, &b, -1.0, &p).unwrap();
        assert_eq!(x, add_scaled_permuted(&a, &b, -1.0, &p).unwrap());
    }

    #[test]
    fn test_range_mismatch() {
        let (a, _) = pair();
        let c: Tensor<f64> = Tensor::zeros(Range::from_extent(&[2, 3]));
        assert!(matches!(add(&a, &c), Err(TiledError::DimensionMismatch { .. })));
        let mut x = a.clone();
        assert!(mult_to(&mut x, &c).is_err());
    }

    #[test]
    fn test_unary_family() {
        let (a, _) = pair();
        assert_eq!(neg(&a).data()[1], -a.data()[1]);
        let mut x = a.clone();
        neg_to(&mut x);
        assert_eq!(x, neg(&a));
        let mut x = a.clone();
        scale_to(&mut x, 4.0);
        assert_eq!(x, scale(&a, 4.0));
        assert_eq!(add_value(&a, 1.5).data()[0], a.data()[0] + 1.5);
        let mut x = a.clone();
        subt_value_to(&mut x, 2.0);
        assert_eq!(x, subt_value(&a, 2.0));
        let p = Permutation::new(vec![1, 0]).unwrap();
        assert_eq!(
            neg_permuted(&a, &p).unwrap(),
            permute(&neg(&a), &p).unwrap()
        );
    }

    #[test]
    fn test_conj_complex() {
        let t = Tensor::from_shape_vec(&[2], vec![c64::new(1.0, 2.0), c64::new(3.0, -4.0)]).unwrap();
        let tc = conj(&t);
        assert_eq!(tc.data()[0].im, -2.0);
        assert_eq!(tc.data()[1].im, 4.0);
    }
}
