//! Stride computation utilities.
//!
//! Tile data is always column-major (first index fastest) to match faer. Tile
//! ordinals inside a tiled range may use either [`Order`].

use serde::{Deserialize, Serialize};

/// Linearization order of a multi-dimensional index space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    /// First index varies fastest.
    #[default]
    ColumnMajor,
    /// Last index varies fastest.
    RowMajor,
}

/// Compute column-major strides from shape.
///
/// For shape [d0, d1, d2, ...], returns strides [1, d0, d0*d1, ...].
///
/// # Examples
///
/// ```
/// use tiledtensors::strides::compute_strides;
///
/// assert_eq!(compute_strides(&[3, 4, 5]), vec![1, 3, 12]);
/// assert_eq!(compute_strides(&[5]), vec![1]);
/// assert_eq!(compute_strides(&[]), vec![]);
/// ```
pub fn compute_strides(shape: &[usize]) -> Vec<usize> {
    compute_strides_with_order(shape, Order::ColumnMajor)
}

/// Compute strides for either ordering.
///
/// ```
/// use tiledtensors::strides::{Order, compute_strides_with_order};
///
/// assert_eq!(compute_strides_with_order(&[3, 4, 5], Order::RowMajor), vec![20, 5, 1]);
/// ```
pub fn compute_strides_with_order(shape: &[usize], order: Order) -> Vec<usize> {
    let mut strides = vec![0; shape.len()];
    let mut stride = 1;
    match order {
        Order::ColumnMajor => {
            for (s, &dim) in strides.iter_mut().zip(shape.iter()) {
                *s = stride;
                stride *= dim;
            }
        }
        Order::RowMajor => {
            for (s, &dim) in strides.iter_mut().zip(shape.iter()).rev() {
                *s = stride;
                stride *= dim;
            }
        }
    }
    strides
}

/// Convert cartesian indices to linear index.
///
/// # Arguments
///
/// * `indices` - Cartesian indices for each dimension
/// * `strides` - Strides for each dimension
#[inline]
pub fn cartesian_to_linear(indices: &[usize], strides: &[usize]) -> usize {
    indices
        .iter()
        .zip(strides.iter())
        .map(|(&idx, &stride)| idx * stride)
        .sum()
}

/// Convert linear index to cartesian indices using column-major order.
pub fn linear_to_cartesian(linear: usize, shape: &[usize]) -> Vec<usize> {
    linear_to_cartesian_with_order(linear, shape, Order::ColumnMajor)
}

/// Convert linear index to cartesian indices using the given order.
pub fn linear_to_cartesian_with_order(mut linear: usize, shape: &[usize], order: Order) -> Vec<usize> {
    let mut indices = vec![0; shape.len()];
    match order {
        Order::ColumnMajor => {
            for (i, &dim) in indices.iter_mut().zip(shape.iter()) {
                *i = linear % dim;
                linear /= dim;
            }
        }
        Order::RowMajor => {
            for (i, &dim) in indices.iter_mut().zip(shape.iter()).rev() {
                *i = linear % dim;
                linear /= dim;
            }
        }
    }
    indices
}
