//! Block permutation.
//!
//! ```text
//! permute(tensor, perm)
//!     → check rank
//!     → allocate output over perm ^ range
//!     → permute_into(output, tensor, perm)
//!
//! permute_into(dest, src, perm)
//!     → dispatch to backend (GenericBackend)
//! ```

use crate::backend::{GenericBackend, PermutationBackend};
use crate::error::TiledError;
use crate::permutation::Permutation;
use crate::scalar::Element;
use crate::tensor::Tensor;

/// Permute the dimensions of a block, returning a new block.
///
/// The result covers `perm ^ tensor.range()`, and the element at global index
/// `i` of the source is found at `perm ^ i` of the result.
///
/// # Errors
///
/// Returns `DimensionMismatch` if `perm` has a different rank than `tensor`.
///
/// # Examples
///
/// ```
/// use tiledtensors::{Permutation, Tensor};
/// use tiledtensors::operations::permute;
///
/// let t = Tensor::from_shape_vec(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
/// let t2 = permute(&t, &Permutation::new(vec![1, 0]).unwrap()).unwrap();
/// assert_eq!(t2.shape().as_slice(), &[3, 2]);
/// assert_eq!(t.get(&[1, 0]), t2.get(&[0, 1]));
/// ```
pub fn permute<T: Element>(tensor: &Tensor<T>, perm: &Permutation) -> Result<Tensor<T>, TiledError> {
    let range = tensor.range().permute(perm)?;
    let mut result = Tensor::zeros(range);
    permute_into(&mut result, tensor, perm)?;
    Ok(result)
}

/// Permute into an existing block.
///
/// # Errors
///
/// Returns `DimensionMismatch` if the rank differs or `dest` does not cover
/// the permuted range of `src`.
pub fn permute_into<T: Element>(
    dest: &mut Tensor<T>,
    src: &Tensor<T>,
    perm: &Permutation,
) -> Result<(), TiledError> {
    let expected = src.range().permute(perm)?;
    if dest.range() != &expected {
        return Err(TiledError::DimensionMismatch {
            expected: expected.extent().to_vec(),
            actual: dest.shape().to_vec(),
        });
    }
    GenericBackend::permute_into(dest, src, perm);
    Ok(())
}
