//! Permutation backend trait.

use crate::permutation::Permutation;
use crate::scalar::Element;
use crate::tensor::Tensor;

/// Backend trait for block permutation.
///
/// Implementations can provide optimized transpose algorithms; the crate
/// ships [`GenericBackend`](super::GenericBackend).
pub trait PermutationBackend {
    /// Write the permutation of `src` into `dest`.
    ///
    /// Element `src[i]` lands at `dest[perm(i)]`, where `perm(i)[perm[d]] = i[d]`.
    ///
    /// # Panics
    ///
    /// Panics if `dest`'s extents are not the permuted extents of `src`.
    fn permute_into<T: Element>(dest: &mut Tensor<T>, src: &Tensor<T>, perm: &Permutation);
}
