//! Generic (loop-based) backend implementation.

use crate::backend::PermutationBackend;
use crate::math::vector_op::copy_vector;
use crate::permutation::Permutation;
use crate::scalar::Element;
use crate::tensor::Tensor;

/// Generic backend using plain loops.
///
/// Walks the source in storage order with an odometer and tracks the
/// destination offset incrementally, so no index vectors are allocated per
/// element.
pub struct GenericBackend;

impl PermutationBackend for GenericBackend {
    fn permute_into<T: Element>(dest: &mut Tensor<T>, src: &Tensor<T>, perm: &Permutation) {
        let src_shape = src.shape();
        assert_eq!(
            perm.apply(&src_shape).ok().as_deref(),
            Some(dest.shape().as_slice()),
            "destination extents must be the permuted source extents"
        );

        if perm.is_identity() {
            copy_vector(src.data(), dest.data_mut());
            return;
        }

        let rank = src_shape.len();
        let dest_strides = dest.strides();
        // stride in the destination of each source dimension
        let step: Vec<usize> = (0..rank).map(|d| dest_strides[perm.as_slice()[d]]).collect();

        let mut index = vec![0usize; rank];
        let mut offset = 0usize;
        let out = dest.data_mut();
        for &value in src.data() {
            out[offset] = value;
            for d in 0..rank {
                index[d] += 1;
                offset += step[d];
                if index[d] < src_shape[d] {
                    break;
                }
                offset -= step[d] * src_shape[d];
                index[d] = 0;
            }
        }
    }
}
