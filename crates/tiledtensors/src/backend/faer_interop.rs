//! Zero-copy views of dense blocks as faer matrices.
//!
//! Both blocks and faer use column-major storage, so a block whose leading
//! dimensions are fused into rows and trailing dimensions into columns is a
//! plain matrix view of the same buffer.

use faer::{MatMut, MatRef};

use crate::scalar::Scalar;
use crate::tensor::Tensor;

/// Extension trait for viewing a block as a faer matrix.
pub trait AsFaerMat<T: Scalar> {
    /// View block data as an immutable `rows x cols` matrix.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols != len()`.
    ///
    /// # Example
    ///
    /// ```
    /// use tiledtensors::Tensor;
    /// use tiledtensors::backend::AsFaerMat;
    ///
    /// let t = Tensor::from_shape_vec(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    /// let mat = t.as_faer_mat(2, 3);
    /// assert_eq!(mat[(1, 2)], 6.0);
    /// ```
    fn as_faer_mat(&self, rows: usize, cols: usize) -> MatRef<'_, T>;

    /// View block data as a mutable `rows x cols` matrix.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols != len()`.
    fn as_faer_mat_mut(&mut self, rows: usize, cols: usize) -> MatMut<'_, T>;
}

impl<T: Scalar> AsFaerMat<T> for Tensor<T> {
    fn as_faer_mat(&self, rows: usize, cols: usize) -> MatRef<'_, T> {
        assert_eq!(
            rows * cols,
            self.len(),
            "matrix dimensions ({} x {} = {}) must match block size ({})",
            rows,
            cols,
            rows * cols,
            self.len()
        );
        MatRef::from_column_major_slice(self.data(), rows, cols)
    }

    fn as_faer_mat_mut(&mut self, rows: usize, cols: usize) -> MatMut<'_, T> {
        assert_eq!(
            rows * cols,
            self.len(),
            "matrix dimensions ({} x {} = {}) must match block size ({})",
            rows,
            cols,
            rows * cols,
            self.len()
        );
        MatMut::from_column_major_slice_mut(self.data_mut(), rows, cols)
    }
}
