//! Dense blocks: the payload of a tile.

use serde::{Deserialize, Serialize};

use crate::error::TiledError;
use crate::math::vector_op::unary_vector_op;
use crate::range::{Coord, Range};
use crate::scalar::{Element, Scalar};
use crate::strides::compute_strides;

/// A dense block of elements over a [`Range`].
///
/// Elements are stored column-major relative to the range's lower bound.
/// Indices passed to [`Tensor::get`] and friends are global element
/// coordinates, so a block keeps its position inside the array it came from.
///
/// # Example
///
/// ```
/// use tiledtensors::{Range, Tensor};
///
/// let range = Range::new(&[2, 0], &[4, 3]).unwrap();
/// let t = Tensor::from_vec(range, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
/// assert_eq!(t.get(&[2, 0]), Some(&1.0));
/// assert_eq!(t.get(&[3, 0]), Some(&2.0)); // column-major: first index fastest
/// assert_eq!(t.get(&[2, 1]), Some(&3.0));
/// assert_eq!(t.get(&[0, 0]), None);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor<T>")]
pub struct Tensor<T> {
    range: Range,
    data: Vec<T>,
}

#[derive(Deserialize)]
struct RawTensor<T> {
    range: Range,
    data: Vec<T>,
}

impl<T> TryFrom<RawTensor<T>> for Tensor<T> {
    type Error = TiledError;

    fn try_from(raw: RawTensor<T>) -> Result<Self, Self::Error> {
        if raw.data.len() != raw.range.volume() {
            return Err(TiledError::DimensionMismatch {
                expected: vec![raw.range.volume()],
                actual: vec![raw.data.len()],
            });
        }
        Ok(Self {
            range: raw.range,
            data: raw.data,
        })
    }
}

impl<T: Element> Tensor<T> {
    /// Zero-initialized (`T::default()`) block.
    pub fn zeros(range: Range) -> Self {
        Self::filled(range, T::default())
    }

    pub fn filled(range: Range, value: T) -> Self {
        let data = vec![value; range.volume()];
        Self { range, data }
    }

    /// Create a block from column-major data.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `data.len()` differs from the range volume.
    pub fn from_vec(range: Range, data: Vec<T>) -> Result<Self, TiledError> {
        RawTensor { range, data }.try_into()
    }

    /// Block anchored at the origin with the given extents.
    pub fn from_shape_vec(shape: &[usize], data: Vec<T>) -> Result<Self, TiledError> {
        Self::from_vec(Range::from_extent(shape), data)
    }

    /// Evaluate `f` at every global index, column-major.
    pub fn from_fn<F>(range: Range, mut f: F) -> Self
    where
        F: FnMut(&[usize]) -> T,
    {
        let volume = range.volume();
        let mut data = Vec::with_capacity(volume);
        let lo = range.lobound().to_vec();
        let up = range.upbound().to_vec();
        if volume > 0 {
            let mut index = lo.clone();
            for _ in 0..volume {
                data.push(f(&index));
                for d in 0..index.len() {
                    index[d] += 1;
                    if index[d] < up[d] {
                        break;
                    }
                    index[d] = lo[d];
                }
            }
        }
        Self { range, data }
    }

    #[inline]
    pub fn range(&self) -> &Range {
        &self.range
    }

    /// Extent of each dimension.
    pub fn shape(&self) -> Coord {
        self.range.extent()
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.range.rank()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Column-major strides of the block.
    pub fn strides(&self) -> Vec<usize> {
        compute_strides(&self.shape())
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    #[inline]
    pub fn get_linear(&self, i: usize) -> Option<&T> {
        self.data.get(i)
    }

    #[inline]
    pub fn get_linear_mut(&mut self, i: usize) -> Option<&mut T> {
        self.data.get_mut(i)
    }

    /// Element at a global index; `None` outside the range.
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        self.range.ordinal(index).and_then(|i| self.data.get(i))
    }

    pub fn get_mut(&mut self, index: &[usize]) -> Option<&mut T> {
        self.range.ordinal(index).and_then(|i| self.data.get_mut(i))
    }

    /// Set the element at a global index.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if the index is outside the block.
    pub fn set(&mut self, index: &[usize], value: T) -> Result<(), TiledError> {
        match self.range.ordinal(index) {
            Some(i) => {
                self.data[i] = value;
                Ok(())
            }
            None => Err(TiledError::OutOfRange {
                what: "element",
                index: index.to_vec(),
                bound: self.range.upbound().to_vec(),
            }),
        }
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Convert every element, keeping the range.
    pub fn map<U: Element, F: FnMut(T) -> U>(&self, f: F) -> Tensor<U> {
        let mut data = vec![U::default(); self.data.len()];
        unary_vector_op(&self.data, &mut data, f);
        Tensor {
            range: self.range.clone(),
            data,
        }
    }
}

impl<T: Scalar> Tensor<T> {
    pub fn ones(range: Range) -> Self {
        Self::filled(range, T::one())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_and_shape() {
        let t: Tensor<f64> = Tensor::zeros(Range::from_extent(&[2, 3, 4]));
        assert_eq!(t.shape().as_slice(), &[2, 3, 4]);
        assert_eq!(t.len(), 24);
        assert_eq!(t.strides(), vec![1, 2, 6]);
        assert!(t.data().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        let err = Tensor::from_shape_vec(&[2, 2], vec![1.0; 3]).unwrap_err();
        assert_eq!(
            err,
            TiledError::DimensionMismatch {
                expected: vec![4],
                actual: vec![3]
            }
        );
    }

    #[test]
    fn test_from_fn_column_major() {
        let range = Range::new(&[1, 10], &[3, 12]).unwrap();
        let t = Tensor::from_fn(range, |i| (i[0] * 100 + i[1]) as i64);
        assert_eq!(t.data(), &[110, 210, 111, 211]);
    }

    #[test]
    fn test_set_get_global_index() {
        let mut t: Tensor<f64> = Tensor::zeros(Range::new(&[5], &[8]).unwrap());
        t.set(&[6], 2.5).unwrap();
        assert_eq!(t.get(&[6]), Some(&2.5));
        assert_eq!(t.get_linear(1), Some(&2.5));
        assert!(matches!(
            t.set(&[8], 1.0),
            Err(TiledError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_map_changes_type() {
        let t = Tensor::from_shape_vec(&[3], vec![1.5, 2.0, -3.0]).unwrap();
        let m: Tensor<i64> = t.map(|x: f64| x as i64);
        assert_eq!(m.data(), &[1, 2, -3]);
        assert_eq!(m.range(), t.range());
    }

    #[test]
    fn test_deserialize_validates_length() {
        let t = Tensor::from_shape_vec(&[2], vec![1.0f64, 2.0]).unwrap();
        let bytes = bincode::serialize(&t).unwrap();
        let back: Tensor<f64> = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, t);

        #[derive(Serialize)]
        struct Bogus {
            range: Range,
            data: Vec<f64>,
        }
        let bogus = Bogus {
            range: Range::from_extent(&[3]),
            data: vec![1.0],
        };
        let bytes = bincode::serialize(&bogus).unwrap();
        assert!(bincode::deserialize::<Tensor<f64>>(&bytes).is_err());
    }

    #[test]
    fn test_ones() {
        let t: Tensor<f64> = Tensor::ones(Range::from_extent(&[2, 2]));
        assert_eq!(t.data(), &[1.0; 4]);
    }
}
