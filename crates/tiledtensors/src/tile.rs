//! Shallow-copy tile handle.
//!
//! A [`Tile`] holds zero or one reference-counted dense block. Cloning a tile
//! shares the block; mutation goes through [`Tile::tensor_mut`], which copies
//! the block first when it is shared. The empty tile is a valid value, but
//! every arithmetic operation on it fails with [`TiledError::EmptyTile`].
//!
//! # Wire format
//!
//! ```text
//! bool empty         (bincode)
//! Tensor<T> payload  (bincode, only when empty == false)
//! ```

use std::io::{Read, Write};
use std::sync::Arc;

use crate::contract::{GemmHelper, gemm, gemm_into};
use crate::error::TiledError;
use crate::operations;
use crate::permutation::Permutation;
use crate::range::Range;
use crate::scalar::{Element, RealOf, RealScalar, Scalar};
use crate::tensor::Tensor;

/// Zero or one shared dense block.
///
/// # Example
///
/// ```
/// use tiledtensors::{Range, Tensor, Tile};
///
/// let a = Tile::new(Tensor::<f64>::ones(Range::from_extent(&[2, 2])));
/// let b = a.clone();
/// assert!(a.shares_block_with(&b));
///
/// let c = a.add_scaled(&b, 0.5).unwrap();
/// assert_eq!(c.tensor().unwrap().data(), &[1.0; 4]);
/// assert!(Tile::<f64>::empty().scale(2.0).is_err());
/// ```
#[derive(Debug)]
pub struct Tile<T> {
    inner: Option<Arc<Tensor<T>>>,
}

impl<T> Clone for Tile<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Tile<T> {
    fn default() -> Self {
        Self { inner: None }
    }
}

impl<T: Element> PartialEq for Tile<T> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl<T: Element> From<Tensor<T>> for Tile<T> {
    fn from(tensor: Tensor<T>) -> Self {
        Self::new(tensor)
    }
}

impl<T: Element> Tile<T> {
    pub fn empty() -> Self {
        Self { inner: None }
    }

    pub fn new(tensor: Tensor<T>) -> Self {
        Self {
            inner: Some(Arc::new(tensor)),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// The block, or `EmptyTile`.
    pub fn tensor(&self) -> Result<&Tensor<T>, TiledError> {
        self.inner.as_deref().ok_or(TiledError::EmptyTile)
    }

    /// Mutable access; clones the block if it is shared with another tile.
    pub fn tensor_mut(&mut self) -> Result<&mut Tensor<T>, TiledError> {
        self.inner
            .as_mut()
            .map(Arc::make_mut)
            .ok_or(TiledError::EmptyTile)
    }

    pub fn range(&self) -> Result<&Range, TiledError> {
        self.tensor().map(Tensor::range)
    }

    /// A tile with its own copy of the block.
    pub fn deep_clone(&self) -> Self {
        Self {
            inner: self.inner.as_ref().map(|t| Arc::new(Tensor::clone(t))),
        }
    }

    pub fn shares_block_with(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Take the block out, cloning it only if it is shared.
    pub fn into_tensor(self) -> Result<Tensor<T>, TiledError> {
        let arc = self.inner.ok_or(TiledError::EmptyTile)?;
        Ok(Arc::try_unwrap(arc).unwrap_or_else(|shared| Tensor::clone(&shared)))
    }

    /// Convert every element; the empty tile maps to the empty tile.
    pub fn map<U: Element, F: FnMut(T) -> U>(&self, f: F) -> Tile<U> {
        match &self.inner {
            Some(t) => Tile::new(t.map(f)),
            None => Tile::empty(),
        }
    }

    pub fn permute(&self, perm: &Permutation) -> Result<Self, TiledError> {
        Ok(Self::new(operations::permute(self.tensor()?, perm)?))
    }

    /// Encode in the tile wire format.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), TiledError> {
        bincode::serialize_into(&mut writer, &self.is_empty())?;
        if let Some(t) = &self.inner {
            bincode::serialize_into(&mut writer, t.as_ref())?;
        }
        Ok(())
    }

    /// Decode from the tile wire format.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, TiledError> {
        let empty: bool = bincode::deserialize_from(&mut reader)?;
        if empty {
            return Ok(Self::empty());
        }
        let tensor: Tensor<T> = bincode::deserialize_from(&mut reader)?;
        Ok(Self::new(tensor))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TiledError> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TiledError> {
        Self::read_from(bytes)
    }
}

macro_rules! tile_binary {
    ($( $name:ident ( $($arg:ident : $ty:ty),* ); )*) => {
        $(
            pub fn $name(&self, right: &Tile<T>, $($arg: $ty),*) -> Result<Tile<T>, TiledError> {
                Ok(Tile::new(operations::$name(self.tensor()?, right.tensor()?, $($arg),*)?))
            }
        )*
    };
}

macro_rules! tile_binary_to {
    ($( $name:ident ( $($arg:ident : $ty:ty),* ); )*) => {
        $(
            pub fn $name(&mut self, arg: &Tile<T>, $($arg: $ty),*) -> Result<(), TiledError> {
                let arg = arg.tensor()?;
                operations::$name(self.tensor_mut()?, arg, $($arg),*)
            }
        )*
    };
}

impl<T: Scalar> Tile<T> {
    tile_binary! {
        add();
        add_scaled(factor: T);
        add_permuted(perm: &Permutation);
        add_scaled_permuted(factor: T, perm: &Permutation);
        subt();
        subt_scaled(factor: T);
        subt_permuted(perm: &Permutation);
        subt_scaled_permuted(factor: T, perm: &Permutation);
        mult();
        mult_scaled(factor: T);
        mult_permuted(perm: &Permutation);
        mult_scaled_permuted(factor: T, perm: &Permutation);
    }

    tile_binary_to! {
        add_to();
        add_to_scaled(factor: T);
        add_to_permuted(perm: &Permutation);
        add_to_scaled_permuted(factor: T, perm: &Permutation);
        subt_to();
        subt_to_scaled(factor: T);
        subt_to_permuted(perm: &Permutation);
        subt_to_scaled_permuted(factor: T, perm: &Permutation);
        mult_to();
        mult_to_scaled(factor: T);
        mult_to_permuted(perm: &Permutation);
        mult_to_scaled_permuted(factor: T, perm: &Permutation);
    }

    pub fn add_value(&self, value: T) -> Result<Self, TiledError> {
        Ok(Self::new(operations::add_value(self.tensor()?, value)))
    }

    pub fn add_value_permuted(&self, value: T, perm: &Permutation) -> Result<Self, TiledError> {
        Ok(Self::new(operations::add_value_permuted(self.tensor()?, value, perm)?))
    }

    pub fn add_value_to(&mut self, value: T) -> Result<(), TiledError> {
        operations::add_value_to(self.tensor_mut()?, value);
        Ok(())
    }

    pub fn subt_value(&self, value: T) -> Result<Self, TiledError> {
        Ok(Self::new(operations::subt_value(self.tensor()?, value)))
    }

    pub fn subt_value_permuted(&self, value: T, perm: &Permutation) -> Result<Self, TiledError> {
        Ok(Self::new(operations::subt_value_permuted(self.tensor()?, value, perm)?))
    }

    pub fn subt_value_to(&mut self, value: T) -> Result<(), TiledError> {
        operations::subt_value_to(self.tensor_mut()?, value);
        Ok(())
    }

    pub fn scale(&self, factor: T) -> Result<Self, TiledError> {
        Ok(Self::new(operations::scale(self.tensor()?, factor)))
    }

    pub fn scale_permuted(&self, factor: T, perm: &Permutation) -> Result<Self, TiledError> {
        Ok(Self::new(operations::scale_permuted(self.tensor()?, factor, perm)?))
    }

    pub fn scale_to(&mut self, factor: T) -> Result<(), TiledError> {
        operations::scale_to(self.tensor_mut()?, factor);
        Ok(())
    }

    pub fn neg(&self) -> Result<Self, TiledError> {
        Ok(Self::new(operations::neg(self.tensor()?)))
    }

    pub fn neg_permuted(&self, perm: &Permutation) -> Result<Self, TiledError> {
        Ok(Self::new(operations::neg_permuted(self.tensor()?, perm)?))
    }

    pub fn neg_to(&mut self) -> Result<(), TiledError> {
        operations::neg_to(self.tensor_mut()?);
        Ok(())
    }

    /// `factor * op(self) * op(right)`.
    pub fn gemm(&self, right: &Self, factor: T, helper: &GemmHelper) -> Result<Self, TiledError> {
        Ok(Self::new(gemm(self.tensor()?, right.tensor()?, factor, helper)?))
    }

    /// `self += factor * op(left) * op(right)`.
    pub fn gemm_into(
        &mut self,
        left: &Self,
        right: &Self,
        factor: T,
        helper: &GemmHelper,
    ) -> Result<(), TiledError> {
        let (left, right) = (left.tensor()?, right.tensor()?);
        gemm_into(self.tensor_mut()?, left, right, factor, helper)
    }

    pub fn sum(&self) -> Result<T, TiledError> {
        self.tensor().map(operations::sum)
    }

    pub fn product(&self) -> Result<T, TiledError> {
        self.tensor().map(operations::product)
    }

    pub fn trace(&self) -> Result<T, TiledError> {
        self.tensor().map(operations::trace)
    }

    pub fn squared_norm(&self) -> Result<RealOf<T>, TiledError> {
        self.tensor().map(operations::squared_norm)
    }

    pub fn norm(&self) -> Result<RealOf<T>, TiledError> {
        self.tensor().map(operations::norm)
    }

    pub fn abs_max(&self) -> Result<RealOf<T>, TiledError> {
        self.tensor().map(operations::abs_max)
    }

    pub fn abs_min(&self) -> Result<RealOf<T>, TiledError> {
        operations::abs_min(self.tensor()?).ok_or(TiledError::EmptyTile)
    }

    pub fn dot(&self, other: &Self) -> Result<T, TiledError> {
        operations::dot(self.tensor()?, other.tensor()?)
    }

    pub fn inner_product(&self, other: &Self) -> Result<T, TiledError> {
        operations::inner_product(self.tensor()?, other.tensor()?)
    }
}

impl<T: RealScalar> Tile<T> {
    pub fn max(&self) -> Result<T, TiledError> {
        operations::max(self.tensor()?).ok_or(TiledError::EmptyTile)
    }

    pub fn min(&self) -> Result<T, TiledError> {
        operations::min(self.tensor()?).ok_or(TiledError::EmptyTile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::BlasOp;
    use approx::assert_relative_eq;

    fn tile(extent: &[usize], offset: f64) -> Tile<f64> {
        Tile::new(Tensor::from_fn(Range::from_extent(extent), |i| {
            offset + i.iter().enumerate().map(|(d, &x)| (x * (d + 1)) as f64).sum::<f64>()
        }))
    }

    #[test]
    fn test_shallow_copy_and_copy_on_write() {
        let a = tile(&[2, 2], 1.0);
        let mut b = a.clone();
        assert!(a.shares_block_with(&b));
        b.scale_to(2.0).unwrap();
        assert!(!a.shares_block_with(&b));
        assert_eq!(a.tensor().unwrap().data()[0], 1.0);
        assert_eq!(b.tensor().unwrap().data()[0], 2.0);
    }

    #[test]
    fn test_deep_clone() {
        let a = tile(&[3], 0.0);
        let b = a.deep_clone();
        assert!(!a.shares_block_with(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_tile_is_checked() {
        let e: Tile<f64> = Tile::empty();
        let a = tile(&[2], 0.0);
        assert_eq!(e.add(&a).unwrap_err(), TiledError::EmptyTile);
        assert_eq!(a.mult(&e).unwrap_err(), TiledError::EmptyTile);
        assert_eq!(e.sum().unwrap_err(), TiledError::EmptyTile);
        let mut e2 = e.clone();
        assert_eq!(e2.neg_to().unwrap_err(), TiledError::EmptyTile);
        let mut a2 = a.clone();
        assert_eq!(a2.add_to(&e).unwrap_err(), TiledError::EmptyTile);
        assert!(e.map(|x: f64| x as i64).is_empty());
    }

    #[test]
    fn test_add_to_with_self_alias() {
        let mut a = tile(&[4], 1.0);
        let b = a.clone();
        a.add_to(&b).unwrap();
        assert_eq!(a.tensor().unwrap().data(), &[2.0, 4.0, 6.0, 8.0]);
        assert_eq!(b.tensor().unwrap().data(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_wire_format() {
        let e: Tile<f64> = Tile::empty();
        assert_eq!(e.to_bytes().unwrap(), vec![1u8]);
        assert!(Tile::<f64>::from_bytes(&[1u8]).unwrap().is_empty());

        let a = tile(&[2, 3], 0.5);
        let bytes = a.to_bytes().unwrap();
        assert_eq!(bytes[0], 0u8);
        let back = Tile::<f64>::from_bytes(&bytes).unwrap();
        assert_eq!(back, a);

        assert!(matches!(
            Tile::<f64>::from_bytes(&bytes[..bytes.len() - 1]),
            Err(TiledError::Serialization { .. })
        ));
    }

    #[test]
    fn test_wire_format_rejects_malformed_range() {
        let encode = |lo: Vec<usize>, up: Vec<usize>| {
            let mut bytes = vec![0u8];
            bytes.extend(bincode::serialize(&(lo, up, Vec::<f64>::new())).unwrap());
            bytes
        };
        // lower bound above upper bound
        assert!(matches!(
            Tile::<f64>::from_bytes(&encode(vec![3], vec![2])),
            Err(TiledError::Serialization { .. })
        ));
        // bounds of different ranks
        assert!(matches!(
            Tile::<f64>::from_bytes(&encode(vec![0], vec![2, 1])),
            Err(TiledError::Serialization { .. })
        ));
        // a well-formed empty box still decodes
        let ok = Tile::<f64>::from_bytes(&encode(vec![2], vec![2])).unwrap();
        assert_eq!(ok.range().unwrap().volume(), 0);
    }

    #[test]
    fn test_reductions() {
        let a = Tile::new(Tensor::from_shape_vec(&[3], vec![3.0, -4.0, 0.0]).unwrap());
        assert_eq!(a.sum().unwrap(), -1.0);
        assert_eq!(a.squared_norm().unwrap(), 25.0);
        assert_relative_eq!(a.norm().unwrap(), 5.0);
        assert_eq!(a.max().unwrap(), 3.0);
        assert_eq!(a.min().unwrap(), -4.0);
        assert_eq!(a.abs_max().unwrap(), 4.0);
        assert_eq!(a.abs_min().unwrap(), 0.0);
        assert_eq!(a.dot(&a).unwrap(), 25.0);
    }

    #[test]
    fn test_gemm_tiles() {
        let a = tile(&[2, 3], 1.0);
        let b = tile(&[3, 2], 0.0);
        let h = GemmHelper::new(BlasOp::NoTrans, BlasOp::NoTrans, 2, 2, 2).unwrap();
        let c = a.gemm(&b, 1.0, &h).unwrap();
        let mut acc = c.clone();
        acc.gemm_into(&a, &b, 1.0, &h).unwrap();
        let doubled = c.scale(2.0).unwrap();
        for (x, y) in acc.tensor().unwrap().data().iter().zip(doubled.tensor().unwrap().data()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-12);
        }
        // c was shared with acc before accumulation and must be untouched
        assert!(!acc.shares_block_with(&c));
    }
}
