//! Tiling index: maps element coordinates to tile coordinates and ordinals.

mod tiled_range1;

pub use tiled_range1::TiledRange1;

use std::fmt;

use crate::error::TiledError;
use crate::permutation::Permutation;
use crate::range::{Coord, Range};
use crate::strides::{
    Order, cartesian_to_linear, compute_strides_with_order, linear_to_cartesian_with_order,
};

/// Tiling of a multi-dimensional element space.
///
/// # Example
/// ```
/// use tiledtensors::{TiledRange, TiledRange1};
///
/// let tr = TiledRange::new(vec![
///     TiledRange1::new(vec![0, 2, 5]).unwrap(),
///     TiledRange1::new(vec![0, 3, 4]).unwrap(),
/// ]);
/// assert_eq!(tr.volume(), 4);
/// assert_eq!(tr.tile_of(&[3, 3]).unwrap().as_slice(), &[1, 1]);
/// assert_eq!(tr.ordinal(&[1, 1]).unwrap(), 3);
/// assert_eq!(tr.range_of(&[1, 0]).unwrap().upbound(), &[5, 3]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TiledRange {
    dims: Vec<TiledRange1>,
    order: Order,
    tile_extent: Coord,
    tile_strides: Vec<usize>,
}

impl TiledRange {
    /// Column-major tile ordinals.
    pub fn new(dims: Vec<TiledRange1>) -> Self {
        Self::with_order(dims, Order::ColumnMajor)
    }

    pub fn with_order(dims: Vec<TiledRange1>, order: Order) -> Self {
        let tile_extent: Coord = dims.iter().map(TiledRange1::tile_count).collect();
        let tile_strides = compute_strides_with_order(&tile_extent, order);
        Self {
            dims,
            order,
            tile_extent,
            tile_strides,
        }
    }

    /// Build from boundary lists, one per dimension.
    pub fn from_boundaries(boundaries: Vec<Vec<usize>>) -> Result<Self, TiledError> {
        let dims = boundaries
            .into_iter()
            .map(TiledRange1::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(dims))
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn order(&self) -> Order {
        self.order
    }

    #[inline]
    pub fn dims(&self) -> &[TiledRange1] {
        &self.dims
    }

    pub fn dim(&self, i: usize) -> Option<&TiledRange1> {
        self.dims.get(i)
    }

    /// Number of tiles along each dimension.
    #[inline]
    pub fn tile_extent(&self) -> &[usize] {
        &self.tile_extent
    }

    #[inline]
    pub(crate) fn tile_strides(&self) -> &[usize] {
        &self.tile_strides
    }

    /// Range of tile coordinates.
    pub fn tiles_range(&self) -> Range {
        Range::from_extent(&self.tile_extent)
    }

    /// Range of element coordinates.
    pub fn elements_range(&self) -> Range {
        let extent: Vec<usize> = self.dims.iter().map(TiledRange1::element_count).collect();
        Range::from_extent(&extent)
    }

    /// Number of tiles.
    pub fn volume(&self) -> usize {
        self.tile_extent.iter().product()
    }

    pub fn element_volume(&self) -> usize {
        self.dims.iter().map(TiledRange1::element_count).product()
    }

    fn check_rank(&self, index: &[usize]) -> Result<(), TiledError> {
        if index.len() != self.rank() {
            return Err(TiledError::DimensionMismatch {
                expected: vec![self.rank()],
                actual: vec![index.len()],
            });
        }
        Ok(())
    }

    /// Tile coordinate containing an element coordinate.
    pub fn tile_of(&self, element: &[usize]) -> Result<Coord, TiledError> {
        self.check_rank(element)?;
        let mut tile = Coord::with_capacity(self.rank());
        for (dim, &e) in self.dims.iter().zip(element.iter()) {
            match dim.element_to_tile(e) {
                Ok(t) => tile.push(t),
                Err(_) => {
                    return Err(TiledError::OutOfRange {
                        what: "element",
                        index: element.to_vec(),
                        bound: self.elements_range().upbound().to_vec(),
                    });
                }
            }
        }
        Ok(tile)
    }

    pub fn element_to_tile_ordinal(&self, element: &[usize]) -> Result<usize, TiledError> {
        let tile = self.tile_of(element)?;
        self.ordinal(&tile)
    }

    fn check_tile(&self, tile: &[usize]) -> Result<(), TiledError> {
        self.check_rank(tile)?;
        if tile.iter().zip(self.tile_extent.iter()).any(|(&t, &n)| t >= n) {
            return Err(TiledError::OutOfRange {
                what: "tile",
                index: tile.to_vec(),
                bound: self.tile_extent.to_vec(),
            });
        }
        Ok(())
    }

    /// Element range of a tile coordinate.
    pub fn range_of(&self, tile: &[usize]) -> Result<Range, TiledError> {
        self.check_tile(tile)?;
        let mut lo = Vec::with_capacity(self.rank());
        let mut up = Vec::with_capacity(self.rank());
        for (dim, &t) in self.dims.iter().zip(tile.iter()) {
            let r = dim.tile(t)?;
            lo.push(r.start);
            up.push(r.end);
        }
        Range::new(&lo, &up)
    }

    /// Element range of the tile with the given ordinal.
    pub fn tile_range(&self, ordinal: usize) -> Result<Range, TiledError> {
        let tile = self.tile_coord(ordinal)?;
        self.range_of(&tile)
    }

    /// Ordinal of a tile coordinate under this range's order.
    pub fn ordinal(&self, tile: &[usize]) -> Result<usize, TiledError> {
        self.check_tile(tile)?;
        Ok(cartesian_to_linear(tile, &self.tile_strides))
    }

    pub fn tile_coord(&self, ordinal: usize) -> Result<Coord, TiledError> {
        if ordinal >= self.volume() {
            return Err(TiledError::OutOfRange {
                what: "tile ordinal",
                index: vec![ordinal],
                bound: vec![self.volume()],
            });
        }
        Ok(linear_to_cartesian_with_order(ordinal, &self.tile_extent, self.order)
            .into_iter()
            .collect())
    }

    /// Ordinal of an element coordinate in the full element space.
    pub fn element_ordinal(&self, element: &[usize]) -> Result<usize, TiledError> {
        self.check_rank(element)?;
        let extent: Vec<usize> = self.dims.iter().map(TiledRange1::element_count).collect();
        if element.iter().zip(extent.iter()).any(|(&e, &n)| e >= n) {
            return Err(TiledError::OutOfRange {
                what: "element",
                index: element.to_vec(),
                bound: extent,
            });
        }
        let strides = compute_strides_with_order(&extent, self.order);
        Ok(cartesian_to_linear(element, &strides))
    }

    pub fn element_coord(&self, ordinal: usize) -> Result<Coord, TiledError> {
        let extent: Vec<usize> = self.dims.iter().map(TiledRange1::element_count).collect();
        if ordinal >= self.element_volume() {
            return Err(TiledError::OutOfRange {
                what: "element ordinal",
                index: vec![ordinal],
                bound: vec![self.element_volume()],
            });
        }
        Ok(linear_to_cartesian_with_order(ordinal, &extent, self.order)
            .into_iter()
            .collect())
    }

    /// `perm ^ self`: dimension `i` moves to position `perm[i]`.
    pub fn permute(&self, perm: &Permutation) -> Result<Self, TiledError> {
        Ok(Self::with_order(perm.apply(&self.dims)?, self.order))
    }
}

impl fmt::Display for TiledRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}", d.boundaries())?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TiledRange {
        TiledRange::from_boundaries(vec![vec![0, 2, 5], vec![0, 1, 3, 4], vec![0, 2]]).unwrap()
    }

    #[test]
    fn test_ordinal_roundtrip_both_orders() {
        for order in [Order::ColumnMajor, Order::RowMajor] {
            let tr = TiledRange::with_order(sample().dims().to_vec(), order);
            assert_eq!(tr.volume(), 6);
            for ord in 0..tr.volume() {
                let tile = tr.tile_coord(ord).unwrap();
                assert_eq!(tr.ordinal(&tile).unwrap(), ord);
            }
        }
    }

    #[test]
    fn test_row_major_ordering() {
        let tr = TiledRange::with_order(sample().dims().to_vec(), Order::RowMajor);
        assert_eq!(tr.ordinal(&[0, 1, 0]).unwrap(), 1);
        assert_eq!(tr.ordinal(&[1, 0, 0]).unwrap(), 3);
    }

    #[test]
    fn test_tile_of_every_element() {
        let tr = sample();
        let elements = tr.elements_range();
        for ord in 0..elements.volume() {
            let e = elements.index(ord).unwrap();
            let tile = tr.tile_of(&e).unwrap();
            assert!(tr.range_of(&tile).unwrap().includes(&e));
            let eo = tr.element_ordinal(&e).unwrap();
            assert_eq!(tr.element_coord(eo).unwrap(), e);
        }
    }

    #[test]
    fn test_errors() {
        let tr = sample();
        assert!(matches!(
            tr.tile_of(&[5, 0, 0]),
            Err(TiledError::OutOfRange { .. })
        ));
        assert!(matches!(
            tr.tile_of(&[0, 0]),
            Err(TiledError::DimensionMismatch { .. })
        ));
        assert!(tr.tile_coord(6).is_err());
        assert!(tr.range_of(&[0, 3, 0]).is_err());
    }

    #[test]
    fn test_permute() {
        let tr = sample();
        let p = Permutation::new(vec![2, 0, 1]).unwrap();
        let ptr = tr.permute(&p).unwrap();
        assert_eq!(ptr.dim(2), tr.dim(0));
        assert_eq!(ptr.dim(0), tr.dim(1));
        assert_eq!(ptr.dim(1), tr.dim(2));

        // tile t of the source lands at p(t) of the result with the permuted range
        for ord in 0..tr.volume() {
            let t = tr.tile_coord(ord).unwrap();
            let pt = p.apply(&t).unwrap();
            let expected = tr.range_of(&t).unwrap().permute(&p).unwrap();
            assert_eq!(ptr.range_of(&pt).unwrap(), expected);
        }

        let bad = Permutation::new(vec![1, 0]).unwrap();
        assert!(matches!(
            tr.permute(&bad),
            Err(TiledError::DimensionMismatch { .. })
        ));
    }
}
