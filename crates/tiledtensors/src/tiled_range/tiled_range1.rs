//! Tiling of a single dimension.

use std::fmt;
use std::ops;

use crate::error::TiledError;

/// Tile boundaries of one dimension.
///
/// Tile `i` covers elements `[boundaries[i], boundaries[i + 1])`. Boundaries
/// start at zero and are strictly increasing, so every tile is non-empty.
///
/// # Example
/// ```
/// use tiledtensors::TiledRange1;
///
/// let tr = TiledRange1::new(vec![0, 2, 5, 7]).unwrap();
/// assert_eq!(tr.tile_count(), 3);
/// assert_eq!(tr.element_count(), 7);
/// assert_eq!(tr.tile(1).unwrap(), 2..5);
/// assert_eq!(tr.element_to_tile(4).unwrap(), 1);
/// assert_eq!(tr.element_to_tile(5).unwrap(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TiledRange1 {
    boundaries: Vec<usize>,
}

impl TiledRange1 {
    /// Create a tiling from its boundaries.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConstruction` for fewer than two boundaries, a first
    /// boundary other than zero, or boundaries that are not strictly increasing.
    pub fn new(boundaries: Vec<usize>) -> Result<Self, TiledError> {
        if boundaries.len() < 2 {
            return Err(TiledError::construction(format!(
                "a tiling needs at least two boundaries, got {:?}",
                boundaries
            )));
        }
        if boundaries[0] != 0 {
            return Err(TiledError::construction(format!(
                "tile boundaries must start at 0, got {:?}",
                boundaries
            )));
        }
        if boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(TiledError::construction(format!(
                "tile boundaries must be strictly increasing, got {:?}",
                boundaries
            )));
        }
        Ok(Self { boundaries })
    }

    /// Tiles of `tile_size` elements; the last one may be shorter.
    pub fn uniform(elements: usize, tile_size: usize) -> Result<Self, TiledError> {
        if tile_size == 0 {
            return Err(TiledError::construction("tile size must be positive"));
        }
        let mut boundaries: Vec<usize> = (0..elements).step_by(tile_size).collect();
        boundaries.push(elements);
        Self::new(boundaries)
    }

    #[inline]
    pub fn tile_count(&self) -> usize {
        self.boundaries.len() - 1
    }

    #[inline]
    pub fn element_count(&self) -> usize {
        self.boundaries[self.boundaries.len() - 1]
    }

    #[inline]
    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    /// Element interval covered by tile `i`.
    pub fn tile(&self, i: usize) -> Result<ops::Range<usize>, TiledError> {
        if i >= self.tile_count() {
            return Err(TiledError::OutOfRange {
                what: "tile",
                index: vec![i],
                bound: vec![self.tile_count()],
            });
        }
        Ok(self.boundaries[i]..self.boundaries[i + 1])
    }

    pub fn tile_extent(&self, i: usize) -> Result<usize, TiledError> {
        self.tile(i).map(|r| r.len())
    }

    /// Tile containing element `e`.
    pub fn element_to_tile(&self, e: usize) -> Result<usize, TiledError> {
        if e >= self.element_count() {
            return Err(TiledError::OutOfRange {
                what: "element",
                index: vec![e],
                bound: vec![self.element_count()],
            });
        }
        // An element equal to a boundary starts the next tile.
        let tile = match self.boundaries[1..].binary_search(&e) {
            Ok(i) => i + 1,
            Err(i) => i,
        };
        Ok(tile)
    }

    pub fn iter(&self) -> impl Iterator<Item = ops::Range<usize>> + '_ {
        self.boundaries.windows(2).map(|w| w[0]..w[1])
    }
}

impl fmt::Display for TiledRange1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TiledRange1({:?})", self.boundaries)
    }
}
