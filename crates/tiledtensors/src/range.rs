//! Element-space boxes.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::TiledError;
use crate::permutation::Permutation;
use crate::strides::{cartesian_to_linear, compute_strides};

/// Coordinate storage for ranges and indices.
pub type Coord = SmallVec<[usize; 4]>;

/// A half-open box `[lobound, upbound)` in element space.
///
/// Elements inside a range are linearized column-major relative to `lobound`.
///
/// # Example
/// ```
/// use tiledtensors::Range;
///
/// let r = Range::new(&[2, 0], &[5, 4]).unwrap();
/// assert_eq!(r.extent().as_slice(), &[3, 4]);
/// assert_eq!(r.volume(), 12);
/// assert_eq!(r.ordinal(&[3, 0]), Some(1));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct Range {
    lobound: Coord,
    upbound: Coord,
}

#[derive(Deserialize)]
struct RawRange {
    lobound: Coord,
    upbound: Coord,
}

impl TryFrom<RawRange> for Range {
    type Error = TiledError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        Range::new(&raw.lobound, &raw.upbound)
    }
}

impl Range {
    /// Create a range from lower and upper bounds.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the bounds have different ranks and
    /// `InvalidConstruction` if any lower bound exceeds its upper bound.
    pub fn new(lobound: &[usize], upbound: &[usize]) -> Result<Self, TiledError> {
        if lobound.len() != upbound.len() {
            return Err(TiledError::DimensionMismatch {
                expected: vec![lobound.len()],
                actual: vec![upbound.len()],
            });
        }
        if let Some(d) = (0..lobound.len()).find(|&d| lobound[d] > upbound[d]) {
            return Err(TiledError::construction(format!(
                "range lower bound {} exceeds upper bound {} in dimension {}",
                lobound[d], upbound[d], d
            )));
        }
        Ok(Self {
            lobound: lobound.iter().copied().collect(),
            upbound: upbound.iter().copied().collect(),
        })
    }

    /// A range anchored at the origin.
    pub fn from_extent(extent: &[usize]) -> Self {
        Self {
            lobound: SmallVec::from_elem(0, extent.len()),
            upbound: extent.iter().copied().collect(),
        }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.lobound.len()
    }

    #[inline]
    pub fn lobound(&self) -> &[usize] {
        &self.lobound
    }

    #[inline]
    pub fn upbound(&self) -> &[usize] {
        &self.upbound
    }

    pub fn extent(&self) -> Coord {
        self.lobound
            .iter()
            .zip(self.upbound.iter())
            .map(|(&lo, &up)| up - lo)
            .collect()
    }

    /// Number of elements; a rank-0 range holds one element.
    pub fn volume(&self) -> usize {
        self.extent().iter().product()
    }

    pub fn includes(&self, index: &[usize]) -> bool {
        index.len() == self.rank()
            && index
                .iter()
                .zip(self.lobound.iter().zip(self.upbound.iter()))
                .all(|(&i, (&lo, &up))| lo <= i && i < up)
    }

    /// Column-major offset of a global index, or `None` if outside.
    pub fn ordinal(&self, index: &[usize]) -> Option<usize> {
        if !self.includes(index) {
            return None;
        }
        let strides = compute_strides(&self.extent());
        let local: Coord = index
            .iter()
            .zip(self.lobound.iter())
            .map(|(&i, &lo)| i - lo)
            .collect();
        Some(cartesian_to_linear(&local, &strides))
    }

    /// Global index of a column-major offset.
    pub fn index(&self, mut ordinal: usize) -> Option<Coord> {
        if ordinal >= self.volume() {
            return None;
        }
        let mut out = Coord::with_capacity(self.rank());
        for (&lo, &up) in self.lobound.iter().zip(self.upbound.iter()) {
            let dim = up - lo;
            out.push(lo + ordinal % dim);
            ordinal /= dim;
        }
        Some(out)
    }

    /// Reorder dimensions: dimension `i` moves to position `perm[i]`.
    pub fn permute(&self, perm: &Permutation) -> Result<Self, TiledError> {
        Ok(Self {
            lobound: perm.apply(&self.lobound)?.into_iter().collect(),
            upbound: perm.apply(&self.upbound)?.into_iter().collect(),
        })
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}, {:?})", self.lobound.as_slice(), self.upbound.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_bounds() {
        assert!(matches!(
            Range::new(&[3], &[2]),
            Err(TiledError::InvalidConstruction { .. })
        ));
        assert!(matches!(
            Range::new(&[0, 0], &[2]),
            Err(TiledError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_ordinal_index_roundtrip() {
        let r = Range::new(&[1, 2, 0], &[3, 5, 2]).unwrap();
        assert_eq!(r.volume(), 12);
        for ord in 0..r.volume() {
            let idx = r.index(ord).unwrap();
            assert!(r.includes(&idx));
            assert_eq!(r.ordinal(&idx), Some(ord));
        }
        assert_eq!(r.index(12), None);
        assert_eq!(r.ordinal(&[0, 2, 0]), None);
    }

    #[test]
    fn test_permute() {
        let r = Range::new(&[0, 2, 4], &[1, 3, 5]).unwrap();
        let p = Permutation::new(vec![2, 0, 1]).unwrap();
        let q = r.permute(&p).unwrap();
        assert_eq!(q.lobound(), &[2, 4, 0]);
        assert_eq!(q.upbound(), &[3, 5, 1]);
    }

    #[test]
    fn test_scalar_range() {
        let r = Range::from_extent(&[]);
        assert_eq!(r.volume(), 1);
        assert_eq!(r.ordinal(&[]), Some(0));
        assert_eq!(format!("{}", r), "[[], [])");
    }
}
