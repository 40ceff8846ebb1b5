//! Which tiles of an array are structurally zero.
//!
//! A [`Shape`] is either dense (every tile present) or sparse. A sparse
//! shape records, per tile ordinal, whether the tile is non-zero and the
//! magnitude it was kept with. Zero tiles are never stored or produced.
//! Every rank must hold an identical copy of an array's shape.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bitset::{BLOCK_BITS, Bitset};
use crate::error::TiledError;
use crate::hash::fnv1a_bytes;
use crate::permutation::Permutation;
use crate::strides::linear_to_cartesian_with_order;
use crate::tiled_range::TiledRange;
use crate::world::World;

/// Tile-level sparsity of an array.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    #[default]
    Dense,
    Sparse(SparseShape),
}

/// Non-zero tiles with their magnitudes.
///
/// A tile is non-zero when its magnitude exceeds the threshold.
///
/// # Example
///
/// ```
/// use tiledtensors::SparseShape;
///
/// let shape = SparseShape::from_norms(&[3.0, 0.0, 1e-3], 1e-2);
/// assert!(!shape.is_zero(0).unwrap());
/// assert!(shape.is_zero(1).unwrap());
/// assert!(shape.is_zero(2).unwrap());
/// assert_eq!(shape.nonzero_count(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SparseShape {
    nonzero: Bitset,
    magnitudes: BTreeMap<usize, f32>,
    threshold: f32,
}

impl SparseShape {
    /// Default zero threshold for tile norms.
    pub const DEFAULT_THRESHOLD: f32 = f32::EPSILON;

    /// Shape keeping every tile whose norm exceeds `threshold`.
    pub fn from_norms(norms: &[f32], threshold: f32) -> Self {
        let mut nonzero = Bitset::new(norms.len());
        let mut magnitudes = BTreeMap::new();
        for (ordinal, &norm) in norms.iter().enumerate() {
            if norm > threshold {
                nonzero.set(ordinal, true);
                magnitudes.insert(ordinal, norm);
            }
        }
        Self {
            nonzero,
            magnitudes,
            threshold,
        }
    }

    /// Shape with exactly the listed tiles non-zero, at unbounded magnitude.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if an ordinal is not below `volume`.
    pub fn from_tile_list(volume: usize, ordinals: &[usize]) -> Result<Self, TiledError> {
        let mut nonzero = Bitset::new(volume);
        let mut magnitudes = BTreeMap::new();
        for &ordinal in ordinals {
            if ordinal >= volume {
                return Err(TiledError::OutOfRange {
                    what: "tile ordinal",
                    index: vec![ordinal],
                    bound: vec![volume],
                });
            }
            nonzero.set(ordinal, true);
            magnitudes.insert(ordinal, f32::INFINITY);
        }
        Ok(Self {
            nonzero,
            magnitudes,
            threshold: Self::DEFAULT_THRESHOLD,
        })
    }

    /// Each tile non-zero with probability `fill`, drawn from `rng`.
    pub fn random<R: rand::Rng>(volume: usize, fill: f64, rng: &mut R) -> Self {
        let fill = fill.clamp(0.0, 1.0);
        let mut nonzero = Bitset::new(volume);
        let mut magnitudes = BTreeMap::new();
        for o in 0..volume {
            if rng.random_bool(fill) {
                nonzero.set(o, true);
                magnitudes.insert(o, f32::INFINITY);
            }
        }
        Self {
            nonzero,
            magnitudes,
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }

    /// Number of tiles covered.
    #[inline]
    pub fn volume(&self) -> usize {
        self.nonzero.len()
    }

    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    fn check_ordinal(&self, ordinal: usize) -> Result<(), TiledError> {
        if ordinal >= self.volume() {
            return Err(TiledError::OutOfRange {
                what: "tile ordinal",
                index: vec![ordinal],
                bound: vec![self.volume()],
            });
        }
        Ok(())
    }

    pub fn is_zero(&self, ordinal: usize) -> Result<bool, TiledError> {
        self.check_ordinal(ordinal)?;
        Ok(!self.nonzero.get(ordinal))
    }

    /// Magnitude of a tile; zero tiles report `0.0`.
    pub fn magnitude(&self, ordinal: usize) -> Result<f32, TiledError> {
        self.check_ordinal(ordinal)?;
        Ok(self.magnitudes.get(&ordinal).copied().unwrap_or(0.0))
    }

    pub fn nonzero_count(&self) -> usize {
        self.magnitudes.len()
    }

    /// Non-zero ordinals, increasing.
    pub fn nonzero_ordinals(&self) -> impl Iterator<Item = usize> + '_ {
        self.nonzero.iter_ones()
    }

    /// Fraction of tiles that are zero.
    pub fn sparsity(&self) -> f64 {
        if self.volume() == 0 {
            return 0.0;
        }
        1.0 - self.nonzero_count() as f64 / self.volume() as f64
    }

    /// Drops every tile whose magnitude does not exceed `threshold`.
    pub fn truncate(&self, threshold: f32) -> Self {
        let mut nonzero = Bitset::new(self.volume());
        let magnitudes: BTreeMap<usize, f32> = self
            .magnitudes
            .iter()
            .filter(|(_, m)| **m > threshold)
            .map(|(&o, &m)| (o, m))
            .collect();
        for &o in magnitudes.keys() {
            nonzero.set(o, true);
        }
        Self {
            nonzero,
            magnitudes,
            threshold,
        }
    }

    /// Shape of the permuted array: tile `t` of `from` becomes tile
    /// `perm ^ t` of `to`.
    ///
    /// Bitset blocks are scanned in parallel batches of `batch_blocks`; the
    /// partial results are merged in block order.
    pub fn permute(
        &self,
        perm: &Permutation,
        from: &TiledRange,
        to: &TiledRange,
        batch_blocks: usize,
    ) -> Result<Self, TiledError> {
        perm.check_rank(from.rank())?;
        if from.volume() != self.volume() || to.volume() != self.volume() {
            return Err(TiledError::DimensionMismatch {
                expected: vec![self.volume()],
                actual: vec![from.volume(), to.volume()],
            });
        }
        let expected = perm.apply(from.tile_extent())?;
        if expected.as_slice() != to.tile_extent() {
            return Err(TiledError::DimensionMismatch {
                expected,
                actual: to.tile_extent().to_vec(),
            });
        }

        // source dimension d contributes along result dimension perm[d]
        let weights: Vec<usize> = perm
            .as_slice()
            .iter()
            .map(|&pd| to.tile_strides()[pd])
            .collect();
        let extent = from.tile_extent();
        let order = from.order();
        let target = |o: usize| -> usize {
            linear_to_cartesian_with_order(o, extent, order)
                .iter()
                .zip(&weights)
                .map(|(c, w)| c * w)
                .sum()
        };

        let blocks: Vec<usize> = (0..self.nonzero.num_blocks()).collect();
        let batches: Vec<Vec<(usize, f32)>> = blocks
            .par_chunks(batch_blocks.max(1))
            .map(|batch| {
                let mut moved = Vec::with_capacity(batch.len() * BLOCK_BITS);
                for &b in batch {
                    for o in self.nonzero.block_ones(b) {
                        moved.push((target(o), self.magnitudes.get(&o).copied().unwrap_or(0.0)));
                    }
                }
                moved
            })
            .collect();

        let mut nonzero = Bitset::new(self.volume());
        let mut magnitudes = BTreeMap::new();
        for (o, m) in batches.into_iter().flatten() {
            nonzero.set(o, true);
            magnitudes.insert(o, m);
        }
        Ok(Self {
            nonzero,
            magnitudes,
            threshold: self.threshold,
        })
    }
}

impl Shape {
    #[inline]
    pub fn is_dense(&self) -> bool {
        matches!(self, Shape::Dense)
    }

    pub fn as_sparse(&self) -> Option<&SparseShape> {
        match self {
            Shape::Dense => None,
            Shape::Sparse(s) => Some(s),
        }
    }

    /// Dense shapes have no zero tiles.
    pub fn is_zero(&self, ordinal: usize) -> Result<bool, TiledError> {
        match self {
            Shape::Dense => Ok(false),
            Shape::Sparse(s) => s.is_zero(ordinal),
        }
    }

    /// Number of non-zero tiles out of `volume`.
    pub fn nonzero_count(&self, volume: usize) -> usize {
        match self {
            Shape::Dense => volume,
            Shape::Sparse(s) => s.nonzero_count(),
        }
    }

    /// Fraction of zero tiles.
    pub fn sparsity(&self) -> f64 {
        self.as_sparse().map_or(0.0, SparseShape::sparsity)
    }

    /// Dense shapes carry no magnitudes and are returned unchanged.
    pub fn truncate(&self, threshold: f32) -> Self {
        match self {
            Shape::Dense => Shape::Dense,
            Shape::Sparse(s) => Shape::Sparse(s.truncate(threshold)),
        }
    }

    /// Tiles covered by a sparse shape; `None` when dense.
    pub fn volume(&self) -> Option<usize> {
        self.as_sparse().map(SparseShape::volume)
    }

    pub fn permute(
        &self,
        perm: &Permutation,
        from: &TiledRange,
        to: &TiledRange,
        batch_blocks: usize,
    ) -> Result<Self, TiledError> {
        match self {
            Shape::Dense => {
                perm.check_rank(from.rank())?;
                Ok(Shape::Dense)
            }
            Shape::Sparse(s) => Ok(Shape::Sparse(s.permute(perm, from, to, batch_blocks)?)),
        }
    }

    /// Collective: the shape of `root`, on every rank.
    pub fn synchronize(&self, world: &World, root: usize) -> Result<Self, TiledError> {
        debug!(rank = world.rank(), root, "broadcasting shape");
        world.broadcast_serializable(root, self)
    }

    fn fingerprint(&self) -> Result<u64, TiledError> {
        Ok(fnv1a_bytes(&bincode::serialize(self)?))
    }

    /// Collective: fails on every rank if any rank holds a different shape.
    ///
    /// # Errors
    ///
    /// Returns `InconsistentShape` naming the first rank that disagrees with
    /// rank 0.
    pub fn check_consistent(&self, world: &World) -> Result<(), TiledError> {
        let prints = world.all_gather_serializable(&self.fingerprint()?)?;
        match prints.iter().position(|p| *p != prints[0]) {
            Some(rank) => Err(TiledError::InconsistentShape { rank }),
            None => Ok(()),
        }
    }

    /// Collective: sparse shape from norms each rank computed for the tiles
    /// it owns. Entries for tiles owned elsewhere must be zero.
    pub fn from_distributed_norms(
        world: &World,
        local_norms: &[f32],
        threshold: f32,
    ) -> Result<Self, TiledError> {
        let norms = world.all_reduce_sum(local_norms)?;
        let shape = SparseShape::from_norms(&norms, threshold);
        debug!(
            rank = world.rank(),
            nonzero = shape.nonzero_count(),
            volume = shape.volume(),
            "sparse shape reduced"
        );
        Ok(Shape::Sparse(shape))
    }
}

impl From<SparseShape> for Shape {
    fn from(shape: SparseShape) -> Self {
        Shape::Sparse(shape)
    }
}
