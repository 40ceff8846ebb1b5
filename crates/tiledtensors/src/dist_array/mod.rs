//! Distributed tiled arrays.
//!
//! A [`DistArray`] couples a tiling ([`TiledRange`]), the sparsity of its
//! tiles ([`Shape`]) and a store of local tiles placed by a [`ProcessMap`].
//! Construction and the conversions are collective: every rank of the world
//! calls them in the same order with the same tiling and shape.

mod conversions;
mod permute;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::error::TiledError;
use crate::pmap::ProcessMap;
use crate::random::RandomUniform;
use crate::range::Range;
use crate::scalar::{Element, RealScalar, Scalar};
use crate::shape::{Shape, SparseShape};
use crate::store::{TileFuture, TileStore};
use crate::tensor::Tensor;
use crate::tile::Tile;
use crate::tiled_range::TiledRange;
use crate::world::World;

/// Tiled array whose tiles are spread over the ranks of a [`World`].
///
/// Cloning is shallow: clones share the tile store.
pub struct DistArray<T: Element> {
    world: World,
    trange: Arc<TiledRange>,
    shape: Arc<Shape>,
    pmap: Arc<dyn ProcessMap>,
    store: Arc<TileStore<T>>,
}

impl<T: Element> Clone for DistArray<T> {
    fn clone(&self) -> Self {
        Self {
            world: self.world.clone(),
            trange: Arc::clone(&self.trange),
            shape: Arc::clone(&self.shape),
            pmap: Arc::clone(&self.pmap),
            store: Arc::clone(&self.store),
        }
    }
}

impl<T: Element> fmt::Debug for DistArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistArray")
            .field("trange", &self.trange.to_string())
            .field("dense", &self.is_dense())
            .field("rank", &self.world.rank())
            .field("local_tiles", &self.store.len())
            .finish()
    }
}

impl<T: Element> DistArray<T> {
    /// Collective: array with no tiles set, placed by the world's default
    /// process map policy. `None` means dense.
    pub fn new(world: &World, trange: TiledRange, shape: Option<Shape>) -> Result<Self, TiledError> {
        let pmap = world
            .config()
            .pmap_policy
            .build(trange.volume(), world.rank(), world.size())?;
        Self::with_pmap(world, trange, shape.unwrap_or_default(), pmap)
    }

    /// Collective: array placed by `pmap`.
    ///
    /// # Errors
    ///
    /// - `InvalidConstruction` if `pmap` or a sparse `shape` does not cover
    ///   the tiling's volume.
    /// - `InconsistentShape` if ranks passed different shapes.
    pub fn with_pmap(
        world: &World,
        trange: TiledRange,
        shape: Shape,
        pmap: Arc<dyn ProcessMap>,
    ) -> Result<Self, TiledError> {
        Self::assemble(world, Arc::new(trange), Arc::new(shape), pmap)
    }

    /// Collective: sparse array whose non-zero tiles are `ordinals`.
    pub fn with_sparse_tiles(
        world: &World,
        trange: TiledRange,
        ordinals: &[usize],
    ) -> Result<Self, TiledError> {
        let shape = SparseShape::from_tile_list(trange.volume(), ordinals)?;
        Self::new(world, trange, Some(Shape::Sparse(shape)))
    }

    pub(crate) fn assemble(
        world: &World,
        trange: Arc<TiledRange>,
        shape: Arc<Shape>,
        pmap: Arc<dyn ProcessMap>,
    ) -> Result<Self, TiledError> {
        let volume = trange.volume();
        if pmap.size() != volume {
            return Err(TiledError::construction(format!(
                "process map covers {} tiles, tiling has {}",
                pmap.size(),
                volume
            )));
        }
        if let Some(v) = shape.volume().filter(|&v| v != volume) {
            return Err(TiledError::construction(format!(
                "shape covers {} tiles, tiling has {}",
                v, volume
            )));
        }
        shape.check_consistent(world)?;
        let store = TileStore::new(world, Arc::clone(&pmap))?;
        debug!(
            rank = world.rank(),
            tiles = volume,
            nonzero = shape.nonzero_count(volume),
            local = pmap.local_size(),
            "array constructed"
        );
        Ok(Self {
            world: world.clone(),
            trange,
            shape,
            pmap,
            store: Arc::new(store),
        })
    }

    #[inline]
    pub fn world(&self) -> &World {
        &self.world
    }

    #[inline]
    pub fn trange(&self) -> &TiledRange {
        &self.trange
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn pmap(&self) -> &Arc<dyn ProcessMap> {
        &self.pmap
    }

    #[inline]
    pub fn is_dense(&self) -> bool {
        self.shape.is_dense()
    }

    fn check_ordinal(&self, ordinal: usize) -> Result<(), TiledError> {
        if ordinal >= self.trange.volume() {
            return Err(TiledError::OutOfRange {
                what: "tile ordinal",
                index: vec![ordinal],
                bound: vec![self.trange.volume()],
            });
        }
        Ok(())
    }

    pub fn is_zero(&self, ordinal: usize) -> Result<bool, TiledError> {
        self.check_ordinal(ordinal)?;
        self.shape.is_zero(ordinal)
    }

    pub fn is_local(&self, ordinal: usize) -> bool {
        self.pmap.is_local(ordinal)
    }

    pub fn owner(&self, ordinal: usize) -> Result<usize, TiledError> {
        self.store.owner(ordinal)
    }

    /// Ordinals owned by this rank, zero tiles included.
    pub fn local_ordinals(&self) -> &[usize] {
        self.pmap.local_ordinals()
    }

    /// Non-zero ordinals owned by this rank.
    pub fn local_nonzero_ordinals(&self) -> Vec<usize> {
        self.pmap
            .local_ordinals()
            .iter()
            .copied()
            .filter(|&o| !self.shape.is_zero(o).unwrap_or(true))
            .collect()
    }

    /// Checks that `ordinal` may receive a tile on this rank.
    fn check_settable(&self, ordinal: usize) -> Result<(), TiledError> {
        self.check_ordinal(ordinal)?;
        if !self.is_local(ordinal) {
            return Err(TiledError::NotLocal {
                ordinal,
                owner: self.pmap.owner(ordinal),
                rank: self.world.rank(),
            });
        }
        if self.shape.is_zero(ordinal)? {
            return Err(TiledError::ZeroTile { ordinal });
        }
        Ok(())
    }

    fn check_tile_range(
        trange: &TiledRange,
        ordinal: usize,
        tile: &Tile<T>,
    ) -> Result<(), TiledError> {
        let expected = trange.tile_range(ordinal)?;
        let actual = tile.range()?;
        if *actual != expected {
            return Err(TiledError::DimensionMismatch {
                expected: expected.upbound().to_vec(),
                actual: actual.upbound().to_vec(),
            });
        }
        Ok(())
    }

    /// Stores a finished local tile.
    ///
    /// # Errors
    ///
    /// `OutOfRange`, `NotLocal`, `ZeroTile`, `AlreadySet`, `EmptyTile`, or
    /// `DimensionMismatch` if the tile's range is not the tile's element range.
    pub fn set(&self, ordinal: usize, tile: impl Into<Tile<T>>) -> Result<(), TiledError> {
        self.check_settable(ordinal)?;
        let tile = tile.into();
        Self::check_tile_range(&self.trange, ordinal, &tile)?;
        self.store.insert(ordinal, tile)
    }

    /// Stores the eventual output of `future`. Its range is checked when it
    /// resolves.
    pub fn set_future<F>(&self, ordinal: usize, future: F) -> Result<(), TiledError>
    where
        F: Future<Output = Result<Tile<T>, TiledError>> + Send + 'static,
    {
        self.check_settable(ordinal)?;
        let trange = Arc::clone(&self.trange);
        self.store.insert_future(ordinal, async move {
            let tile = future.await?;
            Self::check_tile_range(&trange, ordinal, &tile)?;
            Ok(tile)
        })
    }

    /// Runs `producer` on the task pool with the tile's element range.
    pub fn spawn_tile<F>(&self, ordinal: usize, producer: F) -> Result<(), TiledError>
    where
        F: FnOnce(Range) -> Result<Tensor<T>, TiledError> + Send + 'static,
    {
        let range = self.trange.tile_range(ordinal)?;
        self.set_future(ordinal, async move { producer(range).map(Tile::new) })
    }

    /// Produces every local non-zero tile with `producer`.
    pub fn init_tiles<F>(&self, producer: F) -> Result<(), TiledError>
    where
        F: Fn(Range) -> Tensor<T> + Send + Sync + 'static,
    {
        let producer = Arc::new(producer);
        for ordinal in self.local_nonzero_ordinals() {
            let producer = Arc::clone(&producer);
            self.spawn_tile(ordinal, move |range| Ok((*producer)(range)))?;
        }
        Ok(())
    }

    /// Future of a tile, wherever it lives.
    ///
    /// # Errors
    ///
    /// `OutOfRange`, or `ZeroTile` for a tile the shape marks as zero.
    pub fn find(&self, ordinal: usize) -> Result<TileFuture<T>, TiledError> {
        if self.is_zero(ordinal)? {
            return Err(TiledError::ZeroTile { ordinal });
        }
        self.store.get(ordinal)
    }

    /// Future of the tile containing a tile coordinate.
    pub fn find_coord(&self, tile: &[usize]) -> Result<TileFuture<T>, TiledError> {
        let ordinal = self.trange.ordinal(tile)?;
        self.find(ordinal)
    }

    /// Collective: waits for every local tile, then for every rank.
    pub fn fence(&self) -> Result<(), TiledError> {
        let local = self.store.wait_local();
        self.world.barrier()?;
        debug!(rank = self.world.rank(), ok = local.is_ok(), "fence");
        local
    }

    /// Collective: dense array with element values `f(global_index)`.
    pub fn from_fn<F>(world: &World, trange: TiledRange, f: F) -> Result<Self, TiledError>
    where
        F: Fn(&[usize]) -> T + Send + Sync + 'static,
    {
        let array = Self::new(world, trange, None)?;
        array.init_tiles(move |range| Tensor::from_fn(range, |i| f(i)))?;
        Ok(array)
    }
}

impl<T: RandomUniform> DistArray<T> {
    /// Fills local non-zero tiles with uniform random values. Each tile's
    /// generator is seeded from `seed` and its ordinal, so the result does
    /// not depend on the number of ranks.
    pub fn fill_random(&self, seed: u64) -> Result<(), TiledError> {
        for ordinal in self.local_nonzero_ordinals() {
            let tile_seed = seed ^ (ordinal as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            self.spawn_tile(ordinal, move |range| {
                let mut rng = StdRng::seed_from_u64(tile_seed);
                Ok(Tensor::random_with_rng(range, &mut rng))
            })?;
        }
        Ok(())
    }
}

impl<T: Scalar> DistArray<T> {
    /// Collective: sparse array with element values `f(global_index)`,
    /// keeping the tiles whose norm exceeds `threshold`.
    pub fn from_fn_sparse<F>(
        world: &World,
        trange: TiledRange,
        f: F,
        threshold: f32,
    ) -> Result<Self, TiledError>
    where
        F: Fn(&[usize]) -> T + Send + Sync + 'static,
    {
        let pmap = world
            .config()
            .pmap_policy
            .build(trange.volume(), world.rank(), world.size())?;
        let f = Arc::new(f);
        let handles = pmap
            .local_ordinals()
            .iter()
            .map(|&ordinal| {
                let range = trange.tile_range(ordinal)?;
                let f = Arc::clone(&f);
                Ok(world.execute(async move {
                    let tensor = Tensor::from_fn(range, |i| (*f)(i));
                    let norm = crate::operations::norm(&tensor).to_f32();
                    (ordinal, tensor, norm)
                }))
            })
            .collect::<Result<Vec<_>, TiledError>>()?;
        let tiles = handles
            .into_iter()
            .map(|h| h.wait())
            .collect::<Result<Vec<_>, _>>()?;

        let mut norms = vec![0.0f32; trange.volume()];
        for (ordinal, _, norm) in &tiles {
            norms[*ordinal] = *norm;
        }
        let shape = Shape::from_distributed_norms(world, &norms, threshold)?;
        let array = Self::assemble(world, Arc::new(trange), Arc::new(shape), pmap)?;
        for (ordinal, tensor, _) in tiles {
            if !array.is_zero(ordinal)? {
                array.store.insert(ordinal, Tile::new(tensor))?;
            }
        }
        Ok(array)
    }
}
