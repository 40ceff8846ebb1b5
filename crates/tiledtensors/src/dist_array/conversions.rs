//! Conversions between array shapes, tile types and process maps.

use std::sync::Arc;

use tracing::{debug, info};

use super::DistArray;
use crate::error::TiledError;
use crate::pmap::ProcessMap;
use crate::scalar::{Element, RealScalar, Scalar};
use crate::shape::Shape;
use crate::tensor::Tensor;
use crate::tile::Tile;

impl<T: Element> DistArray<T> {
    /// Collective: dense copy; zero tiles become zero blocks.
    pub fn to_dense(&self) -> Result<DistArray<T>, TiledError> {
        let result = DistArray::assemble(
            &self.world,
            Arc::clone(&self.trange),
            Arc::new(Shape::Dense),
            Arc::clone(&self.pmap),
        )?;
        for &ordinal in result.local_ordinals() {
            if self.is_zero(ordinal)? {
                result.set(ordinal, Tensor::zeros(result.trange.tile_range(ordinal)?))?;
            } else {
                let tile = self.find(ordinal)?;
                result.set_future(ordinal, tile)?;
            }
        }
        Ok(result)
    }

    /// Collective: tile-by-tile element conversion. The shape is kept.
    pub fn to_new_tile_type<U, F>(&self, convert: F) -> Result<DistArray<U>, TiledError>
    where
        U: Element,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let convert = Arc::new(convert);
        self.map_tiles(move |tile| Ok(tile.map(|x| (*convert)(x))))
    }

    /// Collective: applies `convert` to every tile. The shape is kept.
    pub fn map_tiles<U, F>(&self, convert: F) -> Result<DistArray<U>, TiledError>
    where
        U: Element,
        F: Fn(Tile<T>) -> Result<Tile<U>, TiledError> + Send + Sync + 'static,
    {
        let result = DistArray::assemble(
            &self.world,
            Arc::clone(&self.trange),
            Arc::clone(&self.shape),
            Arc::clone(&self.pmap),
        )?;
        let convert = Arc::new(convert);
        for ordinal in result.local_nonzero_ordinals() {
            let source = self.find(ordinal)?;
            let convert = Arc::clone(&convert);
            result.set_future(ordinal, async move { (*convert)(source.await?) })?;
        }
        Ok(result)
    }

    /// Collective: same tiles placed by `pmap`.
    pub fn redistribute(&self, pmap: Arc<dyn ProcessMap>) -> Result<DistArray<T>, TiledError> {
        let result = DistArray::assemble(
            &self.world,
            Arc::clone(&self.trange),
            Arc::clone(&self.shape),
            pmap,
        )?;
        let mut moved = 0usize;
        for ordinal in result.local_nonzero_ordinals() {
            if !self.is_local(ordinal) {
                moved += 1;
            }
            result.set_future(ordinal, self.find(ordinal)?)?;
        }
        info!(rank = self.world.rank(), moved, "redistributed");
        Ok(result)
    }
}

impl<T: Scalar> DistArray<T> {
    /// Collective: sparse copy keeping tiles whose norm exceeds `threshold`.
    ///
    /// Tile norms are computed by their owners and all-reduced into the new
    /// shape. Kept tiles share their blocks with `self`.
    pub fn to_sparse(&self, threshold: f32) -> Result<DistArray<T>, TiledError> {
        self.truncate(threshold)
    }

    /// Collective: like [`to_sparse`](Self::to_sparse) for any input shape.
    pub fn truncate(&self, threshold: f32) -> Result<DistArray<T>, TiledError> {
        let handles: Vec<_> = self
            .local_nonzero_ordinals()
            .into_iter()
            .map(|ordinal| {
                let tile = self.find(ordinal)?;
                Ok(self.world.execute(async move {
                    let tile = tile.await?;
                    let norm = tile.norm()?.to_f32();
                    Ok::<_, TiledError>((ordinal, tile, norm))
                }))
            })
            .collect::<Result<_, TiledError>>()?;

        // every rank must reach the all-reduce, so local failures are held back
        let mut norms = vec![0.0f32; self.trange.volume()];
        let mut tiles = Vec::with_capacity(handles.len());
        let mut failure = None;
        for handle in handles {
            match handle.wait().and_then(|r| r) {
                Ok((ordinal, tile, norm)) => {
                    norms[ordinal] = norm;
                    tiles.push((ordinal, tile));
                }
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        let shape = Shape::from_distributed_norms(&self.world, &norms, threshold)?;
        let result = DistArray::assemble(
            &self.world,
            Arc::clone(&self.trange),
            Arc::new(shape),
            Arc::clone(&self.pmap),
        )?;
        if let Some(e) = failure {
            return Err(e);
        }
        let before = tiles.len();
        let mut kept = 0usize;
        for (ordinal, tile) in tiles {
            if !result.is_zero(ordinal)? {
                result.store.insert(ordinal, tile)?;
                kept += 1;
            }
        }
        debug!(rank = self.world.rank(), before, kept, threshold, "truncated");
        Ok(result)
    }
}
