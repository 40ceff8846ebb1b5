use std::sync::Arc;

use tracing::debug;

use super::DistArray;
use crate::error::TiledError;
use crate::permutation::Permutation;
use crate::scalar::Element;

impl<T: Element> DistArray<T> {
    /// Collective: `perm ^ self`.
    ///
    /// Dimension `i` of the result is dimension `perm^-1[i]` of `self`. Each
    /// result tile is produced on its owner from the corresponding source
    /// tile, which is fetched from its own owner when it lives elsewhere.
    pub fn permute(&self, perm: &Permutation) -> Result<DistArray<T>, TiledError> {
        let trange = self.trange.permute(perm)?;
        let shape = self.shape.permute(
            perm,
            &self.trange,
            &trange,
            self.world.config().shape_batch_blocks,
        )?;
        let result = DistArray::assemble(
            &self.world,
            Arc::new(trange),
            Arc::new(shape),
            Arc::clone(&self.pmap),
        )?;

        let mut remote = 0usize;
        for ordinal in result.local_nonzero_ordinals() {
            let coord = result.trange.tile_coord(ordinal)?;
            let source = self.trange.ordinal(&perm.apply_inverse(&coord)?)?;
            if !self.is_local(source) {
                remote += 1;
            }
            let tile = self.find(source)?;
            let perm = perm.clone();
            result.set_future(ordinal, async move { tile.await?.permute(&perm) })?;
        }
        debug!(rank = self.world.rank(), %perm, remote, "permute scheduled");
        Ok(result)
    }
}
