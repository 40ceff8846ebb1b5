//! Distributed container of tiles.
//!
//! Each rank holds a shard with the tiles its process map assigns to it. A
//! slot is created either by the producer (`insert`) or by a consumer that
//! asks for a tile before it exists (`get`); both sides meet on the same
//! [`TileFuture`]. Remote reads fetch from the owner's shard and travel
//! through the tile wire format.

mod future;

pub use future::TileFuture;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::TiledError;
use crate::pmap::ProcessMap;
use crate::scalar::Element;
use crate::tile::Tile;
use crate::world::World;
use self::future::TileSender;

struct Slot<T: Element> {
    future: TileFuture<T>,
    /// Present until a producer claims the slot.
    sender: Option<TileSender<T>>,
}

impl<T: Element> Slot<T> {
    fn pending(ordinal: usize) -> Self {
        let (tx, future) = TileFuture::channel(ordinal);
        Self {
            future,
            sender: Some(tx),
        }
    }

    fn is_set(&self) -> bool {
        self.sender.is_none()
    }
}

/// One rank's tiles.
pub(crate) struct StoreShard<T: Element> {
    rank: usize,
    slots: Mutex<HashMap<usize, Slot<T>>>,
    /// Set when the owning rank dropped its handle. Read under `slots`.
    released: AtomicBool,
}

impl<T: Element> StoreShard<T> {
    fn new(rank: usize) -> Self {
        Self {
            rank,
            slots: Mutex::new(HashMap::new()),
            released: AtomicBool::new(false),
        }
    }

    /// Future of a local slot, creating a pending slot if needed.
    ///
    /// A released shard no longer gets producers, so a request for a tile
    /// it never held resolves to `Abandoned`.
    fn future(&self, ordinal: usize) -> TileFuture<T> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(&ordinal) {
            return slot.future.clone();
        }
        if self.released.load(Ordering::Acquire) {
            return TileFuture::ready(Err(TiledError::Abandoned { ordinal }));
        }
        slots
            .entry(ordinal)
            .or_insert_with(|| Slot::pending(ordinal))
            .future
            .clone()
    }

    /// Stops accepting requests and abandons unproduced slots. Produced
    /// tiles stay readable by other ranks. Returns the number abandoned.
    fn release(&self) -> usize {
        let mut slots = self.slots.lock();
        self.released.store(true, Ordering::Release);
        let before = slots.len();
        slots.retain(|_, slot| slot.is_set());
        before - slots.len()
    }

    /// Takes the producer side of a slot.
    fn claim(&self, ordinal: usize) -> Result<TileSender<T>, TiledError> {
        let mut slots = self.slots.lock();
        let slot = slots.entry(ordinal).or_insert_with(|| Slot::pending(ordinal));
        slot.sender.take().ok_or(TiledError::AlreadySet { ordinal })
    }
}

/// Tiles of one distributed object, indexed by ordinal.
///
/// Construction is collective. Dropping the store abandons every slot that
/// was requested but never produced; the rank's produced tiles are freed
/// once all ranks have dropped their handles.
pub struct TileStore<T: Element> {
    id: u64,
    world: World,
    pmap: Arc<dyn ProcessMap>,
    shard: Arc<StoreShard<T>>,
}

impl<T: Element> fmt::Debug for TileStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileStore")
            .field("id", &self.id)
            .field("rank", &self.shard.rank)
            .field("tiles", &self.pmap.size())
            .field("slots", &self.len())
            .finish()
    }
}

impl<T: Element> TileStore<T> {
    /// Collective: registers this rank's shard and waits for every rank.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConstruction` if `pmap` was not built for this world.
    pub fn new(world: &World, pmap: Arc<dyn ProcessMap>) -> Result<Self, TiledError> {
        if pmap.rank() != world.rank() || pmap.procs() != world.size() {
            return Err(TiledError::construction(format!(
                "process map for rank {} of {} used on rank {} of {}",
                pmap.rank(),
                pmap.procs(),
                world.rank(),
                world.size()
            )));
        }
        let id = world.next_object_id();
        let shard = Arc::new(StoreShard::new(world.rank()));
        world
            .registry()
            .insert(id, world.rank(), Arc::clone(&shard));
        world.barrier()?;
        debug!(id, rank = world.rank(), tiles = pmap.size(), "tile store created");
        Ok(Self {
            id,
            world: world.clone(),
            pmap,
            shard,
        })
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn world(&self) -> &World {
        &self.world
    }

    #[inline]
    pub fn pmap(&self) -> &Arc<dyn ProcessMap> {
        &self.pmap
    }

    pub fn owner(&self, ordinal: usize) -> Result<usize, TiledError> {
        self.check_ordinal(ordinal)?;
        Ok(self.pmap.owner(ordinal))
    }

    pub fn is_local(&self, ordinal: usize) -> bool {
        self.pmap.is_local(ordinal)
    }

    fn check_ordinal(&self, ordinal: usize) -> Result<(), TiledError> {
        if ordinal >= self.pmap.size() {
            return Err(TiledError::OutOfRange {
                what: "tile ordinal",
                index: vec![ordinal],
                bound: vec![self.pmap.size()],
            });
        }
        Ok(())
    }

    fn check_local(&self, ordinal: usize) -> Result<(), TiledError> {
        self.check_ordinal(ordinal)?;
        let owner = self.pmap.owner(ordinal);
        if owner != self.world.rank() {
            return Err(TiledError::NotLocal {
                ordinal,
                owner,
                rank: self.world.rank(),
            });
        }
        Ok(())
    }

    /// Stores a finished tile.
    ///
    /// # Errors
    ///
    /// `OutOfRange`, `NotLocal`, or `AlreadySet` if the slot has a producer.
    pub fn insert(&self, ordinal: usize, tile: Tile<T>) -> Result<(), TiledError> {
        self.check_local(ordinal)?;
        let sender = self.shard.claim(ordinal)?;
        trace!(id = self.id, ordinal, "tile inserted");
        // a closed receiver means the slot was erased meanwhile
        let _ = sender.send(Ok(tile));
        Ok(())
    }

    /// Stores the eventual output of `future`, which runs on the task pool.
    pub fn insert_future<F>(&self, ordinal: usize, future: F) -> Result<(), TiledError>
    where
        F: Future<Output = Result<Tile<T>, TiledError>> + Send + 'static,
    {
        self.check_local(ordinal)?;
        let sender = self.shard.claim(ordinal)?;
        trace!(id = self.id, ordinal, "tile task spawned");
        self.world.spawn(async move {
            let _ = sender.send(future.await);
        });
        Ok(())
    }

    /// Future of a tile, local or remote.
    ///
    /// A local tile that has not been inserted yet resolves once it is. A
    /// remote tile is fetched from its owner's shard.
    pub fn get(&self, ordinal: usize) -> Result<TileFuture<T>, TiledError> {
        self.check_ordinal(ordinal)?;
        let owner = self.pmap.owner(ordinal);
        if owner == self.world.rank() {
            return Ok(self.shard.future(ordinal));
        }
        let Some(shard) = self.world.registry().get::<StoreShard<T>>(self.id, owner) else {
            return Err(TiledError::runtime(format!(
                "store {} has no shard on rank {}",
                self.id, owner
            )));
        };
        debug!(id = self.id, ordinal, owner, rank = self.world.rank(), "remote tile fetch");
        let remote = shard.future(ordinal);
        Ok(TileFuture::from_future(async move {
            let tile = remote.await?;
            let bytes = tile.to_bytes()?;
            trace!(ordinal, bytes = bytes.len(), "tile received");
            Tile::from_bytes(&bytes)
        }))
    }

    /// Removes a local slot. Consumers still waiting on an unproduced slot
    /// see `Abandoned`.
    pub fn erase(&self, ordinal: usize) -> Result<bool, TiledError> {
        self.check_local(ordinal)?;
        Ok(self.shard.slots.lock().remove(&ordinal).is_some())
    }

    /// Gives up on a requested local tile that has no producer.
    ///
    /// Returns `false` if the slot does not exist or is already set.
    pub fn abandon(&self, ordinal: usize) -> Result<bool, TiledError> {
        self.check_local(ordinal)?;
        let mut slots = self.shard.slots.lock();
        match slots.get(&ordinal) {
            Some(slot) if !slot.is_set() => {
                slots.remove(&ordinal);
                warn!(id = self.id, ordinal, "tile abandoned");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// `true` if a local tile has a producer.
    pub fn is_set(&self, ordinal: usize) -> Result<bool, TiledError> {
        self.check_local(ordinal)?;
        Ok(self
            .shard
            .slots
            .lock()
            .get(&ordinal)
            .is_some_and(Slot::is_set))
    }

    /// `true` if a local tile's value is available.
    pub fn is_ready(&self, ordinal: usize) -> Result<bool, TiledError> {
        self.check_local(ordinal)?;
        let future = self
            .shard
            .slots
            .lock()
            .get(&ordinal)
            .filter(|slot| slot.is_set())
            .map(|slot| slot.future.clone());
        Ok(future.is_some_and(|f| f.is_ready()))
    }

    /// Number of local slots, produced or pending.
    pub fn len(&self) -> usize {
        self.shard.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks until every produced local tile is available.
    ///
    /// # Errors
    ///
    /// Returns the first producer error, in ordinal order.
    pub fn wait_local(&self) -> Result<(), TiledError> {
        let mut pending: Vec<(usize, TileFuture<T>)> = self
            .shard
            .slots
            .lock()
            .iter()
            .filter(|(_, slot)| slot.is_set())
            .map(|(&o, slot)| (o, slot.future.clone()))
            .collect();
        pending.sort_unstable_by_key(|(o, _)| *o);
        let results = futures::executor::block_on(join_all(pending.into_iter().map(|(_, f)| f)));
        results.into_iter().try_for_each(|r| r.map(drop))
    }
}

impl<T: Element> Drop for TileStore<T> {
    /// Releases this rank's handle. The shard stays registered, and its
    /// produced tiles stay readable, until every rank has dropped the store.
    fn drop(&mut self) {
        let unproduced = self.shard.release();
        if unproduced > 0 {
            warn!(id = self.id, unproduced, "dropping store with requested tiles never produced");
        }
        if self.world.registry().release(self.id, self.world.size()) {
            debug!(id = self.id, "tile store released on every rank");
        }
    }
}
