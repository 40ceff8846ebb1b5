//! Execution context of one rank.
//!
//! A [`World`] bundles the rank's communicator, its task pool and the
//! registry through which ranks of the same process reach each other's
//! distributed objects. Collectives must be entered by every rank in the
//! same order; object ids are assigned by the same rule so that the n-th
//! collective construction gets the same id everywhere.

mod cluster;
mod communicator;

pub use cluster::LocalCluster;
pub use communicator::{Communicator, LocalCommunicator};

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::executor::{ThreadPool, block_on};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::config::RuntimeConfig;
use crate::error::TiledError;

type Entry = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct RegistryState {
    entries: HashMap<(u64, usize), Entry>,
    /// Ranks that have released each object so far.
    released: HashMap<u64, usize>,
}

/// Distributed objects of all ranks, keyed by `(object id, rank)`.
///
/// A rank's entry outlives that rank's handle: the entries of an object are
/// removed together once every rank of the group has released it.
#[derive(Default)]
pub(crate) struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    pub(crate) fn insert<T: Any + Send + Sync>(&self, id: u64, rank: usize, value: Arc<T>) {
        self.state.lock().entries.insert((id, rank), value);
    }

    /// Records that `rank` dropped object `id`. Returns `true` when this was
    /// the last of `procs` ranks and the entries were removed.
    pub(crate) fn release(&self, id: u64, procs: usize) -> bool {
        let mut state = self.state.lock();
        let count = state.released.entry(id).or_insert(0);
        *count += 1;
        if *count < procs {
            return false;
        }
        state.released.remove(&id);
        state.entries.retain(|&(entry_id, _), _| entry_id != id);
        true
    }

    pub(crate) fn get<T: Any + Send + Sync>(&self, id: u64, rank: usize) -> Option<Arc<T>> {
        let entry = self.state.lock().entries.get(&(id, rank)).cloned()?;
        entry.downcast::<T>().ok()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.state.lock().entries.len())
            .finish()
    }
}

struct WorldInner {
    comm: Arc<dyn Communicator>,
    pool: ThreadPool,
    registry: Arc<Registry>,
    next_object_id: AtomicU64,
    config: RuntimeConfig,
}

/// Handle to one rank's runtime. Cloning shares it.
#[derive(Clone)]
pub struct World {
    inner: Arc<WorldInner>,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("rank", &self.rank())
            .field("size", &self.size())
            .finish()
    }
}

impl World {
    pub(crate) fn new(
        comm: Arc<dyn Communicator>,
        registry: Arc<Registry>,
        config: RuntimeConfig,
    ) -> Result<Self, TiledError> {
        config.validate()?;
        let pool = ThreadPool::builder()
            .pool_size(config.threads_per_rank)
            .name_prefix(format!("tiledtensors-rank{}-", comm.rank()))
            .create()
            .map_err(|e| TiledError::runtime(format!("cannot start task pool: {}", e)))?;
        debug!(
            rank = comm.rank(),
            size = comm.size(),
            threads = config.threads_per_rank,
            "world started"
        );
        Ok(Self {
            inner: Arc::new(WorldInner {
                comm,
                pool,
                registry,
                next_object_id: AtomicU64::new(0),
                config,
            }),
        })
    }

    /// A world of a single rank.
    pub fn single(config: RuntimeConfig) -> Result<Self, TiledError> {
        let comm = LocalCommunicator::group(1).remove(0);
        Self::new(Arc::new(comm), Arc::new(Registry::default()), config)
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.inner.comm.rank()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.inner.comm.size()
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Id for the next collectively constructed object.
    pub(crate) fn next_object_id(&self) -> u64 {
        self.inner.next_object_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Blocks until every rank reaches the barrier.
    ///
    /// # Errors
    ///
    /// Returns `Runtime` if a peer rank has left the group.
    pub fn barrier(&self) -> Result<(), TiledError> {
        trace!(rank = self.rank(), "barrier");
        self.inner.comm.barrier()
    }

    /// `value` of `root`, delivered to every rank.
    pub fn broadcast_serializable<T>(&self, root: usize, value: &T) -> Result<T, TiledError>
    where
        T: Serialize + DeserializeOwned,
    {
        let payload = if self.rank() == root {
            Some(bincode::serialize(value)?)
        } else {
            None
        };
        let bytes = self.inner.comm.broadcast(root, payload)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// Every rank's `value`, indexed by rank.
    pub fn all_gather_serializable<T>(&self, value: &T) -> Result<Vec<T>, TiledError>
    where
        T: Serialize + DeserializeOwned,
    {
        let gathered = self.inner.comm.all_gather(bincode::serialize(value)?)?;
        gathered
            .iter()
            .map(|bytes| bincode::deserialize(bytes).map_err(TiledError::from))
            .collect()
    }

    /// Elementwise sum over ranks, accumulated in rank order.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if ranks contribute different lengths.
    pub fn all_reduce_sum(&self, values: &[f32]) -> Result<Vec<f32>, TiledError> {
        let gathered = self.all_gather_serializable(&values.to_vec())?;
        let mut sum = vec![0.0f32; values.len()];
        for contribution in &gathered {
            if contribution.len() != sum.len() {
                return Err(TiledError::DimensionMismatch {
                    expected: vec![sum.len()],
                    actual: vec![contribution.len()],
                });
            }
            for (s, v) in sum.iter_mut().zip(contribution) {
                *s += *v;
            }
        }
        Ok(sum)
    }

    /// Runs `future` on this rank's task pool.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.pool.spawn_ok(future);
    }

    /// Runs `future` on this rank's task pool and returns a handle to its output.
    pub fn execute<F>(&self, future: F) -> TaskHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.spawn(async move {
            let _ = tx.send(future.await);
        });
        TaskHandle { rx }
    }
}

/// Output of a task started with [`World::execute`].
///
/// Resolves to `Runtime` if the task was dropped before finishing.
#[derive(Debug)]
pub struct TaskHandle<R> {
    rx: oneshot::Receiver<R>,
}

impl<R> TaskHandle<R> {
    /// Blocks the calling thread until the task finishes.
    pub fn wait(self) -> Result<R, TiledError> {
        block_on(self)
    }
}

impl<R> Future for TaskHandle<R> {
    type Output = Result<R, TiledError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.map_err(|_| TiledError::runtime("task dropped before completion")))
    }
}
