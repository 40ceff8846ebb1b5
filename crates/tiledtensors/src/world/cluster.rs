//! Ranks as threads of one process.

use std::sync::Arc;

use tracing::{error, info};

use super::{LocalCommunicator, Registry, World};
use crate::config::RuntimeConfig;
use crate::error::TiledError;

/// A group of `config.ranks` worlds running on scoped threads.
///
/// # Example
///
/// ```
/// use tiledtensors::{LocalCluster, RuntimeConfig};
///
/// let cluster = LocalCluster::new(RuntimeConfig::default().with_ranks(3)).unwrap();
/// let ranks = cluster.run(|world| world.rank()).unwrap();
/// assert_eq!(ranks, vec![0, 1, 2]);
/// ```
#[derive(Clone, Debug)]
pub struct LocalCluster {
    config: RuntimeConfig,
}

impl LocalCluster {
    pub fn new(config: RuntimeConfig) -> Result<Self, TiledError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Runs `body` once per rank, each on its own thread, and returns the
    /// results in rank order.
    ///
    /// A rank that panics poisons the group, so its peers' collectives fail
    /// instead of waiting for it. The first rank's panic is then resumed on
    /// the caller.
    pub fn run<F, R>(&self, body: F) -> Result<Vec<R>, TiledError>
    where
        F: Fn(World) -> R + Sync,
        R: Send,
    {
        let registry = Arc::new(Registry::default());
        let comms = LocalCommunicator::group(self.config.ranks);
        let members = comms
            .iter()
            .map(|comm| {
                let world =
                    World::new(Arc::new(comm.clone()), Arc::clone(&registry), self.config.clone())?;
                Ok((PoisonOnPanic(comm.clone()), world))
            })
            .collect::<Result<Vec<_>, TiledError>>()?;
        info!(ranks = self.config.ranks, "local cluster starting");

        let body = &body;
        let outcomes = std::thread::scope(|s| {
            let handles: Vec<_> = members
                .into_iter()
                .map(|(guard, world)| {
                    s.spawn(move || {
                        let _guard = guard;
                        body(world)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect::<Vec<_>>()
        });

        let origin = comms.first().and_then(LocalCommunicator::poisoned_by);
        if let Some(rank) = origin {
            error!(rank, "rank panicked, group poisoned");
        }
        let mut results = Vec::with_capacity(outcomes.len());
        let mut panics = Vec::new();
        for (rank, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(r) => results.push(r),
                Err(payload) => panics.push((rank, payload)),
            }
        }
        if !panics.is_empty() {
            let index = panics
                .iter()
                .position(|(rank, _)| Some(*rank) == origin)
                .unwrap_or(0);
            std::panic::resume_unwind(panics.swap_remove(index).1);
        }
        Ok(results)
    }
}

/// Poisons the rank's group if the rank thread unwinds.
struct PoisonOnPanic(LocalCommunicator);

impl Drop for PoisonOnPanic {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.poison();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_collectives() {
        let cluster = LocalCluster::new(RuntimeConfig::default().with_ranks(4)).unwrap();
        let sums = cluster
            .run(|world| {
                let mut v = vec![0.0f32; 4];
                v[world.rank()] = world.rank() as f32 + 1.0;
                world.all_reduce_sum(&v).unwrap()
            })
            .unwrap();
        for s in sums {
            assert_eq!(s, vec![1.0, 2.0, 3.0, 4.0]);
        }
    }

    #[test]
    fn test_panicking_rank_releases_peers() {
        let cluster = LocalCluster::new(RuntimeConfig::default().with_ranks(3)).unwrap();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cluster.run(|world| {
                if world.rank() == 1 {
                    panic!("rank 1 failed");
                }
                // peers would otherwise wait here forever
                world.barrier().unwrap();
            })
        }));
        let payload = outcome.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"rank 1 failed"));
    }

    #[test]
    fn test_barrier_error_after_peer_panic() {
        let cluster = LocalCluster::new(RuntimeConfig::default().with_ranks(2)).unwrap();
        let seen = parking_lot::Mutex::new(None);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cluster.run(|world| {
                if world.rank() == 0 {
                    panic!("rank 0 failed");
                }
                *seen.lock() = Some(world.barrier());
            })
        }));
        assert!(outcome.is_err());
        assert!(matches!(
            seen.into_inner(),
            Some(Err(TiledError::Runtime { .. }))
        ));
    }

    #[test]
    fn test_rejects_zero_ranks() {
        assert!(LocalCluster::new(RuntimeConfig::default().with_ranks(0)).is_err());
    }
}
