//! Byte-level collectives between ranks.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::TiledError;

/// Collective operations over opaque byte buffers.
///
/// Every rank of a group must call the same collectives in the same order.
pub trait Communicator: Send + Sync + Debug {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// # Errors
    ///
    /// Returns `Runtime` if the group can no longer meet.
    fn barrier(&self) -> Result<(), TiledError>;

    /// Returns `data` of `root` on every rank; `data` is only read on `root`.
    fn broadcast(&self, root: usize, data: Option<Vec<u8>>) -> Result<Vec<u8>, TiledError>;

    /// Contributions of every rank, indexed by rank.
    fn all_gather(&self, data: Vec<u8>) -> Result<Vec<Vec<u8>>, TiledError>;
}

#[derive(Debug, Default)]
struct Rendezvous {
    arrived: usize,
    generation: u64,
    /// First rank that left the group for good.
    poisoned_by: Option<usize>,
}

#[derive(Debug)]
struct Group {
    size: usize,
    rendezvous: Mutex<Rendezvous>,
    released: Condvar,
    slots: Mutex<Vec<Option<Vec<u8>>>>,
}

impl Group {
    fn poisoned(rank: usize) -> TiledError {
        TiledError::runtime(format!("rank {} left the group", rank))
    }

    /// Reusable barrier that fails instead of blocking once the group is
    /// poisoned.
    fn wait(&self) -> Result<(), TiledError> {
        let mut state = self.rendezvous.lock();
        if let Some(rank) = state.poisoned_by {
            return Err(Self::poisoned(rank));
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation += 1;
            self.released.notify_all();
            return Ok(());
        }
        while state.generation == generation && state.poisoned_by.is_none() {
            self.released.wait(&mut state);
        }
        match state.poisoned_by {
            Some(rank) if state.generation == generation => Err(Self::poisoned(rank)),
            _ => Ok(()),
        }
    }

    fn poison(&self, rank: usize) {
        let mut state = self.rendezvous.lock();
        state.poisoned_by.get_or_insert(rank);
        self.released.notify_all();
    }
}

/// Communicator between threads of one process.
///
/// Each collective publishes into per-rank slots, waits on a barrier, reads,
/// and waits again so that no rank overwrites a slot still being read. A
/// rank that cannot continue poisons the group; every pending and later
/// collective of its peers then fails with `Runtime`.
#[derive(Debug, Clone)]
pub struct LocalCommunicator {
    rank: usize,
    size: usize,
    group: Arc<Group>,
}

impl LocalCommunicator {
    /// One communicator per rank of a new group.
    pub fn group(size: usize) -> Vec<LocalCommunicator> {
        let group = Arc::new(Group {
            size,
            rendezvous: Mutex::new(Rendezvous::default()),
            released: Condvar::new(),
            slots: Mutex::new(vec![None; size]),
        });
        (0..size)
            .map(|rank| LocalCommunicator {
                rank,
                size,
                group: Arc::clone(&group),
            })
            .collect()
    }

    /// Marks this rank as gone and wakes every blocked peer.
    pub fn poison(&self) {
        self.group.poison(self.rank);
    }

    /// The first rank that poisoned the group, if any.
    pub fn poisoned_by(&self) -> Option<usize> {
        self.group.rendezvous.lock().poisoned_by
    }

    fn check_root(&self, root: usize) -> Result<(), TiledError> {
        if root >= self.size {
            return Err(TiledError::OutOfRange {
                what: "root rank",
                index: vec![root],
                bound: vec![self.size],
            });
        }
        Ok(())
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<(), TiledError> {
        self.group.wait()
    }

    fn broadcast(&self, root: usize, data: Option<Vec<u8>>) -> Result<Vec<u8>, TiledError> {
        self.check_root(root)?;
        if self.rank == root {
            self.group.slots.lock()[root] = Some(data.unwrap_or_default());
        }
        self.group.wait()?;
        let value = self.group.slots.lock()[root].clone();
        self.group.wait()?;
        value.ok_or_else(|| TiledError::runtime(format!("rank {} published nothing", root)))
    }

    fn all_gather(&self, data: Vec<u8>) -> Result<Vec<Vec<u8>>, TiledError> {
        self.group.slots.lock()[self.rank] = Some(data);
        self.group.wait()?;
        let gathered: Option<Vec<Vec<u8>>> = self.group.slots.lock().iter().cloned().collect();
        self.group.wait()?;
        gathered.ok_or_else(|| TiledError::runtime("all-gather slot left empty"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collectives_across_threads() {
        let comms = LocalCommunicator::group(3);
        std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let root = if comm.rank() == 1 { Some(vec![7, 8]) } else { None };
                        let b = comm.broadcast(1, root).unwrap();
                        let g = comm.all_gather(vec![comm.rank() as u8]).unwrap();
                        // a second round must not see stale data
                        let g2 = comm.all_gather(vec![10 + comm.rank() as u8]).unwrap();
                        (b, g, g2)
                    })
                })
                .collect();
            for h in handles {
                let (b, g, g2) = h.join().unwrap();
                assert_eq!(b, vec![7, 8]);
                assert_eq!(g, vec![vec![0], vec![1], vec![2]]);
                assert_eq!(g2, vec![vec![10], vec![11], vec![12]]);
            }
        });
    }

    #[test]
    fn test_poisoned_group_releases_waiters() {
        let comms = LocalCommunicator::group(3);
        std::thread::scope(|s| {
            let waiters: Vec<_> = comms[1..]
                .iter()
                .map(|comm| s.spawn(move || comm.barrier()))
                .collect();
            // rank 0 never arrives
            comms[0].poison();
            for w in waiters {
                assert_eq!(
                    w.join().unwrap(),
                    Err(TiledError::runtime("rank 0 left the group"))
                );
            }
        });
        assert_eq!(comms[2].poisoned_by(), Some(0));
        assert!(comms[1].all_gather(vec![1]).is_err());
    }

    #[test]
    fn test_barrier_reusable() {
        let comms = LocalCommunicator::group(2);
        std::thread::scope(|s| {
            for comm in &comms {
                s.spawn(move || {
                    for _ in 0..100 {
                        comm.barrier().unwrap();
                    }
                });
            }
        });
        assert_eq!(comms[0].poisoned_by(), None);
    }

    #[test]
    fn test_bad_root() {
        let comms = LocalCommunicator::group(1);
        assert!(matches!(
            comms[0].broadcast(2, None),
            Err(TiledError::OutOfRange { .. })
        ));
    }
}
