//! Process maps: which rank owns which tile.
//!
//! A process map is a total, stable function from tile ordinal to owning
//! rank. It also lists the ordinals owned by the local rank in increasing
//! order.

use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::TiledError;
use crate::hash::fnv1a_words;

/// Ownership of tile ordinals `0..size()` among `procs()` ranks.
pub trait ProcessMap: Send + Sync + Debug {
    /// Number of tiles mapped.
    fn size(&self) -> usize;

    /// Rank this map was built for.
    fn rank(&self) -> usize;

    /// Number of ranks.
    fn procs(&self) -> usize;

    /// Owner of `ordinal`; `ordinal` must be below `size()`.
    fn owner(&self, ordinal: usize) -> usize;

    /// Ordinals owned by `rank()`, increasing.
    fn local_ordinals(&self) -> &[usize];

    fn is_local(&self, ordinal: usize) -> bool {
        ordinal < self.size() && self.owner(ordinal) == self.rank()
    }

    fn local_size(&self) -> usize {
        self.local_ordinals().len()
    }
}

fn check_rank(rank: usize, procs: usize) -> Result<(), TiledError> {
    if procs == 0 || rank >= procs {
        return Err(TiledError::construction(format!(
            "rank {} is not valid for {} processes",
            rank, procs
        )));
    }
    Ok(())
}

fn collect_local(size: usize, rank: usize, owner: impl Fn(usize) -> usize) -> Vec<usize> {
    (0..size).filter(|&o| owner(o) == rank).collect()
}

/// Contiguous blocks of `ceil(size / procs)` ordinals per rank.
#[derive(Clone, Debug)]
pub struct BlockedPmap {
    size: usize,
    rank: usize,
    procs: usize,
    block: usize,
    local: Vec<usize>,
}

impl BlockedPmap {
    pub fn new(size: usize, rank: usize, procs: usize) -> Result<Self, TiledError> {
        check_rank(rank, procs)?;
        let block = size.div_ceil(procs).max(1);
        let start = (rank * block).min(size);
        let end = ((rank + 1) * block).min(size);
        Ok(Self {
            size,
            rank,
            procs,
            block,
            local: (start..end).collect(),
        })
    }
}

impl ProcessMap for BlockedPmap {
    fn size(&self) -> usize {
        self.size
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn procs(&self) -> usize {
        self.procs
    }

    fn owner(&self, ordinal: usize) -> usize {
        ordinal / self.block
    }

    fn local_ordinals(&self) -> &[usize] {
        &self.local
    }
}

/// `ordinal % procs`.
#[derive(Clone, Debug)]
pub struct RoundRobinPmap {
    size: usize,
    rank: usize,
    procs: usize,
    local: Vec<usize>,
}

impl RoundRobinPmap {
    pub fn new(size: usize, rank: usize, procs: usize) -> Result<Self, TiledError> {
        check_rank(rank, procs)?;
        Ok(Self {
            size,
            rank,
            procs,
            local: (rank..size).step_by(procs).collect(),
        })
    }
}

impl ProcessMap for RoundRobinPmap {
    fn size(&self) -> usize {
        self.size
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn procs(&self) -> usize {
        self.procs
    }

    fn owner(&self, ordinal: usize) -> usize {
        ordinal % self.procs
    }

    fn local_ordinals(&self) -> &[usize] {
        &self.local
    }
}

/// FNV-1a hash of the ordinal, modulo `procs`.
#[derive(Clone, Debug)]
pub struct HashedPmap {
    size: usize,
    rank: usize,
    procs: usize,
    local: Vec<usize>,
}

impl HashedPmap {
    pub fn new(size: usize, rank: usize, procs: usize) -> Result<Self, TiledError> {
        check_rank(rank, procs)?;
        let local = collect_local(size, rank, |o| Self::hash_owner(o, procs));
        Ok(Self {
            size,
            rank,
            procs,
            local,
        })
    }

    fn hash_owner(ordinal: usize, procs: usize) -> usize {
        (fnv1a_words(&[ordinal]) % procs as u64) as usize
    }
}

impl ProcessMap for HashedPmap {
    fn size(&self) -> usize {
        self.size
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn procs(&self) -> usize {
        self.procs
    }

    fn owner(&self, ordinal: usize) -> usize {
        Self::hash_owner(ordinal, self.procs)
    }

    fn local_ordinals(&self) -> &[usize] {
        &self.local
    }
}

/// Selects a process map implementation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PmapPolicy {
    #[default]
    Blocked,
    RoundRobin,
    Hashed,
}

impl PmapPolicy {
    pub fn build(
        self,
        size: usize,
        rank: usize,
        procs: usize,
    ) -> Result<Arc<dyn ProcessMap>, TiledError> {
        Ok(match self {
            PmapPolicy::Blocked => Arc::new(BlockedPmap::new(size, rank, procs)?),
            PmapPolicy::RoundRobin => Arc::new(RoundRobinPmap::new(size, rank, procs)?),
            PmapPolicy::Hashed => Arc::new(HashedPmap::new(size, rank, procs)?),
        })
    }
}

impl FromStr for PmapPolicy {
    type Err = TiledError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blocked" => Ok(PmapPolicy::Blocked),
            "round-robin" | "round_robin" | "roundrobin" => Ok(PmapPolicy::RoundRobin),
            "hashed" => Ok(PmapPolicy::Hashed),
            other => Err(TiledError::InvalidConfig {
                message: format!("unknown process map policy '{}'", other),
            }),
        }
    }
}
