//! Runtime configuration.
//!
//! Values come from [`RuntimeConfig::default`] and may be overridden from the
//! environment:
//!
//! | variable                   | field                | example       |
//! |----------------------------|----------------------|---------------|
//! | `TILEDTENSORS_RANKS`       | `ranks`              | `4`           |
//! | `TILEDTENSORS_THREADS`     | `threads_per_rank`   | `2`           |
//! | `TILEDTENSORS_PMAP`        | `pmap_policy`        | `round-robin` |
//! | `TILEDTENSORS_SHAPE_BATCH` | `shape_batch_blocks` | `8`           |

use std::fmt::Display;
use std::str::FromStr;

use crate::error::TiledError;
use crate::pmap::PmapPolicy;

pub const ENV_RANKS: &str = "TILEDTENSORS_RANKS";
pub const ENV_THREADS: &str = "TILEDTENSORS_THREADS";
pub const ENV_PMAP: &str = "TILEDTENSORS_PMAP";
pub const ENV_SHAPE_BATCH: &str = "TILEDTENSORS_SHAPE_BATCH";

/// Bitset blocks handled per parallel batch when permuting a sparse shape.
pub const DEFAULT_SHAPE_BATCH_BLOCKS: usize = 8;

/// Settings of a local cluster and of the arrays built on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Number of ranks in a [`LocalCluster`](crate::world::LocalCluster).
    pub ranks: usize,
    /// Task pool threads per rank.
    pub threads_per_rank: usize,
    /// Default process map for new arrays.
    pub pmap_policy: PmapPolicy,
    pub shape_batch_blocks: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ranks: 1,
            threads_per_rank: 2,
            pmap_policy: PmapPolicy::default(),
            shape_batch_blocks: DEFAULT_SHAPE_BATCH_BLOCKS,
        }
    }
}

impl RuntimeConfig {
    pub fn with_ranks(mut self, ranks: usize) -> Self {
        self.ranks = ranks;
        self
    }

    pub fn with_threads_per_rank(mut self, threads: usize) -> Self {
        self.threads_per_rank = threads;
        self
    }

    pub fn with_pmap_policy(mut self, policy: PmapPolicy) -> Self {
        self.pmap_policy = policy;
        self
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, TiledError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup(variable)`.
    ///
    /// # Example
    ///
    /// ```
    /// use tiledtensors::{PmapPolicy, RuntimeConfig};
    ///
    /// let config = RuntimeConfig::from_lookup(|key| match key {
    ///     "TILEDTENSORS_RANKS" => Some("3".to_string()),
    ///     "TILEDTENSORS_PMAP" => Some("hashed".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(config.ranks, 3);
    /// assert_eq!(config.pmap_policy, PmapPolicy::Hashed);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TiledError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = lookup(ENV_RANKS) {
            config.ranks = parse(ENV_RANKS, &v)?;
        }
        if let Some(v) = lookup(ENV_THREADS) {
            config.threads_per_rank = parse(ENV_THREADS, &v)?;
        }
        if let Some(v) = lookup(ENV_PMAP) {
            config.pmap_policy = v.parse()?;
        }
        if let Some(v) = lookup(ENV_SHAPE_BATCH) {
            config.shape_batch_blocks = parse(ENV_SHAPE_BATCH, &v)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `InvalidConfig` if any count is zero.
    pub fn validate(&self) -> Result<(), TiledError> {
        for (name, value) in [
            ("ranks", self.ranks),
            ("threads_per_rank", self.threads_per_rank),
            ("shape_batch_blocks", self.shape_batch_blocks),
        ] {
            if value == 0 {
                return Err(TiledError::InvalidConfig {
                    message: format!("{} must be positive", name),
                });
            }
        }
        Ok(())
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, TiledError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e| TiledError::InvalidConfig {
        message: format!("{}='{}': {}", key, value, e),
    })
}
