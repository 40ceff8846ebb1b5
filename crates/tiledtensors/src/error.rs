//! Error types for tiledtensors.

use thiserror::Error;

/// Errors that can occur while building, storing, or computing with tiled arrays.
///
/// The enum is `Clone` so that a single failure can be delivered to every
/// consumer of a shared tile future.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TiledError {
    /// A coordinate or ordinal lies outside its declared bounds.
    #[error("{what} {index:?} is out of range for bound {bound:?}")]
    OutOfRange {
        what: &'static str,
        index: Vec<usize>,
        bound: Vec<usize>,
    },

    /// Malformed boundaries, ranges, permutations, or helpers.
    #[error("invalid construction: {message}")]
    InvalidConstruction { message: String },

    /// A store operation addressed an ordinal owned by another rank.
    #[error("tile {ordinal} is owned by rank {owner}, not by rank {rank}")]
    NotLocal {
        ordinal: usize,
        owner: usize,
        rank: usize,
    },

    /// A tile slot was written twice.
    #[error("tile {ordinal} has already been set")]
    AlreadySet { ordinal: usize },

    /// Operand rank or extents do not agree.
    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Ranks disagree about the sparsity pattern of an array.
    #[error("shape on rank {rank} differs from the shape on rank 0")]
    InconsistentShape { rank: usize },

    /// Arithmetic was requested on an empty tile.
    #[error("operation on an empty tile")]
    EmptyTile,

    /// The shape marks this tile as zero.
    #[error("tile {ordinal} is zero in the array shape")]
    ZeroTile { ordinal: usize },

    /// The slot was dropped before any value was produced.
    #[error("tile {ordinal} was abandoned before a value was produced")]
    Abandoned { ordinal: usize },

    /// Encoding or decoding of a tile or shape failed.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// The execution substrate failed (task pool, remote lookup, worker).
    #[error("runtime error: {message}")]
    Runtime { message: String },

    /// A configuration value could not be parsed or is out of bounds.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl TiledError {
    pub(crate) fn construction(message: impl Into<String>) -> Self {
        Self::InvalidConstruction {
            message: message.into(),
        }
    }

    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }
}

impl From<bincode::Error> for TiledError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = TiledError::NotLocal {
            ordinal: 3,
            owner: 1,
            rank: 0,
        };
        assert_eq!(err.to_string(), "tile 3 is owned by rank 1, not by rank 0");

        let err = TiledError::OutOfRange {
            what: "element",
            index: vec![7],
            bound: vec![7],
        };
        assert_eq!(err.to_string(), "element [7] is out of range for bound [7]");
    }

    #[test]
    fn test_errors_are_cloneable() {
        let err = TiledError::Abandoned { ordinal: 2 };
        assert_eq!(err.clone(), err);
    }
}
