//! tiledtensors - distributed block-sparse tiled arrays
//!
//! An array is a dense multi-dimensional element range cut into a grid of
//! tiles. Tiles are dense blocks spread over the ranks of a [`World`];
//! tiles a sparse [`Shape`] marks as zero are never stored.
//!
//! # Architecture
//!
//! ```text
//! Level 1: Distributed arrays (dist_array, store, shape, pmap, world)
//!     → DistArray: construction, find/set, fence, conversions, permute
//!
//! Level 2: Tiles (tile, operations, contract)
//!     → Tile: shared block with copy-on-write, wire format
//!     → add/subt/mult/scale/neg ladders, reductions, gemm
//!
//! Level 3: Kernels (math, backend)
//!     → unrolled vector ops, permutation backend, faer matmul
//! ```
//!
//! # Example
//!
//! ```
//! use tiledtensors::{DistArray, RuntimeConfig, TiledRange, World};
//!
//! let world = World::single(RuntimeConfig::default()).unwrap();
//! let trange = TiledRange::from_boundaries(vec![vec![0, 2, 5], vec![0, 3]]).unwrap();
//!
//! let a = DistArray::from_fn(&world, trange, |i| (i[0] + 10 * i[1]) as f64).unwrap();
//! a.fence().unwrap();
//!
//! let tile = a.find(1).unwrap().wait().unwrap();
//! assert_eq!(tile.tensor().unwrap().get(&[4, 2]), Some(&24.0));
//! ```

pub mod backend;
pub mod bitset;
pub mod config;
pub mod contract;
pub mod dist_array;
pub mod error;
pub mod hash;
pub mod math;
pub mod operations;
pub mod permutation;
pub mod pmap;
pub mod random;
pub mod range;
pub mod scalar;
pub mod shape;
pub mod store;
pub mod strides;
pub mod tensor;
pub mod tile;
pub mod tiled_range;
pub mod world;

pub use config::RuntimeConfig;
pub use dist_array::DistArray;
pub use error::TiledError;
pub use permutation::Permutation;
pub use pmap::{BlockedPmap, HashedPmap, PmapPolicy, ProcessMap, RoundRobinPmap};
pub use range::Range;
pub use scalar::{Element, RealOf, RealScalar, Scalar, c64};
pub use shape::{Shape, SparseShape};
pub use store::{TileFuture, TileStore};
pub use strides::Order;
pub use tensor::Tensor;
pub use tile::Tile;
pub use tiled_range::{TiledRange, TiledRange1};
pub use world::{LocalCluster, TaskHandle, World};
