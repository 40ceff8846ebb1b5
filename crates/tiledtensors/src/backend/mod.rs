//! Backend abstraction for block kernels.
//!
//! - `GenericBackend`: loop-based permutation (always available)
//! - `faer_interop`: zero-copy views of blocks as faer matrices for GEMM

mod faer_interop;
mod generic;
mod permutation;

pub use faer_interop::AsFaerMat;
pub use generic::GenericBackend;
pub use permutation::PermutationBackend;
