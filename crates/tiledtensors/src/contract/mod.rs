//! Block contraction.
//!
//! - `gemm_helper`: folds a contraction into `(m, n, k)` matrix sizes
//! - `gemm`: GEMM-based implementation using faer

mod gemm;
mod gemm_helper;

pub use gemm::{gemm, gemm_into};
pub use gemm_helper::{BlasOp, GemmHelper};
