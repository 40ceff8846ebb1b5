//! Block operations.
//!
//! ```text
//! Level 1: element-wise ladder, reductions, permute   (this module)
//!     → allocate output, check ranges
//!
//! Level 2: in-place forms (`*_to`, permute_into)
//!     → vector kernels / backend
//!
//! Level 3: math::vector_op and backend::GenericBackend
//! ```

mod elementwise;
mod permute;
mod reduce;

pub use elementwise::{
    add, add_permuted, add_scaled, add_scaled_permuted, add_to, add_to_permuted, add_to_scaled,
    add_to_scaled_permuted, add_value, add_value_permuted, add_value_to, conj, mult,
    mult_permuted, mult_scaled, mult_scaled_permuted, mult_to, mult_to_permuted, mult_to_scaled,
    mult_to_scaled_permuted, neg, neg_permuted, neg_to, scale, scale_permuted, scale_to, subt,
    subt_permuted, subt_scaled, subt_scaled_permuted, subt_to, subt_to_permuted, subt_to_scaled,
    subt_to_scaled_permuted, subt_value, subt_value_permuted, subt_value_to,
};
pub use permute::{permute, permute_into};
pub use reduce::{
    abs_max, abs_min, dot, inner_product, max, min, norm, product, squared_norm, sum, trace,
};
