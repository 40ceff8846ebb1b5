//! Low-level numeric kernels.

pub mod vector_op;

pub use vector_op::{
    LOOP_UNWIND, binary_vector_op, binary_vector_op_in_place, copy_vector, gather_vector,
    reduce_vector_op, reduce_vector_op2, scatter_vector, unary_vector_op,
    unary_vector_op_in_place,
};
