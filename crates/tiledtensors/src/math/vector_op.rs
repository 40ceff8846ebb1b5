//! Loop-unrolled kernels over contiguous buffers.
//!
//! Every kernel processes the first `n & !(LOOP_UNWIND - 1)` elements in
//! blocks of [`LOOP_UNWIND`]: a block is loaded into a local array, the
//! operation is applied to each lane in increasing index order, and the block
//! is stored back. The remaining tail runs the plain scalar loop. Because the
//! operation is applied to the same operands in the same order, results are
//! bit-identical to a naive loop for any `op`, including floating-point
//! reductions.
//!
//! Buffer length mismatches are programmer errors and panic.

/// Unroll factor of every kernel.
pub const LOOP_UNWIND: usize = 8;

const _: () = assert!(
    LOOP_UNWIND.is_power_of_two() && LOOP_UNWIND <= 1024,
    "LOOP_UNWIND must be a power of two no larger than 1024"
);

const INDEX_MASK: usize = !(LOOP_UNWIND - 1);

type Block<T> = [T; LOOP_UNWIND];

#[inline(always)]
fn load<T: Copy>(src: &[T]) -> Block<T> {
    std::array::from_fn(|i| src[i])
}

#[inline(always)]
fn store<T: Copy>(dst: &mut [T], block: &Block<T>) {
    dst.copy_from_slice(block);
}

#[inline]
fn check_len(what: &str, expected: usize, actual: usize) {
    assert_eq!(
        expected, actual,
        "{} buffer has {} elements, expected {}",
        what, actual, expected
    );
}

/// `result[i] = op(arg[i])`.
pub fn unary_vector_op<A, R, F>(arg: &[A], result: &mut [R], mut op: F)
where
    A: Copy,
    R: Copy,
    F: FnMut(A) -> R,
{
    check_len("result", arg.len(), result.len());
    let nx = arg.len() & INDEX_MASK;
    let (arg_main, arg_tail) = arg.split_at(nx);
    let (res_main, res_tail) = result.split_at_mut(nx);

    for (a, r) in arg_main
        .chunks_exact(LOOP_UNWIND)
        .zip(res_main.chunks_exact_mut(LOOP_UNWIND))
    {
        let a = load(a);
        let out: Block<R> = std::array::from_fn(|i| op(a[i]));
        store(r, &out);
    }
    for (r, &a) in res_tail.iter_mut().zip(arg_tail) {
        *r = op(a);
    }
}

/// `op(&mut result[i])`.
pub fn unary_vector_op_in_place<R, F>(result: &mut [R], mut op: F)
where
    R: Copy,
    F: FnMut(&mut R),
{
    let nx = result.len() & INDEX_MASK;
    let (main, tail) = result.split_at_mut(nx);

    for r in main.chunks_exact_mut(LOOP_UNWIND) {
        let mut block = load(r);
        block.iter_mut().for_each(&mut op);
        store(r, &block);
    }
    tail.iter_mut().for_each(op);
}

/// `result[i] = op(left[i], right[i])`.
pub fn binary_vector_op<L, Ri, R, F>(left: &[L], right: &[Ri], result: &mut [R], mut op: F)
where
    L: Copy,
    Ri: Copy,
    R: Copy,
    F: FnMut(L, Ri) -> R,
{
    check_len("right", left.len(), right.len());
    check_len("result", left.len(), result.len());
    let nx = left.len() & INDEX_MASK;
    let (l_main, l_tail) = left.split_at(nx);
    let (r_main, r_tail) = right.split_at(nx);
    let (res_main, res_tail) = result.split_at_mut(nx);

    for ((l, r), out) in l_main
        .chunks_exact(LOOP_UNWIND)
        .zip(r_main.chunks_exact(LOOP_UNWIND))
        .zip(res_main.chunks_exact_mut(LOOP_UNWIND))
    {
        let l = load(l);
        let r = load(r);
        let block: Block<R> = std::array::from_fn(|i| op(l[i], r[i]));
        store(out, &block);
    }
    for ((out, &l), &r) in res_tail.iter_mut().zip(l_tail).zip(r_tail) {
        *out = op(l, r);
    }
}

/// `op(&mut result[i], arg[i])`.
pub fn binary_vector_op_in_place<A, R, F>(arg: &[A], result: &mut [R], mut op: F)
where
    A: Copy,
    R: Copy,
    F: FnMut(&mut R, A),
{
    check_len("result", arg.len(), result.len());
    let nx = arg.len() & INDEX_MASK;
    let (arg_main, arg_tail) = arg.split_at(nx);
    let (res_main, res_tail) = result.split_at_mut(nx);

    for (a, r) in arg_main
        .chunks_exact(LOOP_UNWIND)
        .zip(res_main.chunks_exact_mut(LOOP_UNWIND))
    {
        let a = load(a);
        let mut block = load(r);
        for (out, &x) in block.iter_mut().zip(a.iter()) {
            op(out, x);
        }
        store(r, &block);
    }
    for (r, &a) in res_tail.iter_mut().zip(arg_tail) {
        op(r, a);
    }
}

/// Folds `op(result, arg[i])` for increasing `i`.
pub fn reduce_vector_op<A, R, F>(arg: &[A], result: &mut R, mut op: F)
where
    A: Copy,
    F: FnMut(&mut R, A),
{
    let nx = arg.len() & INDEX_MASK;
    let (main, tail) = arg.split_at(nx);

    for a in main.chunks_exact(LOOP_UNWIND) {
        let a = load(a);
        for &x in a.iter() {
            op(result, x);
        }
    }
    for &x in tail {
        op(result, x);
    }
}

/// Folds `op(result, left[i], right[i])` for increasing `i`.
pub fn reduce_vector_op2<L, Ri, R, F>(left: &[L], right: &[Ri], result: &mut R, mut op: F)
where
    L: Copy,
    Ri: Copy,
    F: FnMut(&mut R, L, Ri),
{
    check_len("right", left.len(), right.len());
    let nx = left.len() & INDEX_MASK;
    let (l_main, l_tail) = left.split_at(nx);
    let (r_main, r_tail) = right.split_at(nx);

    for (l, r) in l_main
        .chunks_exact(LOOP_UNWIND)
        .zip(r_main.chunks_exact(LOOP_UNWIND))
    {
        let l = load(l);
        let r = load(r);
        for i in 0..LOOP_UNWIND {
            op(result, l[i], r[i]);
        }
    }
    for (&l, &r) in l_tail.iter().zip(r_tail) {
        op(result, l, r);
    }
}

/// `result[i] = arg[i]`.
pub fn copy_vector<T: Copy>(arg: &[T], result: &mut [T]) {
    unary_vector_op(arg, result, |x| x);
}

/// `result[i * stride] = arg[i]`.
///
/// # Panics
///
/// Panics if `stride` is zero or `result` is too short.
pub fn scatter_vector<T: Copy>(arg: &[T], result: &mut [T], stride: usize) {
    assert!(stride > 0, "scatter stride must be positive");
    let needed = strided_len(arg.len(), stride);
    assert!(
        result.len() >= needed,
        "scatter needs {} elements, result has {}",
        needed,
        result.len()
    );
    let nx = arg.len() & INDEX_MASK;
    let (main, tail) = arg.split_at(nx);

    let mut offset = 0;
    for a in main.chunks_exact(LOOP_UNWIND) {
        let a = load(a);
        for &x in a.iter() {
            result[offset] = x;
            offset += stride;
        }
    }
    for &x in tail {
        result[offset] = x;
        offset += stride;
    }
}

/// `result[i] = arg[i * stride]`.
///
/// # Panics
///
/// Panics if `stride` is zero or `arg` is too short.
pub fn gather_vector<T: Copy>(arg: &[T], stride: usize, result: &mut [T]) {
    assert!(stride > 0, "gather stride must be positive");
    let needed = strided_len(result.len(), stride);
    assert!(
        arg.len() >= needed,
        "gather needs {} elements, argument has {}",
        needed,
        arg.len()
    );
    let nx = result.len() & INDEX_MASK;
    let (main, tail) = result.split_at_mut(nx);

    let mut offset = 0;
    for r in main.chunks_exact_mut(LOOP_UNWIND) {
        let block: Block<T> = std::array::from_fn(|i| arg[offset + i * stride]);
        store(r, &block);
        offset += LOOP_UNWIND * stride;
    }
    for r in tail {
        *r = arg[offset];
        offset += stride;
    }
}

fn strided_len(n: usize, stride: usize) -> usize {
    if n == 0 { 0 } else { (n - 1) * stride + 1 }
}
