//! Dimension permutations.
//!
//! A permutation `p` sends dimension `i` to position `p[i]`: applying it to a
//! tuple `a` produces `b` with `b[p[i]] = a[i]`.

use std::fmt;

use smallvec::SmallVec;

use crate::error::TiledError;

/// A bijection over `0..rank`.
///
/// # Example
/// ```
/// use tiledtensors::Permutation;
///
/// let p = Permutation::new(vec![1, 2, 0]).unwrap();
/// assert_eq!(p.apply(&['a', 'b', 'c']).unwrap(), vec!['c', 'a', 'b']);
/// assert_eq!(p.inverse().apply(&p.apply(&[1, 2, 3]).unwrap()).unwrap(), vec![1, 2, 3]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Permutation {
    p: SmallVec<[usize; 8]>,
}

impl Permutation {
    /// Create a permutation from its image sequence.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConstruction` if `p` is not a permutation of `0..p.len()`.
    pub fn new(p: Vec<usize>) -> Result<Self, TiledError> {
        validate_permutation(&p, p.len())?;
        Ok(Self { p: p.into() })
    }

    pub fn identity(rank: usize) -> Self {
        Self {
            p: (0..rank).collect(),
        }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.p.len()
    }

    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.p
    }

    pub fn is_identity(&self) -> bool {
        self.p.iter().enumerate().all(|(i, &pi)| i == pi)
    }

    pub fn inverse(&self) -> Self {
        let mut inv: SmallVec<[usize; 8]> = SmallVec::from_elem(0, self.p.len());
        for (i, &pi) in self.p.iter().enumerate() {
            inv[pi] = i;
        }
        Self { p: inv }
    }

    /// `compose(other)` is the permutation that applies `other` first and then `self`.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the ranks differ.
    pub fn compose(&self, other: &Permutation) -> Result<Self, TiledError> {
        other.check_rank(self.rank())?;
        Ok(Self {
            p: other.p.iter().map(|&o| self.p[o]).collect(),
        })
    }

    /// `result[p[i]] = a[i]`.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `a.len() != self.rank()`.
    pub fn apply<T: Clone>(&self, a: &[T]) -> Result<Vec<T>, TiledError> {
        self.check_rank(a.len())?;
        let mut out: Vec<T> = a.to_vec();
        for (i, &pi) in self.p.iter().enumerate() {
            out[pi] = a[i].clone();
        }
        Ok(out)
    }

    /// `result[i] = a[p[i]]`, the inverse of [`Permutation::apply`].
    pub fn apply_inverse<T: Clone>(&self, a: &[T]) -> Result<Vec<T>, TiledError> {
        self.check_rank(a.len())?;
        Ok(self.p.iter().map(|&pi| a[pi].clone()).collect())
    }

    pub(crate) fn check_rank(&self, rank: usize) -> Result<(), TiledError> {
        if self.rank() != rank {
            return Err(TiledError::DimensionMismatch {
                expected: vec![rank],
                actual: vec![self.rank()],
            });
        }
        Ok(())
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, pi) in self.p.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}->{}", i, pi)?;
        }
        write!(f, "}}")
    }
}

fn validate_permutation(perm: &[usize], ndim: usize) -> Result<(), TiledError> {
    let invalid = || TiledError::construction(format!("{:?} is not a permutation of 0..{}", perm, ndim));
    if perm.len() != ndim {
        return Err(invalid());
    }

    let mut seen = vec![false; ndim];
    for &p in perm {
        if p >= ndim || seen[p] {
            return Err(invalid());
        }
        seen[p] = true;
    }

    Ok(())
}
