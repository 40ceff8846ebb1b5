//! Fixed-size bitset over tile ordinals.

use serde::{Deserialize, Serialize};

/// Bits per storage block.
pub const BLOCK_BITS: usize = u64::BITS as usize;

/// A fixed-length set of bits stored in 64-bit blocks.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bitset {
    len: usize,
    blocks: Vec<u64>,
}

impl Bitset {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            blocks: vec![0; len.div_ceil(BLOCK_BITS)],
        }
    }

    /// All bits set.
    pub fn full(len: usize) -> Self {
        let mut set = Self::new(len);
        for i in 0..len {
            set.set(i, true);
        }
        set
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// # Panics
    ///
    /// Panics if `i >= len`.
    #[inline]
    pub fn set(&mut self, i: usize, value: bool) {
        assert!(i < self.len, "bit {} out of range for bitset of {}", i, self.len);
        let mask = 1u64 << (i % BLOCK_BITS);
        if value {
            self.blocks[i / BLOCK_BITS] |= mask;
        } else {
            self.blocks[i / BLOCK_BITS] &= !mask;
        }
    }

    /// Out-of-range bits read as unset.
    #[inline]
    pub fn get(&self, i: usize) -> bool {
        i < self.len && self.blocks[i / BLOCK_BITS] & (1u64 << (i % BLOCK_BITS)) != 0
    }

    pub fn count_ones(&self) -> usize {
        self.blocks.iter().map(|b| b.count_ones() as usize).sum()
    }

    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn blocks(&self) -> &[u64] {
        &self.blocks
    }

    /// Set bits of one block, as absolute indices.
    pub fn block_ones(&self, block: usize) -> impl Iterator<Item = usize> + '_ {
        let base = block * BLOCK_BITS;
        let mut word = self.blocks[block];
        std::iter::from_fn(move || {
            if word == 0 {
                return None;
            }
            let bit = word.trailing_zeros() as usize;
            word &= word - 1;
            Some(base + bit)
        })
    }

    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.blocks.len()).flat_map(move |b| self.block_ones(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let mut b = Bitset::new(130);
        assert_eq!(b.num_blocks(), 3);
        b.set(0, true);
        b.set(64, true);
        b.set(129, true);
        assert!(b.get(64));
        assert!(!b.get(63));
        assert!(!b.get(500));
        assert_eq!(b.count_ones(), 3);
        b.set(64, false);
        assert_eq!(b.iter_ones().collect::<Vec<_>>(), vec![0, 129]);
    }

    #[test]
    fn test_full() {
        let b = Bitset::full(70);
        assert_eq!(b.count_ones(), 70);
        assert_eq!(b.iter_ones().last(), Some(69));
    }
}
