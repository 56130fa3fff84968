// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-size bit set used by dataflow analyses.

use alloc::vec;
use alloc::vec::Vec;

/// A fixed-capacity set of small integers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BitSet {
    words: Vec<u64>,
    len: usize,
}

impl BitSet {
    /// Creates an empty set able to hold `0..len`.
    #[must_use]
    pub fn new_empty(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.len
    }

    /// Returns `true` if `i` is in the set (out-of-range is `false`).
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> bool {
        self.words
            .get(i / 64)
            .is_some_and(|w| w & (1_u64 << (i % 64)) != 0)
    }

    /// Inserts `i` (ignored if out of range).
    #[inline]
    pub fn set(&mut self, i: usize) {
        if let Some(w) = self.words.get_mut(i / 64) {
            *w |= 1_u64 << (i % 64);
        }
    }

    /// Removes `i`.
    #[inline]
    pub fn clear(&mut self, i: usize) {
        if let Some(w) = self.words.get_mut(i / 64) {
            *w &= !(1_u64 << (i % 64));
        }
    }

    /// `self |= other`.
    pub fn union_with(&mut self, other: &Self) {
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= *b;
        }
    }

    /// `self &= !other`.
    pub fn subtract_with(&mut self, other: &Self) {
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= !*b;
        }
    }

    /// Returns `true` if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Iterates set members in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|&i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_ops() {
        let mut a = BitSet::new_empty(130);
        a.set(0);
        a.set(64);
        a.set(129);
        a.set(500);
        assert!(a.get(129));
        assert!(!a.get(500));
        let mut b = BitSet::new_empty(130);
        b.set(64);
        a.subtract_with(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), [0, 129]);
        b.union_with(&a);
        assert_eq!(b.iter().count(), 3);
        b.clear(0);
        assert!(!b.get(0));
        assert!(!b.is_empty());
    }
}
