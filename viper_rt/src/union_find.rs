// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Disjoint-set forest with path compression and union by rank.

use std::vec::Vec;

/// Union-find payload over elements `0..n`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
    size: Vec<usize>,
    count: usize,
}

impl UnionFind {
    /// `n` singleton sets.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: std::vec![0; n],
            size: std::vec![1; n],
            count: n,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Returns `true` when there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Representative of `x`'s set; `None` when out of range.
    pub fn find(&mut self, x: usize) -> Option<usize> {
        if x >= self.parent.len() {
            return None;
        }
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        Some(root)
    }

    /// Merges the sets of `x` and `y`. Returns `true` if they were distinct.
    pub fn union(&mut self, x: usize, y: usize) -> bool {
        let (Some(a), Some(b)) = (self.find(x), self.find(y)) else {
            return false;
        };
        if a == b {
            return false;
        }
        let (hi, lo) = if self.rank[a] >= self.rank[b] { (a, b) } else { (b, a) };
        self.parent[lo] = hi;
        self.size[hi] += self.size[lo];
        if self.rank[hi] == self.rank[lo] {
            self.rank[hi] = self.rank[hi].saturating_add(1);
        }
        self.count -= 1;
        true
    }

    /// Returns `true` if `x` and `y` share a set.
    pub fn connected(&mut self, x: usize, y: usize) -> bool {
        matches!((self.find(x), self.find(y)), (Some(a), Some(b)) if a == b)
    }

    /// Number of disjoint sets.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Size of `x`'s set (0 when out of range).
    pub fn set_size(&mut self, x: usize) -> usize {
        self.find(x).map_or(0, |r| self.size[r])
    }

    /// Back to all singletons.
    pub fn reset(&mut self) {
        *self = Self::new(self.parent.len());
    }
}
