// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! String-to-count maps. Counts are always positive; a key whose count reaches 0 is removed.

use hashbrown::HashMap;
use std::vec::Vec;

use crate::heap::{Heap, HeapError, ObjRef};
use crate::seq::Seq;
use crate::string::RtString;

/// Count map payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CountMap {
    counts: HashMap<Box<[u8]>, i64>,
    total: i64,
}

impl CountMap {
    /// An empty count map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for `key` (0 when absent).
    #[must_use]
    pub fn get(&self, key: &[u8]) -> i64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Sets the count for `key`; `n <= 0` removes it. Returns the stored count.
    pub fn set(&mut self, key: &[u8], n: i64) -> i64 {
        let old = self.get(key);
        if n <= 0 {
            self.counts.remove(key);
            self.total -= old;
            return 0;
        }
        self.counts.insert(key.into(), n);
        self.total += n - old;
        n
    }

    /// Adds one.
    pub fn inc(&mut self, key: &[u8]) -> i64 {
        self.inc_by(key, 1)
    }

    /// Adds `n` (which may be negative).
    pub fn inc_by(&mut self, key: &[u8], n: i64) -> i64 {
        let next = self.get(key).saturating_add(n);
        self.set(key, next)
    }

    /// Subtracts one, removing the key at 0.
    pub fn dec(&mut self, key: &[u8]) -> i64 {
        self.inc_by(key, -1)
    }

    /// The `n` most frequent keys, highest count first; ties in byte order.
    #[must_use]
    pub fn most_common(&self, n: usize) -> Vec<(&[u8], i64)> {
        let mut all: Vec<(&[u8], i64)> = self.counts.iter().map(|(k, v)| (&**k, *v)).collect();
        all.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        all.truncate(n);
        all
    }
}

impl Heap {
    /// A new sequence of fresh strings: the `n` most frequent keys of count map `c`.
    pub fn countmap_most_common(&mut self, c: ObjRef, n: usize) -> Result<ObjRef, HeapError> {
        let keys: Vec<Vec<u8>> = self
            .borrow::<CountMap>(c)?
            .most_common(n)
            .into_iter()
            .map(|(k, _)| k.to_vec())
            .collect();
        let items = keys
            .into_iter()
            .map(|k| Some(self.alloc(RtString::from(k))))
            .collect();
        Ok(self.alloc(Seq::from_owned(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_track_total_and_drop_zeroes() {
        let mut c = CountMap::new();
        assert_eq!(c.inc(b"a"), 1);
        assert_eq!(c.inc_by(b"a", 4), 5);
        assert_eq!(c.inc(b"b"), 1);
        assert_eq!(c.total(), 6);
        assert_eq!(c.dec(b"b"), 0);
        assert_eq!(c.len(), 1, "zero count removes the key");
        assert_eq!(c.set(b"a", 0), 0);
        assert!(c.is_empty());
        assert_eq!(c.total(), 0);
    }

    #[test]
    fn most_common_orders_by_count_then_key() {
        let mut c = CountMap::new();
        c.set(b"x", 2);
        c.set(b"y", 5);
        c.set(b"a", 2);
        c.set(b"z", 1);
        let top: Vec<&[u8]> = c.most_common(3).into_iter().map(|(k, _)| k).collect();
        assert_eq!(top, [&b"y"[..], b"a", b"x"]);

        let mut heap = Heap::new();
        let o = heap.alloc(c);
        let seq = heap.countmap_most_common(o, 1).unwrap();
        let first = heap.seq_get(seq, 0).unwrap().unwrap();
        assert_eq!(heap.str_bytes(first).unwrap(), b"y");
    }
}
