// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Immutable string sets and string-keyed maps built from sequences.
//!
//! Neither type has mutating operations. Building a frozen map from keys with duplicates keeps
//! the first position of each key and the last value written for it; `merge` follows the same
//! rule, with the right-hand map winning.

use std::vec::Vec;

use hashbrown::HashMap;

use crate::heap::{Heap, HeapError, ObjRef};
use crate::seq::Seq;
use crate::string::RtString;

/// Frozen set payload: sorted, deduplicated keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrozenSet {
    keys: Vec<Box<[u8]>>,
}

impl FrozenSet {
    /// Builds a set from arbitrary keys.
    #[must_use]
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut keys: Vec<Box<[u8]>> = keys.into_iter().map(Into::into).collect();
        keys.sort_unstable();
        keys.dedup();
        Self { keys }
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Membership test.
    #[must_use]
    pub fn has(&self, key: &[u8]) -> bool {
        self.keys.binary_search_by(|k| (**k).cmp(key)).is_ok()
    }

    /// Keys in byte order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.keys.iter().map(|k| &**k)
    }

    /// Union.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self::from_keys(self.iter().chain(other.iter()))
    }
}

/// Frozen map payload: entries in first-insertion order. Owns a reference per non-null value.
#[derive(Clone, Debug, Default)]
pub struct FrozenMap {
    entries: Vec<(Box<[u8]>, Option<ObjRef>)>,
    /// Key to position in `entries`.
    index: HashMap<Box<[u8]>, usize>,
}

impl PartialEq for FrozenMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for FrozenMap {}

impl FrozenMap {
    /// The entries.
    #[must_use]
    pub fn entries(&self) -> &[(Box<[u8]>, Option<ObjRef>)] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value for `key`; `None` when absent.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Option<ObjRef>> {
        let &i = self.index.get(key)?;
        self.entries.get(i).map(|(_, v)| *v)
    }

    /// Builds from `(key, value)` pairs with last-value-wins. Values are not retained here.
    fn from_pairs(pairs: impl IntoIterator<Item = (Box<[u8]>, Option<ObjRef>)>) -> Self {
        let mut entries: Vec<(Box<[u8]>, Option<ObjRef>)> = Vec::new();
        let mut index: HashMap<Box<[u8]>, usize> = HashMap::new();
        for (k, v) in pairs {
            match index.get(&k) {
                Some(&i) => entries[i].1 = v,
                None => {
                    index.insert(k.clone(), entries.len());
                    entries.push((k, v));
                }
            }
        }
        Self { entries, index }
    }
}

impl Heap {
    fn string_keys(&self, seq: ObjRef) -> Result<Vec<Box<[u8]>>, HeapError> {
        let items = self.borrow::<Seq>(seq)?.items();
        items
            .iter()
            .map(|item| -> Result<Box<[u8]>, HeapError> {
                let s = item.ok_or(HeapError::Null)?;
                Ok(self.str_bytes(s)?.into())
            })
            .collect()
    }

    /// Builds a frozen set from a sequence of strings.
    pub fn frozen_set_from_seq(&mut self, seq: ObjRef) -> Result<ObjRef, HeapError> {
        let keys = self.string_keys(seq)?;
        Ok(self.alloc(FrozenSet::from_keys(keys.iter().map(|k| &**k))))
    }

    /// A new sequence of fresh strings holding the set's keys in byte order.
    pub fn frozen_set_items(&mut self, s: ObjRef) -> Result<ObjRef, HeapError> {
        let keys: Vec<Vec<u8>> = self
            .borrow::<FrozenSet>(s)?
            .iter()
            .map(<[u8]>::to_vec)
            .collect();
        let items = keys
            .into_iter()
            .map(|k| Some(self.alloc(RtString::from(k))))
            .collect();
        Ok(self.alloc(Seq::from_owned(items)))
    }

    /// Builds a frozen map from parallel key and value sequences.
    pub fn frozen_map_from_seqs(
        &mut self,
        keys: ObjRef,
        values: ObjRef,
    ) -> Result<ObjRef, HeapError> {
        let ks = self.string_keys(keys)?;
        let vs = self.borrow::<Seq>(values)?.items().to_vec();
        if ks.len() != vs.len() {
            return Err(HeapError::BadArgument("keys and values differ in length"));
        }
        let map = FrozenMap::from_pairs(ks.into_iter().zip(vs));
        for (_, v) in &map.entries {
            self.retain(*v)?;
        }
        Ok(self.alloc(map))
    }

    /// Value for `key` (borrowed).
    pub fn frozen_map_get(&self, m: ObjRef, key: &[u8]) -> Result<Option<ObjRef>, HeapError> {
        Ok(self.borrow::<FrozenMap>(m)?.get(key).flatten())
    }

    /// A new sequence of fresh key strings, in entry order.
    pub fn frozen_map_keys(&mut self, m: ObjRef) -> Result<ObjRef, HeapError> {
        let keys: Vec<Box<[u8]>> = self
            .borrow::<FrozenMap>(m)?
            .entries
            .iter()
            .map(|(k, _)| k.clone())
            .collect();
        let items = keys
            .iter()
            .map(|k| Some(self.alloc(RtString::from(&**k))))
            .collect();
        Ok(self.alloc(Seq::from_owned(items)))
    }

    /// A new sequence of the values (each retained), in entry order.
    pub fn frozen_map_values(&mut self, m: ObjRef) -> Result<ObjRef, HeapError> {
        let values: Vec<Option<ObjRef>> = self
            .borrow::<FrozenMap>(m)?
            .entries
            .iter()
            .map(|(_, v)| *v)
            .collect();
        for &v in &values {
            self.retain(v)?;
        }
        Ok(self.alloc(Seq::from_owned(values)))
    }

    /// A new frozen map holding `a`'s entries overwritten by `b`'s.
    pub fn frozen_map_merge(&mut self, a: ObjRef, b: ObjRef) -> Result<ObjRef, HeapError> {
        let left = self.borrow::<FrozenMap>(a)?.entries.iter().cloned();
        let right = self.borrow::<FrozenMap>(b)?.entries.iter().cloned();
        let map = FrozenMap::from_pairs(left.chain(right));
        for (_, v) in &map.entries {
            self.retain(*v)?;
        }
        Ok(self.alloc(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq_of_strings(heap: &mut Heap, items: &[&str]) -> ObjRef {
        let seq = heap.seq_new();
        for s in items {
            let o = heap.str_from(s);
            heap.seq_push(seq, Some(o)).unwrap();
            heap.release(o).unwrap();
        }
        seq
    }

    #[test]
    fn frozen_set_dedups_and_merges() {
        let mut heap = Heap::new();
        let seq = seq_of_strings(&mut heap, &["b", "a", "b"]);
        let fs = heap.frozen_set_from_seq(seq).unwrap();
        let set = heap.borrow::<FrozenSet>(fs).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.has(b"a"));
        assert!(!set.has(b"c"));
        let other = FrozenSet::from_keys([&b"c"[..]]);
        assert_eq!(set.merge(&other).len(), 3);
    }

    #[test]
    fn frozen_map_last_key_wins_and_round_trips() {
        let mut heap = Heap::new();
        let keys = seq_of_strings(&mut heap, &["x", "y", "x"]);
        let values = seq_of_strings(&mut heap, &["1", "2", "3"]);
        let fm = heap.frozen_map_from_seqs(keys, values).unwrap();
        assert_eq!(heap.borrow::<FrozenMap>(fm).unwrap().len(), 2);
        let x = heap.frozen_map_get(fm, b"x").unwrap().unwrap();
        assert_eq!(heap.str_bytes(x).unwrap(), b"3");

        let k2 = heap.frozen_map_keys(fm).unwrap();
        let v2 = heap.frozen_map_values(fm).unwrap();
        let rebuilt = heap.frozen_map_from_seqs(k2, v2).unwrap();
        assert_eq!(
            heap.borrow::<FrozenMap>(rebuilt).unwrap(),
            heap.borrow::<FrozenMap>(fm).unwrap()
        );
    }

    #[test]
    fn merge_prefers_the_right_map() {
        let mut heap = Heap::new();
        let k1 = seq_of_strings(&mut heap, &["a", "b"]);
        let v1 = seq_of_strings(&mut heap, &["1", "2"]);
        let k2 = seq_of_strings(&mut heap, &["b", "c"]);
        let v2 = seq_of_strings(&mut heap, &["20", "30"]);
        let a = heap.frozen_map_from_seqs(k1, v1).unwrap();
        let b = heap.frozen_map_from_seqs(k2, v2).unwrap();
        let m = heap.frozen_map_merge(a, b).unwrap();
        let keys: Vec<&[u8]> = heap
            .borrow::<FrozenMap>(m)
            .unwrap()
            .entries()
            .iter()
            .map(|(k, _)| &**k)
            .collect();
        assert_eq!(keys, [&b"a"[..], b"b", b"c"]);
        let bv = heap.frozen_map_get(m, b"b").unwrap().unwrap();
        assert_eq!(heap.str_bytes(bv).unwrap(), b"20");
        let short = seq_of_strings(&mut heap, &["only"]);
        assert!(heap.frozen_map_from_seqs(short, v1).is_err());
    }

    #[test]
    fn large_maps_keep_first_position_and_last_value() {
        let n = 20_000_u32;
        let pairs = (0..2 * n).map(|i| {
            let key = std::format!("k{}", i % n).into_bytes().into_boxed_slice();
            (key, None)
        });
        let map = FrozenMap::from_pairs(pairs);
        assert_eq!(map.len(), n as usize);
        assert_eq!(&*map.entries()[7].0, b"k7");
        assert_eq!(map.get(b"k19999"), Some(None));
        assert_eq!(map.get(b"k20000"), None);
        assert_eq!(map.get(b""), None);
    }
}
