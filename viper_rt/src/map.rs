// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! String-keyed hash maps.
//!
//! Open addressing with linear probing over FNV-1a hashes. Removal leaves a tombstone so probe
//! chains stay intact; tombstones count toward the load factor and are dropped on rehash.
//! The map copies its keys and owns one reference to every non-null value.

use std::vec::Vec;

use crate::heap::{Heap, HeapError, ObjRef};
use crate::seq::Seq;
use crate::string::RtString;

const MIN_CAPACITY: usize = 16;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        h ^= u64::from(b);
        h = h.wrapping_mul(0x0100_0000_01b3);
    }
    h
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Bucket {
    Empty,
    Tombstone,
    Full {
        key: Box<[u8]>,
        value: Option<ObjRef>,
    },
}

/// Map payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrMap {
    buckets: Vec<Bucket>,
    len: usize,
    tombstones: usize,
}

impl Default for StrMap {
    fn default() -> Self {
        Self::new()
    }
}

impl StrMap {
    /// An empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: std::vec![Bucket::Empty; MIN_CAPACITY],
            len: 0,
            tombstones: 0,
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[allow(clippy::cast_possible_truncation, reason = "masked to the table size")]
    fn home(&self, key: &[u8]) -> usize {
        (fnv1a(key) as usize) & (self.buckets.len() - 1)
    }

    /// Slot holding `key`, if present.
    fn find(&self, key: &[u8]) -> Option<usize> {
        let mask = self.buckets.len() - 1;
        let mut i = self.home(key);
        for _ in 0..self.buckets.len() {
            match &self.buckets[i] {
                Bucket::Empty => return None,
                Bucket::Full { key: k, .. } if **k == *key => return Some(i),
                _ => i = (i + 1) & mask,
            }
        }
        None
    }

    fn grow_if_needed(&mut self) {
        if (self.len + self.tombstones + 1) * 4 <= self.buckets.len() * 3 {
            return;
        }
        let cap = if self.len * 2 >= self.buckets.len() {
            self.buckets.len() * 2
        } else {
            self.buckets.len()
        };
        let old = core::mem::replace(&mut self.buckets, std::vec![Bucket::Empty; cap]);
        self.len = 0;
        self.tombstones = 0;
        for b in old {
            if let Bucket::Full { key, value } = b {
                self.insert_new(key, value);
            }
        }
    }

    fn insert_new(&mut self, key: Box<[u8]>, value: Option<ObjRef>) {
        let mask = self.buckets.len() - 1;
        let mut i = self.home(&key);
        loop {
            match self.buckets[i] {
                Bucket::Empty => break,
                Bucket::Tombstone => {
                    self.tombstones -= 1;
                    break;
                }
                Bucket::Full { .. } => i = (i + 1) & mask,
            }
        }
        self.buckets[i] = Bucket::Full { key, value };
        self.len += 1;
    }

    /// Inserts or overwrites. Returns the previous value when the key existed.
    pub fn insert(&mut self, key: &[u8], value: Option<ObjRef>) -> Option<Option<ObjRef>> {
        if let Some(i) = self.find(key)
            && let Bucket::Full { value: v, .. } = &mut self.buckets[i]
        {
            return Some(core::mem::replace(v, value));
        }
        self.grow_if_needed();
        self.insert_new(key.into(), value);
        None
    }

    /// Value for `key`; `None` when absent.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Option<ObjRef>> {
        let i = self.find(key)?;
        match &self.buckets[i] {
            Bucket::Full { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &[u8]) -> Option<Option<ObjRef>> {
        let i = self.find(key)?;
        match core::mem::replace(&mut self.buckets[i], Bucket::Tombstone) {
            Bucket::Full { value, .. } => {
                self.len -= 1;
                self.tombstones += 1;
                Some(value)
            }
            other => {
                self.buckets[i] = other;
                None
            }
        }
    }

    /// Iterates entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], Option<ObjRef>)> + '_ {
        self.buckets.iter().filter_map(|b| match b {
            Bucket::Full { key, value } => Some((&**key, *value)),
            _ => None,
        })
    }

    fn take_all(&mut self) -> Vec<Option<ObjRef>> {
        let values = self.iter().map(|(_, v)| v).collect();
        *self = Self::new();
        values
    }
}

impl Heap {
    /// Allocates an empty map.
    pub fn map_new(&mut self) -> ObjRef {
        self.alloc(StrMap::new())
    }

    /// Number of entries.
    pub fn map_len(&self, m: ObjRef) -> Result<usize, HeapError> {
        Ok(self.borrow::<StrMap>(m)?.len())
    }

    /// Sets `key` to `v`, retaining `v` and releasing any previous value.
    pub fn map_set(&mut self, m: ObjRef, key: &[u8], v: Option<ObjRef>) -> Result<(), HeapError> {
        self.borrow::<StrMap>(m)?;
        self.retain(v)?;
        if let Some(old) = self.borrow_mut::<StrMap>(m)?.insert(key, v) {
            self.release(old)?;
        }
        Ok(())
    }

    /// Sets `key` only if absent. Returns `true` when inserted.
    pub fn map_set_if_missing(
        &mut self,
        m: ObjRef,
        key: &[u8],
        v: Option<ObjRef>,
    ) -> Result<bool, HeapError> {
        if self.map_has(m, key)? {
            return Ok(false);
        }
        self.map_set(m, key, v)?;
        Ok(true)
    }

    /// Value for `key` (borrowed), `None` when absent or null.
    pub fn map_get(&self, m: ObjRef, key: &[u8]) -> Result<Option<ObjRef>, HeapError> {
        Ok(self.borrow::<StrMap>(m)?.get(key).flatten())
    }

    /// Value for `key`, or `fallback` when absent. Never mutates the map.
    pub fn map_get_or(
        &self,
        m: ObjRef,
        key: &[u8],
        fallback: Option<ObjRef>,
    ) -> Result<Option<ObjRef>, HeapError> {
        Ok(self.borrow::<StrMap>(m)?.get(key).unwrap_or(fallback))
    }

    /// Returns `true` if `key` is present.
    pub fn map_has(&self, m: ObjRef, key: &[u8]) -> Result<bool, HeapError> {
        Ok(self.borrow::<StrMap>(m)?.get(key).is_some())
    }

    /// Removes `key`, releasing its value. Returns `true` if it was present.
    pub fn map_remove(&mut self, m: ObjRef, key: &[u8]) -> Result<bool, HeapError> {
        match self.borrow_mut::<StrMap>(m)?.remove(key) {
            Some(v) => {
                self.release(v)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes every entry.
    pub fn map_clear(&mut self, m: ObjRef) -> Result<(), HeapError> {
        let values = self.borrow_mut::<StrMap>(m)?.take_all();
        for v in values {
            self.release(v)?;
        }
        Ok(())
    }

    /// A new sequence of fresh key strings.
    pub fn map_keys(&mut self, m: ObjRef) -> Result<ObjRef, HeapError> {
        let keys: Vec<Box<[u8]>> = self
            .borrow::<StrMap>(m)?
            .iter()
            .map(|(k, _)| k.into())
            .collect();
        let items = keys
            .iter()
            .map(|k| Some(self.alloc(RtString::from(&**k))))
            .collect();
        Ok(self.alloc(Seq::from_owned(items)))
    }

    /// A new sequence of the values (each retained).
    pub fn map_values(&mut self, m: ObjRef) -> Result<ObjRef, HeapError> {
        let values: Vec<Option<ObjRef>> =
            self.borrow::<StrMap>(m)?.iter().map(|(_, v)| v).collect();
        for &v in &values {
            self.retain(v)?;
        }
        Ok(self.alloc(Seq::from_owned(values)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tombstones_keep_probe_chains_intact() {
        let mut m = StrMap::new();
        for i in 0..100_u32 {
            m.insert(std::format!("k{i}").as_bytes(), None);
        }
        for i in (0..100_u32).step_by(2) {
            assert!(m.remove(std::format!("k{i}").as_bytes()).is_some());
        }
        assert_eq!(m.len(), 50);
        for i in 0..100_u32 {
            let present = m.get(std::format!("k{i}").as_bytes()).is_some();
            assert_eq!(present, i % 2 == 1, "key k{i}");
        }
        for i in 0..100_u32 {
            m.insert(std::format!("k{i}").as_bytes(), None);
        }
        assert_eq!(m.len(), 100);
        assert!(m.buckets.len().is_power_of_two());
    }

    #[test]
    fn map_owns_values_and_copies_keys() {
        let mut heap = Heap::new();
        let m = heap.map_new();
        let v1 = heap.str_from("one");
        let v2 = heap.str_from("two");
        heap.map_set(m, b"a", Some(v1)).unwrap();
        assert_eq!(heap.refcount(v1).unwrap(), 2);
        heap.map_set(m, b"a", Some(v2)).unwrap();
        assert_eq!(heap.refcount(v1).unwrap(), 1, "overwrite releases the old value");
        assert!(!heap.map_set_if_missing(m, b"a", Some(v1)).unwrap());
        assert!(heap.map_set_if_missing(m, b"b", Some(v1)).unwrap());
        assert_eq!(heap.map_get(m, b"a").unwrap(), Some(v2));
        assert_eq!(heap.map_get_or(m, b"zz", Some(v1)).unwrap(), Some(v1));
        assert_eq!(heap.map_len(m).unwrap(), 2);

        assert!(heap.map_remove(m, b"b").unwrap());
        assert!(!heap.map_remove(m, b"b").unwrap());
        assert_eq!(heap.refcount(v1).unwrap(), 1);

        let keys = heap.map_keys(m).unwrap();
        let k0 = heap.seq_get(keys, 0).unwrap().unwrap();
        assert_eq!(heap.str_bytes(k0).unwrap(), b"a");
        let values = heap.map_values(m).unwrap();
        assert_eq!(heap.refcount(v2).unwrap(), 3);
        heap.release(values).unwrap();
        heap.release(keys).unwrap();

        heap.map_clear(m).unwrap();
        assert_eq!(heap.refcount(v2).unwrap(), 1);
        assert!(!heap.map_has(m, b"a").unwrap());
    }
}
