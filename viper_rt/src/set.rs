// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Identity sets of objects and bags of strings.

use hashbrown::HashSet;
use std::vec::Vec;

use crate::heap::{Heap, HeapError, ObjRef};
use crate::seq::Seq;
use crate::string::RtString;

/// Set of objects compared by identity. Owns one reference per member.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentitySet {
    members: HashSet<ObjRef>,
}

impl IdentitySet {
    /// Members in handle order.
    #[must_use]
    pub fn sorted(&self) -> Vec<ObjRef> {
        let mut v: Vec<ObjRef> = self.members.iter().copied().collect();
        v.sort_unstable();
        v
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = ObjRef> + '_ {
        self.members.iter().copied()
    }
}

/// Set of strings by content. Keys are copied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bag {
    keys: HashSet<Box<[u8]>>,
}

impl Bag {
    /// Adds `key`. Returns `true` if it was new.
    pub fn put(&mut self, key: &[u8]) -> bool {
        self.keys.insert(key.into())
    }

    /// Removes `key`. Returns `true` if it was present.
    pub fn drop_key(&mut self, key: &[u8]) -> bool {
        self.keys.remove(key)
    }

    /// Membership test.
    #[must_use]
    pub fn has(&self, key: &[u8]) -> bool {
        self.keys.contains(key)
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

    /// Keys in byte order.
    #[must_use]
    pub fn sorted(&self) -> Vec<&[u8]> {
        let mut v: Vec<&[u8]> = self.keys.iter().map(|k| &**k).collect();
        v.sort_unstable();
        v
    }

    /// Union.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            keys: self.keys.union(&other.keys).cloned().collect(),
        }
    }

    /// Intersection.
    #[must_use]
    pub fn common(&self, other: &Self) -> Self {
        Self {
            keys: self.keys.intersection(&other.keys).cloned().collect(),
        }
    }

    /// Keys of `self` missing from `other`.
    #[must_use]
    pub fn diff(&self, other: &Self) -> Self {
        Self {
            keys: self.keys.difference(&other.keys).cloned().collect(),
        }
    }
}

impl Heap {
    /// Allocates an empty identity set.
    pub fn set_new(&mut self) -> ObjRef {
        self.alloc(IdentitySet::default())
    }

    /// Adds `o`, retaining it when new. Returns `true` if added.
    pub fn set_add(&mut self, s: ObjRef, o: ObjRef) -> Result<bool, HeapError> {
        if self.borrow::<IdentitySet>(s)?.members.contains(&o) {
            return Ok(false);
        }
        self.retain(o)?;
        self.borrow_mut::<IdentitySet>(s)?.members.insert(o);
        Ok(true)
    }

    /// Removes `o`, releasing it. Returns `true` if it was a member.
    pub fn set_remove(&mut self, s: ObjRef, o: ObjRef) -> Result<bool, HeapError> {
        if !self.borrow_mut::<IdentitySet>(s)?.members.remove(&o) {
            return Ok(false);
        }
        self.release(o)?;
        Ok(true)
    }

    /// Membership test.
    pub fn set_has(&self, s: ObjRef, o: ObjRef) -> Result<bool, HeapError> {
        Ok(self.borrow::<IdentitySet>(s)?.members.contains(&o))
    }

    /// Number of members.
    pub fn set_len(&self, s: ObjRef) -> Result<usize, HeapError> {
        Ok(self.borrow::<IdentitySet>(s)?.members.len())
    }

    /// A new sequence of the members (each retained), in handle order.
    pub fn set_items(&mut self, s: ObjRef) -> Result<ObjRef, HeapError> {
        let members = self.borrow::<IdentitySet>(s)?.sorted();
        for &m in &members {
            self.retain(m)?;
        }
        Ok(self.alloc(Seq::from_owned(members.into_iter().map(Some).collect())))
    }

    /// Allocates an empty bag.
    pub fn bag_new(&mut self) -> ObjRef {
        self.alloc(Bag::default())
    }

    /// A new sequence of fresh strings holding the bag's keys in byte order.
    pub fn bag_items(&mut self, b: ObjRef) -> Result<ObjRef, HeapError> {
        let keys: Vec<Vec<u8>> = self
            .borrow::<Bag>(b)?
            .sorted()
            .into_iter()
            .map(<[u8]>::to_vec)
            .collect();
        let items = keys
            .into_iter()
            .map(|k| Some(self.alloc(RtString::from(k))))
            .collect();
        Ok(self.alloc(Seq::from_owned(items)))
    }

    /// Allocates a bag combining `a` and `b` with `op`.
    pub fn bag_combine(
        &mut self,
        a: ObjRef,
        b: ObjRef,
        op: fn(&Bag, &Bag) -> Bag,
    ) -> Result<ObjRef, HeapError> {
        let out = op(self.borrow::<Bag>(a)?, self.borrow::<Bag>(b)?);
        Ok(self.alloc(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_set_retains_members_once() {
        let mut heap = Heap::new();
        let s = heap.set_new();
        let a = heap.str_from("x");
        let b = heap.str_from("x");
        assert!(heap.set_add(s, a).unwrap());
        assert!(!heap.set_add(s, a).unwrap());
        assert!(heap.set_add(s, b).unwrap(), "equal contents, distinct identity");
        assert_eq!(heap.refcount(a).unwrap(), 2);
        assert_eq!(heap.set_len(s).unwrap(), 2);
        assert!(heap.set_remove(s, a).unwrap());
        assert_eq!(heap.refcount(a).unwrap(), 1);
        assert!(!heap.set_has(s, a).unwrap());
        heap.release(s).unwrap();
        assert_eq!(heap.refcount(b).unwrap(), 1);
    }

    #[test]
    fn bag_algebra() {
        let mut x = Bag::default();
        let mut y = Bag::default();
        for k in ["a", "b", "c"] {
            x.put(k.as_bytes());
        }
        for k in ["b", "c", "d"] {
            y.put(k.as_bytes());
        }
        assert!(!x.put(b"a"));
        assert_eq!(x.merge(&y).sorted(), [&b"a"[..], b"b", b"c", b"d"]);
        assert_eq!(x.common(&y).sorted(), [&b"b"[..], b"c"]);
        assert_eq!(x.diff(&y).sorted(), [&b"a"[..]]);
        assert!(x.drop_key(b"a"));
        assert!(!x.has(b"a"));

        let mut heap = Heap::new();
        let bx = heap.alloc(x);
        let by = heap.alloc(y);
        let u = heap.bag_combine(bx, by, Bag::merge).unwrap();
        assert_eq!(heap.borrow::<Bag>(u).unwrap().len(), 3);
        let items = heap.bag_items(u).unwrap();
        let first = heap.seq_get(items, 0).unwrap().unwrap();
        assert_eq!(heap.str_bytes(first).unwrap(), b"b");
    }
}
