// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Growable sequences of object slots.
//!
//! A sequence owns one reference to every non-null element.

use std::vec::Vec;

use crate::heap::{Heap, HeapError, ObjRef};

/// Sequence payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Seq {
    items: Vec<Option<ObjRef>>,
}

impl Seq {
    /// The elements.
    #[must_use]
    pub fn items(&self) -> &[Option<ObjRef>] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut [Option<ObjRef>] {
        &mut self.items
    }

    pub(crate) fn from_owned(items: Vec<Option<ObjRef>>) -> Self {
        Self { items }
    }

    fn index(&self, i: i64) -> Result<usize, HeapError> {
        usize::try_from(i)
            .ok()
            .filter(|&i| i < self.items.len())
            .ok_or(HeapError::OutOfBounds {
                index: i,
                len: self.items.len(),
            })
    }
}

impl Heap {
    /// Allocates an empty sequence.
    pub fn seq_new(&mut self) -> ObjRef {
        self.alloc(Seq::default())
    }

    /// Allocates an empty sequence with room for `cap` elements.
    pub fn seq_with_capacity(&mut self, cap: usize) -> ObjRef {
        self.alloc(Seq {
            items: Vec::with_capacity(cap),
        })
    }

    /// Number of elements.
    pub fn seq_len(&self, s: ObjRef) -> Result<usize, HeapError> {
        Ok(self.borrow::<Seq>(s)?.items.len())
    }

    /// Appends `v`, retaining it.
    pub fn seq_push(&mut self, s: ObjRef, v: Option<ObjRef>) -> Result<(), HeapError> {
        self.borrow::<Seq>(s)?;
        self.retain(v)?;
        self.borrow_mut::<Seq>(s)?.items.push(v);
        Ok(())
    }

    /// Removes the last element. The caller receives the sequence's reference to it.
    pub fn seq_pop(&mut self, s: ObjRef) -> Result<Option<ObjRef>, HeapError> {
        let seq = self.borrow_mut::<Seq>(s)?;
        seq.items.pop().ok_or(HeapError::OutOfBounds { index: 0, len: 0 })
    }

    /// Element `i` (borrowed; retain to keep it).
    pub fn seq_get(&self, s: ObjRef, i: i64) -> Result<Option<ObjRef>, HeapError> {
        let seq = self.borrow::<Seq>(s)?;
        Ok(seq.items[seq.index(i)?])
    }

    /// Replaces element `i`, retaining the new value and releasing the old one.
    pub fn seq_set(&mut self, s: ObjRef, i: i64, v: Option<ObjRef>) -> Result<(), HeapError> {
        let idx = self.borrow::<Seq>(s)?.index(i)?;
        self.retain(v)?;
        let old = core::mem::replace(&mut self.borrow_mut::<Seq>(s)?.items[idx], v);
        self.release(old)?;
        Ok(())
    }
}
