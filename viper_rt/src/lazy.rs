// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deferred computations evaluated at most once.
//!
//! A lazy owns its dependencies (objects the supplier reads) until it is evaluated; afterwards it
//! owns only the cached value.

use std::fmt;
use std::vec::Vec;

use crate::heap::{Heap, HeapError, ObjRef};

/// Computes a lazy's value. The returned reference is owned by the lazy.
pub type Supplier = Box<dyn FnOnce(&mut Heap) -> Result<Option<ObjRef>, HeapError>>;

/// Lazy payload.
#[derive(Default)]
pub struct Lazy {
    supplier: Option<Supplier>,
    deps: Vec<ObjRef>,
    value: Option<ObjRef>,
    evaluated: bool,
}

impl Lazy {
    /// Returns `true` once the value has been computed.
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.evaluated
    }

    pub(crate) fn owned_refs(&self, out: &mut Vec<ObjRef>) {
        out.extend(self.deps.iter().copied());
        out.extend(self.value);
    }
}

impl fmt::Debug for Lazy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("evaluated", &self.evaluated)
            .field("deps", &self.deps)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

impl Heap {
    /// A lazy whose supplier reads `deps`; each dependency is retained until evaluation.
    pub fn lazy_new(
        &mut self,
        deps: &[ObjRef],
        supplier: impl FnOnce(&mut Self) -> Result<Option<ObjRef>, HeapError> + 'static,
    ) -> Result<ObjRef, HeapError> {
        for &d in deps {
            self.retain(d)?;
        }
        Ok(self.alloc(Lazy {
            supplier: Some(Box::new(supplier)),
            deps: deps.to_vec(),
            value: None,
            evaluated: false,
        }))
    }

    /// An already-evaluated lazy holding `value` (retained).
    pub fn lazy_of(&mut self, value: Option<ObjRef>) -> Result<ObjRef, HeapError> {
        self.retain(value)?;
        Ok(self.alloc(Lazy {
            supplier: None,
            deps: Vec::new(),
            value,
            evaluated: true,
        }))
    }

    /// Returns `true` once `l` has been computed.
    pub fn lazy_is_evaluated(&self, l: ObjRef) -> Result<bool, HeapError> {
        Ok(self.borrow::<Lazy>(l)?.evaluated)
    }

    /// Forces `l`, computing its value on first access. The result is borrowed from the lazy.
    pub fn lazy_get(&mut self, l: ObjRef) -> Result<Option<ObjRef>, HeapError> {
        let lazy = self.borrow_mut::<Lazy>(l)?;
        if lazy.evaluated {
            return Ok(lazy.value);
        }
        let supplier = lazy
            .supplier
            .take()
            .ok_or(HeapError::BadArgument("lazy forced while being evaluated"))?;
        let value = supplier(self)?;
        let lazy = self.borrow_mut::<Lazy>(l)?;
        lazy.value = value;
        lazy.evaluated = true;
        let deps = core::mem::take(&mut lazy.deps);
        for d in deps {
            self.release(d)?;
        }
        Ok(value)
    }

    /// A lazy computing `f` over the value of `src`.
    pub fn lazy_map(
        &mut self,
        src: ObjRef,
        f: impl FnOnce(&mut Self, Option<ObjRef>) -> Result<Option<ObjRef>, HeapError> + 'static,
    ) -> Result<ObjRef, HeapError> {
        self.lazy_new(&[src], move |heap| {
            let v = heap.lazy_get(src)?;
            f(heap, v)
        })
    }

    /// A lazy forcing the lazy returned by `f` over the value of `src`.
    pub fn lazy_flat_map(
        &mut self,
        src: ObjRef,
        f: impl FnOnce(&mut Self, Option<ObjRef>) -> Result<ObjRef, HeapError> + 'static,
    ) -> Result<ObjRef, HeapError> {
        self.lazy_new(&[src], move |heap| {
            let v = heap.lazy_get(src)?;
            let inner = f(heap, v)?;
            let r = heap.lazy_get(inner)?;
            heap.retain(r)?;
            heap.release(inner)?;
            Ok(r)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn computes_exactly_once() {
        let mut heap = Heap::new();
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let l = heap
            .lazy_new(&[], move |heap| {
                c.set(c.get() + 1);
                Ok(Some(heap.str_from("v")))
            })
            .unwrap();
        assert!(!heap.lazy_is_evaluated(l).unwrap());
        let a = heap.lazy_get(l).unwrap();
        let b = heap.lazy_get(l).unwrap();
        assert_eq!(a, b);
        assert_eq!(calls.get(), 1);
        assert!(heap.lazy_is_evaluated(l).unwrap());
        heap.release(l).unwrap();
        assert_eq!(heap.live_objects(), 0, "cached value released with the lazy");
    }

    #[test]
    fn map_and_flat_map_chain() {
        let mut heap = Heap::new();
        let s = heap.str_from("ab");
        let base = heap.lazy_of(Some(s)).unwrap();
        heap.release(s).unwrap();
        let upper = heap
            .lazy_map(base, |heap, v| {
                let v = v.ok_or(HeapError::Null)?;
                heap.str_ucase(v).map(Some)
            })
            .unwrap();
        let doubled = heap
            .lazy_flat_map(upper, |heap, v| {
                let v = v.ok_or(HeapError::Null)?;
                let twice = heap.str_concat(v, v)?;
                let l = heap.lazy_of(Some(twice))?;
                heap.release(twice)?;
                Ok(l)
            })
            .unwrap();
        let out = heap.lazy_get(doubled).unwrap().unwrap();
        assert_eq!(heap.str_bytes(out).unwrap(), b"ABAB");
        heap.release(doubled).unwrap();
        heap.release(upper).unwrap();
        heap.release(base).unwrap();
        assert_eq!(heap.live_objects(), 0);
    }
}
