// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reference-counted object heap.
//!
//! Objects live in a slot table and are addressed by [`ObjRef`] handles (slot index plus
//! generation). Every slot carries a [`Header`] with the class tag and the strong/weak/aux
//! counters.
//!
//! ## Ownership
//!
//! - [`Heap::alloc`] returns a handle owning one strong reference.
//! - [`Heap::retain`] adds a reference; [`Heap::release`] drops one. When the strong count reaches
//!   zero the slot's finalizer (if any) runs exactly once, owned children are released, and the
//!   slot is recycled with a bumped generation so stale handles are detected.
//! - Interned strings carry [`STATIC_REFCOUNT`]; retain/release on them are no-ops.
//! - [`WeakRef`] is a non-owning back edge. It resolves through the slot table and fails once the
//!   target is gone.

use hashbrown::HashMap;
use std::fmt;
use std::vec::Vec;

use crate::clock::{Countdown, Stopwatch, Timer};
use crate::countmap::CountMap;
use crate::exception::Exception;
use crate::frozen::{FrozenMap, FrozenSet};
use crate::lazy::Lazy;
use crate::map::StrMap;
use crate::quadtree::Quadtree;
use crate::seq::Seq;
use crate::set::{Bag, IdentitySet};
use crate::string::RtString;
use crate::trap::{RtTrap, TrapKind};
use crate::union_find::UnionFind;

/// Strong count used by immortal (interned) objects.
pub const STATIC_REFCOUNT: u32 = u32::MAX;

/// Class tag stored in every object header.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

/// Class id of runtime strings.
pub const STRING_CLASS_ID: ClassId = ClassId(1);
/// Class id of sequences.
pub const SEQ_CLASS_ID: ClassId = ClassId(2);
/// Class id of string-keyed maps.
pub const MAP_CLASS_ID: ClassId = ClassId(3);
/// Class id of identity sets.
pub const SET_CLASS_ID: ClassId = ClassId(4);
/// Class id of string bags.
pub const BAG_CLASS_ID: ClassId = ClassId(5);
/// Class id of frozen sets.
pub const FROZEN_SET_CLASS_ID: ClassId = ClassId(6);
/// Class id of frozen maps.
pub const FROZEN_MAP_CLASS_ID: ClassId = ClassId(7);
/// Class id of count maps.
pub const COUNT_MAP_CLASS_ID: ClassId = ClassId(8);
/// Class id of runtime exceptions; subclasses use larger ids.
pub const RT_EXCEPTION_CLASS_ID: ClassId = ClassId(9);
/// Class id of lazies.
pub const LAZY_CLASS_ID: ClassId = ClassId(10);
/// Class id of union-find structures.
pub const UNION_FIND_CLASS_ID: ClassId = ClassId(11);
/// Class id of quadtrees.
pub const QUADTREE_CLASS_ID: ClassId = ClassId(12);
/// Class id of stopwatches.
pub const STOPWATCH_CLASS_ID: ClassId = ClassId(13);
/// Class id of periodic timers.
pub const TIMER_CLASS_ID: ClassId = ClassId(14);
/// Class id of countdowns.
pub const COUNTDOWN_CLASS_ID: ClassId = ClassId(15);

/// Handle to a heap object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef {
    index: u32,
    generation: u32,
}

impl ObjRef {
    /// Slot index (stable for the object's lifetime).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }
}

/// A non-owning handle; see [`Heap::upgrade`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct WeakRef {
    index: u32,
    generation: u32,
}

/// Per-object header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// Class tag.
    pub class_id: ClassId,
    /// Strong count ([`STATIC_REFCOUNT`] for immortal objects).
    pub strong: u32,
    /// Number of outstanding weak handles.
    pub weak: u32,
    /// Free-form counter for class-specific bookkeeping.
    pub aux: u32,
}

/// Callback run once when an object's strong count reaches zero, before children are released.
pub type Finalizer = fn(ObjRef, &Object);

/// A heap error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapError {
    /// Handle does not name a live object.
    Dangling,
    /// The object is not of the expected kind.
    WrongKind {
        /// Expected kind.
        expected: &'static str,
        /// Actual kind.
        found: &'static str,
    },
    /// Index out of bounds.
    OutOfBounds {
        /// Requested index.
        index: i64,
        /// Container length.
        len: usize,
    },
    /// Null where an object is required.
    Null,
    /// Invalid argument to a container operation.
    BadArgument(&'static str),
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dangling => write!(f, "dangling object handle"),
            Self::WrongKind { expected, found } => write!(f, "expected {expected}, found {found}"),
            Self::OutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds (len {len})")
            }
            Self::Null => write!(f, "null object"),
            Self::BadArgument(msg) => f.write_str(msg),
        }
    }
}

impl core::error::Error for HeapError {}

impl From<HeapError> for RtTrap {
    fn from(e: HeapError) -> Self {
        Self::with_message(TrapKind::InvalidOperation, std::format!("{e}"))
    }
}

/// Access to a concrete object type stored in [`Object`].
pub trait HeapObject: Sized {
    /// Kind name used in errors.
    const KIND: &'static str;

    /// Borrows `self` out of an object, if it has this kind.
    fn view(obj: &Object) -> Option<&Self>;

    /// Mutably borrows `self` out of an object, if it has this kind.
    fn view_mut(obj: &mut Object) -> Option<&mut Self>;
}

macro_rules! heap_objects {
    ($($variant:ident($ty:ty) = $class:ident, $kind:literal;)*) => {
        /// A heap object payload.
        #[derive(Debug)]
        #[allow(missing_docs, reason = "variants are named after their payload types")]
        pub enum Object {
            $($variant($ty),)*
        }

        impl Object {
            /// Default class id of the payload kind.
            #[must_use]
            pub fn default_class(&self) -> ClassId {
                match self {
                    $(Self::$variant(_) => $class,)*
                }
            }

            /// Kind name.
            #[must_use]
            pub fn kind(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => $kind,)*
                }
            }
        }

        $(
            impl HeapObject for $ty {
                const KIND: &'static str = $kind;

                fn view(obj: &Object) -> Option<&Self> {
                    match obj {
                        Object::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                fn view_mut(obj: &mut Object) -> Option<&mut Self> {
                    match obj {
                        Object::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Object {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

heap_objects! {
    Str(RtString) = STRING_CLASS_ID, "string";
    Seq(Seq) = SEQ_CLASS_ID, "seq";
    Map(StrMap) = MAP_CLASS_ID, "map";
    Set(IdentitySet) = SET_CLASS_ID, "set";
    Bag(Bag) = BAG_CLASS_ID, "bag";
    FrozenSet(FrozenSet) = FROZEN_SET_CLASS_ID, "frozen set";
    FrozenMap(FrozenMap) = FROZEN_MAP_CLASS_ID, "frozen map";
    CountMap(CountMap) = COUNT_MAP_CLASS_ID, "count map";
    Exception(Exception) = RT_EXCEPTION_CLASS_ID, "exception";
    Lazy(Lazy) = LAZY_CLASS_ID, "lazy";
    UnionFind(UnionFind) = UNION_FIND_CLASS_ID, "union-find";
    Quadtree(Quadtree) = QUADTREE_CLASS_ID, "quadtree";
    Stopwatch(Stopwatch) = STOPWATCH_CLASS_ID, "stopwatch";
    Timer(Timer) = TIMER_CLASS_ID, "timer";
    Countdown(Countdown) = COUNTDOWN_CLASS_ID, "countdown";
}

impl Object {
    /// Pushes every strong reference owned by this object.
    fn children(&self, out: &mut Vec<ObjRef>) {
        match self {
            Self::Seq(s) => out.extend(s.items().iter().flatten().copied()),
            Self::Map(m) => out.extend(m.iter().filter_map(|(_, v)| v)),
            Self::Set(s) => out.extend(s.iter()),
            Self::FrozenMap(m) => out.extend(m.entries().iter().filter_map(|(_, v)| *v)),
            Self::Exception(e) => out.extend(e.message),
            Self::Lazy(l) => l.owned_refs(out),
            Self::Str(_)
            | Self::Bag(_)
            | Self::FrozenSet(_)
            | Self::CountMap(_)
            | Self::UnionFind(_)
            | Self::Quadtree(_)
            | Self::Stopwatch(_)
            | Self::Timer(_)
            | Self::Countdown(_) => {}
        }
    }
}

struct Slot {
    generation: u32,
    header: Header,
    object: Option<Object>,
    finalizer: Option<Finalizer>,
}

/// The object heap.
#[derive(Default)]
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    interned: HashMap<Box<[u8]>, ObjRef>,
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("slots", &self.slots.len())
            .field("live", &self.live)
            .field("interned", &self.interned.len())
            .finish_non_exhaustive()
    }
}

impl Heap {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates `object` with its default class. The handle owns one reference.
    pub fn alloc(&mut self, object: impl Into<Object>) -> ObjRef {
        let object = object.into();
        let class = object.default_class();
        self.alloc_with_class(class, object)
    }

    /// Allocates `object` tagged with `class_id`.
    pub fn alloc_with_class(&mut self, class_id: ClassId, object: impl Into<Object>) -> ObjRef {
        let header = Header {
            class_id,
            strong: 1,
            weak: 0,
            aux: 0,
        };
        self.live += 1;
        if let Some(index) = self.free.pop()
            && let Some(slot) = self.slots.get_mut(index as usize)
        {
            slot.header = header;
            slot.object = Some(object.into());
            slot.finalizer = None;
            return ObjRef {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            header,
            object: Some(object.into()),
            finalizer: None,
        });
        ObjRef {
            index,
            generation: 0,
        }
    }

    fn slot(&self, o: ObjRef) -> Result<&Slot, HeapError> {
        self.slots
            .get(o.index as usize)
            .filter(|s| s.generation == o.generation && s.object.is_some())
            .ok_or(HeapError::Dangling)
    }

    fn slot_mut(&mut self, o: ObjRef) -> Result<&mut Slot, HeapError> {
        self.slots
            .get_mut(o.index as usize)
            .filter(|s| s.generation == o.generation && s.object.is_some())
            .ok_or(HeapError::Dangling)
    }

    /// Returns `true` if `o` names a live object.
    #[must_use]
    pub fn is_live(&self, o: ObjRef) -> bool {
        self.slot(o).is_ok()
    }

    /// Number of live objects (interned strings included).
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.live
    }

    /// Returns the header of `o`.
    pub fn header(&self, o: ObjRef) -> Result<Header, HeapError> {
        self.slot(o).map(|s| s.header)
    }

    /// Returns the class tag of `o`.
    pub fn class_id(&self, o: ObjRef) -> Result<ClassId, HeapError> {
        self.slot(o).map(|s| s.header.class_id)
    }

    /// Returns the strong count of `o`.
    pub fn refcount(&self, o: ObjRef) -> Result<u32, HeapError> {
        self.slot(o).map(|s| s.header.strong)
    }

    /// Returns `true` for immortal objects.
    pub fn is_static(&self, o: ObjRef) -> Result<bool, HeapError> {
        self.slot(o).map(|s| s.header.strong == STATIC_REFCOUNT)
    }

    /// Sets the class-specific aux counter.
    pub fn set_aux(&mut self, o: ObjRef, aux: u32) -> Result<(), HeapError> {
        self.slot_mut(o)?.header.aux = aux;
        Ok(())
    }

    /// Installs a finalizer on `o`, replacing any previous one.
    pub fn set_finalizer(&mut self, o: ObjRef, finalizer: Finalizer) -> Result<(), HeapError> {
        self.slot_mut(o)?.finalizer = Some(finalizer);
        Ok(())
    }

    /// Borrows the payload of `o`.
    pub fn get(&self, o: ObjRef) -> Result<&Object, HeapError> {
        self.slot(o)?.object.as_ref().ok_or(HeapError::Dangling)
    }

    /// Mutably borrows the payload of `o`.
    pub fn get_mut(&mut self, o: ObjRef) -> Result<&mut Object, HeapError> {
        self.slot_mut(o)?.object.as_mut().ok_or(HeapError::Dangling)
    }

    /// Borrows the payload of `o` as a `T`.
    pub fn borrow<T: HeapObject>(&self, o: ObjRef) -> Result<&T, HeapError> {
        let obj = self.get(o)?;
        T::view(obj).ok_or(HeapError::WrongKind {
            expected: T::KIND,
            found: obj.kind(),
        })
    }

    /// Mutably borrows the payload of `o` as a `T`.
    pub fn borrow_mut<T: HeapObject>(&mut self, o: ObjRef) -> Result<&mut T, HeapError> {
        let obj = self.get_mut(o)?;
        let found = obj.kind();
        T::view_mut(obj).ok_or(HeapError::WrongKind {
            expected: T::KIND,
            found,
        })
    }

    /// Adds a strong reference. Null is ignored.
    pub fn retain(&mut self, o: impl Into<Option<ObjRef>>) -> Result<(), HeapError> {
        let Some(o) = o.into() else {
            return Ok(());
        };
        let header = &mut self.slot_mut(o)?.header;
        if header.strong != STATIC_REFCOUNT {
            header.strong = header.strong.saturating_add(1).min(STATIC_REFCOUNT - 1);
        }
        Ok(())
    }

    /// Drops a strong reference. Null is ignored. Returns `true` if `o` was freed.
    pub fn release(&mut self, o: impl Into<Option<ObjRef>>) -> Result<bool, HeapError> {
        let Some(root) = o.into() else {
            return Ok(false);
        };
        let mut pending = std::vec![root];
        let mut freed_root = false;
        let mut first_err = None;
        while let Some(o) = pending.pop() {
            let slot = match self.slot_mut(o) {
                Ok(slot) => slot,
                Err(e) => {
                    first_err.get_or_insert(e);
                    continue;
                }
            };
            if slot.header.strong == STATIC_REFCOUNT {
                continue;
            }
            slot.header.strong = slot.header.strong.saturating_sub(1);
            if slot.header.strong > 0 {
                continue;
            }
            let finalizer = slot.finalizer.take();
            let object = slot.object.take();
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(o.index);
            self.live = self.live.saturating_sub(1);
            freed_root |= o == root;
            if let Some(object) = object {
                if let Some(fin) = finalizer {
                    fin(o, &object);
                }
                object.children(&mut pending);
            }
        }
        tracing::trace!(index = root.index, freed_root, "release");
        match first_err {
            Some(e) => Err(e),
            None => Ok(freed_root),
        }
    }

    /// Makes `o` immortal.
    pub fn make_static(&mut self, o: ObjRef) -> Result<(), HeapError> {
        self.slot_mut(o)?.header.strong = STATIC_REFCOUNT;
        Ok(())
    }

    /// Returns the interned string with these contents, allocating it on first use.
    pub fn intern(&mut self, bytes: &[u8]) -> ObjRef {
        if let Some(&o) = self.interned.get(bytes) {
            return o;
        }
        let o = self.alloc(RtString::from(bytes));
        if let Ok(slot) = self.slot_mut(o) {
            slot.header.strong = STATIC_REFCOUNT;
        }
        self.interned.insert(bytes.into(), o);
        o
    }

    /// Creates a weak handle to `o`.
    pub fn downgrade(&mut self, o: ObjRef) -> Result<WeakRef, HeapError> {
        let slot = self.slot_mut(o)?;
        slot.header.weak = slot.header.weak.saturating_add(1);
        Ok(WeakRef {
            index: o.index,
            generation: o.generation,
        })
    }

    /// Resolves a weak handle. On success the returned handle owns a new strong reference.
    pub fn upgrade(&mut self, w: WeakRef) -> Option<ObjRef> {
        let o = ObjRef {
            index: w.index,
            generation: w.generation,
        };
        self.retain(o).ok()?;
        Some(o)
    }

    /// Gives up a weak handle.
    pub fn drop_weak(&mut self, w: WeakRef) {
        let o = ObjRef {
            index: w.index,
            generation: w.generation,
        };
        if let Ok(slot) = self.slot_mut(o) {
            slot.header.weak = slot.header.weak.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    std::thread_local! {
        static FINALIZED: Cell<u32> = const { Cell::new(0) };
    }

    fn count_finalizer(_: ObjRef, _: &Object) {
        FINALIZED.with(|c| c.set(c.get() + 1));
    }

    #[test]
    fn retain_release_is_identity_on_refcount() {
        let mut heap = Heap::new();
        let s = heap.alloc(RtString::from(&b"abc"[..]));
        heap.retain(s).unwrap();
        assert_eq!(heap.refcount(s).unwrap(), 2);
        assert!(!heap.release(s).unwrap());
        assert_eq!(heap.refcount(s).unwrap(), 1);
        heap.retain(None).unwrap();
        assert!(!heap.release(None).unwrap());
    }

    #[test]
    fn finalizer_runs_once_and_children_are_released() {
        let mut heap = Heap::new();
        let child = heap.alloc(RtString::from(&b"x"[..]));
        let seq = heap.seq_new();
        heap.seq_push(seq, Some(child)).unwrap();
        heap.release(child).unwrap();
        heap.set_finalizer(seq, count_finalizer).unwrap();
        heap.set_finalizer(child, count_finalizer).unwrap();
        assert_eq!(heap.live_objects(), 2);

        assert!(heap.release(seq).unwrap());
        assert_eq!(FINALIZED.with(Cell::get), 2);
        assert_eq!(heap.live_objects(), 0);
        assert_eq!(heap.release(seq), Err(HeapError::Dangling), "stale handle is detected");
        assert_eq!(FINALIZED.with(Cell::get), 2);
    }

    #[test]
    fn recycled_slots_get_new_generations() {
        let mut heap = Heap::new();
        let a = heap.alloc(RtString::from(&b"a"[..]));
        heap.release(a).unwrap();
        let b = heap.alloc(RtString::from(&b"b"[..]));
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert!(!heap.is_live(a));
        assert!(heap.is_live(b));
    }

    #[test]
    fn interned_strings_are_shared_and_immortal() {
        let mut heap = Heap::new();
        let a = heap.intern(b"hello");
        let b = heap.intern(b"hello");
        assert_eq!(a, b);
        assert!(heap.is_static(a).unwrap());
        heap.retain(a).unwrap();
        assert!(!heap.release(a).unwrap());
        assert!(!heap.release(a).unwrap());
        assert!(heap.is_live(a));
    }

    #[test]
    fn weak_handles_expire_with_their_target() {
        let mut heap = Heap::new();
        let o = heap.alloc(RtString::from(&b"w"[..]));
        let w = heap.downgrade(o).unwrap();
        assert_eq!(heap.header(o).unwrap().weak, 1);
        let strong = heap.upgrade(w).unwrap();
        assert_eq!(heap.refcount(strong).unwrap(), 2);
        heap.release(strong).unwrap();
        heap.release(o).unwrap();
        assert_eq!(heap.upgrade(w), None);
        heap.drop_weak(w);
    }

    #[test]
    fn typed_borrows_report_the_actual_kind() {
        let mut heap = Heap::new();
        let s = heap.alloc(RtString::from(&b"a"[..]));
        let err = heap.borrow::<Seq>(s).unwrap_err();
        assert_eq!(
            err,
            HeapError::WrongKind {
                expected: "seq",
                found: "string"
            }
        );
    }
}
