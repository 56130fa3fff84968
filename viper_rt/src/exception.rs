// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Exception objects: a retained message string plus a class tag used for catch dispatch.

use crate::heap::{ClassId, Heap, HeapError, ObjRef, RT_EXCEPTION_CLASS_ID};

/// Exception payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exception {
    /// Message string (owned reference).
    pub message: Option<ObjRef>,
}

impl Heap {
    /// Creates an exception with class [`RT_EXCEPTION_CLASS_ID`], retaining `message`.
    pub fn exc_create(&mut self, message: Option<ObjRef>) -> Result<ObjRef, HeapError> {
        self.exc_create_with_class(RT_EXCEPTION_CLASS_ID, message)
    }

    /// Creates an exception of a derived class.
    pub fn exc_create_with_class(
        &mut self,
        class_id: ClassId,
        message: Option<ObjRef>,
    ) -> Result<ObjRef, HeapError> {
        self.retain(message)?;
        Ok(self.alloc_with_class(class_id, Exception { message }))
    }

    /// The exception's message (borrowed).
    pub fn exc_message(&self, e: ObjRef) -> Result<Option<ObjRef>, HeapError> {
        Ok(self.borrow::<Exception>(e)?.message)
    }

    /// Returns `true` if `o` is an exception object.
    #[must_use]
    pub fn is_exception(&self, o: ObjRef) -> bool {
        self.borrow::<Exception>(o).is_ok()
    }

    /// Returns `true` if `o` is an exception whose class is `class_id`.
    #[must_use]
    pub fn exc_is_class(&self, o: ObjRef, class_id: ClassId) -> bool {
        self.is_exception(o) && self.class_id(o) == Ok(class_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_owns_its_message() {
        let mut heap = Heap::new();
        let msg = heap.str_from("boom");
        let e = heap.exc_create(Some(msg)).unwrap();
        heap.release(msg).unwrap();
        assert!(heap.is_live(msg));
        assert_eq!(heap.class_id(e).unwrap(), RT_EXCEPTION_CLASS_ID);
        assert!(heap.is_exception(e));
        assert!(!heap.is_exception(msg));
        assert_eq!(heap.exc_message(e).unwrap(), Some(msg));
        heap.release(e).unwrap();
        assert!(!heap.is_live(msg));
    }

    #[test]
    fn derived_classes_keep_their_tag() {
        let mut heap = Heap::new();
        let e = heap.exc_create_with_class(ClassId(40), None).unwrap();
        assert!(heap.exc_is_class(e, ClassId(40)));
        assert!(!heap.exc_is_class(e, RT_EXCEPTION_CLASS_ID));
    }
}
