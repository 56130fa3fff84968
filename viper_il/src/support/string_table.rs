// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content-addressed string literal labels.

use alloc::boxed::Box;
use alloc::format;
use core::fmt;
use hashbrown::HashMap;

/// Maps string contents to deterministic `.L<n>` labels.
///
/// The emitter runs exactly once per distinct content, on first sight; lowerers use it to
/// register the matching IL global.
pub struct StringTable<E> {
    labels: HashMap<Box<str>, Box<str>>,
    next: u32,
    emit: E,
}

impl<E: FnMut(&str, &str)> StringTable<E> {
    /// Creates an empty table calling `emit(label, content)` for new contents.
    pub fn new(emit: E) -> Self {
        Self {
            labels: HashMap::new(),
            next: 0,
            emit,
        }
    }

    /// Returns the label for `content`, emitting it if new.
    pub fn intern(&mut self, content: &str) -> &str {
        if !self.labels.contains_key(content) {
            let label: Box<str> = format!(".L{}", self.next).into();
            self.next += 1;
            (self.emit)(&label, content);
            self.labels.insert(content.into(), label);
        }
        self.labels.get(content).map_or("", |l| &**l)
    }

    /// Number of distinct contents seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Forgets every label and restarts numbering (between modules).
    pub fn clear(&mut self) {
        self.labels.clear();
        self.next = 0;
    }

    /// Restarts numbering without dropping cached labels.
    pub fn reset_counter(&mut self) {
        self.next = 0;
    }
}

impl<E> fmt::Debug for StringTable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringTable")
            .field("len", &self.labels.len())
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use alloc::string::{String, ToString};
    use alloc::vec::Vec;

    #[test]
    fn equal_contents_share_a_label_and_emit_once() {
        let mut emitted: Vec<(String, String)> = Vec::new();
        {
            let mut t = StringTable::new(|l: &str, c: &str| {
                emitted.push((l.to_string(), c.to_string()));
            });
            let a = t.intern("hello").to_string();
            let b = t.intern("world").to_string();
            let c = t.intern("hello").to_string();
            assert_eq!(a, ".L0");
            assert_eq!(b, ".L1");
            assert_eq!(a, c);
            assert_eq!(t.len(), 2);
        }
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0], (".L0".to_string(), "hello".to_string()));
    }

    #[test]
    fn clear_restarts_numbering() {
        let mut t = StringTable::new(|_: &str, _: &str| {});
        t.intern("a");
        t.intern("b");
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.intern("b"), ".L0");
    }
}
