// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lexical scope tracking for lowerers.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};
use hashbrown::HashMap;

/// A stack of name-resolution scopes mapping source identifiers to unique IL names.
#[derive(Clone, Debug, Default)]
pub struct ScopeTracker {
    scopes: Vec<HashMap<Box<str>, Box<str>>>,
    next_id: u32,
}

impl ScopeTracker {
    /// Creates a tracker with no open scopes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new innermost scope.
    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Closes the innermost scope (no-op when none is open).
    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Number of open scopes.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Binds `name` to `mapped` in the innermost scope.
    pub fn bind(&mut self, name: &str, mapped: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), mapped.into());
        }
    }

    /// Generates a unique `name_<n>` for a local declaration and binds it.
    pub fn declare_local(&mut self, name: &str) -> String {
        let mangled = format!("{name}_{}", self.next_id);
        self.next_id += 1;
        self.bind(name, &mangled);
        mangled
    }

    /// Resolves `name`, innermost scope first.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.get(name))
            .map(|s| &**s)
    }

    /// Pushes a scope that is popped when the returned guard drops.
    pub fn scoped(&mut self) -> ScopeGuard<'_> {
        self.push_scope();
        ScopeGuard { tracker: self }
    }
}

/// RAII guard returned by [`ScopeTracker::scoped`].
#[derive(Debug)]
pub struct ScopeGuard<'a> {
    tracker: &'a mut ScopeTracker,
}

impl Deref for ScopeGuard<'_> {
    type Target = ScopeTracker;

    fn deref(&self) -> &ScopeTracker {
        self.tracker
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut ScopeTracker {
        self.tracker
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.tracker.pop_scope();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scopes_shadow_outer() {
        let mut t = ScopeTracker::new();
        t.push_scope();
        let outer = t.declare_local("x");
        {
            let mut g = t.scoped();
            let inner = g.declare_local("x");
            assert_ne!(inner, outer);
            assert_eq!(g.resolve("x"), Some(inner.as_str()));
            assert_eq!(g.depth(), 2);
        }
        assert_eq!(t.depth(), 1);
        assert_eq!(t.resolve("x"), Some(outer.as_str()));
        assert_eq!(t.resolve("y"), None);
    }

    #[test]
    fn declare_local_is_unique() {
        let mut t = ScopeTracker::new();
        t.push_scope();
        assert_eq!(t.declare_local("i"), "i_0");
        assert_eq!(t.declare_local("i"), "i_1");
        t.bind("n", "param_n");
        assert_eq!(t.resolve("n"), Some("param_n"));
    }
}
