// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic temp/label naming and linker-symbol mangling.

use alloc::borrow::ToOwned;
use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use hashbrown::HashMap;

/// Hands out `%t<n>` temp names and collision-free block labels.
#[derive(Clone, Debug, Default)]
pub struct NameMangler {
    next_temp: u32,
    block_uses: HashMap<Box<str>, u32>,
}

impl NameMangler {
    /// Creates a fresh mangler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `%t<n>` with a monotonically increasing `n`.
    pub fn next_temp(&mut self) -> String {
        let n = self.next_temp;
        self.next_temp += 1;
        format!("%t{n}")
    }

    /// Returns `hint` on first use, then `hint1`, `hint2`, ...
    pub fn block(&mut self, hint: &str) -> String {
        let uses = self.block_uses.entry(hint.into()).or_insert(0);
        let label = if *uses == 0 {
            hint.to_owned()
        } else {
            format!("{hint}{uses}")
        };
        *uses += 1;
        label
    }
}

/// Converts a dotted qualified name into an ASCII linker symbol.
///
/// The result is `@` followed only by `[a-z0-9_]`. The mapping is lossy.
#[must_use]
pub fn mangle_link(qualified: &str) -> String {
    let mut out = String::with_capacity(qualified.len() + 1);
    out.push('@');
    for c in qualified.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c.to_ascii_lowercase());
        } else {
            out.push('_');
        }
    }
    out
}

/// Best-effort inverse of [`mangle_link`] for diagnostics.
#[must_use]
pub fn demangle_link(symbol: &str) -> String {
    symbol.strip_prefix('@').unwrap_or(symbol).replace('_', ".")
}

/// Module initializer symbol for OOP registration.
pub const MOD_INIT_OOP: &str = "__mod_init$oop";

/// Pascal-style OOP initializer symbol.
pub const PASCAL_OOP_INIT: &str = "__pas_oop_init";

/// `Class.Member`.
#[must_use]
pub fn method_symbol(class: &str, member: &str) -> String {
    format!("{class}.{member}")
}

/// `Class.__ctor`.
#[must_use]
pub fn ctor_symbol(class: &str) -> String {
    method_symbol(class, "__ctor")
}

/// `Class.__dtor`.
#[must_use]
pub fn dtor_symbol(class: &str) -> String {
    method_symbol(class, "__dtor")
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Interface registration thunk: `__iface_reg$<sanitized>`.
#[must_use]
pub fn iface_reg_thunk(iface: &str) -> String {
    format!("__iface_reg${}", sanitize(iface))
}

/// Class-to-interface binding thunk: `__iface_bind$<class>$<iface>`.
#[must_use]
pub fn iface_bind_thunk(class: &str, iface: &str) -> String {
    format!("__iface_bind${}${}", sanitize(class), sanitize(iface))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temps_are_monotonic() {
        let mut m = NameMangler::new();
        assert_eq!(m.next_temp(), "%t0");
        assert_eq!(m.next_temp(), "%t1");
    }

    #[test]
    fn block_labels_get_suffixes() {
        let mut m = NameMangler::new();
        assert_eq!(m.block("loop"), "loop");
        assert_eq!(m.block("loop"), "loop1");
        assert_eq!(m.block("exit"), "exit");
        assert_eq!(m.block("loop"), "loop2");
    }

    #[test]
    fn link_names_are_ascii() {
        let s = mangle_link("Viper.Text.Regex.IsMatch");
        assert_eq!(s, "@viper_text_regex_ismatch");
        let odd = mangle_link("Föö.Bar$baz-1");
        assert!(odd.starts_with('@'));
        assert!(
            odd[1..]
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
            "{odd}"
        );
        assert_eq!(demangle_link("@viper_text"), "viper.text");
    }

    #[test]
    fn oop_symbols() {
        assert_eq!(ctor_symbol("Point"), "Point.__ctor");
        assert_eq!(dtor_symbol("Point"), "Point.__dtor");
        assert_eq!(iface_reg_thunk("Shapes.IDraw"), "__iface_reg$Shapes_IDraw");
        assert_eq!(iface_bind_thunk("Circle", "IDraw"), "__iface_bind$Circle$IDraw");
    }
}
