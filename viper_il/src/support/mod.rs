// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Naming helpers shared by frontend lowerers.

pub mod mangle;
pub mod scope;
pub mod string_table;

pub use mangle::{NameMangler, demangle_link, mangle_link};
pub use scope::{ScopeGuard, ScopeTracker};
pub use string_table::StringTable;
