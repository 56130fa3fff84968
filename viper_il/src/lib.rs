// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `viper_il`: the typed SSA intermediate language shared by every Viper frontend and backend.
//!
//! The crate is `no_std` + `alloc`. It provides:
//!
//! - the IL data model ([`types`], [`value`], [`opcode`], [`instr`], [`module`]) and a cursor-style
//!   [`builder`],
//! - the textual format ([`text`]) with a parser and a canonical printer,
//! - a structural/SSA [`verify`]er,
//! - analyses ([`analysis`]): CFG caches, traversal orders, dominators, dataflow,
//! - transformation passes and the pass manager ([`transform`]),
//! - naming helpers used by lowerers ([`support`]).
//!
//! ## Policy and invariants
//!
//! - Blocks end in exactly one terminator. Block parameters are the only merge form.
//! - Temp ids are dense per function (`0..Function::temp_count`).
//! - Analyses are snapshots: mutating block layout invalidates them and they must be rebuilt.

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod analysis;
pub mod builder;
pub mod diag;
pub mod instr;
pub mod module;
pub mod opcode;
pub mod support;
pub mod text;
pub mod transform;
pub mod types;
pub mod value;
pub mod verify;

pub use diag::Diagnostics;
pub use instr::{Instr, SourceLoc};
pub use module::{BasicBlock, Extern, Function, Global, Module, Param};
pub use opcode::Opcode;
pub use types::Type;
pub use value::{LiteralId, TempId, Value};

/// The IL version written and accepted by the text format.
pub const IL_VERSION: &str = "0.1.2";
