// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `viper_rt`: the runtime core that IL programs call into.
//!
//! - [`heap`]: a handle-based, reference-counted object heap. Every object carries a class tag and
//!   a refcount; handles are generation-checked so stale use is reported instead of aliasing.
//! - Object kinds: [`string`], [`seq`], [`map`], [`set`], [`frozen`], [`countmap`],
//!   [`exception`], [`lazy`], [`union_find`], [`quadtree`], and the [`clock`] stopwatches,
//!   timers and countdowns.
//! - Host services: [`math`], [`random`], [`clock`], [`channel`], [`term`].
//! - [`trap`]: the trap kinds shared with the VM, and [`context`], which bundles the mutable state
//!   of one running program.
//!
//! Objects are not thread-safe. A [`context::RtContext`] belongs to one interpreter.

pub mod channel;
pub mod clock;
pub mod context;
pub mod countmap;
pub mod exception;
pub mod frozen;
pub mod heap;
pub mod lazy;
pub mod map;
pub mod math;
pub mod quadtree;
pub mod random;
pub mod seq;
pub mod set;
pub mod string;
pub mod term;
pub mod trap;
pub mod union_find;

pub use context::RtContext;
pub use heap::{ClassId, Heap, HeapError, ObjRef, RT_EXCEPTION_CLASS_ID};
pub use trap::{RtTrap, TrapKind};
