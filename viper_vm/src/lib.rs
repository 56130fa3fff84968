// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `viper_vm`: an interpreter for Viper IL modules.
//!
//! Execution has two phases:
//!
//! 1. [`Program::load`] verifies a [`viper_il::Module`] against a [`RuntimeRegistry`] and resolves
//!    labels, callees, globals, and temps into indices.
//! 2. [`Vm::run`] executes a function of the loaded program. Each instruction is routed to a
//!    handler by the configured [`DispatchKind`]; both strategies share the handler bodies.
//!
//! Runtime helpers (`rt_*`) are plain functions over [`viper_rt::RtContext`], described by a
//! [`RuntimeDescriptor`]. A trap stops execution and is reported as a [`TrapInfo`] naming the
//! function, block, instruction index, and source line:
//!
//! ```text
//! Trap @main:entry#0 line 1: Overflow (code=0)
//! ```
//!
//! ## Example
//! ```
//! use viper_vm::{Program, RuntimeRegistry, Slot, Vm, VmConfig};
//!
//! let module = viper_il::text::parse_module(
//!     "il 0.1.2\nfunc @main() -> i64 {\nentry:\n  %a = add.i64 40, 2\n  ret %a\n}\n",
//! )
//! .unwrap();
//! let program = Program::load(&module, &RuntimeRegistry::with_defaults()).unwrap();
//! let mut vm = Vm::new(VmConfig::new());
//! assert_eq!(vm.run(&program, "main", &[]), Ok(Some(Slot::I64(42))));
//! ```

mod dispatch;
mod frame;
mod ops;

pub mod config;
pub mod memory;
pub mod program;
pub mod runtime;
pub mod slot;
pub mod trace;
pub mod vm;

pub use config::{DispatchKind, Limits, VmConfig};
pub use program::{FuncId, LoadError, Program, RuntimeId};
pub use runtime::{RuntimeDescriptor, RuntimeRegistry};
pub use slot::{Ptr, Slot};
pub use trace::{InstrSite, ScopeKind, TraceMask, TraceSink};
pub use vm::{TrapInfo, Vm};
