// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Profiling adapters for `viper_vm` (currently Tracy).
//!
//! This crate keeps `viper_vm` itself free of profiling dependencies. It listens for the VM's
//! call-frame and runtime-call scope events and mirrors them as Tracy spans.
//!
//! ## Example
//! ```ignore
//! use viper_vm_profiling::ProfilingTraceSink;
//!
//! let mut sink = ProfilingTraceSink::new();
//! vm.run_traced(&program, "main", &[], Some(&mut sink))?;
//! # Ok::<(), viper_vm::TrapInfo>(())
//! ```

mod resolver;
mod sink;

pub use resolver::{DefaultLabelResolver, LabelResolver, ProgramSymbolResolver};
pub use sink::ProfilingTraceSink;
