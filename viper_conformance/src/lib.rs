// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared harness for the Viper conformance tests.
//!
//! The tests live in `tests/`; this crate only provides the parse → optimize → load → run
//! plumbing they share.

use core::fmt;

use viper_il::Diagnostics;
use viper_il::text::ParseError;
use viper_il::transform::{OptLevel, PassManager};
use viper_vm::{LoadError, Program, RuntimeRegistry, Slot, TrapInfo, Vm, VmConfig};

/// Why a source module could not be turned into a [`Program`].
#[derive(Debug)]
pub enum HarnessError {
    /// The text did not parse.
    Parse(ParseError),
    /// A pass failed or left diagnostics behind.
    Optimize(Vec<String>),
    /// Verification or resolution failed at load time.
    Load(LoadError),
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "parse error: {e}"),
            Self::Optimize(errors) => write!(f, "optimization failed: {}", errors.join("; ")),
            Self::Load(e) => write!(f, "load error: {e}"),
        }
    }
}

impl core::error::Error for HarnessError {}

/// Parses `src`, runs the `level` pipeline with inter-pass verification, and loads the result.
pub fn compile(src: &str, level: OptLevel) -> Result<Program, HarnessError> {
    compile_with(src, PassManager::for_level(level))
}

/// Like [`compile`], with the named passes in order instead of a standard pipeline.
///
/// # Panics
///
/// Panics on an unregistered pass name.
pub fn compile_with_passes(src: &str, names: &[&str]) -> Result<Program, HarnessError> {
    let mut pm = PassManager::new();
    for name in names {
        assert!(pm.add_named(name), "unknown pass '{name}'");
    }
    compile_with(src, pm)
}

fn compile_with(src: &str, mut pm: PassManager) -> Result<Program, HarnessError> {
    let mut module = viper_il::text::parse_module(src).map_err(HarnessError::Parse)?;
    pm.verify_between_passes(true)
        .set_resolver(Box::new(RuntimeRegistry::with_defaults()));
    let mut diags = Diagnostics::new();
    if !pm.run(&mut module, &mut diags) {
        return Err(HarnessError::Optimize(diags.errors().to_vec()));
    }
    Program::load(&module, &RuntimeRegistry::with_defaults()).map_err(HarnessError::Load)
}

/// What one execution produced.
#[derive(Debug)]
pub struct Outcome {
    /// Return value or trap report.
    pub result: Result<Option<Slot>, TrapInfo>,
    /// Captured runtime output.
    pub output: String,
    /// Heap objects still live after the run.
    pub live_objects: usize,
}

impl Outcome {
    /// The rendered trap line, if the run trapped.
    #[must_use]
    pub fn trap_line(&self) -> Option<String> {
        self.result.as_ref().err().map(ToString::to_string)
    }
}

/// Runs `entry` of `program` in a fresh VM.
pub fn execute(program: &Program, config: VmConfig, entry: &str, args: &[Slot]) -> Outcome {
    let mut vm = Vm::new(config);
    let result = vm.run(program, entry, args);
    Outcome {
        result,
        output: vm.take_output(),
        live_objects: vm.context().heap.live_objects(),
    }
}
