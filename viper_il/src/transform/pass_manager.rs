// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ordered pass pipelines over a module with shared diagnostics.
//!
//! ## Run contract
//!
//! - Passes run strictly in registration order.
//! - A pass that returns `false`, or that records an error in the shared [`Diagnostics`], stops
//!   the pipeline; later passes do not run and [`PassManager::run`] returns `false`.
//! - With [`PassManager::verify_between_passes`] enabled the verifier runs after every pass and
//!   reports into the same diagnostics, so a verification failure also stops the pipeline.
//! - An empty pipeline leaves the module and the diagnostics untouched.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::diag::Diagnostics;
use crate::module::Module;
use crate::transform::check_opt::CheckOpt;
use crate::transform::cse::{EarlyCse, Gvn};
use crate::transform::dce::Dce;
use crate::transform::dse::Dse;
use crate::transform::licm::Licm;
use crate::transform::mem2reg::{Mem2Reg, Mem2RegOptions};
use crate::transform::peephole::Peephole;
use crate::transform::sccp::Sccp;
use crate::transform::simplify_cfg::SimplifyCfg;
use crate::verify::{CalleeResolver, verify_into};

/// A module transformation.
pub trait Pass {
    /// Registry name (`"mem2reg"`, `"dce"`, ...).
    fn name(&self) -> &'static str;

    /// Runs the pass. Returns `false` to abort the pipeline.
    fn run(&mut self, module: &mut Module, diags: &mut Diagnostics) -> bool;
}

/// Optimization level selecting a standard pipeline.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum OptLevel {
    /// No passes.
    #[default]
    O0,
    /// `simplify-cfg, mem2reg, peephole, dce`.
    O1,
    /// The full scalar pipeline.
    O2,
}

impl OptLevel {
    /// Pass names of the level's pipeline, in order.
    #[must_use]
    pub const fn pipeline(self) -> &'static [&'static str] {
        match self {
            Self::O0 => &[],
            Self::O1 => &["simplify-cfg", "mem2reg", "peephole", "dce"],
            Self::O2 => &[
                "simplify-cfg",
                "mem2reg",
                "dce",
                "licm",
                "gvn",
                "earlycse",
                "dse",
                "peephole",
                "dce",
            ],
        }
    }

    /// Parses `O0`/`O1`/`O2` (also `0`/`1`/`2`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim_start_matches('-') {
            "O0" | "0" => Some(Self::O0),
            "O1" | "1" => Some(Self::O1),
            "O2" | "2" => Some(Self::O2),
            _ => None,
        }
    }
}

/// Creates passes by name.
#[derive(Copy, Clone, Debug, Default)]
pub struct PassRegistry;

impl PassRegistry {
    /// Every registered pass name.
    pub const NAMES: [&'static str; 10] = [
        "simplify-cfg",
        "mem2reg",
        "sccp",
        "peephole",
        "dce",
        "earlycse",
        "gvn",
        "check-opt",
        "dse",
        "licm",
    ];

    /// Instantiates the pass registered as `name`.
    #[must_use]
    pub fn create(name: &str) -> Option<Box<dyn Pass>> {
        let pass: Box<dyn Pass> = match name {
            "simplify-cfg" => Box::new(SimplifyCfg),
            "mem2reg" => Box::new(Mem2Reg::new(Mem2RegOptions::default())),
            "sccp" => Box::new(Sccp),
            "peephole" => Box::new(Peephole),
            "dce" => Box::new(Dce),
            "earlycse" => Box::new(EarlyCse),
            "gvn" => Box::new(Gvn),
            "check-opt" => Box::new(CheckOpt),
            "dse" => Box::new(Dse),
            "licm" => Box::new(Licm),
            _ => return None,
        };
        Some(pass)
    }
}

/// Runs an ordered list of passes.
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
    verify_between: bool,
    resolver: Box<dyn CalleeResolver>,
}

impl fmt::Debug for PassManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassManager")
            .field("passes", &self.names())
            .field("verify_between", &self.verify_between)
            .finish_non_exhaustive()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PassManager {
    /// Creates an empty manager with inter-pass verification off.
    #[must_use]
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            verify_between: false,
            resolver: Box::new(()),
        }
    }

    /// Creates a manager holding the standard pipeline for `level`.
    #[must_use]
    pub fn for_level(level: OptLevel) -> Self {
        let mut pm = Self::new();
        for name in level.pipeline() {
            if let Some(pass) = PassRegistry::create(name) {
                pm.add(pass);
            }
        }
        pm
    }

    /// Appends a pass.
    pub fn add(&mut self, pass: Box<dyn Pass>) -> &mut Self {
        self.passes.push(pass);
        self
    }

    /// Appends the pass registered as `name`. Returns `false` if the name is unknown.
    pub fn add_named(&mut self, name: &str) -> bool {
        match PassRegistry::create(name) {
            Some(pass) => {
                self.passes.push(pass);
                true
            }
            None => false,
        }
    }

    /// Enables or disables verification after each pass.
    pub fn verify_between_passes(&mut self, on: bool) -> &mut Self {
        self.verify_between = on;
        self
    }

    /// Sets the resolver the inter-pass verifier uses for callees outside the module.
    pub fn set_resolver(&mut self, resolver: Box<dyn CalleeResolver>) -> &mut Self {
        self.resolver = resolver;
        self
    }

    /// Registered pass names, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Number of passes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Returns `true` when no pass is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Runs the pipeline. Returns `false` as soon as a pass fails or diagnostics hold an error.
    pub fn run(&mut self, module: &mut Module, diags: &mut Diagnostics) -> bool {
        for pass in &mut self.passes {
            let name = pass.name();
            tracing::debug!(pass = name, "running pass");
            if !pass.run(module, diags) {
                tracing::debug!(pass = name, "pass reported failure; pipeline stopped");
                return false;
            }
            if diags.has_errors() {
                tracing::debug!(pass = name, "pass recorded errors; pipeline stopped");
                return false;
            }
            if self.verify_between && !verify_into(module, &*self.resolver, diags) {
                tracing::debug!(pass = name, "verification failed after pass; pipeline stopped");
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{parse_module, print_module};
    use alloc::rc::Rc;
    use alloc::string::String;
    use core::cell::RefCell;

    struct Recorder {
        name: &'static str,
        ok: bool,
        error: bool,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Pass for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn run(&mut self, _module: &mut Module, diags: &mut Diagnostics) -> bool {
            self.log.borrow_mut().push(self.name);
            if self.error {
                diags.error(String::from(self.name));
            }
            self.ok
        }
    }

    fn recorder(
        name: &'static str,
        ok: bool,
        error: bool,
        log: &Rc<RefCell<Vec<&'static str>>>,
    ) -> Box<dyn Pass> {
        Box::new(Recorder {
            name,
            ok,
            error,
            log: Rc::clone(log),
        })
    }

    #[test]
    fn passes_run_in_order_and_stop_on_failure() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pm = PassManager::new();
        pm.add(recorder("a", true, false, &log))
            .add(recorder("b", false, false, &log))
            .add(recorder("c", true, false, &log));
        let mut m = Module::new();
        let mut diags = Diagnostics::new();
        assert!(!pm.run(&mut m, &mut diags));
        assert_eq!(*log.borrow(), ["a", "b"]);
    }

    #[test]
    fn a_recorded_error_stops_the_pipeline() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pm = PassManager::new();
        pm.add(recorder("a", true, true, &log))
            .add(recorder("b", true, false, &log));
        let mut m = Module::new();
        let mut diags = Diagnostics::new();
        assert!(!pm.run(&mut m, &mut diags));
        assert_eq!(*log.borrow(), ["a"]);
        assert_eq!(diags.errors(), ["a"]);
    }

    #[test]
    fn empty_pipeline_is_the_identity() {
        let src = "il 0.1.2
func @main() -> i64 {
entry:
  %a = add.i64 1, 2
  ret %a
}
";
        let mut m = parse_module(src).unwrap();
        let before = print_module(&m);
        let mut diags = Diagnostics::new();
        assert!(PassManager::for_level(OptLevel::O0).run(&mut m, &mut diags));
        assert_eq!(print_module(&m), before);
        assert_eq!(diags, Diagnostics::new());
    }

    #[test]
    fn standard_pipelines_are_registered() {
        assert_eq!(PassManager::for_level(OptLevel::O1).names(), OptLevel::O1.pipeline());
        assert_eq!(PassManager::for_level(OptLevel::O2).len(), 9);
        for name in PassRegistry::NAMES {
            assert_eq!(PassRegistry::create(name).map(|p| p.name()), Some(name));
        }
        assert!(PassRegistry::create("inline").is_none());
        assert_eq!(OptLevel::parse("-O2"), Some(OptLevel::O2));
    }

    #[test]
    fn verification_between_passes_catches_broken_output() {
        struct Breaker;
        impl Pass for Breaker {
            fn name(&self) -> &'static str {
                "breaker"
            }
            fn run(&mut self, module: &mut Module, _diags: &mut Diagnostics) -> bool {
                module.functions[0].blocks[0].instrs.pop();
                true
            }
        }
        let src = "il 0.1.2
func @main() -> void {
entry:
  ret
}
";
        let mut m = parse_module(src).unwrap();
        let mut pm = PassManager::new();
        pm.add(Box::new(Breaker)).verify_between_passes(true);
        let mut diags = Diagnostics::new();
        assert!(!pm.run(&mut m, &mut diags));
        assert!(diags.has_errors());
    }
}
