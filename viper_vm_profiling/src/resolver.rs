// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use hashbrown::HashMap;
use viper_vm::{FuncId, Program, RuntimeId};

/// Names profiling scopes.
///
/// Return `None` to fall back to the index-based labels.
pub trait LabelResolver {
    /// Label for an IL function activation.
    fn call_frame_label(&mut self, _func: FuncId, _program: &Program) -> Option<String> {
        None
    }

    /// Label for a runtime helper call.
    fn runtime_call_label(&mut self, _desc: RuntimeId, _program: &Program) -> Option<String> {
        None
    }
}

/// Index-based labels only.
#[derive(Default, Debug)]
pub struct DefaultLabelResolver;

impl LabelResolver for DefaultLabelResolver {}

/// Uses the function and helper names recorded in the [`Program`].
#[derive(Default, Debug)]
pub struct ProgramSymbolResolver {
    frames: HashMap<FuncId, String>,
    runtime: HashMap<RuntimeId, String>,
}

impl LabelResolver for ProgramSymbolResolver {
    fn call_frame_label(&mut self, func: FuncId, program: &Program) -> Option<String> {
        if let Some(label) = self.frames.get(&func) {
            return Some(label.clone());
        }
        let label = format!("func:{}", program.function_name(func)?);
        self.frames.insert(func, label.clone());
        Some(label)
    }

    fn runtime_call_label(&mut self, desc: RuntimeId, program: &Program) -> Option<String> {
        if let Some(label) = self.runtime.get(&desc) {
            return Some(label.clone());
        }
        let label = format!("rt:{}", program.runtime_name(desc)?);
        self.runtime.insert(desc, label.clone());
        Some(label)
    }
}

pub(crate) fn default_call_frame_label(func: FuncId) -> String {
    format!("func:#{}", func.0)
}

pub(crate) fn default_runtime_call_label(desc: RuntimeId) -> String {
    format!("rt:#{}", desc.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use viper_vm::RuntimeRegistry;

    #[test]
    fn symbol_resolver_uses_program_names() {
        let src = "il 0.1.2
extern @rt_abs_i64(i64) -> i64
func @main() -> i64 {
entry:
  %a = call @rt_abs_i64(-3)
  ret %a
}
";
        let module = viper_il::text::parse_module(src).unwrap();
        let program = Program::load(&module, &RuntimeRegistry::with_defaults()).unwrap();
        let mut resolver = ProgramSymbolResolver::default();
        assert_eq!(
            resolver.call_frame_label(FuncId(0), &program).as_deref(),
            Some("func:main")
        );
        assert_eq!(
            resolver.runtime_call_label(RuntimeId(0), &program).as_deref(),
            Some("rt:rt_abs_i64")
        );
        assert_eq!(resolver.call_frame_label(FuncId(9), &program), None);
        assert_eq!(default_call_frame_label(FuncId(9)), "func:#9");
    }
}
