// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::resolver::{
    DefaultLabelResolver, LabelResolver, default_call_frame_label, default_runtime_call_label,
};
use viper_vm::{Program, ScopeKind, TraceMask, TraceSink};

type BackendGuard = tracy_client::Span;

struct ScopeEntry {
    kind: ScopeKind,
    depth: usize,
    guard: Option<BackendGuard>,
}

/// A [`TraceSink`] that emits Tracy spans via `tracy-client`.
pub struct ProfilingTraceSink<R = DefaultLabelResolver> {
    resolver: R,
    stack: Vec<ScopeEntry>,
}

impl ProfilingTraceSink<DefaultLabelResolver> {
    /// Creates a sink with index-based labels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: LabelResolver> ProfilingTraceSink<R> {
    /// Creates a sink with a custom label resolver.
    #[must_use]
    pub fn with_resolver(resolver: R) -> Self {
        Self {
            resolver,
            stack: Vec::new(),
        }
    }

    /// Number of spans currently open.
    #[must_use]
    pub fn open_scopes(&self) -> usize {
        self.stack.len()
    }

    fn resolve_label(&mut self, program: &Program, kind: ScopeKind) -> String {
        match kind {
            ScopeKind::CallFrame { func } => self
                .resolver
                .call_frame_label(func, program)
                .unwrap_or_else(|| default_call_frame_label(func)),
            ScopeKind::RuntimeCall { desc } => self
                .resolver
                .runtime_call_label(desc, program)
                .unwrap_or_else(|| default_runtime_call_label(desc)),
        }
    }

    fn start_scope(&self, kind: ScopeKind, label: &str, ip: u32) -> Option<BackendGuard> {
        let function_name = match kind {
            ScopeKind::CallFrame { .. } => "viper_vm.call_frame",
            ScopeKind::RuntimeCall { .. } => "viper_vm.runtime_call",
        };
        let client = tracy_client::Client::running()?;
        Some(client.span_alloc(Some(label), function_name, "viper_vm", ip, 0))
    }

    // LIFO so nested spans close inner to outer.
    fn drop_active_scopes(&mut self) {
        while let Some(entry) = self.stack.pop() {
            drop(entry.guard);
        }
    }
}

impl<R: LabelResolver> TraceSink for ProfilingTraceSink<R> {
    fn mask(&self) -> TraceMask {
        TraceMask::CALL | TraceMask::RUNTIME
    }

    fn scope_enter(&mut self, program: &Program, kind: ScopeKind, depth: usize, ip: u32) {
        let label = self.resolve_label(program, kind);
        let guard = self.start_scope(kind, &label, ip);
        self.stack.push(ScopeEntry { kind, depth, guard });
    }

    fn scope_exit(&mut self, _program: &Program, kind: ScopeKind, depth: usize) {
        if let Some(top) = self.stack.last()
            && top.kind == kind
            && top.depth == depth
        {
            self.stack.pop();
            return;
        }
        // Out of sync: close everything rather than leak spans.
        self.drop_active_scopes();
    }
}

impl<R> Default for ProfilingTraceSink<R>
where
    R: LabelResolver + Default,
{
    fn default() -> Self {
        Self::with_resolver(R::default())
    }
}

impl<R> core::fmt::Debug for ProfilingTraceSink<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProfilingTraceSink")
            .field("stack_depth", &self.stack.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::ProfilingTraceSink;
    use crate::ProgramSymbolResolver;
    use viper_vm::{FuncId, Program, RuntimeRegistry, ScopeKind, Slot, Vm, VmConfig};

    #[test]
    fn start_scope_without_tracy_client_does_not_panic() {
        let sink = ProfilingTraceSink::new();
        let _guard = sink.start_scope(ScopeKind::CallFrame { func: FuncId(0) }, "test", 0);
    }

    #[test]
    fn scopes_balance_over_a_run() {
        let module = viper_il::text::parse_module(
            "il 0.1.2
extern @rt_abs_i64(i64) -> i64
func @inner(i64 %n) -> i64 {
entry:
  %a = call @rt_abs_i64(%n)
  %b = add.i64 %a, 1
  ret %b
}
func @main() -> i64 {
entry:
  %r = call @inner(-4)
  ret %r
}
",
        )
        .unwrap();
        let program = Program::load(&module, &RuntimeRegistry::with_defaults()).unwrap();
        let mut sink = ProfilingTraceSink::with_resolver(ProgramSymbolResolver::default());
        let mut vm = Vm::new(VmConfig::new());
        let result = vm.run_traced(&program, "main", &[], Some(&mut sink));
        assert_eq!(result, Ok(Some(Slot::I64(5))));
        assert_eq!(sink.open_scopes(), 0, "every entered scope was exited");
    }
}
