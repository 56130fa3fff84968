// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interpreter configuration.

/// Instruction dispatch strategy.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DispatchKind {
    /// A `match` over the opcode; the reference strategy.
    #[default]
    Switch,
    /// A handler table indexed by opcode.
    Threaded,
}

impl DispatchKind {
    /// Parses `switch` or `threaded`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "switch" => Some(Self::Switch),
            "threaded" => Some(Self::Threaded),
            _ => None,
        }
    }
}

/// Resource limits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Deepest allowed call stack.
    pub max_call_depth: usize,
    /// Bytes of `alloca` space per frame.
    pub frame_stack_bytes: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_call_depth: 4096,
            frame_stack_bytes: 1024,
        }
    }
}

/// Knobs for [`Vm`](crate::vm::Vm).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VmConfig {
    /// Dispatch strategy.
    pub dispatch: DispatchKind,
    /// Trap after this many instructions.
    pub max_steps: Option<u64>,
    /// Check operand kinds against the opcode before every instruction.
    pub verify_operands: bool,
    /// Reuse the caller's frame for calls in tail position.
    pub tail_calls: bool,
    /// Resource limits.
    pub limits: Limits,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchKind::Switch,
            max_steps: None,
            verify_operands: false,
            tail_calls: true,
            limits: Limits::default(),
        }
    }
}

impl VmConfig {
    /// Switch dispatch, no step budget, tail calls on, default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the dispatch strategy.
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: DispatchKind) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Sets the step budget.
    #[must_use]
    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }
}
