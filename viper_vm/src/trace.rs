// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Execution tracing hooks.
//!
//! A [`TraceSink`] is consulted only for the event classes its [`TraceMask`] selects, so a run
//! without a sink (or with an empty mask) pays nothing beyond a bit test.

use core::ops::{BitOr, BitOrAssign};

use viper_il::Opcode;

use crate::program::{FuncId, Program, RuntimeId};

/// Event classes a sink wants to receive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TraceMask(u8);

impl TraceMask {
    /// Nothing.
    pub const NONE: Self = Self(0);
    /// Call frame enter/exit.
    pub const CALL: Self = Self(1);
    /// Runtime helper enter/exit.
    pub const RUNTIME: Self = Self(1 << 1);
    /// Every executed instruction.
    pub const INSTR: Self = Self(1 << 2);

    /// Returns `true` if every bit of `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl BitOr for TraceMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TraceMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// What a scope event describes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// An IL function activation.
    CallFrame {
        /// The function.
        func: FuncId,
    },
    /// A runtime helper invocation.
    RuntimeCall {
        /// The descriptor.
        desc: RuntimeId,
    },
}

/// Position of an executing instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstrSite {
    /// Function.
    pub func: FuncId,
    /// Block index.
    pub block: u32,
    /// Instruction index within the block.
    pub ip: u32,
    /// Opcode.
    pub op: Opcode,
}

/// Receiver of execution events. Every callback has an empty default.
pub trait TraceSink {
    /// Event classes to deliver.
    fn mask(&self) -> TraceMask;

    /// A scope was entered at call depth `depth`. `ip` is the caller's instruction index.
    fn scope_enter(&mut self, _program: &Program, _kind: ScopeKind, _depth: usize, _ip: u32) {}

    /// The matching scope was left.
    fn scope_exit(&mut self, _program: &Program, _kind: ScopeKind, _depth: usize) {}

    /// An instruction is about to execute.
    fn instr(&mut self, _program: &Program, _site: InstrSite) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_bits_combine() {
        let mut m = TraceMask::CALL | TraceMask::INSTR;
        assert!(m.contains(TraceMask::CALL));
        assert!(!m.contains(TraceMask::RUNTIME));
        assert!(!m.contains(TraceMask::NONE));
        m |= TraceMask::RUNTIME;
        assert!(m.contains(TraceMask::CALL | TraceMask::RUNTIME));
    }
}
