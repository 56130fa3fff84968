// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! IL instructions.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::opcode::Opcode;
use crate::types::Type;
use crate::value::{TempId, Value};

/// Source position attached to an instruction (`.loc file line column`).
///
/// `line == 0` means "unknown".
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourceLoc {
    /// Frontend file id.
    pub file: u32,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

impl SourceLoc {
    /// Returns `true` when a line is known.
    #[inline]
    #[must_use]
    pub const fn is_known(self) -> bool {
        self.line != 0
    }
}

/// One IL instruction.
///
/// `labels` and `br_args` are parallel: `br_args[i]` feeds the parameters of `labels[i]`. For
/// `switch.i32`, `operands[0]` is the scrutinee, `operands[1..]` are the case values, `labels[0]`
/// is the default target and `labels[1..]` are the case targets.
#[derive(Clone, Debug, PartialEq)]
pub struct Instr {
    /// Result temp, if the instruction produces a value.
    pub result: Option<TempId>,
    /// Opcode.
    pub op: Opcode,
    /// Result type (or the accessed type for `store`), `void` for effect-only ops.
    pub ty: Type,
    /// Value operands.
    pub operands: Vec<Value>,
    /// Callee symbol for `call`.
    pub callee: Option<Box<str>>,
    /// Branch target labels.
    pub labels: Vec<Box<str>>,
    /// Branch arguments, parallel to `labels`.
    pub br_args: Vec<Vec<Value>>,
    /// Source location.
    pub loc: SourceLoc,
}

impl Instr {
    /// Creates an instruction with no labels or callee.
    #[must_use]
    pub fn new(op: Opcode, ty: Type, result: Option<TempId>, operands: Vec<Value>) -> Self {
        Self {
            result,
            op,
            ty,
            operands,
            callee: None,
            labels: Vec::new(),
            br_args: Vec::new(),
            loc: SourceLoc::default(),
        }
    }

    /// Creates `br label(args)`.
    #[must_use]
    pub fn br(label: impl Into<Box<str>>, args: Vec<Value>) -> Self {
        let mut i = Self::new(Opcode::Br, Type::Void, None, Vec::new());
        i.labels.push(label.into());
        i.br_args.push(args);
        i
    }

    /// Creates `ret v?`.
    #[must_use]
    pub fn ret(value: Option<Value>) -> Self {
        Self::new(Opcode::Ret, Type::Void, None, value.into_iter().collect())
    }

    /// Returns `true` if this is a terminator.
    #[inline]
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        self.op.is_terminator()
    }

    /// Iterates every value read by the instruction (operands, then branch arguments).
    pub fn uses(&self) -> impl Iterator<Item = &Value> + '_ {
        self.operands
            .iter()
            .chain(self.br_args.iter().flat_map(|args| args.iter()))
    }

    /// Iterates every temp read by the instruction.
    pub fn used_temps(&self) -> impl Iterator<Item = TempId> + '_ {
        self.uses().filter_map(Value::as_temp)
    }

    /// Mutably visits every value read by the instruction.
    pub fn for_each_use_mut(&mut self, mut f: impl FnMut(&mut Value)) {
        for v in &mut self.operands {
            f(v);
        }
        for args in &mut self.br_args {
            for v in args {
                f(v);
            }
        }
    }

    /// Replaces every use of `from` with `to`; returns the number of replacements.
    pub fn replace_temp(&mut self, from: TempId, to: &Value) -> usize {
        let mut n = 0;
        self.for_each_use_mut(|v| {
            if v.as_temp() == Some(from) {
                *v = to.clone();
                n += 1;
            }
        });
        n
    }

    /// Returns the branch arguments passed to the `i`-th label.
    #[must_use]
    pub fn args_for(&self, i: usize) -> &[Value] {
        self.br_args.get(i).map_or(&[], Vec::as_slice)
    }
}
