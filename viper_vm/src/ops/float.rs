// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! IEEE-754 arithmetic and compares.

use viper_il::Opcode;

use crate::dispatch::{Flow, OpResult};
use crate::program::LoadedInstr;
use crate::slot::Slot;
use crate::vm::{Exec, malformed};

pub(crate) fn arith(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let (a, b) = (ex.operand(ins, 0)?.float()?, ex.operand(ins, 1)?.float()?);
    let v = match ins.op {
        Opcode::FAdd => a + b,
        Opcode::FSub => a - b,
        Opcode::FMul => a * b,
        Opcode::FDiv => a / b,
        _ => return Err(malformed("not a float arithmetic opcode")),
    };
    ex.set(ins, Slot::F64(v));
    Ok(Flow::Next)
}

/// Ordered compares are false when either side is NaN; `fcmp_ne` and `fcmp_uno` are true.
pub(crate) fn compare(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let (a, b) = (ex.operand(ins, 0)?.float()?, ex.operand(ins, 1)?.float()?);
    let unordered = a.is_nan() || b.is_nan();
    let v = match ins.op {
        Opcode::FCmpEq => a == b,
        Opcode::FCmpNe => a != b,
        Opcode::FCmpLt => a < b,
        Opcode::FCmpLe => a <= b,
        Opcode::FCmpGt => a > b,
        Opcode::FCmpGe => a >= b,
        Opcode::FCmpOrd => !unordered,
        Opcode::FCmpUno => unordered,
        _ => return Err(malformed("not a float compare opcode")),
    };
    ex.set(ins, Slot::I64(i64::from(v)));
    Ok(Flow::Next)
}
