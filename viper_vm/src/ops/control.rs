// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Branches, returns, and `trap`.

use viper_il::Type;
use viper_rt::{RtTrap, TrapKind};

use crate::dispatch::{Flow, OpResult};
use crate::program::{LoadedInstr, Target};
use crate::vm::{Exec, malformed};

fn target(ins: &LoadedInstr, i: usize) -> Result<&Target, RtTrap> {
    ins.targets
        .get(i)
        .ok_or_else(|| malformed("branch is missing a target"))
}

pub(crate) fn br(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    ex.jump(target(ins, 0)?)
}

pub(crate) fn cbr(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let cond = ex.operand(ins, 0)?.int()?;
    ex.jump(target(ins, if cond & 1 != 0 { 0 } else { 1 })?)
}

/// Scans cases in order; the first equal case wins, otherwise the default (target 0) is taken.
pub(crate) fn switch_i32(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let v = Type::I32.wrap_int(ex.operand(ins, 0)?.int()?);
    let mut taken = 0;
    for (i, case) in ins.operands.iter().enumerate().skip(1) {
        if Type::I32.wrap_int(ex.eval(case)?.int()?) == v {
            taken = i;
            break;
        }
    }
    ex.jump(target(ins, taken)?)
}

pub(crate) fn ret(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let value = match ins.operands.first() {
        Some(op) => Some(ex.eval(op)?),
        None => None,
    };
    let Some(dest) = ex.pop_frame()? else {
        return Ok(Flow::Halt(value));
    };
    if let (Some(reg), Some(v)) = (dest, value) {
        ex.set_reg(reg, v);
    }
    ex.current.ip += 1;
    Ok(Flow::Jumped)
}

pub(crate) fn trap(_ex: &mut Exec<'_, '_>, _ins: &LoadedInstr) -> OpResult {
    Err(RtTrap::new(TrapKind::Unreachable))
}
