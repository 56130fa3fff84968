// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer arithmetic, bitwise, and compare handlers.
//!
//! Registers hold integers normalized to their type's width (sign-extended), so every result is
//! passed back through [`Type::wrap_int`].

use viper_il::{Opcode, Type};
use viper_rt::{RtTrap, TrapKind};

use crate::dispatch::{Flow, OpResult};
use crate::program::LoadedInstr;
use crate::slot::{Ptr, Slot};
use crate::vm::{Exec, malformed};

fn operands(ex: &Exec<'_, '_>, ins: &LoadedInstr) -> Result<(i64, i64), RtTrap> {
    Ok((ex.operand(ins, 0)?.int()?, ex.operand(ins, 1)?.int()?))
}

fn shift_amount(ty: Type, b: i64) -> u32 {
    let mask = i64::from(ty.bit_width().max(1) - 1);
    u32::try_from(b & mask).unwrap_or(0)
}

/// `add`, `sub`, `mul`, and the division family.
pub(crate) fn arith(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let (a, b) = operands(ex, ins)?;
    let ty = ins.ty;
    let v = match ins.op {
        Opcode::IAdd => a.wrapping_add(b),
        Opcode::ISub => a.wrapping_sub(b),
        Opcode::IMul => a.wrapping_mul(b),
        Opcode::SDiv | Opcode::SRem => {
            if b == 0 {
                return Err(RtTrap::new(TrapKind::DivideByZero));
            }
            if ins.op == Opcode::SRem {
                a.wrapping_rem(b)
            } else if b == -1 && Some(a) == ty.int_min() {
                return Err(RtTrap::new(TrapKind::Overflow));
            } else {
                a / b
            }
        }
        Opcode::UDiv | Opcode::URem => {
            let (ua, ub) = (ty.as_unsigned(a), ty.as_unsigned(b));
            if ub == 0 {
                return Err(RtTrap::new(TrapKind::DivideByZero));
            }
            let q = if ins.op == Opcode::UDiv { ua / ub } else { ua % ub };
            q.cast_signed()
        }
        _ => return Err(malformed("not an integer arithmetic opcode")),
    };
    ex.set(ins, Slot::I64(ty.wrap_int(v)));
    Ok(Flow::Next)
}

/// `iadd.ovf`, `isub.ovf`, `imul.ovf`: trap when the exact result leaves the type's range.
pub(crate) fn checked(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let (a, b) = operands(ex, ins)?;
    let ty = ins.ty;
    let exact = match ins.op {
        Opcode::IAddOvf => a.checked_add(b),
        Opcode::ISubOvf => a.checked_sub(b),
        Opcode::IMulOvf => a.checked_mul(b),
        _ => return Err(malformed("not a checked arithmetic opcode")),
    };
    let (min, max) = (ty.int_min().unwrap_or(i64::MIN), ty.int_max().unwrap_or(i64::MAX));
    let v = exact
        .filter(|v| (min..=max).contains(v))
        .ok_or(RtTrap::new(TrapKind::Overflow))?;
    ex.set(ins, Slot::I64(v));
    Ok(Flow::Next)
}

/// `and`, `or`, `xor`, and shifts. Shift counts are taken modulo the bit width.
pub(crate) fn bitwise(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let (a, b) = operands(ex, ins)?;
    let ty = ins.ty;
    let v = match ins.op {
        Opcode::And => a & b,
        Opcode::Or => a | b,
        Opcode::Xor => a ^ b,
        Opcode::Shl => a.wrapping_shl(shift_amount(ty, b)),
        Opcode::LShr => (ty.as_unsigned(a) >> shift_amount(ty, b)).cast_signed(),
        Opcode::AShr => a >> shift_amount(ty, b),
        _ => return Err(malformed("not a bitwise opcode")),
    };
    ex.set(ins, Slot::I64(ty.wrap_int(v)));
    Ok(Flow::Next)
}

fn ref_key(s: Slot) -> Result<Ptr, RtTrap> {
    match s {
        Slot::Str(Some(o)) => Ok(Ptr::Obj(o)),
        other => other.ptr(),
    }
}

/// Integer compares. Equality also accepts pointers and strings, compared by identity.
pub(crate) fn compare(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let (l, r) = (ex.operand(ins, 0)?, ex.operand(ins, 1)?);
    let equality = matches!(ins.op, Opcode::ICmpEq | Opcode::ICmpNe);
    if equality && !(matches!(l, Slot::I64(_)) && matches!(r, Slot::I64(_))) {
        let same = ref_key(l)? == ref_key(r)?;
        ex.set(ins, Slot::I64(i64::from(same == (ins.op == Opcode::ICmpEq))));
        return Ok(Flow::Next);
    }
    let (a, b) = (l.int()?, r.int()?);
    let ty = ins.src_ty;
    let (ua, ub) = (ty.as_unsigned(a), ty.as_unsigned(b));
    let v = match ins.op {
        Opcode::ICmpEq => a == b,
        Opcode::ICmpNe => a != b,
        Opcode::SCmpLt => a < b,
        Opcode::SCmpLe => a <= b,
        Opcode::SCmpGt => a > b,
        Opcode::SCmpGe => a >= b,
        Opcode::UCmpLt => ua < ub,
        Opcode::UCmpLe => ua <= ub,
        Opcode::UCmpGt => ua > ub,
        Opcode::UCmpGe => ua >= ub,
        _ => return Err(malformed("not an integer compare opcode")),
    };
    ex.set(ins, Slot::I64(i64::from(v)));
    Ok(Flow::Next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_counts_wrap_at_the_width() {
        assert_eq!(shift_amount(Type::I64, 65), 1);
        assert_eq!(shift_amount(Type::I32, 33), 1);
        assert_eq!(shift_amount(Type::I16, -1), 15);
        assert_eq!(shift_amount(Type::I1, 5), 0);
    }

    #[test]
    fn identity_keys_unify_null_pointers_and_strings() {
        assert_eq!(ref_key(Slot::Str(None)), Ok(Ptr::Null));
        assert_eq!(ref_key(Slot::Ptr(Ptr::Null)), Ok(Ptr::Null));
        assert!(ref_key(Slot::F64(0.0)).is_err());
    }
}
