// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scalar conversions.

use viper_il::{Opcode, Type};
use viper_rt::{RtTrap, TrapKind};

use crate::dispatch::{Flow, OpResult};
use crate::program::LoadedInstr;
use crate::slot::Slot;
use crate::vm::{Exec, malformed};

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

fn int_range(ty: Type) -> (i64, i64) {
    (ty.int_min().unwrap_or(i64::MIN), ty.int_max().unwrap_or(i64::MAX))
}

/// Converts an integral float already known to lie in `[-2^63, 2^63)`.
#[allow(clippy::cast_possible_truncation, reason = "range checked by the caller")]
fn integral_to_i64(v: f64) -> i64 {
    v as i64
}

/// Converts an integral float already known to lie in `[0, 2^64)`.
#[allow(clippy::cast_possible_truncation, reason = "range checked by the caller")]
fn integral_to_u64(v: f64) -> u64 {
    v as u64
}

/// Rounds `v` toward zero into `ty`.
pub(crate) fn fp_to_si(v: f64, ty: Type) -> Result<i64, RtTrap> {
    if !v.is_finite() {
        return Err(RtTrap::new(TrapKind::InvalidCast));
    }
    let t = v.trunc();
    if !(-TWO_POW_63..TWO_POW_63).contains(&t) {
        return Err(RtTrap::new(TrapKind::Overflow));
    }
    let n = integral_to_i64(t);
    let (min, max) = int_range(ty);
    if !(min..=max).contains(&n) {
        return Err(RtTrap::new(TrapKind::Overflow));
    }
    Ok(n)
}

/// Rounds `v` to nearest, ties to even, into signed `ty`.
pub(crate) fn fp_to_si_rte(v: f64, ty: Type) -> Result<i64, RtTrap> {
    if !v.is_finite() {
        return Err(RtTrap::new(TrapKind::InvalidCast));
    }
    let r = v.round_ties_even();
    if !(-TWO_POW_63..TWO_POW_63).contains(&r) {
        return Err(RtTrap::new(TrapKind::InvalidCast));
    }
    let n = integral_to_i64(r);
    let (min, max) = int_range(ty);
    if !(min..=max).contains(&n) {
        return Err(RtTrap::new(TrapKind::InvalidCast));
    }
    Ok(n)
}

/// Rounds `v` to nearest, ties to even, into unsigned `ty`. The result is returned in register
/// form (normalized to the width).
pub(crate) fn fp_to_ui_rte(v: f64, ty: Type) -> Result<i64, RtTrap> {
    if v.is_nan() {
        return Err(RtTrap::new(TrapKind::InvalidCast));
    }
    let r = v.round_ties_even();
    if r < 0.0 {
        return Err(RtTrap::new(TrapKind::InvalidCast));
    }
    if r >= TWO_POW_64 {
        return Err(RtTrap::new(TrapKind::Overflow));
    }
    let n = integral_to_u64(r);
    if n > ty.uint_max().unwrap_or(u64::MAX) {
        return Err(RtTrap::new(TrapKind::InvalidCast));
    }
    Ok(ty.wrap_int(n.cast_signed()))
}

pub(crate) fn cast(ex: &mut Exec<'_, '_>, ins: &LoadedInstr) -> OpResult {
    let x = ex.operand(ins, 0)?;
    let ty = ins.ty;
    let v = match ins.op {
        Opcode::Trunc1 => Slot::I64(x.int()? & 1),
        Opcode::Zext1 => Slot::I64(i64::from(x.int()? != 0)),
        Opcode::Sitofp => Slot::F64(x.int()? as f64),
        Opcode::Fptosi => Slot::I64(fp_to_si(x.float()?, ty)?),
        Opcode::CastFpToSiRteChk => Slot::I64(fp_to_si_rte(x.float()?, ty)?),
        Opcode::CastFpToUiRteChk => Slot::I64(fp_to_ui_rte(x.float()?, ty)?),
        Opcode::CastSiNarrowChk => {
            let n = x.int()?;
            let (min, max) = int_range(ty);
            if !(min..=max).contains(&n) {
                return Err(RtTrap::new(TrapKind::InvalidCast));
            }
            Slot::I64(n)
        }
        Opcode::CastUiNarrowChk => {
            let u = ins.src_ty.as_unsigned(x.int()?);
            if u > ty.uint_max().unwrap_or(u64::MAX) {
                return Err(RtTrap::new(TrapKind::InvalidCast));
            }
            Slot::I64(ty.wrap_int(u.cast_signed()))
        }
        _ => return Err(malformed("not a cast opcode")),
    };
    ex.set(ins, v);
    Ok(Flow::Next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fptosi_truncates_and_classifies_failures() {
        assert_eq!(fp_to_si(-2.9, Type::I64), Ok(-2));
        assert_eq!(fp_to_si(f64::NAN, Type::I64).unwrap_err().kind, TrapKind::InvalidCast);
        assert_eq!(
            fp_to_si(f64::NEG_INFINITY, Type::I64).unwrap_err().kind,
            TrapKind::InvalidCast
        );
        assert_eq!(fp_to_si(1e19, Type::I64).unwrap_err().kind, TrapKind::Overflow);
        assert_eq!(fp_to_si(40000.0, Type::I16).unwrap_err().kind, TrapKind::Overflow);
    }

    #[test]
    fn rte_casts_round_half_to_even() {
        assert_eq!(fp_to_si_rte(2.5, Type::I64), Ok(2));
        assert_eq!(fp_to_si_rte(-3.5, Type::I32), Ok(-4));
        assert_eq!(fp_to_ui_rte(3.5, Type::I64), Ok(4));
        assert_eq!(fp_to_ui_rte(-0.4, Type::I64), Ok(0), "rounds to zero");
        assert_eq!(fp_to_ui_rte(-1.0, Type::I64).unwrap_err().kind, TrapKind::InvalidCast);
        assert_eq!(fp_to_ui_rte(TWO_POW_64, Type::I64).unwrap_err().kind, TrapKind::Overflow);
        assert_eq!(fp_to_ui_rte(70000.0, Type::I16).unwrap_err().kind, TrapKind::InvalidCast);
        assert_eq!(fp_to_ui_rte(65535.0, Type::I16), Ok(-1), "register form is sign-extended");
    }
}
