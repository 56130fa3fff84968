// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Constant folding and algebraic simplification of single instructions.
//!
//! Folding evaluates with the same width and wrapping rules as the VM. Ops that may trap are only
//! folded when the constant operands prove they do not (no division by zero, no overflow, casts in
//! range).

use alloc::vec;
use alloc::vec::Vec;

use crate::diag::Diagnostics;
use crate::instr::Instr;
use crate::module::{Function, Module};
use crate::opcode::Opcode;
use crate::transform::pass_manager::Pass;
use crate::transform::util::apply_substitutions;
use crate::types::Type;
use crate::value::Value;

/// The `peephole` pass.
#[derive(Copy, Clone, Debug, Default)]
pub struct Peephole;

impl Pass for Peephole {
    fn name(&self) -> &'static str {
        "peephole"
    }

    fn run(&mut self, module: &mut Module, _diags: &mut Diagnostics) -> bool {
        let mut folded = 0;
        for f in &mut module.functions {
            folded += simplify_function(f);
        }
        tracing::debug!(folded, "peephole finished");
        true
    }
}

/// Folds and simplifies `f` to a fixpoint. Returns the number of instructions removed.
pub fn simplify_function(f: &mut Function) -> usize {
    let mut total = 0;
    loop {
        let mut subst: Vec<Option<Value>> = vec![None; f.temp_count()];
        let mut removed = 0;
        for b in &mut f.blocks {
            b.instrs.retain(|ins| {
                let Some(r) = ins.result else {
                    return true;
                };
                match simplify(ins) {
                    Some(v) => {
                        subst[r.index()] = Some(v);
                        removed += 1;
                        false
                    }
                    None => true,
                }
            });
        }
        if removed == 0 {
            return total;
        }
        apply_substitutions(f, &subst);
        total += removed;
    }
}

/// Returns the value `ins` reduces to, if any.
#[must_use]
pub fn simplify(ins: &Instr) -> Option<Value> {
    match ins.operands.as_slice() {
        [a] => fold_unary(ins.op, ins.ty, a),
        [a, b] => fold_binary(ins.op, ins.ty, a, b).or_else(|| identity(ins.op, ins.ty, a, b)),
        _ => None,
    }
}

fn float_of(v: &Value) -> Option<f64> {
    match v {
        Value::ConstFloat(x) => Some(*x),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, reason = "casts are range-checked first")]
fn fold_unary(op: Opcode, ty: Type, a: &Value) -> Option<Value> {
    match op {
        Opcode::IConst => a.as_const_int().map(|v| Value::ConstInt(ty.wrap_int(v))),
        Opcode::FConst => match a {
            Value::ConstFloat(x) => Some(Value::ConstFloat(*x)),
            Value::ConstInt(v) => Some(Value::ConstFloat(*v as f64)),
            _ => None,
        },
        Opcode::Trunc1 => a.as_const_int().map(|v| Value::ConstInt(v & 1)),
        Opcode::Zext1 => a.as_const_int().map(|v| Value::ConstInt(i64::from(v != 0))),
        Opcode::Sitofp => a.as_const_int().map(|v| Value::ConstFloat(v as f64)),
        Opcode::CastSiNarrowChk => {
            let v = a.as_const_int()?;
            (ty.int_min()? <= v && v <= ty.int_max()?).then_some(Value::ConstInt(v))
        }
        Opcode::CastUiNarrowChk => {
            let v = a.as_const_int()? as u64;
            (v <= ty.uint_max()?).then(|| Value::ConstInt(ty.wrap_int(v as i64)))
        }
        Opcode::Fptosi => {
            let x = float_of(a)?.trunc();
            in_i64_range(x).then(|| Value::ConstInt(x as i64)).filter(|v| fits(ty, v))
        }
        Opcode::CastFpToSiRteChk => {
            let x = float_of(a)?.round_ties_even();
            in_i64_range(x).then(|| Value::ConstInt(x as i64)).filter(|v| fits(ty, v))
        }
        _ => None,
    }
}

fn in_i64_range(x: f64) -> bool {
    x.is_finite() && (-9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0).contains(&x)
}

fn fits(ty: Type, v: &Value) -> bool {
    let (Some(lo), Some(hi)) = (ty.int_min(), ty.int_max()) else {
        return false;
    };
    v.as_const_int().is_some_and(|v| (lo..=hi).contains(&v))
}

fn fold_binary(op: Opcode, ty: Type, a: &Value, b: &Value) -> Option<Value> {
    if let (Some(x), Some(y)) = (float_of(a), float_of(b)) {
        return fold_float(op, x, y);
    }
    let (x, y) = (a.as_const_int()?, b.as_const_int()?);
    if matches!(
        op,
        Opcode::ICmpEq
            | Opcode::ICmpNe
            | Opcode::SCmpLt
            | Opcode::SCmpLe
            | Opcode::SCmpGt
            | Opcode::SCmpGe
            | Opcode::UCmpLt
            | Opcode::UCmpLe
            | Opcode::UCmpGt
            | Opcode::UCmpGe
    ) {
        // Compares carry an i1 result type; evaluate at full width.
        return fold_compare(op, x, y).map(|c| Value::ConstInt(i64::from(c)));
    }
    fold_int(op, ty, x, y).map(Value::ConstInt)
}

/// Integer arithmetic at the width of `ty`. `None` when the op would trap.
#[must_use]
#[allow(clippy::cast_possible_truncation, reason = "shift counts are masked to the width")]
pub fn fold_int(op: Opcode, ty: Type, x: i64, y: i64) -> Option<i64> {
    let bits = ty.bit_width();
    if bits == 0 {
        return None;
    }
    let (x, y) = (ty.wrap_int(x), ty.wrap_int(y));
    let (ux, uy) = (ty.as_unsigned(x), ty.as_unsigned(y));
    let shift = (y as u32) & (bits - 1);
    let checked = |r: Option<i64>| r.filter(|v| ty.wrap_int(*v) == *v);
    let v = match op {
        Opcode::IAdd => x.wrapping_add(y),
        Opcode::ISub => x.wrapping_sub(y),
        Opcode::IMul => x.wrapping_mul(y),
        Opcode::And => x & y,
        Opcode::Or => x | y,
        Opcode::Xor => x ^ y,
        Opcode::Shl => ((ux << shift) & mask(bits)) as i64,
        Opcode::LShr => (ux >> shift) as i64,
        Opcode::AShr => x >> shift,
        Opcode::SDiv => checked(x.checked_div(y))?,
        Opcode::SRem => checked(x.checked_rem(y))?,
        Opcode::UDiv => ux.checked_div(uy)? as i64,
        Opcode::URem => ux.checked_rem(uy)? as i64,
        Opcode::IAddOvf => checked(x.checked_add(y))?,
        Opcode::ISubOvf => checked(x.checked_sub(y))?,
        Opcode::IMulOvf => checked(x.checked_mul(y))?,
        _ => return None,
    };
    Some(ty.wrap_int(v))
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1_u64 << bits) - 1 }
}

fn fold_compare(op: Opcode, x: i64, y: i64) -> Option<bool> {
    let (ux, uy) = (x as u64, y as u64);
    Some(match op {
        Opcode::ICmpEq => x == y,
        Opcode::ICmpNe => x != y,
        Opcode::SCmpLt => x < y,
        Opcode::SCmpLe => x <= y,
        Opcode::SCmpGt => x > y,
        Opcode::SCmpGe => x >= y,
        Opcode::UCmpLt => ux < uy,
        Opcode::UCmpLe => ux <= uy,
        Opcode::UCmpGt => ux > uy,
        Opcode::UCmpGe => ux >= uy,
        _ => return None,
    })
}

fn fold_float(op: Opcode, x: f64, y: f64) -> Option<Value> {
    let cmp = |c: bool| Some(Value::ConstInt(i64::from(c)));
    match op {
        Opcode::FAdd => Some(Value::ConstFloat(x + y)),
        Opcode::FSub => Some(Value::ConstFloat(x - y)),
        Opcode::FMul => Some(Value::ConstFloat(x * y)),
        Opcode::FDiv => Some(Value::ConstFloat(x / y)),
        Opcode::FCmpEq => cmp(x == y),
        Opcode::FCmpNe => cmp(x != y),
        Opcode::FCmpLt => cmp(x < y),
        Opcode::FCmpLe => cmp(x <= y),
        Opcode::FCmpGt => cmp(x > y),
        Opcode::FCmpGe => cmp(x >= y),
        Opcode::FCmpOrd => cmp(!x.is_nan() && !y.is_nan()),
        Opcode::FCmpUno => cmp(x.is_nan() || y.is_nan()),
        _ => None,
    }
}

/// Algebraic identities with one constant operand.
fn identity(op: Opcode, ty: Type, a: &Value, b: &Value) -> Option<Value> {
    if !ty.is_integer() {
        return None;
    }
    if let (Some(x), Some(y)) = (a.as_temp(), b.as_temp())
        && x == y
    {
        return match op {
            Opcode::ISub | Opcode::Xor => Some(Value::ConstInt(0)),
            Opcode::And | Opcode::Or => Some(a.clone()),
            _ => None,
        };
    }
    let (ca, cb) = (a.as_const_int(), b.as_const_int());
    match (op, ca, cb) {
        (Opcode::IAdd | Opcode::Or | Opcode::Xor, Some(0), None) => Some(b.clone()),
        (
            Opcode::IAdd | Opcode::ISub | Opcode::Or | Opcode::Xor | Opcode::Shl | Opcode::LShr
            | Opcode::AShr,
            None,
            Some(0),
        ) => Some(a.clone()),
        (Opcode::IMul, Some(1), None) => Some(b.clone()),
        (Opcode::IMul, None, Some(1)) => Some(a.clone()),
        (Opcode::IMul | Opcode::And, Some(0), None)
        | (Opcode::IMul | Opcode::And, None, Some(0)) => Some(Value::ConstInt(0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse_module;

    #[test]
    fn folds_the_bitwise_chain() {
        let src = "il 0.1.2
func @main() -> i64 {
entry:
  %a = iconst.i64 0xFF00FF00
  %b = iconst.i64 0x00000100
  %c = and.i64 %a, %b
  %d = or.i64 %c, 0x2
  %e = xor.i64 %d, 0x5
  ret %e
}
";
        let mut m = parse_module(src).unwrap();
        assert_eq!(simplify_function(&mut m.functions[0]), 5);
        let entry = &m.functions[0].blocks[0];
        assert_eq!(entry.instrs.len(), 1);
        assert_eq!(entry.instrs[0].operands, [Value::ConstInt(0x107)]);
    }

    #[test]
    fn trapping_ops_fold_only_when_safe() {
        assert_eq!(fold_int(Opcode::SDiv, Type::I64, 7, 0), None);
        assert_eq!(fold_int(Opcode::SDiv, Type::I64, i64::MIN, -1), None);
        assert_eq!(fold_int(Opcode::IAddOvf, Type::I64, i64::MAX, 1), None);
        assert_eq!(fold_int(Opcode::IAddOvf, Type::I32, i64::from(i32::MAX), 1), None);
        assert_eq!(
            fold_int(Opcode::IAdd, Type::I32, i64::from(i32::MAX), 1),
            Some(i64::from(i32::MIN))
        );
        assert_eq!(fold_int(Opcode::IAddOvf, Type::I64, 40, 2), Some(42));
        assert_eq!(fold_int(Opcode::UDiv, Type::I64, -2, 2), Some(i64::MAX));
        assert_eq!(fold_int(Opcode::AShr, Type::I64, -8, 1), Some(-4));
        assert_eq!(fold_int(Opcode::LShr, Type::I64, -8, 60), Some(15));
        assert_eq!(fold_int(Opcode::Shl, Type::I64, 1, 65), Some(2));
    }

    #[test]
    fn identities_forward_the_other_operand() {
        let src = "il 0.1.2
func @f(i64 %x) -> i64 {
entry:
  %a = add.i64 %x, 0
  %b = mul.i64 1, %a
  %c = and.i64 %b, 0
  %d = sub.i64 %b, %b
  %e = add.i64 %c, %d
  %g = or.i64 %b, %e
  ret %g
}
";
        let mut m = parse_module(src).unwrap();
        simplify_function(&mut m.functions[0]);
        let entry = &m.functions[0].blocks[0];
        assert_eq!(entry.instrs.len(), 1);
        assert_eq!(entry.instrs[0].operands, [Value::Temp(crate::value::TempId(0))]);
    }

    #[test]
    fn float_compares_respect_nan() {
        assert_eq!(fold_float(Opcode::FCmpEq, f64::NAN, f64::NAN), Some(Value::ConstInt(0)));
        assert_eq!(fold_float(Opcode::FCmpUno, f64::NAN, 1.0), Some(Value::ConstInt(1)));
        assert_eq!(fold_float(Opcode::FCmpNe, f64::NAN, 1.0), Some(Value::ConstInt(1)));
        assert!(matches!(
            fold_float(Opcode::FDiv, 1.0, 0.0),
            Some(Value::ConstFloat(x)) if x == f64::INFINITY
        ));
    }
}
