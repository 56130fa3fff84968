// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Removal of run-time checks that cannot fail or that already ran.
//!
//! A *check* is a value-producing instruction whose only effect is a possible trap: overflow
//! checked arithmetic, division, and the checked casts. `check-opt` does three things, in order:
//!
//! 1. **Demotion.** `iadd.ovf`/`isub.ovf`/`imul.ovf` become their wrapping forms when the
//!    operand ranges prove the exact result fits the type. Ranges come from constants, `i1`
//!    producers, non-negative `and` masks, shifts and remainders by constants.
//! 2. **Redundancy.** A check identical to one in a dominating block (or earlier in the same
//!    block) is dropped and its result replaced; the first one either trapped or produced the
//!    same value.
//! 3. **Hoisting.** A check in a loop header whose operands are defined outside the loop moves
//!    to the preheader, provided nothing before it in the header has an effect or may trap and
//!    the loop contains no exception-handling instructions.

use alloc::vec;
use alloc::vec::Vec;

use crate::analysis::cfg::FunctionCfg;
use crate::analysis::dominators::DomTree;
use crate::analysis::loops::natural_loops;
use crate::diag::Diagnostics;
use crate::instr::Instr;
use crate::module::{Function, Module};
use crate::opcode::{OpClass, Opcode};
use crate::transform::cse::dominator_scoped_reuse;
use crate::transform::pass_manager::Pass;
use crate::transform::util::def_blocks;
use crate::types::Type;
use crate::value::Value;

/// The `check-opt` pass.
#[derive(Copy, Clone, Debug, Default)]
pub struct CheckOpt;

impl Pass for CheckOpt {
    fn name(&self) -> &'static str {
        "check-opt"
    }

    fn run(&mut self, module: &mut Module, _diags: &mut Diagnostics) -> bool {
        let mut stats = CheckOptStats::default();
        for f in &mut module.functions {
            let s = optimize_checks(f);
            stats.demoted += s.demoted;
            stats.merged += s.merged;
            stats.hoisted += s.hoisted;
        }
        tracing::debug!(
            demoted = stats.demoted,
            merged = stats.merged,
            hoisted = stats.hoisted,
            "check-opt finished"
        );
        true
    }
}

/// Per-function counts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckOptStats {
    /// Checked ops rewritten to wrapping ops.
    pub demoted: usize,
    /// Checks removed as dominated duplicates.
    pub merged: usize,
    /// Checks moved out of loops.
    pub hoisted: usize,
}

/// Returns `true` for opcodes whose only effect is a possible trap.
#[must_use]
pub fn is_check(op: Opcode) -> bool {
    let info = op.info();
    info.may_trap
        && !info.side_effects
        && !info.terminator
        && info.has_result
        && matches!(info.class, OpClass::IntBinary | OpClass::Cast)
}

/// Runs all three phases on `f`.
pub fn optimize_checks(f: &mut Function) -> CheckOptStats {
    if f.blocks.is_empty() {
        return CheckOptStats::default();
    }
    CheckOptStats {
        demoted: demote_proven(f),
        merged: dominator_scoped_reuse(f, is_check),
        hoisted: hoist_header_checks(f),
    }
}

/// Closed interval of possible values, wide enough to hold any product of two `i64`s.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Range {
    lo: i128,
    hi: i128,
}

impl Range {
    fn point(v: i64) -> Self {
        Self {
            lo: v.into(),
            hi: v.into(),
        }
    }

    fn of_type(ty: Type) -> Option<Self> {
        Some(Self {
            lo: ty.int_min()?.into(),
            hi: ty.int_max()?.into(),
        })
    }

    fn within(self, outer: Self) -> bool {
        outer.lo <= self.lo && self.hi <= outer.hi
    }

    fn add(self, o: Self) -> Self {
        Self {
            lo: self.lo + o.lo,
            hi: self.hi + o.hi,
        }
    }

    fn sub(self, o: Self) -> Self {
        Self {
            lo: self.lo - o.hi,
            hi: self.hi - o.lo,
        }
    }

    fn mul(self, o: Self) -> Self {
        let corners = [self.lo * o.lo, self.lo * o.hi, self.hi * o.lo, self.hi * o.hi];
        Self {
            lo: corners.into_iter().min().unwrap_or(i128::MIN),
            hi: corners.into_iter().max().unwrap_or(i128::MAX),
        }
    }

    fn clamp_to(self, outer: Self) -> Self {
        Self {
            lo: self.lo.max(outer.lo),
            hi: self.hi.min(outer.hi),
        }
    }
}

struct Ranges(Vec<Option<Range>>);

impl Ranges {
    fn operand(&self, v: Option<&Value>, ty: Type) -> Option<Range> {
        match v? {
            Value::ConstInt(c) => Some(Range::point(*c)),
            Value::Temp(t) => self
                .0
                .get(t.index())
                .copied()
                .flatten()
                .or_else(|| Range::of_type(ty)),
            _ => None,
        }
    }

    /// Exact (unwrapped) result range of a two-operand arithmetic op.
    fn exact(&self, ins: &Instr) -> Option<Range> {
        let a = self.operand(ins.operands.first(), ins.ty)?;
        let b = self.operand(ins.operands.get(1), ins.ty)?;
        match ins.op {
            Opcode::IAdd | Opcode::IAddOvf => Some(a.add(b)),
            Opcode::ISub | Opcode::ISubOvf => Some(a.sub(b)),
            Opcode::IMul | Opcode::IMulOvf => Some(a.mul(b)),
            _ => None,
        }
    }

    /// Range of the value `ins` produces, if narrower than its type.
    fn result(&self, ins: &Instr) -> Option<Range> {
        let full = Range::of_type(ins.ty)?;
        let const_rhs = ins.operands.get(1).and_then(Value::as_const_int);
        let derived = match ins.op {
            Opcode::IConst => ins.operands.first()?.as_const_int().map(Range::point),
            Opcode::Zext1 | Opcode::Trunc1 => Some(Range { lo: 0, hi: 1 }),
            _ if matches!(ins.op.info().class, OpClass::IntCompare | OpClass::FloatCompare) => {
                Some(Range { lo: 0, hi: 1 })
            }
            Opcode::And => {
                let lhs = ins.operands.first().and_then(Value::as_const_int);
                let mask = const_rhs.or(lhs).filter(|m| *m >= 0)?;
                Some(Range {
                    lo: 0,
                    hi: mask.into(),
                })
            }
            Opcode::LShr => {
                let k = u32::try_from(const_rhs?).ok()?;
                let width = ins.ty.bit_width();
                (1..width).contains(&k).then(|| Range {
                    lo: 0,
                    hi: ins.ty.uint_max().map_or(0, |m| i128::from(m >> k)),
                })
            }
            Opcode::URem => {
                let m = const_rhs.filter(|m| *m > 0)?;
                Some(Range {
                    lo: 0,
                    hi: i128::from(m) - 1,
                })
            }
            Opcode::SRem => {
                let m = i128::from(const_rhs.filter(|m| *m != 0)?).abs();
                Some(Range {
                    lo: 1 - m,
                    hi: m - 1,
                })
            }
            Opcode::IAdd | Opcode::ISub | Opcode::IMul => {
                self.exact(ins).filter(|r| r.within(full))
            }
            Opcode::IAddOvf | Opcode::ISubOvf | Opcode::IMulOvf => {
                self.exact(ins).map(|r| r.clamp_to(full))
            }
            _ => None,
        };
        derived.filter(|r| r.within(full))
    }
}

/// Rewrites checked arithmetic whose result provably fits. Returns the number rewritten.
fn demote_proven(f: &mut Function) -> usize {
    let cfg = FunctionCfg::new(f);
    let mut ranges = Ranges(vec![None; f.temp_count()]);
    let mut demoted = 0;
    // Reverse post-order visits definitions before the uses they dominate.
    for b in cfg.reverse_post_order() {
        for ins in &mut f.blocks[b].instrs {
            if matches!(ins.op, Opcode::IAddOvf | Opcode::ISubOvf | Opcode::IMulOvf)
                && let (Some(exact), Some(full)) = (ranges.exact(ins), Range::of_type(ins.ty))
                && exact.within(full)
            {
                ins.op = match ins.op {
                    Opcode::IAddOvf => Opcode::IAdd,
                    Opcode::ISubOvf => Opcode::ISub,
                    _ => Opcode::IMul,
                };
                demoted += 1;
            }
            let known = ranges.result(ins);
            if let Some(r) = ins.result
                && let Some(slot) = ranges.0.get_mut(r.index())
            {
                *slot = known;
            }
        }
    }
    demoted
}

/// Moves invariant checks from loop headers to preheaders. Returns the number moved.
fn hoist_header_checks(f: &mut Function) -> usize {
    let cfg = FunctionCfg::new(f);
    let dt = DomTree::compute(&cfg);
    let mut loops = natural_loops(&cfg, &dt);
    loops.sort_by_key(|l| l.blocks.len());

    let mut moved = 0;
    for lp in &loops {
        let Some(pre) = lp.preheader(&cfg) else {
            continue;
        };
        if f.blocks[pre].terminator().is_none_or(|t| t.op != Opcode::Br) {
            continue;
        }
        let handles_exceptions = lp.blocks.iter().any(|&b| {
            f.blocks[b]
                .instrs
                .iter()
                .any(|i| i.op.info().class == OpClass::Exception)
        });
        if handles_exceptions {
            continue;
        }
        let mut defs = def_blocks(f);
        let mut ii = 0;
        while ii < f.blocks[lp.header].instrs.len() {
            let ins = &f.blocks[lp.header].instrs[ii];
            let invariant = ins.used_temps().all(|t| {
                defs.get(t.index())
                    .copied()
                    .flatten()
                    .is_some_and(|d| !lp.contains(d))
            });
            if is_check(ins.op) && invariant {
                let ins = f.blocks[lp.header].instrs.remove(ii);
                if let Some(r) = ins.result
                    && let Some(d) = defs.get_mut(r.index())
                {
                    *d = Some(pre);
                }
                let pre_block = &mut f.blocks[pre];
                let at = pre_block.instrs.len().saturating_sub(1);
                pre_block.instrs.insert(at, ins);
                moved += 1;
                continue;
            }
            if !ins.op.is_pure() {
                break;
            }
            ii += 1;
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{parse_module, print_module};
    use crate::verify::verify_module;

    fn ops(f: &Function, b: usize) -> Vec<Opcode> {
        f.blocks[b].instrs.iter().map(|i| i.op).collect()
    }

    #[test]
    fn bounded_operands_demote_checked_arithmetic() {
        let src = "il 0.1.2
func @f(i64 %x, i64 %y, i1 %c) -> i64 {
entry:
  %a = and.i64 %x, 255
  %b = urem.i64 %y, 1000
  %s = iadd.ovf.i64 %a, %b
  %z = zext1 %c
  %p = imul.ovf.i64 %s, %z
  %d = isub.ovf.i64 %p, 4096
  %wide = iadd.ovf.i64 %x, 1
  ret %d
}
";
        let mut m = parse_module(src).unwrap();
        let stats = optimize_checks(&mut m.functions[0]);
        assert_eq!(stats.demoted, 3, "{}", print_module(&m));
        let f = &m.functions[0];
        assert_eq!(
            ops(f, 0),
            [
                Opcode::And,
                Opcode::URem,
                Opcode::IAdd,
                Opcode::Zext1,
                Opcode::IMul,
                Opcode::ISub,
                Opcode::IAddOvf,
                Opcode::Ret
            ]
        );
        verify_module(&m).unwrap();
    }

    #[test]
    fn narrow_types_use_their_own_range() {
        let src = "il 0.1.2
func @f(i32 %x) -> i32 {
entry:
  %a = and.i32 %x, 65535
  %b = imul.ovf.i32 %a, 65535
  %c = iadd.ovf.i32 %a, 65535
  ret %c
}
";
        let mut m = parse_module(src).unwrap();
        let stats = optimize_checks(&mut m.functions[0]);
        assert_eq!(stats.demoted, 1, "only the add fits in i32");
        assert_eq!(
            ops(&m.functions[0], 0),
            [Opcode::And, Opcode::IMulOvf, Opcode::IAdd, Opcode::Ret]
        );
    }

    #[test]
    fn dominated_duplicate_checks_are_merged() {
        let src = "il 0.1.2
func @f(i64 %x, i64 %y, i1 %c) -> i64 {
entry:
  %q = sdiv.i64 %x, %y
  %n = cast.si_narrow.chk.i16 %x
  cbr %c, l, r
l:
  %q2 = sdiv.i64 %x, %y
  %s = iadd.ovf.i64 %q2, %x
  %t = iadd.ovf.i64 %x, %q2
  %u = add.i64 %s, %t
  ret %u
r:
  %n2 = cast.si_narrow.chk.i16 %x
  %w = zext1 %c
  ret %w
}
";
        let mut m = parse_module(src).unwrap();
        let stats = optimize_checks(&mut m.functions[0]);
        assert_eq!(stats.merged, 3, "{}", print_module(&m));
        let f = &m.functions[0];
        assert_eq!(ops(f, 1), [Opcode::IAddOvf, Opcode::IAdd, Opcode::Ret]);
        let q = f.blocks[0].instrs[0].result.map(Value::Temp);
        assert_eq!(f.blocks[1].instrs[0].operands.first(), q.as_ref());
        assert_eq!(ops(f, 2), [Opcode::Zext1, Opcode::Ret]);
        verify_module(&m).unwrap();
    }

    #[test]
    fn sibling_checks_are_not_merged() {
        let src = "il 0.1.2
func @f(i64 %x, i64 %y, i1 %c) -> i64 {
entry:
  cbr %c, l, r
l:
  %a = udiv.i64 %x, %y
  ret %a
r:
  %b = udiv.i64 %x, %y
  ret %b
}
";
        let mut m = parse_module(src).unwrap();
        assert_eq!(optimize_checks(&mut m.functions[0]).merged, 0);
    }

    #[test]
    fn invariant_header_checks_move_to_the_preheader() {
        let src = "il 0.1.2
func @f(i64 %n, i64 %k) -> i64 {
entry:
  br loop(0, 0)
loop(%i: i64, %acc: i64):
  %step = sdiv.i64 %n, %k
  %wide = cast.si_narrow.chk.i32 %k
  %acc2 = add.i64 %acc, %step
  %i2 = add.i64 %i, 1
  %c = scmp_lt %i2, %n
  cbr %c, loop(%i2, %acc2), done
done:
  ret %acc
}
";
        let mut m = parse_module(src).unwrap();
        let stats = optimize_checks(&mut m.functions[0]);
        assert_eq!(stats.hoisted, 2);
        let f = &m.functions[0];
        assert_eq!(ops(f, 0), [Opcode::SDiv, Opcode::CastSiNarrowChk, Opcode::Br]);
        assert_eq!(f.blocks[1].instrs.len(), 4);
        verify_module(&m).unwrap();
    }

    #[test]
    fn checks_behind_an_effect_stay_in_the_loop() {
        let src = "il 0.1.2
extern @rt_print_i64(i64) -> void
func @f(i64 %n, i64 %k) -> i64 {
entry:
  br loop(0)
loop(%i: i64):
  call @rt_print_i64(%i)
  %q = sdiv.i64 %n, %k
  %i2 = add.i64 %i, %q
  %c = scmp_lt %i2, %n
  cbr %c, loop(%i2), done
done:
  ret 0
}
";
        let mut m = parse_module(src).unwrap();
        let stats = optimize_checks(&mut m.functions[0]);
        assert_eq!(stats.hoisted, 0, "the print must happen before a division trap");
        assert_eq!(ops(&m.functions[0], 0), [Opcode::Br]);
    }
}
