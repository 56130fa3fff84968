// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CFG cleanup: constant branch folding, unreachable block removal, and straight-line block
//! merging.

use alloc::vec::Vec;

use crate::analysis::cfg::FunctionCfg;
use crate::diag::Diagnostics;
use crate::instr::Instr;
use crate::module::{Function, Module};
use crate::opcode::Opcode;
use crate::transform::pass_manager::Pass;
use crate::transform::util::replace_all_uses;
use crate::value::Value;

/// The `simplify-cfg` pass.
#[derive(Copy, Clone, Debug, Default)]
pub struct SimplifyCfg;

impl Pass for SimplifyCfg {
    fn name(&self) -> &'static str {
        "simplify-cfg"
    }

    fn run(&mut self, module: &mut Module, _diags: &mut Diagnostics) -> bool {
        let mut changed = false;
        for f in &mut module.functions {
            changed |= simplify_function(f);
        }
        tracing::debug!(changed, "simplify-cfg finished");
        true
    }
}

/// Simplifies `f` to a fixpoint. Returns `true` if anything changed.
pub fn simplify_function(f: &mut Function) -> bool {
    let mut changed = false;
    loop {
        let mut round = fold_constant_branches(f);
        round |= remove_unreachable(f);
        round |= merge_one_straight_line_pair(f);
        if !round {
            return changed;
        }
        changed = true;
    }
}

/// Picks the taken edge of a `cbr`/`switch` on a constant, or of a `cbr` whose two edges agree.
#[allow(clippy::cast_possible_truncation, reason = "switch compares as i32")]
pub(crate) fn folded_target(term: &Instr) -> Option<usize> {
    match term.op {
        Opcode::CBr => {
            if let Some(c) = term.operands.first().and_then(Value::as_const_int) {
                return Some(if c != 0 { 0 } else { 1 });
            }
            let same_label = term.labels.first() == term.labels.get(1);
            let same_args = term.args_for(0).len() == term.args_for(1).len()
                && term.args_for(0).iter().zip(term.args_for(1)).all(|(a, b)| a.same_as(b));
            (same_label && same_args).then_some(0)
        }
        Opcode::SwitchI32 => {
            let v = term.operands.first()?.as_const_int()?;
            let hit = term
                .operands
                .iter()
                .skip(1)
                .position(|k| k.as_const_int().is_some_and(|k| k as i32 == v as i32));
            Some(hit.map_or(0, |k| k + 1))
        }
        _ => None,
    }
}

fn fold_constant_branches(f: &mut Function) -> bool {
    let mut changed = false;
    for b in &mut f.blocks {
        let Some(term) = b.terminator_mut() else {
            continue;
        };
        let Some(taken) = folded_target(term) else {
            continue;
        };
        let (Some(label), Some(args)) = (term.labels.get(taken).cloned(), term.br_args.get(taken))
        else {
            continue;
        };
        let mut br = Instr::br(label, args.clone());
        br.loc = term.loc;
        *term = br;
        changed = true;
    }
    changed
}

pub(crate) fn remove_unreachable(f: &mut Function) -> bool {
    let reachable = FunctionCfg::new(f).reachable();
    if reachable.iter().all(|r| *r) {
        return false;
    }
    let mut i = 0;
    f.blocks.retain(|_| {
        let keep = reachable[i];
        i += 1;
        keep
    });
    true
}

/// Merges one block into its unique predecessor when that predecessor ends in `br` to it.
fn merge_one_straight_line_pair(f: &mut Function) -> bool {
    let cfg = FunctionCfg::new(f);
    for b in 1..f.blocks.len() {
        let [p] = cfg.predecessors(b) else {
            continue;
        };
        let p = *p;
        if p == b {
            continue;
        }
        let label = f.blocks[b].label.clone();
        let Some(term) = f.blocks[p].terminator() else {
            continue;
        };
        if term.op != Opcode::Br || term.labels.first() != Some(&label) {
            continue;
        }
        let references: usize = f
            .blocks
            .iter()
            .flat_map(|blk| blk.instrs.iter())
            .map(|ins| ins.labels.iter().filter(|l| **l == label).count())
            .sum();
        if references != 1 {
            continue;
        }

        let args: Vec<Value> = term.args_for(0).to_vec();
        let params: Vec<_> = f.blocks[b].params.iter().map(|p| p.id).collect();
        for (param, arg) in params.into_iter().zip(args) {
            replace_all_uses(f, param, &arg);
        }
        let moved = core::mem::take(&mut f.blocks[b].instrs);
        let pred = &mut f.blocks[p];
        pred.instrs.pop();
        pred.instrs.extend(moved);
        pred.terminated = pred.terminator().is_some();
        f.blocks.remove(b);
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{parse_module, print_module};
    use crate::verify::verify_module;

    #[test]
    fn folds_constant_branches_and_drops_dead_blocks() {
        let src = "il 0.1.2
func @f() -> i64 {
entry:
  cbr 1, yes(7), no
yes(%x: i64):
  ret %x
no:
  ret 0
}
";
        let mut m = parse_module(src).unwrap();
        assert!(simplify_function(&mut m.functions[0]));
        let f = &m.functions[0];
        assert_eq!(f.blocks.len(), 1, "{}", print_module(&m));
        assert_eq!(f.blocks[0].instrs, [Instr::ret(Some(Value::ConstInt(7)))]);
        verify_module(&m).unwrap();
    }

    #[test]
    fn constant_switch_takes_the_first_matching_case() {
        let src = "il 0.1.2
func @f() -> i64 {
entry:
  switch.i32 1, default d, 1 -> a, 1 -> b
a:
  ret 1
b:
  ret 2
d:
  ret 0
}
";
        let mut m = parse_module(src).unwrap();
        simplify_function(&mut m.functions[0]);
        let f = &m.functions[0];
        assert_eq!(f.blocks.len(), 1);
        assert_eq!(f.blocks[0].instrs[0].operands, [Value::ConstInt(1)]);
    }

    #[test]
    fn keeps_join_points_and_loops() {
        let src = "il 0.1.2
func @f(i1 %c) -> i64 {
entry:
  cbr %c, a, b
a:
  br j(1)
b:
  br j(2)
j(%v: i64):
  ret %v
}
";
        let mut m = parse_module(src).unwrap();
        let before = m.clone();
        assert!(!simplify_function(&mut m.functions[0]));
        assert_eq!(m, before);
    }

    #[test]
    fn exception_handlers_stay_reachable() {
        let src = "il 0.1.2
func @f() -> i64 {
entry:
  eh.push h
  ret 0
h(%e: ptr):
  ret 1
}
";
        let mut m = parse_module(src).unwrap();
        simplify_function(&mut m.functions[0]);
        assert_eq!(m.functions[0].blocks.len(), 2);
    }
}
