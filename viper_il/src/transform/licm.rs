// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Loop-invariant code motion.
//!
//! Pure, non-trapping instructions whose operands are all defined outside a natural loop (or by
//! instructions already hoisted) move to the loop's preheader, just before its `br`. Loops
//! without a preheader are skipped; this pass does not create one.

use alloc::vec::Vec;

use crate::analysis::cfg::FunctionCfg;
use crate::analysis::dominators::DomTree;
use crate::analysis::loops::natural_loops;
use crate::diag::Diagnostics;
use crate::module::{Function, Module};
use crate::opcode::Opcode;
use crate::transform::pass_manager::Pass;
use crate::transform::util::def_blocks;

/// The `licm` pass.
#[derive(Copy, Clone, Debug, Default)]
pub struct Licm;

impl Pass for Licm {
    fn name(&self) -> &'static str {
        "licm"
    }

    fn run(&mut self, module: &mut Module, _diags: &mut Diagnostics) -> bool {
        let mut hoisted = 0;
        for f in &mut module.functions {
            hoisted += hoist_invariants(f);
        }
        tracing::debug!(hoisted, "licm finished");
        true
    }
}

/// Hoists loop invariants in `f`. Returns the number of instructions moved.
pub fn hoist_invariants(f: &mut Function) -> usize {
    let cfg = FunctionCfg::new(f);
    let dt = DomTree::compute(&cfg);
    let mut loops = natural_loops(&cfg, &dt);
    // Inner loops first so their invariants can continue outward.
    loops.sort_by_key(|l| l.blocks.len());

    let mut moved = 0;
    for lp in &loops {
        let Some(pre) = lp.preheader(&cfg) else {
            continue;
        };
        if f.blocks[pre].terminator().is_none_or(|t| t.op != Opcode::Br) {
            continue;
        }
        let mut defs = def_blocks(f);
        loop {
            let mut hoisted_any = false;
            for &b in &lp.blocks {
                let mut ii = 0;
                while ii < f.blocks[b].instrs.len() {
                    let ins = &f.blocks[b].instrs[ii];
                    let invariant = ins.op.is_pure()
                        && ins.result.is_some()
                        && ins.used_temps().all(|t| {
                            defs.get(t.index())
                                .copied()
                                .flatten()
                                .is_some_and(|d| !lp.contains(d))
                        });
                    if !invariant {
                        ii += 1;
                        continue;
                    }
                    let ins = f.blocks[b].instrs.remove(ii);
                    if let Some(r) = ins.result
                        && let Some(d) = defs.get_mut(r.index())
                    {
                        *d = Some(pre);
                    }
                    let pre_block = &mut f.blocks[pre];
                    let at = pre_block.instrs.len().saturating_sub(1);
                    pre_block.instrs.insert(at, ins);
                    moved += 1;
                    hoisted_any = true;
                }
            }
            if !hoisted_any {
                break;
            }
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse_module;
    use crate::verify::verify_module;

    #[test]
    fn hoists_invariant_chains_into_the_preheader() {
        let src = "il 0.1.2
func @f(i64 %n, i64 %k) -> i64 {
entry:
  br loop(0, 0)
loop(%i: i64, %acc: i64):
  %a = mul.i64 %k, 3
  %b = add.i64 %a, 1
  %acc2 = add.i64 %acc, %b
  %i2 = add.i64 %i, 1
  %c = scmp_lt %i2, %n
  cbr %c, loop(%i2, %acc2), done
done:
  ret %acc
}
";
        let mut m = parse_module(src).unwrap();
        assert_eq!(hoist_invariants(&mut m.functions[0]), 2);
        let f = &m.functions[0];
        let entry_ops: Vec<Opcode> = f.blocks[0].instrs.iter().map(|i| i.op).collect();
        assert_eq!(entry_ops, [Opcode::IMul, Opcode::IAdd, Opcode::Br]);
        assert_eq!(f.blocks[1].instrs.len(), 4);
        verify_module(&m).unwrap();
    }

    #[test]
    fn trapping_ops_stay_in_the_loop() {
        let src = "il 0.1.2
func @f(i64 %n, i64 %k) -> i64 {
entry:
  br loop(0)
loop(%i: i64):
  %q = sdiv.i64 %n, %k
  %i2 = add.i64 %i, %q
  %c = scmp_lt %i2, %n
  cbr %c, loop(%i2), done
done:
  ret 0
}
";
        let mut m = parse_module(src).unwrap();
        assert_eq!(hoist_invariants(&mut m.functions[0]), 0);
    }
}
