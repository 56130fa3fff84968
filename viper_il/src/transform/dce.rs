// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dead code elimination: unused pure instructions and unused block parameters.

use alloc::vec::Vec;

use crate::diag::Diagnostics;
use crate::module::{Function, Module};
use crate::opcode::Opcode;
use crate::transform::pass_manager::Pass;
use crate::transform::util::use_counts;

/// The `dce` pass.
#[derive(Copy, Clone, Debug, Default)]
pub struct Dce;

impl Pass for Dce {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn run(&mut self, module: &mut Module, _diags: &mut Diagnostics) -> bool {
        let mut removed = 0;
        for f in &mut module.functions {
            removed += eliminate_dead_code(f);
        }
        tracing::debug!(removed, "dce finished");
        true
    }
}

/// Removes dead instructions and block parameters from `f` to a fixpoint. Returns the number of
/// instructions and parameters removed.
pub fn eliminate_dead_code(f: &mut Function) -> usize {
    let mut total = 0;
    loop {
        let counts = use_counts(f);
        let unused = |t: crate::value::TempId| counts.get(t.index()).is_none_or(|c| *c == 0);
        let mut removed = 0;
        for b in &mut f.blocks {
            b.instrs.retain(|ins| {
                let dead = ins.op.is_pure() && ins.result.is_some_and(unused);
                removed += usize::from(dead);
                !dead
            });
        }
        removed += remove_dead_params(f, &counts);
        if removed == 0 {
            return total;
        }
        total += removed;
    }
}

fn remove_dead_params(f: &mut Function, counts: &[u32]) -> usize {
    let mut removed = 0;
    for bi in 1..f.blocks.len() {
        let label = f.blocks[bi].label.clone();
        let handler = f
            .blocks
            .iter()
            .flat_map(|b| b.instrs.iter())
            .any(|i| i.op == Opcode::EhPush && i.labels.iter().any(|l| *l == label));
        if handler {
            continue;
        }
        let dead: Vec<usize> = f.blocks[bi]
            .params
            .iter()
            .enumerate()
            .filter(|(_, p)| counts.get(p.id.index()).is_none_or(|c| *c == 0))
            .map(|(k, _)| k)
            .collect();
        if dead.is_empty() {
            continue;
        }
        for &k in dead.iter().rev() {
            f.blocks[bi].params.remove(k);
        }
        for b in &mut f.blocks {
            let Some(term) = b.terminator_mut() else {
                continue;
            };
            for i in 0..term.labels.len() {
                if term.labels[i] != label {
                    continue;
                }
                if let Some(args) = term.br_args.get_mut(i) {
                    for &k in dead.iter().rev() {
                        if k < args.len() {
                            args.remove(k);
                        }
                    }
                }
            }
        }
        removed += dead.len();
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse_module;
    use crate::verify::verify_module;

    #[test]
    fn removes_unused_pure_chains_but_keeps_effects() {
        let src = "il 0.1.2
extern @rt_print_i64(i64) -> void
func @f(i64 %x) -> void {
entry:
  %a = add.i64 %x, 1
  %b = mul.i64 %a, 2
  %c = sdiv.i64 %x, 0
  call @rt_print_i64(%x)
  ret
}
";
        let mut m = parse_module(src).unwrap();
        assert_eq!(eliminate_dead_code(&mut m.functions[0]), 2);
        let ops: Vec<Opcode> = m.functions[0].blocks[0].instrs.iter().map(|i| i.op).collect();
        assert_eq!(ops, [Opcode::SDiv, Opcode::Call, Opcode::Ret]);
    }

    #[test]
    fn drops_unused_block_params_with_their_arguments() {
        let src = "il 0.1.2
func @f(i1 %c) -> i64 {
entry:
  cbr %c, j(1, 2), j(3, 4)
j(%a: i64, %b: i64):
  ret %b
}
";
        let mut m = parse_module(src).unwrap();
        assert_eq!(eliminate_dead_code(&mut m.functions[0]), 1);
        let f = &m.functions[0];
        assert_eq!(f.blocks[1].params.len(), 1);
        let term = f.blocks[0].terminator().unwrap();
        assert_eq!(term.args_for(0), [crate::value::Value::ConstInt(2)]);
        assert_eq!(term.args_for(1), [crate::value::Value::ConstInt(4)]);
        verify_module(&m).unwrap();
    }
}
