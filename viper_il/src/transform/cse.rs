// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Redundancy elimination for pure instructions.
//!
//! - `earlycse` works inside each block.
//! - `gvn` walks the dominator tree, so an expression computed in a block is reused by every
//!   block it dominates.
//!
//! Both key an instruction on `(opcode, type, operands)`, with the operands of commutative ops
//! sorted, after substituting earlier eliminations.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::analysis::cfg::FunctionCfg;
use crate::analysis::dominators::DomTree;
use crate::diag::Diagnostics;
use crate::instr::Instr;
use crate::module::{Function, Module};
use crate::opcode::Opcode;
use crate::transform::pass_manager::Pass;
use crate::transform::util::apply_substitutions;
use crate::types::Type;
use crate::value::{TempId, Value};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Operand {
    Int(i64),
    Float(u64),
    Str(u32),
    Null,
    Temp(u32),
    Global(Box<str>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ExprKey {
    op: Opcode,
    ty: Type,
    operands: Vec<Operand>,
}

fn is_commutative(op: Opcode) -> bool {
    matches!(
        op,
        Opcode::IAdd
            | Opcode::IMul
            | Opcode::IAddOvf
            | Opcode::IMulOvf
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::ICmpEq
            | Opcode::ICmpNe
            | Opcode::FAdd
            | Opcode::FMul
            | Opcode::FCmpEq
            | Opcode::FCmpNe
    )
}

fn operand_key(v: &Value, subst: &[Option<Value>]) -> Operand {
    let v = match v.as_temp().and_then(|t| subst.get(t.index())).and_then(Option::as_ref) {
        Some(replacement) => replacement,
        None => v,
    };
    match v {
        Value::ConstInt(x) => Operand::Int(*x),
        Value::ConstFloat(x) => Operand::Float(x.to_bits()),
        Value::ConstStr(id) => Operand::Str(id.0),
        Value::Null => Operand::Null,
        Value::Temp(t) => Operand::Temp(t.0),
        Value::Global(name) => Operand::Global(name.clone()),
    }
}

fn expr_key(ins: &Instr, subst: &[Option<Value>]) -> Option<ExprKey> {
    if !ins.op.is_pure() {
        return None;
    }
    key_of(ins, subst)
}

/// Keys any value-producing instruction; callers decide which opcodes may be merged.
fn key_of(ins: &Instr, subst: &[Option<Value>]) -> Option<ExprKey> {
    ins.result?;
    let mut operands: Vec<Operand> = ins.operands.iter().map(|v| operand_key(v, subst)).collect();
    if is_commutative(ins.op) {
        operands.sort();
    }
    Some(ExprKey {
        op: ins.op,
        ty: ins.ty,
        operands,
    })
}

/// The `earlycse` pass.
#[derive(Copy, Clone, Debug, Default)]
pub struct EarlyCse;

impl Pass for EarlyCse {
    fn name(&self) -> &'static str {
        "earlycse"
    }

    fn run(&mut self, module: &mut Module, _diags: &mut Diagnostics) -> bool {
        let mut removed = 0;
        for f in &mut module.functions {
            removed += early_cse(f);
        }
        tracing::debug!(removed, "earlycse finished");
        true
    }
}

/// Block-local common subexpression elimination. Returns the number of instructions removed.
pub fn early_cse(f: &mut Function) -> usize {
    let mut subst: Vec<Option<Value>> = vec![None; f.temp_count()];
    let mut removed = 0;
    for b in &mut f.blocks {
        let mut seen: HashMap<ExprKey, TempId> = HashMap::new();
        b.instrs.retain(|ins| {
            let (Some(key), Some(r)) = (expr_key(ins, &subst), ins.result) else {
                return true;
            };
            match seen.get(&key) {
                Some(&prev) => {
                    subst[r.index()] = Some(Value::Temp(prev));
                    removed += 1;
                    false
                }
                None => {
                    seen.insert(key, r);
                    true
                }
            }
        });
    }
    if removed > 0 {
        apply_substitutions(f, &subst);
    }
    removed
}

/// The `gvn` pass.
#[derive(Copy, Clone, Debug, Default)]
pub struct Gvn;

impl Pass for Gvn {
    fn name(&self) -> &'static str {
        "gvn"
    }

    fn run(&mut self, module: &mut Module, _diags: &mut Diagnostics) -> bool {
        let mut removed = 0;
        for f in &mut module.functions {
            removed += global_value_numbering(f);
        }
        tracing::debug!(removed, "gvn finished");
        true
    }
}

enum Visit {
    Enter(usize),
    Exit(usize),
}

/// Dominator-scoped value numbering. Returns the number of instructions removed.
pub fn global_value_numbering(f: &mut Function) -> usize {
    dominator_scoped_reuse(f, Opcode::is_pure)
}

/// Replaces each instruction selected by `mergeable` with an identical one from a dominating
/// block. Returns the number of instructions removed.
pub(crate) fn dominator_scoped_reuse(f: &mut Function, mergeable: fn(Opcode) -> bool) -> usize {
    let cfg = FunctionCfg::new(f);
    let dt = DomTree::compute(&cfg);
    let mut subst: Vec<Option<Value>> = vec![None; f.temp_count()];
    let mut table: HashMap<ExprKey, TempId> = HashMap::new();
    // Undo log: (key, previous binding).
    let mut log: Vec<(ExprKey, Option<TempId>)> = Vec::new();
    let mut marks: Vec<usize> = vec![0; f.blocks.len()];
    let mut dead: Vec<Vec<usize>> = vec![Vec::new(); f.blocks.len()];

    let mut stack = if dt.is_reachable(0) { vec![Visit::Enter(0)] } else { Vec::new() };
    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(b) => {
                marks[b] = log.len();
                for (ii, ins) in f.blocks[b].instrs.iter().enumerate() {
                    if !mergeable(ins.op) {
                        continue;
                    }
                    let (Some(key), Some(r)) = (key_of(ins, &subst), ins.result) else {
                        continue;
                    };
                    if let Some(&prev) = table.get(&key) {
                        subst[r.index()] = Some(Value::Temp(prev));
                        dead[b].push(ii);
                    } else {
                        let old = table.insert(key.clone(), r);
                        log.push((key, old));
                    }
                }
                stack.push(Visit::Exit(b));
                for &c in dt.children(b).iter().rev() {
                    stack.push(Visit::Enter(c));
                }
            }
            Visit::Exit(b) => {
                while log.len() > marks[b] {
                    let Some((key, old)) = log.pop() else {
                        break;
                    };
                    match old {
                        Some(t) => {
                            table.insert(key, t);
                        }
                        None => {
                            table.remove(&key);
                        }
                    }
                }
            }
        }
    }

    let mut removed = 0;
    for (b, idxs) in dead.iter().enumerate() {
        if idxs.is_empty() {
            continue;
        }
        let mut ii = 0;
        f.blocks[b].instrs.retain(|_| {
            let keep = !idxs.contains(&ii);
            ii += 1;
            keep
        });
        removed += idxs.len();
    }
    if removed > 0 {
        apply_substitutions(f, &subst);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse_module;
    use crate::verify::verify_module;

    #[test]
    fn early_cse_reuses_commuted_expressions() {
        let src = "il 0.1.2
func @f(i64 %x, i64 %y) -> i64 {
entry:
  %a = add.i64 %x, %y
  %b = add.i64 %y, %x
  %c = mul.i64 %a, 3
  %d = mul.i64 %b, 3
  %e = sub.i64 %c, %d
  ret %e
}
";
        let mut m = parse_module(src).unwrap();
        assert_eq!(early_cse(&mut m.functions[0]), 2);
        let instrs = &m.functions[0].blocks[0].instrs;
        assert_eq!(instrs.len(), 4);
        assert_eq!(instrs[2].operands[0], instrs[2].operands[1]);
        verify_module(&m).unwrap();
    }

    #[test]
    fn gvn_reuses_values_from_dominating_blocks_only() {
        let src = "il 0.1.2
func @f(i64 %x, i1 %c) -> i64 {
entry:
  %a = add.i64 %x, 1
  cbr %c, l, r
l:
  %b = add.i64 %x, 1
  %m = mul.i64 %x, 5
  br j(%b)
r:
  %n = mul.i64 %x, 5
  br j(%n)
j(%v: i64):
  %k = mul.i64 %x, 5
  %s = add.i64 %v, %k
  ret %s
}
";
        let mut m = parse_module(src).unwrap();
        assert_eq!(global_value_numbering(&mut m.functions[0]), 1);
        let f = &m.functions[0];
        assert_eq!(f.blocks[1].instrs.len(), 2, "redundant add in `l` is gone");
        assert_eq!(f.blocks[1].terminator().unwrap().args_for(0), [Value::Temp(TempId(2))]);
        assert_eq!(f.blocks[2].instrs.len(), 2, "`r` keeps its mul");
        assert_eq!(f.blocks[3].instrs.len(), 3, "`j` keeps its mul");
        verify_module(&m).unwrap();
    }

    #[test]
    fn impure_ops_are_never_merged() {
        let src = "il 0.1.2
func @f(ptr %p, i64 %x) -> i64 {
entry:
  %a = load.i64 %p
  %b = load.i64 %p
  %c = sdiv.i64 %x, 2
  %d = sdiv.i64 %x, 2
  %s = add.i64 %a, %b
  %t = add.i64 %c, %d
  %u = add.i64 %s, %t
  ret %u
}
";
        let mut m = parse_module(src).unwrap();
        assert_eq!(early_cse(&mut m.functions[0]), 0);
    }
}
