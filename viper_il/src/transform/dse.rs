// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dead store elimination for non-escaping stack slots.
//!
//! A slot is an `alloca` whose result is only ever the address operand of `load`/`store`. A store
//! to a slot is dead when no load of that slot can observe it: slot liveness is solved backward
//! over the CFG, and a store with its slot not live immediately after it is removed.
//!
//! Functions that register exception handlers are skipped, since a handler in the same frame can
//! observe slots along edges the CFG does not model.

use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::analysis::bitset::BitSet;
use crate::analysis::cfg::FunctionCfg;
use crate::analysis::liveness::compute_liveness;
use crate::diag::Diagnostics;
use crate::instr::Instr;
use crate::module::{Function, Module};
use crate::opcode::Opcode;
use crate::transform::pass_manager::Pass;
use crate::value::TempId;

/// The `dse` pass.
#[derive(Copy, Clone, Debug, Default)]
pub struct Dse;

impl Pass for Dse {
    fn name(&self) -> &'static str {
        "dse"
    }

    fn run(&mut self, module: &mut Module, _diags: &mut Diagnostics) -> bool {
        let mut removed = 0;
        for f in &mut module.functions {
            removed += eliminate_dead_stores(f);
        }
        tracing::debug!(removed, "dse finished");
        true
    }
}

enum Access {
    Load(usize),
    Store(usize),
}

fn access(ins: &Instr, slots: &HashMap<TempId, usize>) -> Option<Access> {
    let slot = *slots.get(&ins.operands.first()?.as_temp()?)?;
    match ins.op {
        Opcode::Load => Some(Access::Load(slot)),
        Opcode::Store => Some(Access::Store(slot)),
        _ => None,
    }
}

/// Finds allocas used only as direct `load`/`store` addresses.
fn private_slots(f: &Function) -> HashMap<TempId, usize> {
    let mut candidates: HashMap<TempId, bool> = f
        .blocks
        .iter()
        .flat_map(|b| b.instrs.iter())
        .filter(|i| i.op == Opcode::Alloca)
        .filter_map(|i| i.result)
        .map(|t| (t, true))
        .collect();
    for ins in f.blocks.iter().flat_map(|b| b.instrs.iter()) {
        for (k, v) in ins.uses().enumerate() {
            let Some(t) = v.as_temp() else { continue };
            let direct = k == 0 && matches!(ins.op, Opcode::Load | Opcode::Store);
            if !direct && let Some(ok) = candidates.get_mut(&t) {
                *ok = false;
            }
        }
    }
    let mut slots: Vec<TempId> = candidates
        .into_iter()
        .filter_map(|(t, ok)| ok.then_some(t))
        .collect();
    slots.sort_unstable();
    slots.into_iter().enumerate().map(|(i, t)| (t, i)).collect()
}

/// Removes dead stores from `f`. Returns the number removed.
pub fn eliminate_dead_stores(f: &mut Function) -> usize {
    if f
        .blocks
        .iter()
        .flat_map(|b| b.instrs.iter())
        .any(|i| i.op == Opcode::EhPush)
    {
        return 0;
    }
    let slots = private_slots(f);
    if slots.is_empty() {
        return 0;
    }
    let universe = slots.len();
    let cfg = FunctionCfg::new(f);

    let mut use_sets = Vec::with_capacity(f.blocks.len());
    let mut def_sets = Vec::with_capacity(f.blocks.len());
    for b in &f.blocks {
        let mut uses = BitSet::new_empty(universe);
        let mut defs = BitSet::new_empty(universe);
        for ins in &b.instrs {
            match access(ins, &slots) {
                Some(Access::Load(s)) if !defs.get(s) => uses.set(s),
                Some(Access::Store(s)) => defs.set(s),
                _ => {}
            }
        }
        use_sets.push(uses);
        def_sets.push(defs);
    }
    let liveness = compute_liveness(&cfg, &cfg.reachable(), universe, &use_sets, &def_sets);

    let mut removed = 0;
    for (bi, b) in f.blocks.iter_mut().enumerate() {
        let Some(out) = liveness.live_out.get(bi) else {
            continue;
        };
        let mut live = out.clone();
        let mut dead = Vec::new();
        for (ii, ins) in b.instrs.iter().enumerate().rev() {
            match access(ins, &slots) {
                Some(Access::Load(s)) => live.set(s),
                Some(Access::Store(s)) => {
                    if live.get(s) {
                        live.clear(s);
                    } else {
                        dead.push(ii);
                    }
                }
                None => {}
            }
        }
        if dead.is_empty() {
            continue;
        }
        let mut ii = 0;
        b.instrs.retain(|_| {
            let keep = !dead.contains(&ii);
            ii += 1;
            keep
        });
        removed += dead.len();
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse_module;
    use crate::value::Value;

    fn is_private_slot(f: &Function, v: &Value) -> bool {
        v.as_temp().is_some_and(|t| private_slots(f).contains_key(&t))
    }

    #[test]
    fn removes_overwritten_and_never_read_stores() {
        let src = "il 0.1.2
func @f(i1 %c) -> i64 {
entry:
  %p = alloca 8
  %q = alloca 8
  store.i64 %p, 1
  store.i64 %p, 2
  store.i64 %q, 9
  cbr %c, a, b
a:
  %x = load.i64 %p
  ret %x
b:
  store.i64 %p, 3
  ret 0
}
";
        let mut m = parse_module(src).unwrap();
        // Dead: `store %p, 1` is overwritten, `store %q, 9` is never read, and `store %p, 3`
        // has no load after it.
        assert_eq!(eliminate_dead_stores(&mut m.functions[0]), 3);
        let entry = &m.functions[0].blocks[0];
        let stores: Vec<&Instr> = entry.instrs.iter().filter(|i| i.op == Opcode::Store).collect();
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].operands[1], Value::ConstInt(2));
    }

    #[test]
    fn escaping_slots_are_left_alone() {
        let src = "il 0.1.2
extern @sink(ptr) -> void
func @f() -> void {
entry:
  %p = alloca 8
  %g = gep %p, 0
  store.i64 %p, 1
  call @sink(%g)
  ret
}
";
        let mut m = parse_module(src).unwrap();
        let f = &m.functions[0];
        assert!(!is_private_slot(f, &Value::Temp(TempId(0))));
        assert_eq!(eliminate_dead_stores(&mut m.functions[0]), 0);
    }

    #[test]
    fn loop_carried_loads_keep_stores_alive() {
        let src = "il 0.1.2
func @f(i64 %n) -> i64 {
entry:
  %p = alloca 8
  store.i64 %p, 0
  br loop
loop:
  %v = load.i64 %p
  %w = add.i64 %v, 1
  store.i64 %p, %w
  %c = scmp_lt %w, %n
  cbr %c, loop, done
done:
  ret %w
}
";
        let mut m = parse_module(src).unwrap();
        assert_eq!(eliminate_dead_stores(&mut m.functions[0]), 0);
    }
}
