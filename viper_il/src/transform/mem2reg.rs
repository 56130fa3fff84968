// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Promotion of single-store stack slots to SSA values.
//!
//! An `alloca` result `%p` is promotable when:
//! 1. exactly one `store` writes through `%p`, and it stores `i64`, `f64`, or `i1`;
//! 2. every other use of `%p` is the address operand of a `load` of that same type;
//! 3. every load is dominated by the store: it follows the store in the store's block, or the
//!    store's block strictly dominates the load's block.
//!
//! Promotion replaces each load result with the stored value and deletes the loads, the store,
//! and the `alloca`. Slots that fail any condition are left untouched; the pass never fails.

use alloc::vec::Vec;
use hashbrown::HashSet;

use crate::analysis::cfg::FunctionCfg;
use crate::analysis::dominators::DomTree;
use crate::diag::Diagnostics;
use crate::module::{Function, Module};
use crate::opcode::Opcode;
use crate::transform::pass_manager::Pass;
use crate::transform::util::replace_all_uses;
use crate::types::Type;
use crate::value::{TempId, Value};

/// Options for [`Mem2Reg`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Mem2RegOptions {
    /// Accumulate [`Mem2RegStats`] across runs.
    pub collect_stats: bool,
}

/// Counters reported by promotion.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Mem2RegStats {
    /// Allocas promoted.
    pub promoted_vars: usize,
    /// Loads removed.
    pub removed_loads: usize,
    /// Stores removed.
    pub removed_stores: usize,
}

impl Mem2RegStats {
    fn absorb(&mut self, other: Self) {
        self.promoted_vars += other.promoted_vars;
        self.removed_loads += other.removed_loads;
        self.removed_stores += other.removed_stores;
    }
}

/// Instruction position `(block, index)`.
type Site = (usize, usize);

struct SlotUses {
    store: Option<(Site, Value, Type)>,
    stores: usize,
    loads: Vec<(Site, TempId, Type)>,
    escaped: bool,
}

fn slot_uses(f: &Function, slot: TempId) -> SlotUses {
    let mut uses = SlotUses {
        store: None,
        stores: 0,
        loads: Vec::new(),
        escaped: false,
    };
    for (bi, b) in f.blocks.iter().enumerate() {
        for (ii, ins) in b.instrs.iter().enumerate() {
            if !ins.used_temps().any(|t| t == slot) {
                continue;
            }
            let addr_is_slot = ins.operands.first().and_then(Value::as_temp) == Some(slot);
            let value_is_slot = ins.operands.get(1).and_then(Value::as_temp) == Some(slot);
            match ins.op {
                Opcode::Store if addr_is_slot && !value_is_slot => {
                    uses.stores += 1;
                    if let Some(v) = ins.operands.get(1) {
                        uses.store = Some(((bi, ii), v.clone(), ins.ty));
                    }
                }
                Opcode::Load if addr_is_slot => match ins.result {
                    Some(r) => uses.loads.push(((bi, ii), r, ins.ty)),
                    None => uses.escaped = true,
                },
                _ => uses.escaped = true,
            }
        }
    }
    uses
}

/// Promotes eligible allocas of `f`.
pub fn promote_function(f: &mut Function) -> Mem2RegStats {
    let mut stats = Mem2RegStats::default();
    let allocas: Vec<TempId> = f
        .blocks
        .iter()
        .flat_map(|b| b.instrs.iter())
        .filter(|i| i.op == Opcode::Alloca)
        .filter_map(|i| i.result)
        .collect();
    if allocas.is_empty() {
        return stats;
    }

    // Promotion only deletes non-terminators, so the CFG and dominators stay valid.
    let cfg = FunctionCfg::new(f);
    let dt = DomTree::compute(&cfg);

    for slot in allocas {
        let uses = slot_uses(f, slot);
        if uses.escaped || uses.stores != 1 {
            continue;
        }
        let Some(((sb, si), value, ty)) = uses.store else {
            continue;
        };
        if !matches!(ty, Type::I64 | Type::F64 | Type::I1) {
            continue;
        }
        let dominated = uses.loads.iter().all(|&((lb, li), _, lty)| {
            lty == ty && if lb == sb { li > si } else { dt.strictly_dominates(sb, lb) }
        });
        if !dominated {
            continue;
        }

        let mut dead: HashSet<Site> = HashSet::new();
        dead.insert((sb, si));
        for &(site, result, _) in &uses.loads {
            dead.insert(site);
            replace_all_uses(f, result, &value);
        }
        for (bi, b) in f.blocks.iter_mut().enumerate() {
            let mut ii = 0;
            b.instrs.retain(|ins| {
                let is_slot = ins.op == Opcode::Alloca && ins.result == Some(slot);
                let keep = !dead.contains(&(bi, ii)) && !is_slot;
                ii += 1;
                keep
            });
        }

        stats.promoted_vars += 1;
        stats.removed_loads += uses.loads.len();
        stats.removed_stores += 1;
    }
    stats
}

/// Promotes eligible allocas in every function of `module`.
pub fn promote_module(module: &mut Module) -> Mem2RegStats {
    let mut stats = Mem2RegStats::default();
    for f in &mut module.functions {
        stats.absorb(promote_function(f));
    }
    stats
}

/// The `mem2reg` pass.
#[derive(Clone, Debug, Default)]
pub struct Mem2Reg {
    options: Mem2RegOptions,
    stats: Mem2RegStats,
}

impl Mem2Reg {
    /// Creates the pass.
    #[must_use]
    pub fn new(options: Mem2RegOptions) -> Self {
        Self {
            options,
            stats: Mem2RegStats::default(),
        }
    }

    /// Counters accumulated so far (all zero unless `collect_stats` is set).
    #[must_use]
    pub fn stats(&self) -> Mem2RegStats {
        self.stats
    }
}

impl Pass for Mem2Reg {
    fn name(&self) -> &'static str {
        "mem2reg"
    }

    fn run(&mut self, module: &mut Module, _diags: &mut Diagnostics) -> bool {
        let stats = promote_module(module);
        tracing::debug!(
            promoted = stats.promoted_vars,
            loads = stats.removed_loads,
            stores = stats.removed_stores,
            "mem2reg finished"
        );
        if self.options.collect_stats {
            self.stats.absorb(stats);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse_module;
    use crate::verify::verify_module;

    #[test]
    fn promotes_a_single_store_slot() {
        let src = "il 0.1.2
func @main() -> i64 {
entry:
  %p = alloca 8
  store.i64 %p, 42
  %a = load.i64 %p
  %b = load.i64 %p
  br next
next:
  %c = load.i64 %p
  %s = add.i64 %a, %b
  %t = add.i64 %s, %c
  ret %c
}
";
        let mut m = parse_module(src).unwrap();
        let mut pass = Mem2Reg::new(Mem2RegOptions { collect_stats: true });
        assert!(pass.run(&mut m, &mut Diagnostics::new()));
        assert_eq!(
            pass.stats(),
            Mem2RegStats {
                promoted_vars: 1,
                removed_loads: 3,
                removed_stores: 1
            }
        );
        let f = &m.functions[0];
        let ops: Vec<Opcode> = f.blocks.iter().flat_map(|b| &b.instrs).map(|i| i.op).collect();
        assert!(
            !ops.iter()
                .any(|op| matches!(op, Opcode::Alloca | Opcode::Load | Opcode::Store)),
            "memory traffic remains: {ops:?}"
        );
        let ret = f.blocks[1].terminator().unwrap();
        assert_eq!(ret.operands, [Value::ConstInt(42)]);
        assert_eq!(f.blocks[1].instrs[0].operands, [Value::ConstInt(42), Value::ConstInt(42)]);
        verify_module(&m).unwrap();
    }

    #[test]
    fn leaves_slots_with_a_load_before_the_store() {
        let src = "il 0.1.2
func @f() -> i64 {
entry:
  %p = alloca 8
  %a = load.i64 %p
  store.i64 %p, 1
  ret %a
}
";
        let mut m = parse_module(src).unwrap();
        let before = m.clone();
        assert_eq!(promote_module(&mut m), Mem2RegStats::default());
        assert_eq!(m, before);
    }

    #[test]
    fn leaves_escaping_and_multi_store_slots() {
        let src = "il 0.1.2
extern @sink(ptr) -> void
func @f(i1 %c) -> i64 {
entry:
  %p = alloca 8
  %q = alloca 8
  store.i64 %p, 1
  store.i64 %q, 1
  store.i64 %q, 2
  call @sink(%p)
  %a = load.i64 %p
  %b = load.i64 %q
  %s = add.i64 %a, %b
  ret %s
}
";
        let mut m = parse_module(src).unwrap();
        assert_eq!(promote_module(&mut m).promoted_vars, 0);
    }

    #[test]
    fn store_in_a_sibling_branch_does_not_dominate() {
        let src = "il 0.1.2
func @f(i1 %c) -> f64 {
entry:
  %p = alloca 8
  cbr %c, a, b
a:
  store.f64 %p, 1.5
  br b
b:
  %v = load.f64 %p
  ret %v
}
";
        let mut m = parse_module(src).unwrap();
        assert_eq!(promote_module(&mut m).promoted_vars, 0);
    }
}
