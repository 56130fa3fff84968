// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared helpers for passes.

use alloc::vec;
use alloc::vec::Vec;

use crate::module::Function;
use crate::value::{TempId, Value};

/// Replaces every use of `from` in `f` with `to`. Returns the number of operands rewritten.
pub(crate) fn replace_all_uses(f: &mut Function, from: TempId, to: &Value) -> usize {
    let mut n = 0;
    for b in &mut f.blocks {
        for ins in &mut b.instrs {
            n += ins.replace_temp(from, to);
        }
    }
    n
}

/// Applies a substitution table (indexed by temp) to every operand of `f`.
///
/// Chains are followed, so `a -> b` and `b -> c` rewrite `a` to `c`.
pub(crate) fn apply_substitutions(f: &mut Function, subst: &[Option<Value>]) -> bool {
    let resolve = |v: &Value| -> Option<Value> {
        let mut cur = subst.get(v.as_temp()?.index())?.clone()?;
        // Chains are acyclic; bound the walk anyway.
        for _ in 0..subst.len() {
            match cur.as_temp().and_then(|t| subst.get(t.index())).cloned().flatten() {
                Some(next) => cur = next,
                None => break,
            }
        }
        Some(cur)
    };
    let mut changed = false;
    for b in &mut f.blocks {
        for ins in &mut b.instrs {
            ins.for_each_use_mut(|v| {
                if let Some(new) = resolve(v) {
                    *v = new;
                    changed = true;
                }
            });
        }
    }
    changed
}

/// Number of uses of each temp in `f` (operands and branch arguments).
pub(crate) fn use_counts(f: &Function) -> Vec<u32> {
    let mut counts = vec![0_u32; f.temp_count()];
    for b in &f.blocks {
        for ins in &b.instrs {
            for t in ins.used_temps() {
                if let Some(c) = counts.get_mut(t.index()) {
                    *c += 1;
                }
            }
        }
    }
    counts
}

/// Block index defining each temp (parameters included).
pub(crate) fn def_blocks(f: &Function) -> Vec<Option<usize>> {
    let mut defs = vec![None; f.temp_count()];
    for (bi, b) in f.blocks.iter().enumerate() {
        let params = b.params.iter().map(|p| p.id);
        let results = b.instrs.iter().filter_map(|i| i.result);
        for t in params.chain(results) {
            if let Some(d) = defs.get_mut(t.index()) {
                *d = Some(bi);
            }
        }
    }
    defs
}
