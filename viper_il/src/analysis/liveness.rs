// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backward liveness over arbitrary per-block use/def sets.
//!
//! Callers decide what a "variable" is: SSA temps ([`temp_liveness`]) or alloca slots (dead-store
//! elimination builds its own use/def sets and calls [`compute_liveness`]).

use alloc::vec::Vec;

use crate::analysis::bitset::BitSet;
use crate::analysis::cfg::FunctionCfg;
use crate::analysis::dataflow;
use crate::module::Function;

/// Live-in / live-out sets per block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Liveness {
    /// Variables live on block entry.
    pub live_in: Vec<BitSet>,
    /// Variables live on block exit.
    pub live_out: Vec<BitSet>,
}

/// Solves `IN = USE ∪ (OUT \ DEF)`, `OUT = ∪ IN[succ]`.
#[must_use]
pub fn compute_liveness(
    cfg: &FunctionCfg,
    reachable: &[bool],
    universe: usize,
    use_sets: &[BitSet],
    def_sets: &[BitSet],
) -> Liveness {
    let bottom = BitSet::new_empty(universe);
    let (live_in, live_out) = dataflow::solve_backward(
        cfg,
        reachable,
        bottom,
        |acc, succ_in| acc.union_with(succ_in),
        |b, out| {
            let mut in_set = use_sets[b].clone();
            let mut pass_through = out.clone();
            pass_through.subtract_with(&def_sets[b]);
            in_set.union_with(&pass_through);
            in_set
        },
    );
    Liveness { live_in, live_out }
}

/// Liveness of SSA temps in `f`.
///
/// Block parameters are definitions of their block; branch arguments are uses in the branching
/// block.
#[must_use]
pub fn temp_liveness(f: &Function, cfg: &FunctionCfg) -> Liveness {
    let universe = f.temp_count();
    let mut use_sets = Vec::with_capacity(f.blocks.len());
    let mut def_sets = Vec::with_capacity(f.blocks.len());
    for b in &f.blocks {
        let mut uses = BitSet::new_empty(universe);
        let mut defs = BitSet::new_empty(universe);
        for p in &b.params {
            defs.set(p.id.index());
        }
        for ins in &b.instrs {
            for t in ins.used_temps() {
                if !defs.get(t.index()) {
                    uses.set(t.index());
                }
            }
            if let Some(r) = ins.result {
                defs.set(r.index());
            }
        }
        use_sets.push(uses);
        def_sets.push(defs);
    }
    compute_liveness(cfg, &cfg.reachable(), universe, &use_sets, &def_sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse_module;

    #[test]
    fn loop_carried_value_is_live_around_the_loop() {
        let src = "il 0.1.2
func @f(i64 %n) -> i64 {
entry:
  br loop(0)
loop(%i: i64):
  %c = scmp_lt %i, %n
  cbr %c, body, exit
body:
  %j = add %i, 1
  br loop(%j)
exit:
  ret %i
}
";
        let m = parse_module(src).unwrap();
        let f = &m.functions[0];
        let cfg = FunctionCfg::new(f);
        let live = temp_liveness(f, &cfg);
        // temps: n=0, i=1, c=2, j=3
        assert!(live.live_out[0].get(0), "n is live out of the entry");
        assert!(!live.live_in[0].get(0), "n is defined by the entry params");
        assert!(live.live_out[1].get(1), "i is live out of the header");
        assert!(live.live_in[2].get(0), "n stays live through the body");
        assert!(!live.live_in[1].get(1), "i is defined by the header");
        assert!(!live.live_out[3].get(1), "nothing is live after ret");
    }
}
