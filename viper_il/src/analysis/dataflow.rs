// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Worklist dataflow solver over a [`FunctionCfg`].
//!
//! Analyses supply the lattice (`meet_into`) and the per-block transfer function; the solver owns
//! iteration order and change tracking. Termination assumes monotone transfer functions over a
//! finite-height lattice.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::analysis::cfg::FunctionCfg;

/// Backward fixpoint. Returns `(in_states, out_states)` per block.
///
/// `OUT[b]` is the meet of `IN[s]` over reachable successors `s` (starting from `bottom`), and
/// `IN[b] = transfer_block(b, OUT[b])`.
pub(crate) fn solve_backward<State, MeetInto, TransferBlock>(
    cfg: &FunctionCfg,
    reachable: &[bool],
    bottom: State,
    mut meet_into: MeetInto,
    mut transfer_block: TransferBlock,
) -> (Vec<State>, Vec<State>)
where
    State: Clone + PartialEq,
    MeetInto: FnMut(&mut State, &State),
    TransferBlock: FnMut(usize, &State) -> State,
{
    let n = cfg.len();
    let mut in_states: Vec<State> = (0..n).map(|_| bottom.clone()).collect();
    let mut out_states: Vec<State> = (0..n).map(|_| bottom.clone()).collect();
    let live = |b: usize| reachable.get(b).copied().unwrap_or(false);

    // Post-order visits successors first, which converges quickly for backward problems.
    let mut work: VecDeque<usize> = cfg.post_order().into_iter().collect();
    let mut queued: Vec<bool> = alloc::vec![false; n];
    for &b in &work {
        queued[b] = true;
    }

    while let Some(b) = work.pop_front() {
        queued[b] = false;
        let mut new_out = bottom.clone();
        for &succ in cfg.successors(b) {
            if live(succ) {
                meet_into(&mut new_out, &in_states[succ]);
            }
        }
        let new_in = transfer_block(b, &new_out);
        let changed = new_in != in_states[b] || new_out != out_states[b];
        out_states[b] = new_out;
        in_states[b] = new_in;
        if changed {
            for &p in cfg.predecessors(b) {
                if live(p) && !queued[p] {
                    queued[p] = true;
                    work.push_back(p);
                }
            }
        }
    }

    (in_states, out_states)
}
