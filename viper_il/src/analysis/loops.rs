// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Natural loop discovery.

use alloc::vec;
use alloc::vec::Vec;

use crate::analysis::cfg::FunctionCfg;
use crate::analysis::dominators::DomTree;

/// A natural loop: a header plus every block that reaches a back edge into it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NaturalLoop {
    /// Loop header (dominates every block of the loop).
    pub header: usize,
    /// Sources of back edges into the header.
    pub latches: Vec<usize>,
    /// Member blocks, sorted, header included.
    pub blocks: Vec<usize>,
}

impl NaturalLoop {
    /// Returns `true` if `b` belongs to the loop.
    #[must_use]
    pub fn contains(&self, b: usize) -> bool {
        self.blocks.binary_search(&b).is_ok()
    }

    /// The unique out-of-loop predecessor of the header when it branches only to the header.
    #[must_use]
    pub fn preheader(&self, cfg: &FunctionCfg) -> Option<usize> {
        let mut outside = cfg
            .predecessors(self.header)
            .iter()
            .copied()
            .filter(|p| !self.contains(*p));
        let pre = outside.next()?;
        if outside.next().is_some() || cfg.successors(pre) != [self.header] {
            return None;
        }
        Some(pre)
    }
}

/// Finds natural loops; back edges sharing a header are merged into one loop.
///
/// Order is by header discovery, not nesting. Sort by block count to visit inner loops first.
#[must_use]
pub fn natural_loops(cfg: &FunctionCfg, dt: &DomTree) -> Vec<NaturalLoop> {
    let mut loops: Vec<NaturalLoop> = Vec::new();
    for tail in 0..cfg.len() {
        if !dt.is_reachable(tail) {
            continue;
        }
        for &header in cfg.successors(tail) {
            if !dt.dominates(header, tail) {
                continue;
            }
            let mut member = vec![false; cfg.len()];
            member[header] = true;
            let mut stack = vec![tail];
            while let Some(b) = stack.pop() {
                if member[b] {
                    continue;
                }
                member[b] = true;
                for &p in cfg.predecessors(b) {
                    if dt.is_reachable(p) && !member[p] {
                        stack.push(p);
                    }
                }
            }
            let blocks: Vec<usize> = (0..cfg.len()).filter(|&b| member[b]).collect();
            match loops.iter_mut().find(|l| l.header == header) {
                Some(l) => {
                    l.latches.push(tail);
                    let mut merged = l.blocks.clone();
                    merged.extend(blocks);
                    merged.sort_unstable();
                    merged.dedup();
                    l.blocks = merged;
                }
                None => loops.push(NaturalLoop {
                    header,
                    latches: vec![tail],
                    blocks,
                }),
            }
        }
    }
    loops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse_module;

    #[test]
    fn finds_a_simple_loop_and_its_preheader() {
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
        let cfg = FunctionCfg::new(&m.functions[0]);
        let dt = DomTree::compute(&cfg);
        let loops = natural_loops(&cfg, &dt);
        assert_eq!(loops.len(), 1);
        let l = &loops[0];
        assert_eq!(l.header, 1);
        assert_eq!(l.blocks, [1, 2]);
        assert_eq!(l.latches, [2]);
        assert_eq!(l.preheader(&cfg), Some(0));
        assert!(!l.contains(3));
    }
}
