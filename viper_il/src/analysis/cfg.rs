// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Control-flow graph caches and traversal orders.
//!
//! ## Policy and invariants
//!
//! - All caches are populated eagerly at construction. Mutating block layout (adding, removing,
//!   or reordering blocks, or editing terminator labels) leaves the context stale; rebuild it.
//! - Successors follow the terminator's label order with duplicate targets collapsed, followed by
//!   any `eh.push` handler labels of the block. Predecessors are the inverse relation.
//! - Labels that do not resolve produce no edge and are recorded in
//!   [`FunctionCfg::unresolved_labels`] for the verifier.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::module::{Function, Module};
use crate::opcode::Opcode;

/// CFG caches for one function. Blocks are identified by their index in `Function::blocks`.
#[derive(Clone, Debug)]
pub struct FunctionCfg {
    succs: Vec<Vec<usize>>,
    preds: Vec<Vec<usize>>,
    labels: HashMap<Box<str>, usize>,
    unresolved: Vec<(usize, Box<str>)>,
}

impl FunctionCfg {
    /// Builds the caches for `f`.
    #[must_use]
    pub fn new(f: &Function) -> Self {
        let n = f.blocks.len();
        let mut labels = HashMap::with_capacity(n);
        for (i, b) in f.blocks.iter().enumerate() {
            labels.entry(b.label.clone()).or_insert(i);
        }

        let mut succs: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut unresolved = Vec::new();
        for (i, b) in f.blocks.iter().enumerate() {
            let term_labels = b.terminator().map(|t| t.labels.as_slice()).unwrap_or(&[]);
            let handler_labels = b
                .instrs
                .iter()
                .filter(|ins| ins.op == Opcode::EhPush)
                .flat_map(|ins| ins.labels.iter());
            for label in term_labels.iter().chain(handler_labels) {
                match labels.get(label) {
                    Some(&t) => {
                        if !succs[i].contains(&t) {
                            succs[i].push(t);
                        }
                    }
                    None => unresolved.push((i, label.clone())),
                }
            }
        }

        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, ss) in succs.iter().enumerate() {
            for &s in ss {
                preds[s].push(i);
            }
        }

        Self {
            succs,
            preds,
            labels,
            unresolved,
        }
    }

    /// Number of blocks.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.succs.len()
    }

    /// Returns `true` for a function without blocks.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.succs.is_empty()
    }

    /// Successor block indices of `b`.
    #[inline]
    #[must_use]
    pub fn successors(&self, b: usize) -> &[usize] {
        self.succs.get(b).map_or(&[], Vec::as_slice)
    }

    /// Predecessor block indices of `b`.
    #[inline]
    #[must_use]
    pub fn predecessors(&self, b: usize) -> &[usize] {
        self.preds.get(b).map_or(&[], Vec::as_slice)
    }

    /// Resolves a label to its block index.
    #[inline]
    #[must_use]
    pub fn block_of(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    /// `(block, label)` pairs whose label did not resolve.
    #[must_use]
    pub fn unresolved_labels(&self) -> &[(usize, Box<str>)] {
        &self.unresolved
    }

    /// DFS post-order over blocks reachable from the entry; the entry comes last.
    #[must_use]
    pub fn post_order(&self) -> Vec<usize> {
        let n = self.len();
        let mut order = Vec::with_capacity(n);
        if n == 0 {
            return order;
        }
        let mut visited = vec![false; n];
        // (block, index of the next successor to visit)
        let mut stack: Vec<(usize, usize)> = vec![(0, 0)];
        visited[0] = true;
        while let Some(top) = stack.last_mut() {
            let (b, next) = *top;
            if let Some(&s) = self.succs[b].get(next) {
                top.1 += 1;
                if !visited[s] {
                    visited[s] = true;
                    stack.push((s, 0));
                }
            } else {
                order.push(b);
                stack.pop();
            }
        }
        order
    }

    /// Reverse post-order; the entry comes first.
    #[must_use]
    pub fn reverse_post_order(&self) -> Vec<usize> {
        let mut order = self.post_order();
        order.reverse();
        order
    }

    /// Reachability from the entry, per block.
    #[must_use]
    pub fn reachable(&self) -> Vec<bool> {
        let mut r = vec![false; self.len()];
        for b in self.post_order() {
            r[b] = true;
        }
        r
    }

    /// RPO index per block (`None` for unreachable blocks).
    #[must_use]
    pub fn rpo_numbering(&self) -> Vec<Option<usize>> {
        let mut idx = vec![None; self.len()];
        for (i, b) in self.reverse_post_order().into_iter().enumerate() {
            idx[b] = Some(i);
        }
        idx
    }

    /// Returns `true` iff no reachable edge goes to a block with an equal or smaller RPO index.
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        let num = self.rpo_numbering();
        for (b, nb) in num.iter().enumerate() {
            let Some(nb) = nb else { continue };
            for &s in &self.succs[b] {
                if num[s].is_some_and(|ns| ns <= *nb) {
                    return false;
                }
            }
        }
        true
    }

    /// A linearization of reachable blocks consistent with every edge; empty for cyclic CFGs.
    #[must_use]
    pub fn topo_order(&self) -> Vec<usize> {
        if self.is_acyclic() {
            self.reverse_post_order()
        } else {
            Vec::new()
        }
    }
}

/// A block within a module: `(function index, block index)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockRef {
    /// Index into `Module::functions`.
    pub func: usize,
    /// Index into `Function::blocks`.
    pub block: usize,
}

/// Module-wide CFG caches.
#[derive(Clone, Debug)]
pub struct CfgContext {
    functions: Vec<FunctionCfg>,
    by_name: HashMap<Box<str>, usize>,
}

impl CfgContext {
    /// Builds caches for every function of `module`.
    #[must_use]
    pub fn new(module: &Module) -> Self {
        Self {
            functions: module.functions.iter().map(FunctionCfg::new).collect(),
            by_name: module
                .functions
                .iter()
                .enumerate()
                .map(|(i, f)| (f.name.clone(), i))
                .collect(),
        }
    }

    /// Per-function caches.
    #[must_use]
    pub fn function(&self, func: usize) -> Option<&FunctionCfg> {
        self.functions.get(func)
    }

    /// Index of the function named `name`.
    #[must_use]
    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Function owning `b`.
    #[inline]
    #[must_use]
    pub fn block_to_function(&self, b: BlockRef) -> usize {
        b.func
    }

    /// Resolves `label` inside function `func`.
    #[must_use]
    pub fn label_to_block(&self, func: usize, label: &str) -> Option<BlockRef> {
        let block = self.functions.get(func)?.block_of(label)?;
        Some(BlockRef { func, block })
    }

    /// Successors of `b`.
    #[must_use]
    pub fn successors(&self, b: BlockRef) -> &[usize] {
        self.functions.get(b.func).map_or(&[], |f| f.successors(b.block))
    }

    /// Predecessors of `b`.
    #[must_use]
    pub fn predecessors(&self, b: BlockRef) -> &[usize] {
        self.functions
            .get(b.func)
            .map_or(&[], |f| f.predecessors(b.block))
    }

    /// Post-order of function `func`.
    #[must_use]
    pub fn post_order(&self, func: usize) -> Vec<usize> {
        self.functions
            .get(func)
            .map(FunctionCfg::post_order)
            .unwrap_or_default()
    }

    /// Reverse post-order of function `func`.
    #[must_use]
    pub fn reverse_post_order(&self, func: usize) -> Vec<usize> {
        self.functions
            .get(func)
            .map(FunctionCfg::reverse_post_order)
            .unwrap_or_default()
    }

    /// Whether function `func` has no back edges.
    #[must_use]
    pub fn is_acyclic(&self, func: usize) -> bool {
        self.functions.get(func).is_none_or(FunctionCfg::is_acyclic)
    }

    /// Topological order of function `func` (empty if cyclic).
    #[must_use]
    pub fn topo_order(&self, func: usize) -> Vec<usize> {
        self.functions
            .get(func)
            .map(FunctionCfg::topo_order)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse_module;

    const DIAMOND_LOOP: &str = "il 0.1.2
func @f(i1 %c) -> void {
entry:
  cbr %c, left, right
left:
  br join
right:
  br join
join:
  cbr %c, entry2, exit
entry2:
  br join
exit:
  ret
dead:
  br exit
}
";

    #[test]
    fn successors_and_predecessors() {
        let m = parse_module(DIAMOND_LOOP).unwrap();
        let cfg = FunctionCfg::new(&m.functions[0]);
        assert_eq!(cfg.successors(0), &[1, 2]);
        assert_eq!(cfg.predecessors(3), &[1, 2, 4]);
        assert_eq!(cfg.successors(5), &[] as &[usize]);
        assert_eq!(cfg.block_of("exit"), Some(5));
        assert!(cfg.unresolved_labels().is_empty());
    }

    #[test]
    fn orders_and_cycles() {
        let m = parse_module(DIAMOND_LOOP).unwrap();
        let cfg = FunctionCfg::new(&m.functions[0]);
        let po = cfg.post_order();
        assert_eq!(po.last(), Some(&0));
        assert!(!po.contains(&6), "unreachable block must not appear");
        let rpo = cfg.reverse_post_order();
        assert_eq!(rpo[0], 0);
        assert!(!cfg.is_acyclic());
        assert!(cfg.topo_order().is_empty());
        assert!(!cfg.reachable()[6]);
    }

    #[test]
    fn acyclic_topo_order_respects_edges() {
        let src = "il 0.1.2
func @g(i1 %c) -> void {
entry:
  cbr %c, a, b
a:
  br c
b:
  br c
c:
  ret
}
";
        let m = parse_module(src).unwrap();
        let ctx = CfgContext::new(&m);
        assert!(ctx.is_acyclic(0));
        let topo = ctx.topo_order(0);
        let pos = |b: usize| topo.iter().position(|&x| x == b).unwrap();
        let f = ctx.function(0).unwrap();
        for b in 0..f.len() {
            for &s in f.successors(b) {
                assert!(pos(b) < pos(s), "edge {b}->{s} violates topo order");
            }
        }
        let c = ctx.label_to_block(0, "c").unwrap();
        assert_eq!(ctx.predecessors(c), &[1, 2]);
        assert_eq!(ctx.block_to_function(c), 0);
    }
}
