// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dominator tree (Cooper, Harvey, Kennedy: "A Simple, Fast Dominance Algorithm").

use alloc::vec;
use alloc::vec::Vec;

use crate::analysis::cfg::FunctionCfg;

/// Immediate-dominator tree over the reachable blocks of one function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomTree {
    idom: Vec<Option<usize>>,
    rpo_index: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
}

impl DomTree {
    /// Computes the tree for `cfg`. Block 0 is the root.
    #[must_use]
    pub fn compute(cfg: &FunctionCfg) -> Self {
        let n = cfg.len();
        let rpo = cfg.reverse_post_order();
        let mut rpo_index = vec![None; n];
        for (i, &b) in rpo.iter().enumerate() {
            rpo_index[b] = Some(i);
        }

        // During the fixpoint the root points at itself.
        let mut idom: Vec<Option<usize>> = vec![None; n];
        if let Some(&entry) = rpo.first() {
            idom[entry] = Some(entry);
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &b in rpo.iter().skip(1) {
                let mut new_idom: Option<usize> = None;
                for &p in cfg.predecessors(b) {
                    if idom[p].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(cur) => intersect(&idom, &rpo_index, p, cur),
                    });
                }
                if new_idom.is_some() && idom[b] != new_idom {
                    idom[b] = new_idom;
                    changed = true;
                }
            }
        }

        if let Some(&entry) = rpo.first() {
            idom[entry] = None;
        }

        let mut children = vec![Vec::new(); n];
        for &b in &rpo {
            if let Some(d) = idom[b] {
                children[d].push(b);
            }
        }

        Self {
            idom,
            rpo_index,
            children,
        }
    }

    /// Immediate dominator of `b` (`None` for the entry and for unreachable blocks).
    #[inline]
    #[must_use]
    pub fn immediate_dominator(&self, b: usize) -> Option<usize> {
        self.idom.get(b).copied().flatten()
    }

    /// Returns `true` if `b` is reachable from the entry.
    #[inline]
    #[must_use]
    pub fn is_reachable(&self, b: usize) -> bool {
        self.rpo_index.get(b).is_some_and(Option::is_some)
    }

    /// Returns `true` if `a` dominates `b` (reflexive). Unreachable blocks dominate nothing and
    /// are dominated by nothing.
    #[must_use]
    pub fn dominates(&self, a: usize, b: usize) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            match self.immediate_dominator(cur) {
                Some(up) => cur = up,
                None => return false,
            }
        }
    }

    /// Returns `true` if `a` dominates `b` and `a != b`.
    #[inline]
    #[must_use]
    pub fn strictly_dominates(&self, a: usize, b: usize) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Blocks immediately dominated by `b`, in RPO.
    #[must_use]
    pub fn children(&self, b: usize) -> &[usize] {
        self.children.get(b).map_or(&[], Vec::as_slice)
    }

    /// Pre-order walk of the dominator tree from the entry.
    #[must_use]
    pub fn preorder(&self) -> Vec<usize> {
        let mut out = Vec::new();
        if !self.is_reachable(0) {
            return out;
        }
        let mut stack = vec![0_usize];
        while let Some(b) = stack.pop() {
            out.push(b);
            for &c in self.children(b).iter().rev() {
                stack.push(c);
            }
        }
        out
    }
}

fn intersect(
    idom: &[Option<usize>],
    rpo_index: &[Option<usize>],
    mut a: usize,
    mut b: usize,
) -> usize {
    let num = |x: usize| rpo_index[x].unwrap_or(usize::MAX);
    while a != b {
        while num(a) > num(b) {
            match idom[a] {
                Some(up) => a = up,
                None => return b,
            }
        }
        while num(b) > num(a) {
            match idom[b] {
                Some(up) => b = up,
                None => return a,
            }
        }
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::parse_module;

    #[test]
    fn diamond_with_loop() {
        let src = "il 0.1.2
func @f(i1 %c) -> void {
entry:
  cbr %c, left, right
left:
  br join
right:
  br join
join:
  cbr %c, body, exit
body:
  br join
exit:
  ret
orphan:
  ret
}
";
        let m = parse_module(src).unwrap();
        let cfg = FunctionCfg::new(&m.functions[0]);
        let dt = DomTree::compute(&cfg);
        assert_eq!(dt.immediate_dominator(0), None);
        assert_eq!(dt.immediate_dominator(1), Some(0));
        assert_eq!(dt.immediate_dominator(3), Some(0));
        assert_eq!(dt.immediate_dominator(4), Some(3));
        assert_eq!(dt.immediate_dominator(5), Some(3));
        assert_eq!(dt.immediate_dominator(6), None);
        assert!(dt.dominates(0, 5));
        assert!(dt.dominates(3, 4));
        assert!(!dt.dominates(1, 3));
        assert!(dt.dominates(4, 4));
        assert!(!dt.strictly_dominates(4, 4));
        assert!(!dt.dominates(0, 6));
        let mut kids = dt.children(3).to_vec();
        kids.sort_unstable();
        assert_eq!(kids, [4, 5]);
        assert_eq!(dt.preorder()[0], 0);
    }
}
