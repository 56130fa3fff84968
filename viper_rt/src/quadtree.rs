// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-depth quadtree over integer rectangles.
//!
//! Items are addressed by caller-chosen ids and positioned by their center. A node splits into
//! four quadrants when it would exceed [`MAX_ITEMS`]; items straddling a split line stay in the
//! parent. Nodes at [`MAX_DEPTH`] never split, so a full leaf rejects further inserts. Queries
//! return at most [`MAX_RESULTS`] ids and report whether they were truncated.

use std::vec::Vec;

/// Items a node holds before splitting.
pub const MAX_ITEMS: usize = 8;
/// Maximum node depth.
pub const MAX_DEPTH: u32 = 8;
/// Maximum ids returned by one query.
pub const MAX_RESULTS: usize = 256;
/// Maximum pairs returned by [`Quadtree::pairs`].
pub const MAX_PAIRS: usize = 1024;

/// Axis-aligned rectangle given by its top-left corner and size.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rect {
    /// Left edge.
    pub x: i64,
    /// Top edge.
    pub y: i64,
    /// Width.
    pub w: i64,
    /// Height.
    pub h: i64,
}

impl Rect {
    /// A rectangle of size `w` x `h` centered on `(cx, cy)`.
    #[must_use]
    pub const fn centered(cx: i64, cy: i64, w: i64, h: i64) -> Self {
        Self {
            x: cx.saturating_sub(w / 2),
            y: cy.saturating_sub(h / 2),
            w,
            h,
        }
    }

    /// Right edge, clamped to the `i64` range.
    #[must_use]
    pub const fn right(&self) -> i64 {
        self.x.saturating_add(self.w)
    }

    /// Bottom edge, clamped to the `i64` range.
    #[must_use]
    pub const fn bottom(&self) -> i64 {
        self.y.saturating_add(self.h)
    }

    /// Returns `true` if the rectangles overlap (touching edges do not count).
    #[must_use]
    pub const fn intersects(&self, o: &Self) -> bool {
        !(o.x >= self.right()
            || o.right() <= self.x
            || o.y >= self.bottom()
            || o.bottom() <= self.y)
    }
}

#[derive(Clone, Debug)]
struct Node {
    bounds: Rect,
    depth: u32,
    items: Vec<usize>,
    children: Option<[usize; 4]>,
}

#[derive(Clone, Debug)]
struct Item {
    id: i64,
    rect: Rect,
}

/// Result of a query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryResult {
    /// Matching ids.
    pub ids: Vec<i64>,
    /// `true` when more items matched than [`MAX_RESULTS`].
    pub truncated: bool,
}

/// Quadtree payload.
#[derive(Clone, Debug)]
pub struct Quadtree {
    nodes: Vec<Node>,
    items: Vec<Option<Item>>,
    /// Result of the last [`Quadtree::run_query`], read back by index.
    last_query: QueryResult,
    /// Result of the last [`Quadtree::run_pairs`].
    last_pairs: Vec<(i64, i64)>,
}

impl Quadtree {
    /// An empty tree covering `bounds`.
    #[must_use]
    pub fn new(bounds: Rect) -> Self {
        Self {
            nodes: std::vec![Node {
                bounds,
                depth: 0,
                items: Vec::new(),
                children: None,
            }],
            items: Vec::new(),
            last_query: QueryResult::default(),
            last_pairs: Vec::new(),
        }
    }

    /// Number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.iter().flatten().count()
    }

    /// Returns `true` when no items are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot_of(&self, id: i64) -> Option<usize> {
        self.items
            .iter()
            .position(|it| it.as_ref().is_some_and(|it| it.id == id))
    }

    /// Inserts item `id` centered at `(cx, cy)`. Fails on duplicate ids, rectangles outside the
    /// tree, and full leaves at maximum depth.
    pub fn insert(&mut self, id: i64, cx: i64, cy: i64, w: i64, h: i64) -> bool {
        if self.slot_of(id).is_some() {
            return false;
        }
        let rect = Rect::centered(cx, cy, w, h);
        if !self.nodes[0].bounds.intersects(&rect) {
            return false;
        }
        let slot = match self.items.iter().position(Option::is_none) {
            Some(s) => {
                self.items[s] = Some(Item { id, rect });
                s
            }
            None => {
                self.items.push(Some(Item { id, rect }));
                self.items.len() - 1
            }
        };
        if self.insert_into(0, slot) {
            return true;
        }
        self.items[slot] = None;
        false
    }

    fn rect(&self, slot: usize) -> Option<Rect> {
        self.items.get(slot)?.as_ref().map(|it| it.rect)
    }

    fn quadrant(&self, node: usize, r: &Rect) -> Option<usize> {
        let n = &self.nodes[node];
        let mid_x = n.bounds.x.saturating_add(n.bounds.w / 2);
        let mid_y = n.bounds.y.saturating_add(n.bounds.h / 2);
        let top = r.y < mid_y;
        let bottom = r.bottom() > mid_y;
        let left = r.x < mid_x;
        let right = r.right() > mid_x;
        match (top, bottom, left, right) {
            (true, false, true, false) => Some(0),
            (true, false, false, true) => Some(1),
            (false, true, true, false) => Some(2),
            (false, true, false, true) => Some(3),
            _ => None,
        }
    }

    fn child_for(&self, node: usize, slot: usize) -> Option<usize> {
        let children = self.nodes[node].children?;
        let r = self.rect(slot)?;
        self.quadrant(node, &r).map(|q| children[q])
    }

    fn split(&mut self, node: usize) {
        let Node { bounds: b, depth, .. } = self.nodes[node];
        let hw = b.w / 2;
        let hh = b.h / 2;
        let base = self.nodes.len();
        for (dx, dy) in [(0, 0), (hw, 0), (0, hh), (hw, hh)] {
            self.nodes.push(Node {
                bounds: Rect {
                    x: b.x.saturating_add(dx),
                    y: b.y.saturating_add(dy),
                    w: hw,
                    h: hh,
                },
                depth: depth + 1,
                items: Vec::new(),
                children: None,
            });
        }
        self.nodes[node].children = Some([base, base + 1, base + 2, base + 3]);
    }

    fn insert_into(&mut self, node: usize, slot: usize) -> bool {
        if let Some(child) = self.child_for(node, slot) {
            return self.insert_into(child, slot);
        }
        if self.nodes[node].items.len() < MAX_ITEMS {
            self.nodes[node].items.push(slot);
            return true;
        }
        if self.nodes[node].children.is_some() || self.nodes[node].depth >= MAX_DEPTH {
            return false;
        }
        self.split(node);
        let existing = core::mem::take(&mut self.nodes[node].items);
        for s in existing {
            match self.child_for(node, s) {
                Some(child) => {
                    self.insert_into(child, s);
                }
                None => self.nodes[node].items.push(s),
            }
        }
        match self.child_for(node, slot) {
            Some(child) => self.insert_into(child, slot),
            None if self.nodes[node].items.len() < MAX_ITEMS => {
                self.nodes[node].items.push(slot);
                true
            }
            None => false,
        }
    }

    fn remove_slot(&mut self, slot: usize) -> bool {
        for n in &mut self.nodes {
            if let Some(pos) = n.items.iter().position(|&s| s == slot) {
                n.items.swap_remove(pos);
                return true;
            }
        }
        false
    }

    /// Removes item `id`. Returns `true` if it was present.
    pub fn remove(&mut self, id: i64) -> bool {
        let Some(slot) = self.slot_of(id) else {
            return false;
        };
        self.remove_slot(slot);
        self.items[slot] = None;
        true
    }

    /// Moves item `id` (remove then insert).
    pub fn update(&mut self, id: i64, cx: i64, cy: i64, w: i64, h: i64) -> bool {
        self.remove(id) && self.insert(id, cx, cy, w, h)
    }

    /// Ids of items overlapping `area`.
    #[must_use]
    pub fn query_rect(&self, area: Rect) -> QueryResult {
        let mut out = QueryResult::default();
        let mut stack = std::vec![0_usize];
        while let Some(n) = stack.pop() {
            let node = &self.nodes[n];
            for &s in &node.items {
                let Some(item) = self.items.get(s).and_then(Option::as_ref) else {
                    continue;
                };
                if !item.rect.intersects(&area) {
                    continue;
                }
                if out.ids.len() >= MAX_RESULTS {
                    out.truncated = true;
                    return out;
                }
                out.ids.push(item.id);
            }
            if let Some(children) = node.children {
                for &c in children.iter().rev() {
                    if self.nodes[c].bounds.intersects(&area) {
                        stack.push(c);
                    }
                }
            }
        }
        out
    }

    /// Ids of items within the square of half-size `radius` around `(x, y)`.
    #[must_use]
    pub fn query_point(&self, x: i64, y: i64, radius: i64) -> QueryResult {
        let side = radius.saturating_mul(2);
        self.query_rect(Rect {
            x: x.saturating_sub(radius),
            y: y.saturating_sub(radius),
            w: side,
            h: side,
        })
    }

    /// Runs [`Quadtree::query_rect`] and keeps the result. Returns the number of ids.
    pub fn run_query(&mut self, area: Rect) -> usize {
        self.last_query = self.query_rect(area);
        self.last_query.ids.len()
    }

    /// Id `i` of the last kept query.
    #[must_use]
    pub fn result(&self, i: usize) -> Option<i64> {
        self.last_query.ids.get(i).copied()
    }

    /// Whether the last kept query hit [`MAX_RESULTS`].
    #[must_use]
    pub fn last_truncated(&self) -> bool {
        self.last_query.truncated
    }

    /// Runs [`Quadtree::pairs`] and keeps the result. Returns the number of pairs.
    pub fn run_pairs(&mut self) -> usize {
        self.last_pairs = self.pairs();
        self.last_pairs.len()
    }

    /// Pair `i` of the last kept pair scan.
    #[must_use]
    pub fn pair(&self, i: usize) -> Option<(i64, i64)> {
        self.last_pairs.get(i).copied()
    }

    /// Broad-phase candidate pairs: items sharing a node, and items against those of ancestor
    /// nodes. Capped at [`MAX_PAIRS`].
    #[must_use]
    pub fn pairs(&self) -> Vec<(i64, i64)> {
        let mut out = Vec::new();
        self.collect_pairs(0, &mut Vec::new(), &mut out);
        out
    }

    fn collect_pairs(&self, node: usize, ancestors: &mut Vec<i64>, out: &mut Vec<(i64, i64)>) {
        let ids: Vec<i64> = self.nodes[node]
            .items
            .iter()
            .filter_map(|&s| self.items.get(s)?.as_ref().map(|it| it.id))
            .collect();
        for (i, &a) in ids.iter().enumerate() {
            for &b in ids[i + 1..].iter().chain(ancestors.iter()) {
                if out.len() >= MAX_PAIRS {
                    return;
                }
                out.push((a, b));
            }
        }
        let Some(children) = self.nodes[node].children else {
            return;
        };
        let mark = ancestors.len();
        ancestors.extend_from_slice(&ids);
        for c in children {
            self.collect_pairs(c, ancestors, out);
        }
        ancestors.truncate(mark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> Quadtree {
        Quadtree::new(Rect {
            x: 0,
            y: 0,
            w: 1024,
            h: 1024,
        })
    }

    #[test]
    fn insert_query_remove() {
        let mut qt = world();
        assert!(qt.insert(1, 100, 100, 10, 10));
        assert!(qt.insert(2, 900, 900, 10, 10));
        assert!(!qt.insert(1, 50, 50, 4, 4), "duplicate id");
        assert!(!qt.insert(3, 5000, 5000, 4, 4), "out of bounds");
        let hits = qt.query_rect(Rect {
            x: 0,
            y: 0,
            w: 200,
            h: 200,
        });
        assert_eq!(hits.ids, [1]);
        assert!(!hits.truncated);
        assert!(qt.remove(1));
        assert!(!qt.remove(1));
        assert!(qt.query_point(100, 100, 20).ids.is_empty());
        assert!(qt.update(2, 100, 100, 10, 10));
        assert_eq!(qt.query_point(100, 100, 20).ids, [2]);
        assert_eq!(qt.len(), 1);

        let near = Rect {
            x: 90,
            y: 90,
            w: 5,
            h: 5,
        };
        assert_eq!(qt.run_query(near), 1);
        assert_eq!((qt.result(0), qt.result(1)), (Some(2), None));
        assert!(!qt.last_truncated());
    }

    #[test]
    fn splits_past_capacity_and_caps_results() {
        let mut qt = world();
        let mut n = 0;
        for i in 0..20 {
            for j in 0..20 {
                assert!(qt.insert(n, 20 + i * 50, 20 + j * 50, 4, 4), "item {n}");
                n += 1;
            }
        }
        assert!(qt.nodes.len() > 1, "root split");
        let all = qt.query_rect(Rect {
            x: 0,
            y: 0,
            w: 1024,
            h: 1024,
        });
        assert_eq!(all.ids.len(), MAX_RESULTS);
        assert!(all.truncated);
    }

    #[test]
    fn extreme_coordinates_clamp_instead_of_wrapping() {
        let r = Rect::centered(i64::MIN, i64::MAX, i64::MAX, i64::MAX);
        assert_eq!((r.x, r.y), (i64::MIN, i64::MAX - i64::MAX / 2));
        assert_eq!(r.right(), i64::MIN + i64::MAX);
        let far = Rect {
            x: i64::MAX - 1,
            y: i64::MAX - 1,
            w: 10,
            h: 10,
        };
        assert_eq!(far.bottom(), i64::MAX);
        assert!(!world().nodes[0].bounds.intersects(&far));

        let mut qt = Quadtree::new(Rect {
            x: i64::MAX - 1000,
            y: i64::MAX - 1000,
            w: i64::MAX,
            h: i64::MAX,
        });
        assert!(qt.insert(1, i64::MAX - 10, i64::MAX - 10, 100, 100));
        assert!(!qt.insert(2, i64::MIN, i64::MIN, i64::MAX, i64::MAX), "outside the tree");
        assert_eq!(qt.query_point(i64::MAX, i64::MAX, i64::MAX).ids, [1]);
    }

    #[test]
    fn pairs_include_ancestors() {
        let mut qt = world();
        // Straddles the root's center lines, so it stays at the root after the split.
        assert!(qt.insert(100, 512, 512, 20, 20));
        for k in 0..8 {
            assert!(qt.insert(k, 10 + k * 10, 10, 4, 4));
        }
        let pairs = qt.pairs();
        assert!(pairs.contains(&(0, 100)));
        assert!(pairs.contains(&(0, 1)));
        assert!(!pairs.iter().any(|&(a, b)| a == b));
    }
}
