// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static bounding-box index for wall hit-testing and collision candidates.
//!
//! The tree is bulk-loaded with sort-tile-recursive (STR) packing and never
//! updated in place: every edit that moves walls calls [`SpatialIndex::rebuild`].
//! Nodes live in one flat `Vec`; leaves reference ranges of the item array and
//! branches reference ranges of the node array, so a search is a plain
//! stack walk with no pointer chasing.

use crate::geometry::Bounds;

/// Maximum children per node.
pub const NODE_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
struct Node {
    bounds: Bounds,
    kind: NodeKind,
}

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    /// Items `start..end` of the packed item array.
    Leaf { start: usize, end: usize },
    /// Nodes `start..end` of the node array.
    Branch { start: usize, end: usize },
}

/// Packed R-tree over `(Bounds, T)` pairs.
#[derive(Debug, Clone)]
pub struct SpatialIndex<T> {
    items: Vec<(Bounds, T)>,
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl<T: Copy> Default for SpatialIndex<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            nodes: Vec::new(),
            root: None,
        }
    }
}

impl<T: Copy> SpatialIndex<T> {
    /// Bulk-loads a new index.
    pub fn new(items: impl IntoIterator<Item = (Bounds, T)>) -> Self {
        let mut index = Self::default();
        index.rebuild(items);
        index
    }

    /// Replaces the whole content of the index.
    pub fn rebuild(&mut self, items: impl IntoIterator<Item = (Bounds, T)>) {
        self.items = items.into_iter().filter(|(b, _)| !b.is_empty()).collect();
        self.nodes.clear();
        self.root = None;
        if self.items.is_empty() {
            return;
        }

        let n = self.items.len();
        str_sort(&mut self.items[..]);

        // Leaves over consecutive runs of the sorted items.
        let mut level: Vec<usize> = Vec::with_capacity(n.div_ceil(NODE_CAPACITY));
        for start in (0..n).step_by(NODE_CAPACITY) {
            let end = (start + NODE_CAPACITY).min(n);
            let bounds = self.items[start..end]
                .iter()
                .fold(Bounds::empty(), |acc, (b, _)| acc.union(b));
            level.push(self.nodes.len());
            self.nodes.push(Node {
                bounds,
                kind: NodeKind::Leaf { start, end },
            });
        }

        // Pack upper levels until one root remains. Each level is re-sorted
        // with the same tiling so siblings stay spatially coherent.
        while level.len() > 1 {
            let mut entries: Vec<(Bounds, usize)> =
                level.iter().map(|&i| (self.nodes[i].bounds, i)).collect();
            str_sort(&mut entries[..]);

            // Children of one branch must be contiguous in the node array.
            let base = self.nodes.len();
            let reordered: Vec<Node> = entries.iter().map(|&(_, i)| self.nodes[i].clone()).collect();
            self.nodes.extend(reordered);

            let mut next = Vec::with_capacity(entries.len().div_ceil(NODE_CAPACITY));
            for start in (0..entries.len()).step_by(NODE_CAPACITY) {
                let end = (start + NODE_CAPACITY).min(entries.len());
                let bounds = entries[start..end]
                    .iter()
                    .fold(Bounds::empty(), |acc, (b, _)| acc.union(b));
                next.push(self.nodes.len());
                self.nodes.push(Node {
                    bounds,
                    kind: NodeKind::Branch {
                        start: base + start,
                        end: base + end,
                    },
                });
            }
            level = next;
        }
        self.root = level.first().copied();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns every item whose box intersects `query` (touching counts).
    pub fn search(&self, query: &Bounds) -> Vec<T> {
        let mut out = Vec::new();
        self.visit(query, |item| out.push(item));
        out
    }

    /// Calls `f` for every item whose box intersects `query`.
    pub fn visit(&self, query: &Bounds, mut f: impl FnMut(T)) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.bounds.intersects(query) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { start, end } => {
                    for (b, item) in &self.items[start..end] {
                        if b.intersects(query) {
                            f(*item);
                        }
                    }
                }
                NodeKind::Branch { start, end } => stack.extend(start..end),
            }
        }
    }

    /// Bounds of everything in the index.
    pub fn bounds(&self) -> Bounds {
        self.root
            .map(|r| self.nodes[r].bounds)
            .unwrap_or_else(Bounds::empty)
    }
}

/// Sort-tile-recursive ordering of a slice of boxed entries.
///
/// Sorts by the center coordinate of the axis with the larger center spread,
/// cuts the run into vertical (or horizontal) slabs of
/// `CAP * ceil(sqrt(n / CAP))` entries, and sorts each slab along the other
/// axis. Consecutive runs of `NODE_CAPACITY` entries then become nodes.
fn str_sort<E>(entries: &mut [(Bounds, E)]) {
    let n = entries.len();
    if n <= NODE_CAPACITY {
        return;
    }
    let spread = entries
        .iter()
        .fold(Bounds::empty(), |acc, (b, _)| acc.include(&b.center()));
    let x_first = spread.width() >= spread.height();

    let key = |b: &Bounds, x_axis: bool| {
        let c = b.center();
        if x_axis {
            c.x
        } else {
            c.y
        }
    };
    entries.sort_by(|a, b| key(&a.0, x_first).total_cmp(&key(&b.0, x_first)));

    let leaf_count = n.div_ceil(NODE_CAPACITY);
    let slab_count = (leaf_count as f64).sqrt().ceil() as usize;
    let slab_size = NODE_CAPACITY * slab_count.max(1);
    for slab in entries.chunks_mut(slab_size) {
        slab.sort_by(|a, b| key(&a.0, !x_first).total_cmp(&key(&b.0, !x_first)));
    }
}
