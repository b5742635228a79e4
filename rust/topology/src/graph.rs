// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall graph: junction nodes and wall adjacency.
//!
//! Wall endpoints that fall into the same tolerance bucket are merged into one
//! [`JunctionNode`] whose position is the running average of its endpoints.
//! Bucketing uses `(round(x / tol), round(y / tol))`, so two endpoints closer
//! than the tolerance but on opposite sides of a bucket boundary stay apart.
//! That non-transitive merging is accepted; callers snap to shared points.
//!
//! The graph is rebuilt from scratch after every edit and never patched.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::geometry::{Point, Vector};
use crate::keys::{Endpoint, EndpointRef, NodeKey, WallId};
use crate::types::WallSegment;

/// Smallest usable bucket size.
const MIN_TOLERANCE: f64 = 1e-9;

/// A point where one or more wall endpoints meet.
#[derive(Debug, Clone)]
pub struct JunctionNode {
    pub position: Point,
    /// Every wall endpoint merged into this node.
    pub endpoints: SmallVec<[EndpointRef; 4]>,
}

impl JunctionNode {
    /// Distinct walls terminating here, in first-seen order.
    pub fn walls(&self) -> impl Iterator<Item = WallId> + '_ {
        self.endpoints
            .iter()
            .enumerate()
            .filter(|(i, (w, _))| !self.endpoints[..*i].iter().any(|(o, _)| o == w))
            .map(|(_, (w, _))| *w)
    }
}

/// Junction nodes plus the symmetric wall adjacency derived from them.
#[derive(Debug, Clone)]
pub struct WallGraph {
    nodes: SlotMap<NodeKey, JunctionNode>,
    endpoint_nodes: FxHashMap<EndpointRef, NodeKey>,
    adjacency: BTreeMap<WallId, BTreeSet<WallId>>,
}

impl WallGraph {
    /// Builds the graph for `walls` with the given merge tolerance.
    pub fn build<'a>(walls: impl IntoIterator<Item = &'a WallSegment>, tolerance: f64) -> Self {
        let tolerance = tolerance.max(MIN_TOLERANCE);
        let mut nodes: SlotMap<NodeKey, JunctionNode> = SlotMap::with_key();
        let mut endpoint_nodes = FxHashMap::default();
        let mut buckets: FxHashMap<(i64, i64), NodeKey> = FxHashMap::default();
        let mut adjacency: BTreeMap<WallId, BTreeSet<WallId>> = BTreeMap::new();

        for wall in walls {
            adjacency.entry(wall.id).or_default();
            for which in Endpoint::BOTH {
                let p = wall.endpoint(which);
                let bucket = bucket_key(&p, tolerance);
                let key = *buckets.entry(bucket).or_insert_with(|| {
                    nodes.insert(JunctionNode {
                        position: p,
                        endpoints: SmallVec::new(),
                    })
                });
                let node = &mut nodes[key];
                node.endpoints.push((wall.id, which));
                let count = node.endpoints.len() as f64;
                let delta: Vector = (p - node.position) / count;
                node.position += delta;
                endpoint_nodes.insert((wall.id, which), key);
            }
        }

        for node in nodes.values() {
            let walls: Vec<WallId> = node.walls().collect();
            for (i, &a) in walls.iter().enumerate() {
                for &b in &walls[i + 1..] {
                    adjacency.entry(a).or_default().insert(b);
                    adjacency.entry(b).or_default().insert(a);
                }
            }
        }

        debug!(
            walls = adjacency.len(),
            nodes = nodes.len(),
            tolerance,
            "rebuilt wall graph"
        );

        Self {
            nodes,
            endpoint_nodes,
            adjacency,
        }
    }

    pub fn node(&self, key: NodeKey) -> Option<&JunctionNode> {
        self.nodes.get(key)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeKey, &JunctionNode)> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node a wall endpoint was merged into.
    pub fn node_of(&self, wall: WallId, which: Endpoint) -> Option<NodeKey> {
        self.endpoint_nodes.get(&(wall, which)).copied()
    }

    /// Start and end nodes of a wall.
    pub fn wall_nodes(&self, wall: WallId) -> Option<(NodeKey, NodeKey)> {
        Some((
            self.node_of(wall, Endpoint::Start)?,
            self.node_of(wall, Endpoint::End)?,
        ))
    }

    /// Endpoint references sharing the node of `(wall, which)`, itself included.
    pub fn endpoints_at(&self, wall: WallId, which: Endpoint) -> &[EndpointRef] {
        self.node_of(wall, which)
            .and_then(|k| self.nodes.get(k))
            .map(|n| n.endpoints.as_slice())
            .unwrap_or(&[])
    }

    /// Distinct walls terminating at a node.
    pub fn walls_at(&self, key: NodeKey) -> Vec<WallId> {
        self.nodes
            .get(key)
            .map(|n| n.walls().collect())
            .unwrap_or_default()
    }

    /// Number of wall endpoints at a node.
    pub fn degree(&self, key: NodeKey) -> usize {
        self.nodes.get(key).map_or(0, |n| n.endpoints.len())
    }

    pub fn contains_wall(&self, wall: WallId) -> bool {
        self.adjacency.contains_key(&wall)
    }

    /// Walls sharing at least one node with `wall`, in id order.
    pub fn neighbors(&self, wall: WallId) -> impl Iterator<Item = WallId> + '_ {
        self.adjacency.get(&wall).into_iter().flatten().copied()
    }

    pub fn adjacency(&self) -> &BTreeMap<WallId, BTreeSet<WallId>> {
        &self.adjacency
    }

    /// Every wall reachable from `seeds` over shared nodes, seeds included.
    pub fn connected_walls(&self, seeds: impl IntoIterator<Item = WallId>) -> BTreeSet<WallId> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        for seed in seeds {
            if self.contains_wall(seed) && visited.insert(seed) {
                queue.push_back(seed);
            }
        }
        while let Some(wall) = queue.pop_front() {
            for next in self.neighbors(wall) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        visited
    }

    /// Breadth-first chain walk from `seed`.
    ///
    /// Passes through a node only when exactly two walls meet there, unless
    /// `through_junctions` is set. `max_depth` bounds the number of hops from
    /// the seed. Returns walls in discovery order, seed first; empty if the
    /// seed is unknown.
    pub fn walk_chain(&self, seed: WallId, through_junctions: bool, max_depth: usize) -> Vec<WallId> {
        if !self.contains_wall(seed) {
            return Vec::new();
        }
        let mut order = vec![seed];
        let mut seen: FxHashSet<WallId> = FxHashSet::default();
        seen.insert(seed);
        let mut queue = VecDeque::from([(seed, 0usize)]);

        while let Some((wall, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for which in Endpoint::BOTH {
                let Some(key) = self.node_of(wall, which) else {
                    continue;
                };
                let walls = self.walls_at(key);
                if walls.len() > 2 && !through_junctions {
                    continue;
                }
                for next in walls {
                    if seen.insert(next) {
                        order.push(next);
                        queue.push_back((next, depth + 1));
                    }
                }
            }
        }
        order
    }
}

fn bucket_key(p: &Point, tolerance: f64) -> (i64, i64) {
    (
        (p.x / tolerance).round() as i64,
        (p.y / tolerance).round() as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wall(id: u32, x0: f64, y0: f64, x1: f64, y1: f64) -> WallSegment {
        WallSegment::new(WallId(id), Point::new(x0, y0), Point::new(x1, y1), 100.0)
    }

    fn rectangle() -> Vec<WallSegment> {
        vec![
            wall(1, 0.0, 0.0, 4000.0, 0.0),
            wall(2, 4000.0, 0.0, 4000.0, 3000.0),
            wall(3, 4000.0, 3000.0, 0.0, 3000.0),
            wall(4, 0.0, 3000.0, 0.0, 0.0),
        ]
    }

    #[test]
    fn rectangle_merges_corners() {
        let walls = rectangle();
        let graph = WallGraph::build(&walls, 5.0);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(
            graph.neighbors(WallId(1)).collect::<Vec<_>>(),
            vec![WallId(2), WallId(4)]
        );
        let corner = graph.node_of(WallId(1), Endpoint::End).unwrap();
        assert_eq!(graph.node_of(WallId(2), Endpoint::Start), Some(corner));
        assert_eq!(graph.degree(corner), 2);
    }

    #[test]
    fn near_endpoints_average() {
        let walls = vec![wall(1, 0.0, 0.0, 100.0, 0.0), wall(2, 101.0, 1.0, 100.0, 200.0)];
        let graph = WallGraph::build(&walls, 5.0);
        let key = graph.node_of(WallId(1), Endpoint::End).unwrap();
        assert_eq!(graph.node_of(WallId(2), Endpoint::Start), Some(key));
        let p = graph.node(key).unwrap().position;
        assert_relative_eq!(p.x, 100.5);
        assert_relative_eq!(p.y, 0.5);
    }

    #[test]
    fn wall_is_never_its_own_neighbor() {
        let walls = vec![wall(1, 0.0, 0.0, 1.0, 0.0)];
        let graph = WallGraph::build(&walls, 5.0);
        assert_eq!(graph.neighbors(WallId(1)).count(), 0);
    }

    #[test]
    fn chain_walk_stops_at_junctions() {
        // 1 - 2 - 3 in a line, with 4 branching off the 2/3 node.
        let walls = vec![
            wall(1, 0.0, 0.0, 100.0, 0.0),
            wall(2, 100.0, 0.0, 200.0, 0.0),
            wall(3, 200.0, 0.0, 300.0, 0.0),
            wall(4, 200.0, 0.0, 200.0, 100.0),
        ];
        let graph = WallGraph::build(&walls, 5.0);
        assert_eq!(graph.walk_chain(WallId(1), false, 10), vec![WallId(1), WallId(2)]);
        let through = graph.walk_chain(WallId(1), true, 10);
        assert_eq!(through.len(), 4);
        assert_eq!(graph.walk_chain(WallId(1), true, 1), vec![WallId(1), WallId(2)]);
        assert!(graph.walk_chain(WallId(9), true, 3).is_empty());
    }

    #[test]
    fn connected_walls_from_seed() {
        let mut walls = rectangle();
        walls.push(wall(9, 9000.0, 0.0, 9500.0, 0.0));
        let graph = WallGraph::build(&walls, 5.0);
        let set = graph.connected_walls([WallId(3)]);
        assert_eq!(set.len(), 4);
        assert!(!set.contains(&WallId(9)));
    }
}
