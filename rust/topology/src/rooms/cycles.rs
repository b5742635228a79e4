// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Depth-bounded simple-cycle search over the wall graph.
//!
//! Used when polygonization cannot run. Every simple cycle is enumerated once
//! from its lowest node; a cycle is kept only if no other node or wall of the
//! same connected component lies strictly inside it.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::geometry::{self, Point};
use crate::keys::WallId;

use super::half_edge::{face_from_loop, PlanarGraph};
use super::Face;

/// Hard cap on enumerated cycles.
pub(crate) const MAX_CYCLES: usize = 1000;

struct Search<'a> {
    graph: &'a PlanarGraph,
    adjacency: Vec<Vec<(usize, usize)>>,
    max_depth: usize,
    cycles: Vec<(Vec<usize>, Vec<usize>)>,
    seen: FxHashSet<Vec<u32>>,
}

impl Search<'_> {
    fn run(&mut self, start: usize, nodes: &mut Vec<usize>, edges: &mut Vec<usize>) {
        if self.cycles.len() >= MAX_CYCLES || nodes.len() > self.max_depth {
            return;
        }
        let Some(&current) = nodes.last() else {
            return;
        };
        let neighbors = self.adjacency[current].clone();
        for (next, edge) in neighbors {
            if edges.last() == Some(&edge) {
                continue;
            }
            if next == start {
                if nodes.len() >= 3 {
                    let mut loop_edges = edges.clone();
                    loop_edges.push(edge);
                    let key: Vec<u32> = loop_edges.iter().map(|&e| e as u32).collect();
                    if self.seen.insert(super::canonical_cycle(&key)) {
                        self.cycles.push((nodes.clone(), loop_edges));
                    }
                }
                continue;
            }
            if next < start || nodes.contains(&next) {
                continue;
            }
            nodes.push(next);
            edges.push(edge);
            self.run(start, nodes, edges);
            nodes.pop();
            edges.pop();
        }
    }

    fn component_labels(&self) -> Vec<usize> {
        let n = self.graph.nodes.len();
        let mut label = vec![usize::MAX; n];
        for seed in 0..n {
            if label[seed] != usize::MAX {
                continue;
            }
            label[seed] = seed;
            let mut stack = vec![seed];
            while let Some(v) = stack.pop() {
                for &(w, _) in &self.adjacency[v] {
                    if label[w] == usize::MAX {
                        label[w] = seed;
                        stack.push(w);
                    }
                }
            }
        }
        label
    }
}

/// Minimal cycles of `graph` whose area exceeds `min_area`.
pub(crate) fn minimal_cycles(graph: &PlanarGraph, max_depth: usize, min_area: f64, tolerance: f64) -> Vec<Face> {
    let mut adjacency = vec![Vec::new(); graph.nodes.len()];
    for (i, e) in graph.edges.iter().enumerate() {
        adjacency[e.a].push((e.b, i));
        adjacency[e.b].push((e.a, i));
    }
    let mut search = Search {
        graph,
        adjacency,
        max_depth: max_depth.max(3),
        cycles: Vec::new(),
        seen: FxHashSet::default(),
    };
    for start in 0..graph.nodes.len() {
        if search.cycles.len() >= MAX_CYCLES {
            debug!(limit = MAX_CYCLES, "cycle enumeration limit reached");
            break;
        }
        let mut nodes = vec![start];
        let mut edges = Vec::new();
        search.run(start, &mut nodes, &mut edges);
    }

    let labels = search.component_labels();
    let mut faces = Vec::new();
    for (nodes, edges) in &search.cycles {
        let polygon: Vec<Point> = nodes.iter().map(|&n| graph.nodes[n]).collect();
        if geometry::polygon_area(&polygon) <= min_area {
            continue;
        }
        let component = labels[nodes[0]];
        let on_cycle_nodes: FxHashSet<usize> = nodes.iter().copied().collect();
        let on_cycle_edges: FxHashSet<usize> = edges.iter().copied().collect();

        let node_inside = (0..graph.nodes.len()).any(|n| {
            labels[n] == component
                && !on_cycle_nodes.contains(&n)
                && geometry::point_strictly_inside(&graph.nodes[n], &polygon, tolerance)
        });
        let edge_inside = graph.edges.iter().enumerate().any(|(i, e)| {
            if labels[e.a] != component || on_cycle_edges.contains(&i) {
                return false;
            }
            let mid = Point::from((graph.nodes[e.a].coords + graph.nodes[e.b].coords) * 0.5);
            geometry::point_strictly_inside(&mid, &polygon, tolerance)
        });
        if node_inside || edge_inside {
            continue;
        }

        let walls: Vec<WallId> = edges.iter().map(|&e| graph.edges[e].wall).collect();
        if let Some(face) = face_from_loop(polygon, walls) {
            faces.push(face);
        }
    }
    debug!(cycles = search.cycles.len(), faces = faces.len(), "cycle search finished");
    faces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rooms::half_edge::PlanarEdge;
    use approx::assert_relative_eq;

    fn grid_with_chord() -> PlanarGraph {
        // Square 0-1-2-3 with a diagonal chord 0-2.
        PlanarGraph {
            nodes: vec![
                Point::new(0.0, 0.0),
                Point::new(100.0, 0.0),
                Point::new(100.0, 100.0),
                Point::new(0.0, 100.0),
            ],
            edges: vec![
                PlanarEdge { a: 0, b: 1, wall: WallId(1) },
                PlanarEdge { a: 1, b: 2, wall: WallId(2) },
                PlanarEdge { a: 2, b: 3, wall: WallId(3) },
                PlanarEdge { a: 3, b: 0, wall: WallId(4) },
                PlanarEdge { a: 0, b: 2, wall: WallId(5) },
            ],
        }
    }

    #[test]
    fn keeps_only_minimal_cycles() {
        let faces = minimal_cycles(&grid_with_chord(), 64, 1.0, 1e-6);
        assert_eq!(faces.len(), 2);
        for face in &faces {
            assert_relative_eq!(face.area, 5000.0);
            assert!(face.wall_ids.contains(&WallId(5)));
            assert!(geometry::signed_area(&face.polygon) > 0.0);
        }
    }

    #[test]
    fn depth_bound_limits_cycle_length() {
        let faces = minimal_cycles(&grid_with_chord(), 3, 1.0, 1e-6);
        // Triangles need three nodes, the outer square four.
        assert_eq!(faces.len(), 2);
        let mut square = grid_with_chord();
        square.edges.pop();
        assert!(minimal_cycles(&square, 3, 1.0, 1e-6).is_empty());
        assert_eq!(minimal_cycles(&square, 4, 1.0, 1e-6).len(), 1);
    }
}
