// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar edge sets and half-edge face tracing.
//!
//! Every undirected edge yields two half-edges. Outgoing half-edges at each
//! node are sorted by angle; after arriving at a node the trace continues
//! with the next outgoing half-edge clockwise from the one leading back.
//! Bounded faces come out counter-clockwise (positive area), the unbounded
//! face of each component comes out clockwise and is dropped.

use rustc_hash::FxHashMap;

use crate::geometry::{self, Point};
use crate::graph::WallGraph;
use crate::keys::{NodeKey, WallId};
use crate::types::WallSegment;

use super::{canonical_signature, Face};

/// An undirected edge between two planar nodes, labelled with its wall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlanarEdge {
    pub a: usize,
    pub b: usize,
    pub wall: WallId,
}

/// Nodes and wall-labelled edges of a planar arrangement.
#[derive(Debug, Clone, Default)]
pub(crate) struct PlanarGraph {
    pub nodes: Vec<Point>,
    pub edges: Vec<PlanarEdge>,
}

impl PlanarGraph {
    /// One edge per wall between its merged junction nodes.
    pub fn from_wall_graph<'a>(
        graph: &WallGraph,
        walls: impl IntoIterator<Item = &'a WallSegment>,
    ) -> Self {
        let mut out = Self::default();
        let mut index: FxHashMap<NodeKey, usize> = FxHashMap::default();
        for wall in walls {
            let Some((ka, kb)) = graph.wall_nodes(wall.id) else {
                continue;
            };
            let mut slot = |key: NodeKey, out: &mut Self| -> Option<usize> {
                if let Some(&i) = index.get(&key) {
                    return Some(i);
                }
                let position = graph.node(key)?.position;
                out.nodes.push(position);
                index.insert(key, out.nodes.len() - 1);
                Some(out.nodes.len() - 1)
            };
            let (Some(a), Some(b)) = (slot(ka, &mut out), slot(kb, &mut out)) else {
                continue;
            };
            out.edges.push(PlanarEdge {
                a,
                b,
                wall: wall.id,
            });
        }
        out.normalize();
        out
    }

    /// Drops self-loops and duplicate node pairs (first edge wins), then
    /// prunes dangling filaments until every remaining node has degree >= 2.
    pub fn normalize(&mut self) {
        let mut seen: FxHashMap<(usize, usize), ()> = FxHashMap::default();
        self.edges.retain(|e| {
            if e.a == e.b {
                return false;
            }
            let key = (e.a.min(e.b), e.a.max(e.b));
            seen.insert(key, ()).is_none()
        });

        let mut degree = vec![0usize; self.nodes.len()];
        for e in &self.edges {
            degree[e.a] += 1;
            degree[e.b] += 1;
        }
        let mut alive = vec![true; self.edges.len()];
        let mut incident: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (i, e) in self.edges.iter().enumerate() {
            incident[e.a].push(i);
            incident[e.b].push(i);
        }
        let mut stack: Vec<usize> = (0..self.nodes.len()).filter(|&n| degree[n] == 1).collect();
        while let Some(n) = stack.pop() {
            if degree[n] != 1 {
                continue;
            }
            let Some(&e) = incident[n].iter().find(|&&e| alive[e]) else {
                continue;
            };
            alive[e] = false;
            let edge = self.edges[e];
            for end in [edge.a, edge.b] {
                degree[end] -= 1;
                if degree[end] == 1 {
                    stack.push(end);
                }
            }
        }
        let mut i = 0;
        self.edges.retain(|_| {
            let keep = alive[i];
            i += 1;
            keep
        });
    }

    fn origin(&self, half: usize) -> usize {
        let e = &self.edges[half / 2];
        if half % 2 == 0 {
            e.a
        } else {
            e.b
        }
    }

    fn destination(&self, half: usize) -> usize {
        self.origin(half ^ 1)
    }
}

/// Traces all bounded faces whose area exceeds `min_area`.
pub(crate) fn trace_faces(graph: &PlanarGraph, min_area: f64) -> Vec<Face> {
    let half_count = graph.edges.len() * 2;
    if half_count == 0 {
        return Vec::new();
    }

    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); graph.nodes.len()];
    for h in 0..half_count {
        outgoing[graph.origin(h)].push(h);
    }
    let angle = |h: usize| {
        let d = graph.nodes[graph.destination(h)] - graph.nodes[graph.origin(h)];
        d.y.atan2(d.x)
    };
    for list in &mut outgoing {
        list.sort_by(|&x, &y| angle(x).total_cmp(&angle(y)).then(x.cmp(&y)));
    }
    let mut slot = vec![0usize; half_count];
    for list in &outgoing {
        for (i, &h) in list.iter().enumerate() {
            slot[h] = i;
        }
    }
    let next = |h: usize| {
        let around = &outgoing[graph.destination(h)];
        let twin = h ^ 1;
        around[(slot[twin] + around.len() - 1) % around.len()]
    };

    let mut visited = vec![false; half_count];
    let mut faces = Vec::new();
    for start in 0..half_count {
        if visited[start] {
            continue;
        }
        let mut loop_halves = Vec::new();
        let mut current = start;
        let closed = loop {
            visited[current] = true;
            loop_halves.push(current);
            current = next(current);
            if current == start {
                break true;
            }
            if visited[current] || loop_halves.len() > half_count {
                break false;
            }
        };
        if !closed || loop_halves.len() < 3 {
            continue;
        }

        let polygon: Vec<Point> = loop_halves.iter().map(|&h| graph.nodes[graph.origin(h)]).collect();
        let area = geometry::signed_area(&polygon);
        if area <= min_area {
            continue;
        }
        let walls: Vec<WallId> = loop_halves.iter().map(|&h| graph.edges[h / 2].wall).collect();
        if let Some(face) = face_from_loop(polygon, walls) {
            faces.push(face);
        }
    }
    faces
}

/// Builds a face from a closed vertex loop where `walls[i]` labels the edge
/// leaving `polygon[i]`. Vertices between two edges of the same wall are
/// dropped; loops that self-intersect are rejected.
pub(crate) fn face_from_loop(polygon: Vec<Point>, walls: Vec<WallId>) -> Option<Face> {
    let n = polygon.len();
    let mut points = Vec::with_capacity(n);
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let incoming = walls[(i + n - 1) % n];
        if incoming != walls[i] {
            points.push(polygon[i]);
            ids.push(walls[i]);
        }
    }
    if points.len() < 3 || geometry::polygon_self_intersects(&points) {
        return None;
    }
    let points = geometry::ensure_ccw(points);
    Some(Face {
        area: geometry::polygon_area(&points),
        signature: canonical_signature(&ids),
        polygon: points,
        wall_ids: ids,
        split_from: None,
    })
}
