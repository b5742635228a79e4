// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Line-arrangement polygonization.
//!
//! Splits every wall at crossings, T-contacts and collinear overlaps with
//! other walls, merges split points within tolerance, and returns the planar
//! graph of sub-edges. Faces of that graph see T-junctions that the plain
//! wall graph cannot.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::geometry::{self, Bounds, Point, SegmentIntersection};
use crate::spatial::SpatialIndex;
use crate::types::WallSegment;

use super::half_edge::{PlanarEdge, PlanarGraph};

/// Sub-edge budget per input wall before the input is treated as degenerate.
const MAX_SPLITS_PER_WALL: usize = 64;

/// Merges points within tolerance using a hash grid and a 3x3 cell lookup.
struct NodeMerger {
    cell: f64,
    tolerance: f64,
    grid: FxHashMap<(i64, i64), Vec<usize>>,
    points: Vec<Point>,
}

impl NodeMerger {
    fn new(tolerance: f64) -> Self {
        Self {
            cell: tolerance.max(1e-9),
            tolerance,
            grid: FxHashMap::default(),
            points: Vec::new(),
        }
    }

    fn cell_of(&self, p: &Point) -> (i64, i64) {
        (
            (p.x / self.cell).floor() as i64,
            (p.y / self.cell).floor() as i64,
        )
    }

    fn find_or_add(&mut self, p: Point) -> usize {
        let (cx, cy) = self.cell_of(&p);
        let tol_sq = self.tolerance * self.tolerance;
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(ids) = self.grid.get(&(cx + dx, cy + dy)) {
                    for &id in ids {
                        if (self.points[id] - p).norm_squared() <= tol_sq {
                            return id;
                        }
                    }
                }
            }
        }
        let id = self.points.len();
        self.points.push(p);
        self.grid.entry((cx, cy)).or_default().push(id);
        id
    }
}

/// Polygonizes `walls`. Returns `None` for degenerate input: non-finite
/// coordinates or an arrangement that explodes past the split budget.
pub(crate) fn polygonize(walls: &[&WallSegment], tolerance: f64) -> Option<PlanarGraph> {
    let finite = |p: &Point| p.x.is_finite() && p.y.is_finite();
    if walls.iter().any(|w| !finite(&w.start) || !finite(&w.end)) {
        return None;
    }

    let index = SpatialIndex::new(
        walls
            .iter()
            .enumerate()
            .map(|(i, w)| (Bounds::from_segment(&w.start, &w.end).inflate(tolerance), i)),
    );

    let mut splits: Vec<Vec<(f64, Point)>> = walls
        .iter()
        .map(|w| vec![(0.0, w.start), (1.0, w.end)])
        .collect();

    for (i, a) in walls.iter().enumerate() {
        let query = Bounds::from_segment(&a.start, &a.end).inflate(tolerance);
        for j in index.search(&query) {
            if j <= i {
                continue;
            }
            let b = walls[j];
            let (for_a, for_b) = contacts(a, b, tolerance);
            splits[i].extend(for_a);
            splits[j].extend(for_b);
        }
    }

    let mut merger = NodeMerger::new(tolerance);
    let mut edges = Vec::new();
    for (wall, mut points) in walls.iter().zip(splits) {
        points.sort_by(|x, y| x.0.total_cmp(&y.0));
        let mut previous: Option<usize> = None;
        for (_, p) in points {
            let node = merger.find_or_add(p);
            if let Some(prev) = previous {
                if prev != node {
                    edges.push(PlanarEdge {
                        a: prev,
                        b: node,
                        wall: wall.id,
                    });
                }
            }
            previous = Some(node);
        }
        if edges.len() > walls.len() * MAX_SPLITS_PER_WALL {
            return None;
        }
    }

    debug!(
        walls = walls.len(),
        nodes = merger.points.len(),
        sub_edges = edges.len(),
        "polygonized wall arrangement"
    );

    let mut graph = PlanarGraph {
        nodes: merger.points,
        edges,
    };
    graph.normalize();
    Some(graph)
}

/// Split points that `b` induces on `a` and that `a` induces on `b`.
fn contacts(a: &WallSegment, b: &WallSegment, tolerance: f64) -> (Vec<(f64, Point)>, Vec<(f64, Point)>) {
    let mut on_a = Vec::new();
    let mut on_b = Vec::new();

    let interior = |w: &WallSegment, t: f64| {
        let margin = tolerance / w.length().max(geometry::EPSILON);
        t > margin && t < 1.0 - margin
    };
    // Endpoint of `other` resting on `w` within tolerance.
    let resting = |w: &WallSegment, p: &Point| -> Option<(f64, Point)> {
        let t = geometry::project_param(p, &w.start, &w.end);
        (interior(w, t) && geometry::point_segment_distance(p, &w.start, &w.end) <= tolerance)
            .then_some((t, *p))
    };

    match geometry::segment_intersection(&a.start, &a.end, &b.start, &b.end) {
        SegmentIntersection::Point { point, t, u } => {
            let b_at_end = !interior(b, u);
            let a_at_end = !interior(a, t);
            if interior(a, t) {
                // Prefer the real endpoint so both sides merge into one node.
                let p = if b_at_end { nearest_endpoint(b, &point) } else { point };
                on_a.push((t, p));
            }
            if interior(b, u) {
                let p = if a_at_end { nearest_endpoint(a, &point) } else { point };
                on_b.push((u, p));
            }
        }
        SegmentIntersection::Collinear | SegmentIntersection::None => {
            for p in [b.start, b.end] {
                on_a.extend(resting(a, &p));
            }
            for p in [a.start, a.end] {
                on_b.extend(resting(b, &p));
            }
        }
    }
    (on_a, on_b)
}

fn nearest_endpoint(w: &WallSegment, p: &Point) -> Point {
    if (w.start - p).norm_squared() <= (w.end - p).norm_squared() {
        w.start
    } else {
        w.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::WallId;
    use crate::rooms::half_edge::trace_faces;

    fn wall(id: u32, x0: f64, y0: f64, x1: f64, y1: f64) -> WallSegment {
        WallSegment::new(WallId(id), Point::new(x0, y0), Point::new(x1, y1), 100.0)
    }

    #[test]
    fn t_junction_divider_splits_room() {
        let walls = vec![
            wall(1, 0.0, 0.0, 4000.0, 0.0),
            wall(2, 4000.0, 0.0, 4000.0, 3000.0),
            wall(3, 4000.0, 3000.0, 0.0, 3000.0),
            wall(4, 0.0, 3000.0, 0.0, 0.0),
            wall(5, 2000.0, 0.0, 2000.0, 3000.0),
        ];
        let refs: Vec<&WallSegment> = walls.iter().collect();
        let graph = polygonize(&refs, 5.0).unwrap();
        assert_eq!(graph.nodes.len(), 6);
        assert_eq!(graph.edges.len(), 7);
        let faces = trace_faces(&graph, 1000.0);
        assert_eq!(faces.len(), 2);
        let total: f64 = faces.iter().map(|f| f.area).sum();
        assert!((total - 12_000_000.0).abs() < 1e-6);
        assert!(faces.iter().all(|f| f.wall_ids.contains(&WallId(5))));
    }

    #[test]
    fn crossing_walls_split_both() {
        let walls = vec![wall(1, 0.0, 0.0, 100.0, 100.0), wall(2, 0.0, 100.0, 100.0, 0.0)];
        let refs: Vec<&WallSegment> = walls.iter().collect();
        let mut graph = polygonize(&refs, 1.0).unwrap();
        // Four arms only, all pruned as filaments.
        graph.normalize();
        assert!(graph.edges.is_empty());
        assert_eq!(graph.nodes.len(), 5);
    }

    #[test]
    fn non_finite_input_is_degenerate() {
        let walls = vec![wall(1, 0.0, 0.0, f64::NAN, 1.0)];
        let refs: Vec<&WallSegment> = walls.iter().collect();
        assert!(polygonize(&refs, 1.0).is_none());
    }
}
