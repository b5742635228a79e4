// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Splitting faces along divider walls.
//!
//! A divider whose endpoints rest on a face boundary is invisible to plain
//! face tracing (its endpoints are T-junctions). The face is cut with a thin
//! blade along the divider using a boolean difference, and the pieces become
//! child faces.

use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;

use crate::geometry::{self, Point};
use crate::keys::WallId;
use crate::types::WallSegment;

use super::{canonical_signature, Face};

/// Cuts `polygon` along the segment `a → b`.
///
/// Returns the pieces (counter-clockwise, blade slivers snapped back onto the
/// cut line), or an empty list when the segment does not separate the
/// polygon into at least two parts.
pub fn split_polygon_by_segment(polygon: &[Point], a: &Point, b: &Point, tolerance: f64) -> Vec<Vec<Point>> {
    let d = b - a;
    let len = d.norm();
    let Some(normal) = geometry::left_normal(&d) else {
        return Vec::new();
    };
    if polygon.len() < 3 {
        return Vec::new();
    }
    let dir = d / len;
    let half_width = (tolerance * 1e-3).max(1e-6);
    let a_ext = a - dir * tolerance;
    let b_ext = b + dir * tolerance;
    let blade = vec![
        to_path(&(a_ext - normal * half_width)),
        to_path(&(b_ext - normal * half_width)),
        to_path(&(b_ext + normal * half_width)),
        to_path(&(a_ext + normal * half_width)),
    ];

    let subject = vec![geometry::ensure_ccw(polygon.to_vec())
        .iter()
        .map(to_path)
        .collect::<Vec<[f64; 2]>>()];
    let clip = vec![blade];
    let shapes = subject.overlay(&clip, OverlayRule::Difference, FillRule::EvenOdd);

    let snap_band = half_width * 4.0;
    let mut pieces = Vec::new();
    for shape in &shapes {
        let Some(outer) = shape.first() else {
            continue;
        };
        let mut ring: Vec<Point> = Vec::with_capacity(outer.len());
        for p in outer {
            let mut q = Point::new(p[0], p[1]);
            if geometry::point_line_distance(&q, a, b) <= snap_band {
                let t = geometry::project_param(&q, a, b);
                q = a + d * t;
            }
            if ring.last().is_some_and(|last: &Point| (last - q).norm() <= snap_band) {
                continue;
            }
            ring.push(q);
        }
        while ring.len() > 1 && ring.first().zip(ring.last()).is_some_and(|(f, l)| (f - l).norm() <= snap_band) {
            ring.pop();
        }
        if ring.len() >= 3 && geometry::polygon_area(&ring) > geometry::EPSILON {
            pieces.push(geometry::ensure_ccw(ring));
        }
    }
    if pieces.len() < 2 {
        return Vec::new();
    }
    pieces
}

fn to_path(p: &Point) -> [f64; 2] {
    [p.x, p.y]
}

/// Splits every face that a divider wall cuts through.
///
/// A divider cuts a face when both endpoints lie inside or on the face and its
/// midpoint lies strictly inside. Pieces at or below `min_area` are dropped.
pub(crate) fn split_faces(
    mut faces: Vec<Face>,
    walls: &[&WallSegment],
    tolerance: f64,
    min_area: f64,
) -> Vec<Face> {
    for divider in walls.iter().filter(|w| w.is_divider) {
        let mut next = Vec::with_capacity(faces.len() + 1);
        for face in faces {
            if !cuts(&face, divider, tolerance) {
                next.push(face);
                continue;
            }
            let pieces = split_polygon_by_segment(&face.polygon, &divider.start, &divider.end, tolerance);
            if pieces.is_empty() {
                next.push(face);
                continue;
            }
            for piece in pieces {
                let area = geometry::polygon_area(&piece);
                if area <= min_area {
                    continue;
                }
                let candidates: Vec<&WallSegment> = walls
                    .iter()
                    .copied()
                    .filter(|w| w.id == divider.id || face.wall_ids.contains(&w.id))
                    .collect();
                let (polygon, wall_ids) = label_edges(piece, &candidates, tolerance);
                if wall_ids.len() < 3 {
                    continue;
                }
                next.push(Face {
                    area: geometry::polygon_area(&polygon),
                    signature: canonical_signature(&wall_ids),
                    polygon,
                    wall_ids,
                    split_from: Some(face.signature.clone()),
                });
            }
        }
        faces = next;
    }
    faces
}

fn cuts(face: &Face, divider: &WallSegment, tolerance: f64) -> bool {
    !face.wall_ids.contains(&divider.id)
        && geometry::point_inside_or_on(&divider.start, &face.polygon, tolerance)
        && geometry::point_inside_or_on(&divider.end, &face.polygon, tolerance)
        && geometry::point_strictly_inside(&divider.midpoint(), &face.polygon, tolerance)
}

/// Labels each edge of `ring` with the candidate wall whose centerline it
/// follows, then merges consecutive edges of the same wall.
fn label_edges(ring: Vec<Point>, candidates: &[&WallSegment], tolerance: f64) -> (Vec<Point>, Vec<WallId>) {
    let n = ring.len();
    let mut labels: Vec<Option<WallId>> = Vec::with_capacity(n);
    for i in 0..n {
        let p = &ring[i];
        let q = &ring[(i + 1) % n];
        let best = candidates
            .iter()
            .map(|w| {
                let err = geometry::point_segment_distance(p, &w.start, &w.end)
                    .max(geometry::point_segment_distance(q, &w.start, &w.end));
                (err, w.id)
            })
            .filter(|(err, _)| *err <= tolerance * 2.0)
            .min_by(|x, y| x.0.total_cmp(&y.0));
        labels.push(best.map(|(_, id)| id));
    }

    let mut points = Vec::with_capacity(n);
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let incoming = labels[(i + n - 1) % n];
        if incoming.is_some() && incoming == labels[i] {
            continue;
        }
        points.push(ring[i]);
        if let Some(id) = labels[i] {
            ids.push(id);
        }
    }
    (points, ids)
}
