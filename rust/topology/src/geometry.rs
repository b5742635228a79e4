// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar geometry primitives shared by every component.
//!
//! Points and vectors are nalgebra types. Polygons are plain vertex slices
//! with an implicit closing edge (first vertex is not repeated at the end).

use nalgebra::{Point2, Rotation2, Vector2};
use serde::{Deserialize, Serialize};

/// A 2D point in plan coordinates.
pub type Point = Point2<f64>;

/// A 2D displacement in plan coordinates.
pub type Vector = Vector2<f64>;

/// Epsilon for floating point comparisons that are not tolerance-driven.
pub const EPSILON: f64 = 1e-9;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Creates a box from two corners in any order.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    /// An inverted box that acts as the identity for [`Bounds::union`].
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Self {
        points.into_iter().fold(Self::empty(), |b, p| b.include(p))
    }

    pub fn from_segment(a: &Point, b: &Point) -> Self {
        Self::new(a.x, a.y, b.x, b.y)
    }

    /// Returns the box grown to include `p`.
    pub fn include(&self, p: &Point) -> Self {
        Self {
            min_x: self.min_x.min(p.x),
            min_y: self.min_y.min(p.y),
            max_x: self.max_x.max(p.x),
            max_y: self.max_y.max(p.y),
        }
    }

    pub fn union(&self, other: &Bounds) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Returns the box grown by `d` on every side.
    pub fn inflate(&self, d: f64) -> Self {
        Self {
            min_x: self.min_x - d,
            min_y: self.min_y - d,
            max_x: self.max_x + d,
            max_y: self.max_y + d,
        }
    }

    /// Inclusive overlap test; touching boxes intersect.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn contains(&self, other: &Bounds) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }

    /// Corners in counter-clockwise order starting at the minimum corner.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.min_x, self.min_y),
            Point::new(self.max_x, self.min_y),
            Point::new(self.max_x, self.max_y),
            Point::new(self.min_x, self.max_y),
        ]
    }
}

// =============================================================================
// Polygons
// =============================================================================

/// Signed area (shoelace). Positive = counter-clockwise.
pub fn signed_area(polygon: &[Point]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let n = polygon.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += polygon[i].x * polygon[j].y;
        area -= polygon[j].x * polygon[i].y;
    }
    area * 0.5
}

pub fn polygon_area(polygon: &[Point]) -> f64 {
    signed_area(polygon).abs()
}

/// Length of the closed boundary.
pub fn perimeter(polygon: &[Point]) -> f64 {
    let n = polygon.len();
    if n < 2 {
        return 0.0;
    }
    (0..n)
        .map(|i| (polygon[(i + 1) % n] - polygon[i]).norm())
        .sum()
}

/// Area-weighted centroid; falls back to the vertex average for degenerate rings.
pub fn centroid(polygon: &[Point]) -> Point {
    let n = polygon.len();
    if n == 0 {
        return Point::origin();
    }
    let area = signed_area(polygon);
    if area.abs() < EPSILON {
        let sum = polygon.iter().fold(Vector::zeros(), |acc, p| acc + p.coords);
        return Point::from(sum / n as f64);
    }
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let p = &polygon[i];
        let q = &polygon[(i + 1) % n];
        let cross = p.x * q.y - q.x * p.y;
        cx += (p.x + q.x) * cross;
        cy += (p.y + q.y) * cross;
    }
    Point::new(cx / (6.0 * area), cy / (6.0 * area))
}

/// Returns the ring with counter-clockwise winding.
pub fn ensure_ccw(mut polygon: Vec<Point>) -> Vec<Point> {
    if signed_area(&polygon) < 0.0 {
        polygon.reverse();
    }
    polygon
}

/// Even-odd point-in-polygon test. Points exactly on the boundary may land
/// on either side; use [`point_on_boundary`] when that matters.
pub fn point_in_polygon(p: &Point, polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = &polygon[i];
        let b = &polygon[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// True when `p` lies within `tolerance` of any polygon edge.
pub fn point_on_boundary(p: &Point, polygon: &[Point], tolerance: f64) -> bool {
    let n = polygon.len();
    (0..n).any(|i| point_segment_distance(p, &polygon[i], &polygon[(i + 1) % n]) <= tolerance)
}

/// True when `p` is strictly inside (farther than `tolerance` from the boundary).
pub fn point_strictly_inside(p: &Point, polygon: &[Point], tolerance: f64) -> bool {
    point_in_polygon(p, polygon) && !point_on_boundary(p, polygon, tolerance)
}

/// True when `p` is inside the polygon or on its boundary.
pub fn point_inside_or_on(p: &Point, polygon: &[Point], tolerance: f64) -> bool {
    point_on_boundary(p, polygon, tolerance) || point_in_polygon(p, polygon)
}

/// True when two non-adjacent edges of the ring touch or cross, or two
/// adjacent edges fold back onto each other.
pub fn polygon_self_intersects(polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return true;
    }
    for i in 0..n {
        let a1 = &polygon[i];
        let a2 = &polygon[(i + 1) % n];
        for j in (i + 1)..n {
            let b1 = &polygon[j];
            let b2 = &polygon[(j + 1) % n];
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                // Shared vertex is fine; collinear back-tracking is not.
                let u = a2 - a1;
                let v = b2 - b1;
                let (shared_dir_a, shared_dir_b) = if j == i + 1 { (-u, v) } else { (u, -v) };
                if cross(&shared_dir_a, &shared_dir_b).abs() <= EPSILON * u.norm() * v.norm()
                    && shared_dir_a.dot(&shared_dir_b) > 0.0
                {
                    return true;
                }
                continue;
            }
            if !matches!(segment_intersection(a1, a2, b1, b2), SegmentIntersection::None) {
                return true;
            }
        }
    }
    false
}

/// True when `inner` lies inside `outer` (boundary contact within `tolerance`
/// allowed): every vertex and every edge midpoint of `inner` is inside or on
/// `outer`, and no edges properly cross.
pub fn polygon_contains_polygon(outer: &[Point], inner: &[Point], tolerance: f64) -> bool {
    if outer.len() < 3 || inner.len() < 3 {
        return false;
    }
    let outer_bounds = Bounds::from_points(outer).inflate(tolerance);
    if !outer_bounds.contains(&Bounds::from_points(inner)) {
        return false;
    }
    let n = inner.len();
    for i in 0..n {
        let p = &inner[i];
        let q = &inner[(i + 1) % n];
        let mid = Point::from((p.coords + q.coords) * 0.5);
        if !point_inside_or_on(p, outer, tolerance) || !point_inside_or_on(&mid, outer, tolerance) {
            return false;
        }
    }
    let m = outer.len();
    for i in 0..n {
        for j in 0..m {
            if let SegmentIntersection::Point { t, u, .. } =
                segment_intersection(&inner[i], &inner[(i + 1) % n], &outer[j], &outer[(j + 1) % m])
            {
                let interior = |s: f64| s > 1e-6 && s < 1.0 - 1e-6;
                if interior(t) && interior(u) {
                    return false;
                }
            }
        }
    }
    true
}

// =============================================================================
// Segments
// =============================================================================

/// 2D cross product (z component).
pub fn cross(u: &Vector, v: &Vector) -> f64 {
    u.x * v.y - u.y * v.x
}

/// Unclamped projection parameter of `p` on the line `a → b`.
pub fn project_param(p: &Point, a: &Point, b: &Point) -> f64 {
    let d = b - a;
    let len_sq = d.norm_squared();
    if len_sq < EPSILON * EPSILON {
        return 0.0;
    }
    (p - a).dot(&d) / len_sq
}

/// Distance from `p` to the segment `a → b`.
pub fn point_segment_distance(p: &Point, a: &Point, b: &Point) -> f64 {
    let t = project_param(p, a, b).clamp(0.0, 1.0);
    let closest = a + (b - a) * t;
    (p - closest).norm()
}

/// Distance from `p` to the infinite line through `a` and `b`.
pub fn point_line_distance(p: &Point, a: &Point, b: &Point) -> f64 {
    let d = b - a;
    let len = d.norm();
    if len < EPSILON {
        return (p - a).norm();
    }
    cross(&d, &(p - a)).abs() / len
}

/// Result of intersecting two segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentIntersection {
    None,
    /// Single intersection at `point`, with parameters `t` on the first
    /// segment and `u` on the second.
    Point { point: Point, t: f64, u: f64 },
    /// Collinear segments sharing more than one point.
    Collinear,
}

/// Intersects segment `a1 → a2` with `b1 → b2`. Touching counts.
pub fn segment_intersection(a1: &Point, a2: &Point, b1: &Point, b2: &Point) -> SegmentIntersection {
    let r = a2 - a1;
    let s = b2 - b1;
    let denom = cross(&r, &s);
    let qp = b1 - a1;
    let scale = (r.norm() * s.norm()).max(EPSILON);

    if denom.abs() <= EPSILON * scale {
        // Parallel: collinear only if b1 lies on a's line.
        if cross(&qp, &r).abs() > EPSILON * r.norm().max(EPSILON) * qp.norm().max(1.0) {
            return SegmentIntersection::None;
        }
        let rr = r.norm_squared();
        if rr < EPSILON * EPSILON {
            return SegmentIntersection::None;
        }
        let t0 = qp.dot(&r) / rr;
        let t1 = t0 + s.dot(&r) / rr;
        let (lo, hi) = (t0.min(t1), t0.max(t1));
        if hi < -EPSILON || lo > 1.0 + EPSILON {
            return SegmentIntersection::None;
        }
        if (hi.min(1.0) - lo.max(0.0)).abs() <= EPSILON {
            // Collinear, touching at a single point.
            let t = lo.max(0.0).min(1.0);
            let point = a1 + r * t;
            let u = project_param(&point, b1, b2);
            return SegmentIntersection::Point { point, t, u };
        }
        return SegmentIntersection::Collinear;
    }

    let t = cross(&qp, &s) / denom;
    let u = cross(&qp, &r) / denom;
    let tol = 1e-12;
    if t >= -tol && t <= 1.0 + tol && u >= -tol && u <= 1.0 + tol {
        SegmentIntersection::Point {
            point: a1 + r * t,
            t,
            u,
        }
    } else {
        SegmentIntersection::None
    }
}

/// Minimum distance between two segments (zero when they intersect).
pub fn segment_distance(a1: &Point, a2: &Point, b1: &Point, b2: &Point) -> f64 {
    if !matches!(segment_intersection(a1, a2, b1, b2), SegmentIntersection::None) {
        return 0.0;
    }
    point_segment_distance(a1, b1, b2)
        .min(point_segment_distance(a2, b1, b2))
        .min(point_segment_distance(b1, a1, a2))
        .min(point_segment_distance(b2, a1, a2))
}

// =============================================================================
// Angles and transforms
// =============================================================================

/// Rotates `p` about `pivot` by `radians` (counter-clockwise).
pub fn rotate_point(p: &Point, pivot: &Point, radians: f64) -> Point {
    let rotation = Rotation2::new(radians);
    pivot + rotation * (p - pivot)
}

/// Signed angle from `u` to `v` in radians, in `(-π, π]`.
pub fn signed_angle(u: &Vector, v: &Vector) -> f64 {
    cross(u, v).atan2(u.dot(v))
}

/// Unsigned angle between `u` and `v` in radians, in `[0, π]`.
pub fn unsigned_angle(u: &Vector, v: &Vector) -> f64 {
    signed_angle(u, v).abs()
}

/// Unit left-hand normal of `d`, or `None` for a zero vector.
pub fn left_normal(d: &Vector) -> Option<Vector> {
    let len = d.norm();
    if len < EPSILON {
        return None;
    }
    Some(Vector::new(-d.y / len, d.x / len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(size: f64) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(size, 0.0),
            Point::new(size, size),
            Point::new(0.0, size),
        ]
    }

    #[test]
    fn area_perimeter_centroid() {
        let sq = square(10.0);
        assert_relative_eq!(signed_area(&sq), 100.0);
        assert_relative_eq!(perimeter(&sq), 40.0);
        let c = centroid(&sq);
        assert_relative_eq!(c.x, 5.0);
        assert_relative_eq!(c.y, 5.0);

        let mut cw = sq.clone();
        cw.reverse();
        assert_relative_eq!(signed_area(&cw), -100.0);
        assert_relative_eq!(signed_area(&ensure_ccw(cw)), 100.0);
    }

    #[test]
    fn point_in_polygon_and_boundary() {
        let sq = square(10.0);
        assert!(point_in_polygon(&Point::new(5.0, 5.0), &sq));
        assert!(!point_in_polygon(&Point::new(15.0, 5.0), &sq));
        assert!(point_on_boundary(&Point::new(10.0, 5.0), &sq, 1e-6));
        assert!(point_inside_or_on(&Point::new(0.0, 0.0), &sq, 1e-6));
        assert!(!point_strictly_inside(&Point::new(0.0, 5.0), &sq, 1e-6));
    }

    #[test]
    fn segment_intersections() {
        let hit = segment_intersection(
            &Point::new(0.0, 0.0),
            &Point::new(10.0, 10.0),
            &Point::new(0.0, 10.0),
            &Point::new(10.0, 0.0),
        );
        match hit {
            SegmentIntersection::Point { point, t, u } => {
                assert_relative_eq!(point.x, 5.0);
                assert_relative_eq!(t, 0.5);
                assert_relative_eq!(u, 0.5);
            }
            other => panic!("expected a crossing, got {other:?}"),
        }

        let miss = segment_intersection(
            &Point::new(0.0, 0.0),
            &Point::new(1.0, 0.0),
            &Point::new(2.0, 1.0),
            &Point::new(3.0, 1.0),
        );
        assert_eq!(miss, SegmentIntersection::None);

        let overlap = segment_intersection(
            &Point::new(0.0, 0.0),
            &Point::new(10.0, 0.0),
            &Point::new(5.0, 0.0),
            &Point::new(15.0, 0.0),
        );
        assert_eq!(overlap, SegmentIntersection::Collinear);
    }

    #[test]
    fn distances() {
        let d = segment_distance(
            &Point::new(0.0, 0.0),
            &Point::new(10.0, 0.0),
            &Point::new(0.0, 3.0),
            &Point::new(10.0, 3.0),
        );
        assert_relative_eq!(d, 3.0);
        assert_relative_eq!(
            point_line_distance(&Point::new(50.0, 4.0), &Point::new(0.0, 0.0), &Point::new(1.0, 0.0)),
            4.0
        );
    }

    #[test]
    fn self_intersection_detects_bowtie() {
        let bowtie = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
        ];
        assert!(polygon_self_intersects(&bowtie));
        assert!(!polygon_self_intersects(&square(4.0)));
    }

    #[test]
    fn containment() {
        let outer = square(10.0);
        let inner = vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(5.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(polygon_contains_polygon(&outer, &inner, 1e-6));
        assert!(!polygon_contains_polygon(&inner, &outer, 1e-6));
    }

    #[test]
    fn rotation_and_angles() {
        let p = rotate_point(&Point::new(1.0, 0.0), &Point::origin(), std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
        let a = signed_angle(&Vector::new(1.0, 0.0), &Vector::new(0.0, 1.0));
        assert_relative_eq!(a, std::f64::consts::FRAC_PI_2);
        assert!(left_normal(&Vector::zeros()).is_none());
    }
}
