// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall-versus-wall conflict detection.
//!
//! Candidates come from the spatial index; each pair is classified in order:
//! shared endpoint (never a conflict), collinear overlap, T-contact (a
//! junction, not a conflict), crossing, then clearance.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::geometry::{self, SegmentIntersection};
use crate::keys::WallId;
use crate::spatial::SpatialIndex;
use crate::types::WallSegment;

/// Why two walls conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionReason {
    /// Collinear walls sharing more than `tolerance` of length.
    Overlap,
    /// Centerlines cross.
    Intersect,
    /// Faces closer than the clearance threshold.
    Clearance,
}

/// A conflicting wall pair, `wall_a < wall_b`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collision {
    pub wall_a: WallId,
    pub wall_b: WallId,
    pub reason: CollisionReason,
    /// Face-to-face gap for clearance conflicts, zero otherwise.
    pub distance: f64,
}

/// Pairwise classifier plus index-driven search.
#[derive(Debug, Clone, Copy)]
pub struct CollisionDetector {
    pub tolerance: f64,
    /// Minimum face-to-face gap; `0` disables clearance checks.
    pub clearance: f64,
}

impl CollisionDetector {
    pub fn new(tolerance: f64, clearance: f64) -> Self {
        Self {
            tolerance,
            clearance: clearance.max(0.0),
        }
    }

    /// Classifies one pair. `None` means no conflict.
    pub fn classify(&self, a: &WallSegment, b: &WallSegment) -> Option<Collision> {
        if a.id == b.id {
            return None;
        }
        let tol = self.tolerance;
        let (wall_a, wall_b) = if a.id < b.id { (a.id, b.id) } else { (b.id, a.id) };
        let hit = |reason, distance| {
            Some(Collision {
                wall_a,
                wall_b,
                reason,
                distance,
            })
        };

        let shares_endpoint = [a.start, a.end]
            .iter()
            .any(|p| (p - b.start).norm() <= tol || (p - b.end).norm() <= tol);
        if shares_endpoint {
            return None;
        }

        if self.collinear_overlap(a, b) > tol {
            return hit(CollisionReason::Overlap, 0.0);
        }

        let rests_on = |w: &WallSegment, other: &WallSegment| {
            [w.start, w.end]
                .iter()
                .any(|p| geometry::point_segment_distance(p, &other.start, &other.end) <= tol)
        };
        if rests_on(a, b) || rests_on(b, a) {
            return None;
        }

        if let SegmentIntersection::Point { .. } = geometry::segment_intersection(&a.start, &a.end, &b.start, &b.end) {
            return hit(CollisionReason::Intersect, 0.0);
        }

        if self.clearance > 0.0 {
            let centerline = geometry::segment_distance(&a.start, &a.end, &b.start, &b.end);
            let gap = (centerline - (a.thickness + b.thickness) * 0.5).max(0.0);
            if gap < self.clearance {
                return hit(CollisionReason::Clearance, gap);
            }
        }
        None
    }

    /// Length shared by two nearly collinear walls, zero if they are not.
    fn collinear_overlap(&self, a: &WallSegment, b: &WallSegment) -> f64 {
        let da = a.direction();
        let len_a = da.norm();
        if len_a < geometry::EPSILON || b.length() < geometry::EPSILON {
            return 0.0;
        }
        if geometry::point_line_distance(&b.start, &a.start, &a.end) > self.tolerance
            || geometry::point_line_distance(&b.end, &a.start, &a.end) > self.tolerance
        {
            return 0.0;
        }
        let t0 = geometry::project_param(&b.start, &a.start, &a.end);
        let t1 = geometry::project_param(&b.end, &a.start, &a.end);
        let lo = t0.min(t1).max(0.0);
        let hi = t0.max(t1).min(1.0);
        ((hi - lo) * len_a).max(0.0)
    }

    /// Conflicts between `changed` walls and everything else, each unordered
    /// pair once, sorted by pair.
    pub fn detect(
        &self,
        walls: &BTreeMap<WallId, WallSegment>,
        index: &SpatialIndex<WallId>,
        changed: &BTreeSet<WallId>,
    ) -> Vec<Collision> {
        let reach = self.clearance + self.tolerance;
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for id in changed {
            let Some(wall) = walls.get(id) else {
                continue;
            };
            for other_id in index.search(&wall.bounds().inflate(reach)) {
                if other_id == *id {
                    continue;
                }
                let Some(other) = walls.get(&other_id) else {
                    continue;
                };
                if let Some(c) = self.classify(wall, other) {
                    if seen.insert((c.wall_a, c.wall_b)) {
                        out.push(c);
                    }
                }
            }
        }
        out.sort_by_key(|c| (c.wall_a, c.wall_b));
        out
    }

    /// Conflicts among all walls.
    pub fn detect_all(&self, walls: &BTreeMap<WallId, WallSegment>) -> Vec<Collision> {
        let index = SpatialIndex::new(walls.values().map(|w| (w.bounds(), w.id)));
        let ids: BTreeSet<WallId> = walls.keys().copied().collect();
        self.detect(walls, &index, &ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn wall(id: u32, x0: f64, y0: f64, x1: f64, y1: f64) -> WallSegment {
        WallSegment::new(WallId(id), Point::new(x0, y0), Point::new(x1, y1), 100.0)
    }

    fn detector() -> CollisionDetector {
        CollisionDetector::new(5.0, 0.0)
    }

    #[test]
    fn corner_and_t_contact_are_not_conflicts() {
        let d = detector();
        let a = wall(1, 0.0, 0.0, 1000.0, 0.0);
        assert!(d.classify(&a, &wall(2, 1000.0, 0.0, 1000.0, 800.0)).is_none());
        assert!(d.classify(&a, &wall(3, 500.0, 0.0, 500.0, 800.0)).is_none());
        assert!(d.classify(&a, &wall(4, 500.0, 3.0, 500.0, 800.0)).is_none());
    }

    #[test]
    fn crossing_and_overlap() {
        let d = detector();
        let a = wall(2, 0.0, 0.0, 1000.0, 0.0);
        let cross = d.classify(&a, &wall(1, 500.0, -400.0, 500.0, 400.0)).unwrap();
        assert_eq!(cross.reason, CollisionReason::Intersect);
        assert_eq!((cross.wall_a, cross.wall_b), (WallId(1), WallId(2)));

        let overlap = d.classify(&a, &wall(3, 600.0, 0.0, 1600.0, 0.0)).unwrap();
        assert_eq!(overlap.reason, CollisionReason::Overlap);
    }

    #[test]
    fn clearance_only_when_enabled() {
        let a = wall(1, 0.0, 0.0, 1000.0, 0.0);
        let b = wall(2, 0.0, 150.0, 1000.0, 150.0);
        assert!(detector().classify(&a, &b).is_none());
        let strict = CollisionDetector::new(5.0, 100.0);
        let c = strict.classify(&a, &b).unwrap();
        assert_eq!(c.reason, CollisionReason::Clearance);
        assert!((c.distance - 50.0).abs() < 1e-9);
    }

    #[test]
    fn each_pair_reported_once() {
        let walls: BTreeMap<WallId, WallSegment> = [
            wall(1, 0.0, 0.0, 1000.0, 0.0),
            wall(2, 500.0, -400.0, 500.0, 400.0),
            wall(3, 0.0, 2000.0, 100.0, 2000.0),
        ]
        .into_iter()
        .map(|w| (w.id, w))
        .collect();
        let found = detector().detect_all(&walls);
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].wall_a, found[0].wall_b), (WallId(1), WallId(2)));
    }
}
