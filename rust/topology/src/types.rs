// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall and room records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{self, Bounds, Point, Vector};
use crate::keys::{Endpoint, RoomId, WallId};

/// Which side of a wall (relative to its start → end direction) faces a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WallSide {
    Left,
    Right,
}

/// A straight wall with thickness, defined by its centerline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallSegment {
    pub id: WallId,
    pub start: Point,
    pub end: Point,
    pub thickness: f64,
    /// Walls sharing a junction node. Recomputed on every graph rebuild.
    #[serde(default)]
    pub connected_wall_ids: Vec<WallId>,
    /// Side facing the smallest adjacent room, if any.
    #[serde(default)]
    pub interior_side: Option<WallSide>,
    /// Set when the wall was inserted across an existing room.
    #[serde(default)]
    pub is_divider: bool,
}

impl WallSegment {
    pub fn new(id: WallId, start: Point, end: Point, thickness: f64) -> Self {
        Self {
            id,
            start,
            end,
            thickness,
            connected_wall_ids: Vec::new(),
            interior_side: None,
            is_divider: false,
        }
    }

    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Un-normalized start → end vector.
    pub fn direction(&self) -> Vector {
        self.end - self.start
    }

    /// Unit left normal, `None` for a zero-length wall.
    pub fn normal(&self) -> Option<Vector> {
        geometry::left_normal(&self.direction())
    }

    pub fn midpoint(&self) -> Point {
        Point::from((self.start.coords + self.end.coords) * 0.5)
    }

    /// Centerline bounds inflated by half the thickness.
    pub fn bounds(&self) -> Bounds {
        Bounds::from_segment(&self.start, &self.end).inflate(self.thickness * 0.5)
    }

    pub fn endpoint(&self, which: Endpoint) -> Point {
        match which {
            Endpoint::Start => self.start,
            Endpoint::End => self.end,
        }
    }

    pub fn set_endpoint(&mut self, which: Endpoint, p: Point) {
        match which {
            Endpoint::Start => self.start = p,
            Endpoint::End => self.end = p,
        }
    }

}

/// User-facing identity that survives re-detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomIdentity {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    /// Free-form user edits (labels, finishes, ...).
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

/// An enclosed region bounded by walls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    /// Counter-clockwise ring; the first vertex is not repeated.
    pub polygon: Vec<Point>,
    /// Boundary walls in loop order.
    pub wall_ids: Vec<WallId>,
    pub area: f64,
    pub perimeter: f64,
    pub centroid: Point,
    #[serde(default)]
    pub parent_room_id: Option<RoomId>,
    #[serde(default)]
    pub child_room_ids: Vec<RoomId>,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub identity: RoomIdentity,
    /// Canonical boundary key, see [`crate::rooms::canonical_signature`].
    #[serde(default)]
    pub signature: String,
}

impl Room {
    /// Builds a room, deriving area, perimeter, centroid and signature.
    pub fn from_polygon(id: RoomId, polygon: Vec<Point>, wall_ids: Vec<WallId>) -> Self {
        let polygon = geometry::ensure_ccw(polygon);
        let signature = crate::rooms::canonical_signature(&wall_ids);
        Self {
            id,
            area: geometry::polygon_area(&polygon),
            perimeter: geometry::perimeter(&polygon),
            centroid: geometry::centroid(&polygon),
            polygon,
            wall_ids,
            parent_room_id: None,
            child_room_ids: Vec::new(),
            depth: 0,
            identity: RoomIdentity::default(),
            signature,
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(&self.polygon)
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn wall_helpers() {
        let w = WallSegment::new(WallId(1), Point::new(0.0, 0.0), Point::new(10.0, 0.0), 2.0);
        assert_relative_eq!(w.length(), 10.0);
        let n = w.normal().unwrap();
        assert_relative_eq!(n.y, 1.0);
        let b = w.bounds();
        assert_relative_eq!(b.min_y, -1.0);
        assert_relative_eq!(b.max_x, 11.0);
        assert_eq!(w.endpoint(Endpoint::End), Point::new(10.0, 0.0));
    }

    #[test]
    fn room_from_clockwise_polygon_is_normalized() {
        let poly = vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 0.0),
        ];
        let room = Room::from_polygon(RoomId(1), poly, vec![WallId(3), WallId(1), WallId(2)]);
        assert!(geometry::signed_area(&room.polygon) > 0.0);
        assert_relative_eq!(room.area, 100.0);
        assert_relative_eq!(room.perimeter, 40.0);
        assert_eq!(room.signature, "1-2-3");
    }
}
