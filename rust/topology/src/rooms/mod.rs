// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Room detection.
//!
//! Detection runs in two stages:
//!
//! 1. **Faces.** Minimal enclosed polygons are traced from the walls with one
//!    of two strategies ([`DetectionStrategy`]), then cut along divider walls.
//! 2. **Resolution.** Faces are matched to the previous room set by canonical
//!    boundary signature so ids and user identity survive, rooms split by a
//!    divider are archived as parents of the pieces, archived rooms whose
//!    boundary reappears are restored, new rooms get fresh ids and default
//!    names, and the containment forest is rebuilt.
//!
//! Incremental detection re-traces only the walls reachable from a changed
//! set and splices the result into the untouched remainder. It produces the
//! same room set as a full pass.

mod cycles;
mod divider;
mod half_edge;
mod planarize;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineOptions;
use crate::geometry::{self, Bounds, Point};
use crate::graph::WallGraph;
use crate::keys::{RoomId, WallId};
use crate::spatial::SpatialIndex;
use crate::state::RoomNaming;
use crate::types::{Room, WallSegment, WallSide};

pub use divider::split_polygon_by_segment;

/// Relative area slack when checking that divider pieces cover their parent.
const SPLIT_AREA_SLACK: f64 = 0.02;

/// How faces are traced from walls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionStrategy {
    /// Half-edge tracing over the merged junction graph.
    HalfEdge,
    /// Polygonization of the full line arrangement, with a depth-bounded
    /// cycle search as fallback.
    #[default]
    CycleSearch,
}

impl std::str::FromStr for DetectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "half-edge" | "half_edge" | "halfedge" => Ok(Self::HalfEdge),
            "cycle-search" | "cycle_search" | "cycles" => Ok(Self::CycleSearch),
            other => Err(format!("unknown detection strategy: {other}")),
        }
    }
}

/// A traced face before identity resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub polygon: Vec<Point>,
    pub wall_ids: Vec<WallId>,
    pub signature: String,
    pub area: f64,
    /// Signature of the face this one was cut from by a divider.
    pub split_from: Option<String>,
}

/// Live rooms, archived rooms and the allocator state that produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomSet {
    pub rooms: BTreeMap<RoomId, Room>,
    pub archived: BTreeMap<RoomId, Room>,
    pub naming: RoomNaming,
}

/// Canonical form of a cyclic id sequence: consecutive duplicates removed,
/// then the smallest rotation over both directions.
pub fn canonical_cycle(ids: &[u32]) -> Vec<u32> {
    let mut seq: Vec<u32> = Vec::with_capacity(ids.len());
    for &id in ids {
        if seq.last() != Some(&id) {
            seq.push(id);
        }
    }
    while seq.len() > 1 && seq.first() == seq.last() {
        seq.pop();
    }
    let n = seq.len();
    if n == 0 {
        return seq;
    }
    let mut best: Option<Vec<u32>> = None;
    let mut reversed = seq.clone();
    reversed.reverse();
    for candidate in [&seq, &reversed] {
        for shift in 0..n {
            let rotated: Vec<u32> = candidate[shift..].iter().chain(&candidate[..shift]).copied().collect();
            if best.as_ref().map_or(true, |b| rotated < *b) {
                best = Some(rotated);
            }
        }
    }
    best.unwrap_or_default()
}

/// Rotation- and direction-invariant key of a boundary wall loop.
pub fn canonical_signature(wall_ids: &[WallId]) -> String {
    let raw: Vec<u32> = wall_ids.iter().map(|w| w.0).collect();
    canonical_cycle(&raw)
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join("-")
}

/// Face tracing plus identity resolution, configured from [`EngineOptions`].
#[derive(Debug, Clone)]
pub struct RoomDetector {
    pub strategy: DetectionStrategy,
    pub tolerance: f64,
    pub min_area: f64,
    pub max_cycle_depth: usize,
}

impl RoomDetector {
    pub fn new(options: &EngineOptions) -> Self {
        Self {
            strategy: options.detection_strategy,
            tolerance: options.node_tolerance,
            min_area: options.min_room_area,
            max_cycle_depth: options.max_cycle_depth,
        }
    }

    pub fn with_strategy(mut self, strategy: DetectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Traces faces for a set of walls, dividers applied.
    pub fn faces(&self, walls: &[&WallSegment]) -> Vec<Face> {
        let faces = match self.strategy {
            DetectionStrategy::HalfEdge => {
                let graph = WallGraph::build(walls.iter().copied(), self.tolerance);
                let planar = half_edge::PlanarGraph::from_wall_graph(&graph, walls.iter().copied());
                half_edge::trace_faces(&planar, self.min_area)
            }
            DetectionStrategy::CycleSearch => match planarize::polygonize(walls, self.tolerance) {
                Some(planar) => {
                    let faces = half_edge::trace_faces(&planar, self.min_area);
                    if faces.is_empty() && !planar.edges.is_empty() {
                        debug!("polygonization found no faces, falling back to cycle search");
                        self.cycle_faces(walls)
                    } else {
                        faces
                    }
                }
                None => {
                    warn!(walls = walls.len(), "degenerate wall arrangement, falling back to cycle search");
                    self.cycle_faces(walls)
                }
            },
        };
        let faces = divider::split_faces(faces, walls, self.tolerance, self.min_area);
        debug!(strategy = ?self.strategy, walls = walls.len(), faces = faces.len(), "traced faces");
        faces
    }

    fn cycle_faces(&self, walls: &[&WallSegment]) -> Vec<Face> {
        let graph = WallGraph::build(walls.iter().copied(), self.tolerance);
        let planar = half_edge::PlanarGraph::from_wall_graph(&graph, walls.iter().copied());
        cycles::minimal_cycles(&planar, self.max_cycle_depth, self.min_area, self.tolerance)
    }

    /// Full re-detection with `previous` as identity context.
    pub fn detect(&self, walls: &BTreeMap<WallId, WallSegment>, previous: &RoomSet) -> RoomSet {
        let all: Vec<&WallSegment> = walls.values().collect();
        let faces = self.faces(&all);
        self.resolve(faces, walls, previous)
    }

    /// Re-detects only the region touched by `changed` (ids of moved, added
    /// or removed walls) and keeps every previous room outside it.
    pub fn detect_incremental(
        &self,
        walls: &BTreeMap<WallId, WallSegment>,
        graph: &WallGraph,
        previous: &RoomSet,
        changed: &BTreeSet<WallId>,
    ) -> RoomSet {
        let affected = self.affected_walls(walls, graph, previous, changed);
        let subset: Vec<&WallSegment> = affected.iter().filter_map(|id| walls.get(id)).collect();
        let mut faces = self.faces(&subset);

        let mut kept = 0usize;
        for room in previous.rooms.values() {
            let untouched = room
                .wall_ids
                .iter()
                .all(|w| !affected.contains(w) && !changed.contains(w) && walls.contains_key(w));
            if untouched {
                kept += 1;
                faces.push(Face {
                    polygon: room.polygon.clone(),
                    wall_ids: room.wall_ids.clone(),
                    signature: signature_of(room),
                    area: room.area,
                    split_from: None,
                });
            }
        }
        debug!(
            changed = changed.len(),
            affected = affected.len(),
            kept_rooms = kept,
            "incremental room detection"
        );
        self.resolve(faces, walls, previous)
    }

    /// Changed walls grown to a fixpoint over shared nodes, spatially touching
    /// walls and previous rooms overlapping the region.
    fn affected_walls(
        &self,
        walls: &BTreeMap<WallId, WallSegment>,
        graph: &WallGraph,
        previous: &RoomSet,
        changed: &BTreeSet<WallId>,
    ) -> BTreeSet<WallId> {
        let index = SpatialIndex::new(
            walls
                .values()
                .map(|w| (Bounds::from_segment(&w.start, &w.end).inflate(self.tolerance), w.id)),
        );

        let mut seeds: BTreeSet<WallId> = changed.iter().copied().filter(|id| walls.contains_key(id)).collect();
        // Rooms bounded by removed walls must be re-derived too.
        for room in previous.rooms.values() {
            if room.wall_ids.iter().any(|w| changed.contains(w)) {
                seeds.extend(room.wall_ids.iter().copied().filter(|id| walls.contains_key(id)));
            }
        }

        let mut affected = graph.connected_walls(seeds);
        loop {
            let before = affected.len();

            let mut region = Bounds::empty();
            let mut touching = Vec::new();
            for id in &affected {
                let Some(w) = walls.get(id) else {
                    continue;
                };
                let b = Bounds::from_segment(&w.start, &w.end).inflate(self.tolerance);
                region = region.union(&b);
                index.visit(&b, |other| touching.push(other));
            }
            affected.extend(touching);

            if !region.is_empty() {
                for room in previous.rooms.values() {
                    if room.bounds().intersects(&region) {
                        affected.extend(room.wall_ids.iter().copied().filter(|id| walls.contains_key(id)));
                    }
                }
            }

            affected = graph.connected_walls(affected);
            if affected.len() == before {
                break;
            }
        }
        affected
    }

    /// Assigns identity, archival, nesting and names to traced faces.
    fn resolve(&self, mut faces: Vec<Face>, walls: &BTreeMap<WallId, WallSegment>, previous: &RoomSet) -> RoomSet {
        faces.sort_by(|a, b| a.signature.cmp(&b.signature));
        faces.dedup_by(|a, b| a.signature == b.signature);

        let mut naming = previous.naming.clone();
        let mut archived = previous.archived.clone();
        for id in previous.rooms.keys().chain(previous.archived.keys()) {
            naming.reserve(*id);
        }

        let previous_by_signature: BTreeMap<String, &Room> =
            previous.rooms.values().map(|r| (signature_of(r), r)).collect();

        let mut assigned: Vec<Option<Room>> = vec![None; faces.len()];
        // Archived parent each resolved room hangs under, if any.
        let mut archived_parent: BTreeMap<RoomId, RoomId> = BTreeMap::new();
        let mut matched_previous: BTreeSet<RoomId> = BTreeSet::new();

        // Same boundary as a live room: keep it.
        for (i, face) in faces.iter().enumerate() {
            if let Some(prev) = previous_by_signature.get(&face.signature) {
                let room = carry_identity(face, prev);
                if let Some(parent) = prev.parent_room_id.filter(|p| archived.contains_key(p)) {
                    archived_parent.insert(room.id, parent);
                }
                matched_previous.insert(prev.id);
                assigned[i] = Some(room);
            }
        }

        // Same boundary as an archived room: restore it.
        for (i, face) in faces.iter().enumerate() {
            if assigned[i].is_some() {
                continue;
            }
            let restored = archived
                .values()
                .find(|r| signature_of(r) == face.signature)
                .map(|r| r.id);
            if let Some(old) = restored.and_then(|id| archived.remove(&id)) {
                debug!(room = %old.id, "restored archived room");
                let room = carry_identity(face, &old);
                if let Some(parent) = old.parent_room_id.filter(|p| archived.contains_key(p)) {
                    archived_parent.insert(room.id, parent);
                }
                assigned[i] = Some(room);
            }
        }

        // Live rooms that vanished because a divider cut them: archive them
        // as parents of the pieces.
        let divider_ids: BTreeSet<WallId> = walls.values().filter(|w| w.is_divider).map(|w| w.id).collect();
        for prev in previous.rooms.values() {
            if matched_previous.contains(&prev.id) {
                continue;
            }
            let pieces: Vec<usize> = faces
                .iter()
                .enumerate()
                .filter(|(i, face)| {
                    assigned[*i].is_none()
                        && (face.split_from.is_some() || face.wall_ids.iter().any(|w| divider_ids.contains(w)))
                        && geometry::polygon_contains_polygon(&prev.polygon, &face.polygon, self.tolerance)
                })
                .map(|(i, _)| i)
                .collect();
            if pieces.len() < 2 {
                continue;
            }
            let covered: f64 = pieces.iter().map(|&i| faces[i].area).sum();
            if (covered - prev.area).abs() > prev.area * SPLIT_AREA_SLACK {
                continue;
            }
            let mut parent = prev.clone();
            parent.child_room_ids.clear();
            debug!(room = %prev.id, pieces = pieces.len(), "archived room split by divider");
            for i in pieces {
                let room = fresh_room(&faces[i], &mut naming);
                archived_parent.insert(room.id, parent.id);
                assigned[i] = Some(room);
            }
            archived.insert(parent.id, parent);
        }

        // Everything else is new.
        for (i, face) in faces.iter().enumerate() {
            if assigned[i].is_none() {
                assigned[i] = Some(fresh_room(face, &mut naming));
            }
        }

        let mut rooms: Vec<Room> = assigned.into_iter().flatten().collect();
        assign_nesting(&mut rooms, &archived, &archived_parent, self.tolerance);

        // Default names for rooms that have none yet, in id order.
        rooms.sort_by_key(|r| r.id);
        for room in &mut rooms {
            if room.identity.name.is_empty() {
                room.identity.name = if room.parent_room_id.is_some() {
                    naming.nested_name()
                } else {
                    naming.top_level_name()
                };
            }
        }

        let mut live: BTreeMap<RoomId, Room> = rooms.into_iter().map(|r| (r.id, r)).collect();
        link_children(&mut live, &mut archived);
        RoomSet {
            rooms: live,
            archived,
            naming,
        }
    }
}

/// Which side of `wall` faces the interior of `room`, if the wall bounds it.
pub fn interior_side(wall: &WallSegment, room: &Room, tolerance: f64) -> Option<WallSide> {
    let dir = wall.direction();
    let n = room.polygon.len();
    let ccw = geometry::signed_area(&room.polygon) >= 0.0;
    let mut best: Option<(f64, WallSide)> = None;
    for i in 0..n {
        let p = &room.polygon[i];
        let q = &room.polygon[(i + 1) % n];
        let err = geometry::point_segment_distance(p, &wall.start, &wall.end)
            .max(geometry::point_segment_distance(q, &wall.start, &wall.end));
        if err > tolerance * 2.0 || (q - p).norm() < geometry::EPSILON {
            continue;
        }
        let along = (q - p).dot(&dir) > 0.0;
        // Interior is left of every edge of a counter-clockwise ring.
        let side = if along == ccw { WallSide::Left } else { WallSide::Right };
        if best.map_or(true, |(e, _)| err < e) {
            best = Some((err, side));
        }
    }
    best.map(|(_, side)| side)
}

fn signature_of(room: &Room) -> String {
    if room.signature.is_empty() {
        canonical_signature(&room.wall_ids)
    } else {
        room.signature.clone()
    }
}

fn carry_identity(face: &Face, prev: &Room) -> Room {
    let mut room = Room::from_polygon(prev.id, face.polygon.clone(), face.wall_ids.clone());
    room.identity = prev.identity.clone();
    room
}

fn fresh_room(face: &Face, naming: &mut RoomNaming) -> Room {
    Room::from_polygon(naming.allocate_id(), face.polygon.clone(), face.wall_ids.clone())
}

/// Parent = smallest strictly larger live room containing the polygon, else
/// the archived parent the room was split from.
fn assign_nesting(
    rooms: &mut [Room],
    archived: &BTreeMap<RoomId, Room>,
    archived_parent: &BTreeMap<RoomId, RoomId>,
    tolerance: f64,
) {
    rooms.sort_by(|a, b| b.area.total_cmp(&a.area).then(a.id.cmp(&b.id)));
    for i in 0..rooms.len() {
        let mut parent: Option<(RoomId, u32)> = None;
        for j in (0..i).rev() {
            let outer = &rooms[j];
            if outer.area <= rooms[i].area + geometry::EPSILON {
                continue;
            }
            if geometry::polygon_contains_polygon(&outer.polygon, &rooms[i].polygon, tolerance) {
                parent = Some((outer.id, outer.depth));
                break;
            }
        }
        if parent.is_none() {
            parent = archived_parent
                .get(&rooms[i].id)
                .and_then(|p| archived.get(p))
                .map(|p| (p.id, p.depth));
        }
        let room = &mut rooms[i];
        match parent {
            Some((id, depth)) => {
                room.parent_room_id = Some(id);
                room.depth = depth + 1;
            }
            None => {
                room.parent_room_id = None;
                room.depth = 0;
            }
        }
    }
}

fn link_children(live: &mut BTreeMap<RoomId, Room>, archived: &mut BTreeMap<RoomId, Room>) {
    let mut children: BTreeMap<RoomId, Vec<RoomId>> = BTreeMap::new();
    for room in live.values().chain(archived.values()) {
        if let Some(parent) = room.parent_room_id {
            children.entry(parent).or_default().push(room.id);
        }
    }
    for room in live.values_mut().chain(archived.values_mut()) {
        let mut ids = children.remove(&room.id).unwrap_or_default();
        ids.sort();
        room.child_room_ids = ids;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wall(id: u32, x0: f64, y0: f64, x1: f64, y1: f64) -> WallSegment {
        WallSegment::new(WallId(id), Point::new(x0, y0), Point::new(x1, y1), 100.0)
    }

    fn rectangle() -> BTreeMap<WallId, WallSegment> {
        [
            wall(1, 0.0, 0.0, 4000.0, 0.0),
            wall(2, 4000.0, 0.0, 4000.0, 3000.0),
            wall(3, 4000.0, 3000.0, 0.0, 3000.0),
            wall(4, 0.0, 3000.0, 0.0, 0.0),
        ]
        .into_iter()
        .map(|w| (w.id, w))
        .collect()
    }

    fn detector(strategy: DetectionStrategy) -> RoomDetector {
        RoomDetector::new(&EngineOptions::default()).with_strategy(strategy)
    }

    #[test]
    fn signature_is_rotation_and_direction_invariant() {
        let a = canonical_signature(&[WallId(3), WallId(1), WallId(2)]);
        let b = canonical_signature(&[WallId(2), WallId(1), WallId(3)]);
        let c = canonical_signature(&[WallId(1), WallId(2), WallId(3), WallId(3)]);
        assert_eq!(a, "1-2-3");
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(canonical_cycle(&[10, 9, 2]), vec![2, 9, 10]);
    }

    #[test]
    fn both_strategies_find_the_rectangle() {
        let walls = rectangle();
        for strategy in [DetectionStrategy::HalfEdge, DetectionStrategy::CycleSearch] {
            let set = detector(strategy).detect(&walls, &RoomSet::default());
            assert_eq!(set.rooms.len(), 1, "{strategy:?}");
            let room = set.rooms.values().next().unwrap();
            assert_relative_eq!(room.area, 12_000_000.0);
            assert_eq!(room.depth, 0);
            assert_eq!(room.identity.name, "Room 1");
        }
    }

    #[test]
    fn redetection_keeps_identity() {
        let walls = rectangle();
        let d = detector(DetectionStrategy::CycleSearch);
        let mut first = d.detect(&walls, &RoomSet::default());
        let id = *first.rooms.keys().next().unwrap();
        first.rooms.get_mut(&id).unwrap().identity.color = Some("#ffcc00".into());
        let second = d.detect(&walls, &first);
        assert_eq!(second.rooms.len(), 1);
        let room = &second.rooms[&id];
        assert_eq!(room.identity.color.as_deref(), Some("#ffcc00"));
        assert_eq!(second.naming, first.naming);
    }

    #[test]
    fn divider_archives_parent() {
        let mut walls = rectangle();
        let d = detector(DetectionStrategy::HalfEdge);
        let before = d.detect(&walls, &RoomSet::default());
        let parent_id = *before.rooms.keys().next().unwrap();

        let mut divider = wall(5, 2000.0, 0.0, 2000.0, 3000.0);
        divider.is_divider = true;
        walls.insert(divider.id, divider);
        let after = d.detect(&walls, &before);

        assert_eq!(after.rooms.len(), 2);
        assert!(after.archived.contains_key(&parent_id));
        let total: f64 = after.rooms.values().map(|r| r.area).sum();
        assert_relative_eq!(total, 12_000_000.0, max_relative = 1e-6);
        for child in after.rooms.values() {
            assert_eq!(child.parent_room_id, Some(parent_id));
            assert_eq!(child.depth, 1);
            assert!(child.identity.name.starts_with("Sub-room"));
        }
        assert_eq!(after.archived[&parent_id].child_room_ids.len(), 2);

        walls.remove(&WallId(5));
        let restored = d.detect(&walls, &after);
        assert_eq!(restored.rooms.len(), 1);
        assert!(restored.rooms.contains_key(&parent_id));
        assert!(restored.archived.is_empty());
        assert_eq!(restored.rooms[&parent_id].identity.name, "Room 1");
    }

    #[test]
    fn interior_side_follows_orientation() {
        let walls = rectangle();
        let set = detector(DetectionStrategy::CycleSearch).detect(&walls, &RoomSet::default());
        let room = set.rooms.values().next().unwrap();
        // Walls run counter-clockwise, so the room is on their left.
        for w in walls.values() {
            assert_eq!(interior_side(w, room, 5.0), Some(WallSide::Left));
        }
        let mut flipped = walls[&WallId(1)].clone();
        std::mem::swap(&mut flipped.start, &mut flipped.end);
        assert_eq!(interior_side(&flipped, room, 5.0), Some(WallSide::Right));
    }
}
