// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Consistency diagnostics for an editor snapshot.
//!
//! Checks are read-only: problems are reported, never repaired. Derived
//! aspects flagged dirty in the snapshot are skipped, since they are known
//! to be stale.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::EngineOptions;
use crate::geometry;
use crate::graph::WallGraph;
use crate::keys::{RoomId, WallId};
use crate::state::EditorState;

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "issue", rename_all = "kebab-case")]
pub enum ConsistencyIssue {
    #[error("{wall} lists {other} as connected but not the other way round")]
    AsymmetricAdjacency { wall: WallId, other: WallId },

    #[error("{wall} lists unknown wall {other} as connected")]
    UnknownAdjacentWall { wall: WallId, other: WallId },

    #[error("{wall} connections are out of date with the junction graph")]
    StaleAdjacency { wall: WallId },

    #[error("{wall} is {length:.3} long")]
    DegenerateWall { wall: WallId, length: f64 },

    #[error("{wall} has thickness {thickness}")]
    InvalidThickness { wall: WallId, thickness: f64 },

    #[error("{room} is bounded by missing {wall}")]
    RoomMissingWall { room: RoomId, wall: WallId },

    #[error("{room} has area {area:.1}, below the minimum")]
    RoomBelowMinArea { room: RoomId, area: f64 },

    #[error("{room} polygon intersects itself")]
    SelfIntersectingRoom { room: RoomId },

    #[error("{room} has unknown parent {parent}")]
    MissingParentRoom { room: RoomId, parent: RoomId },

    #[error("{room} is not contained in its parent {parent}")]
    ChildNotContained { room: RoomId, parent: RoomId },

    #[error("{room} has depth {actual}, expected {expected}")]
    DepthMismatch { room: RoomId, expected: u32, actual: u32 },

    #[error("{parent} and {child} disagree about their parent/child link")]
    ChildListMismatch { parent: RoomId, child: RoomId },

    #[error("rooms {rooms:?} share boundary signature {signature}")]
    DuplicateRoomSignature { signature: String, rooms: Vec<RoomId> },

    #[error("selection contains missing {wall}")]
    InvalidSelection { wall: WallId },
}

/// Runs every check against `state`.
pub fn validate_consistency(state: &EditorState, options: &EngineOptions) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();
    check_walls(state, options, &mut issues);
    if !state.dirty.topology {
        check_adjacency(state, options, &mut issues);
    }
    if !state.dirty.rooms {
        check_rooms(state, options, &mut issues);
    }
    for wall in &state.selected_wall_ids {
        if !state.walls.contains_key(wall) {
            issues.push(ConsistencyIssue::InvalidSelection { wall: *wall });
        }
    }
    issues
}

fn check_walls(state: &EditorState, options: &EngineOptions, issues: &mut Vec<ConsistencyIssue>) {
    for wall in state.walls.values() {
        let length = wall.length();
        if !length.is_finite() || length < options.min_wall_length {
            issues.push(ConsistencyIssue::DegenerateWall { wall: wall.id, length });
        }
        if !(options.min_thickness..=options.max_thickness).contains(&wall.thickness) {
            issues.push(ConsistencyIssue::InvalidThickness {
                wall: wall.id,
                thickness: wall.thickness,
            });
        }
    }
}

fn check_adjacency(state: &EditorState, options: &EngineOptions, issues: &mut Vec<ConsistencyIssue>) {
    let graph = WallGraph::build(state.walls.values(), options.node_tolerance);
    for wall in state.walls.values() {
        for other in &wall.connected_wall_ids {
            match state.walls.get(other) {
                None => issues.push(ConsistencyIssue::UnknownAdjacentWall {
                    wall: wall.id,
                    other: *other,
                }),
                Some(o) if !o.connected_wall_ids.contains(&wall.id) => {
                    issues.push(ConsistencyIssue::AsymmetricAdjacency {
                        wall: wall.id,
                        other: *other,
                    })
                }
                Some(_) => {}
            }
        }
        let stored: BTreeSet<WallId> = wall.connected_wall_ids.iter().copied().collect();
        let derived: BTreeSet<WallId> = graph.neighbors(wall.id).collect();
        if stored != derived {
            issues.push(ConsistencyIssue::StaleAdjacency { wall: wall.id });
        }
    }
}

fn check_rooms(state: &EditorState, options: &EngineOptions, issues: &mut Vec<ConsistencyIssue>) {
    let tolerance = options.node_tolerance;
    let parent_of = |id: RoomId| state.rooms.get(&id).or_else(|| state.archived_rooms.get(&id));
    let mut by_signature: BTreeMap<&str, Vec<RoomId>> = BTreeMap::new();

    for room in state.rooms.values() {
        for wall in &room.wall_ids {
            if !state.walls.contains_key(wall) {
                issues.push(ConsistencyIssue::RoomMissingWall { room: room.id, wall: *wall });
            }
        }
        if room.area <= options.min_room_area {
            issues.push(ConsistencyIssue::RoomBelowMinArea {
                room: room.id,
                area: room.area,
            });
        }
        if geometry::polygon_self_intersects(&room.polygon) {
            issues.push(ConsistencyIssue::SelfIntersectingRoom { room: room.id });
        }
        by_signature.entry(room.signature.as_str()).or_default().push(room.id);

        match room.parent_room_id {
            None if room.depth != 0 => issues.push(ConsistencyIssue::DepthMismatch {
                room: room.id,
                expected: 0,
                actual: room.depth,
            }),
            None => {}
            Some(parent_id) => match parent_of(parent_id) {
                None => issues.push(ConsistencyIssue::MissingParentRoom {
                    room: room.id,
                    parent: parent_id,
                }),
                Some(parent) => {
                    if !geometry::polygon_contains_polygon(&parent.polygon, &room.polygon, tolerance) {
                        issues.push(ConsistencyIssue::ChildNotContained {
                            room: room.id,
                            parent: parent_id,
                        });
                    }
                    if room.depth != parent.depth + 1 {
                        issues.push(ConsistencyIssue::DepthMismatch {
                            room: room.id,
                            expected: parent.depth + 1,
                            actual: room.depth,
                        });
                    }
                    if !parent.child_room_ids.contains(&room.id) {
                        issues.push(ConsistencyIssue::ChildListMismatch {
                            parent: parent_id,
                            child: room.id,
                        });
                    }
                }
            },
        }
    }

    // Child lists must point back.
    for parent in state.rooms.values().chain(state.archived_rooms.values()) {
        for child in &parent.child_room_ids {
            let points_back = state
                .rooms
                .get(child)
                .or_else(|| state.archived_rooms.get(child))
                .is_some_and(|c| c.parent_room_id == Some(parent.id));
            if !points_back {
                issues.push(ConsistencyIssue::ChildListMismatch {
                    parent: parent.id,
                    child: *child,
                });
            }
        }
    }

    for (signature, rooms) in by_signature {
        if rooms.len() > 1 {
            issues.push(ConsistencyIssue::DuplicateRoomSignature {
                signature: signature.to_string(),
                rooms,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EditOptions, Engine, EngineInit};
    use crate::geometry::Point;
    use crate::types::WallSegment;

    fn wall(id: u32, x0: f64, y0: f64, x1: f64, y1: f64) -> WallSegment {
        WallSegment::new(WallId(id), Point::new(x0, y0), Point::new(x1, y1), 100.0)
    }

    fn engine() -> Engine {
        Engine::new(EngineInit {
            walls: vec![
                wall(1, 0.0, 0.0, 4000.0, 0.0),
                wall(2, 4000.0, 0.0, 4000.0, 3000.0),
                wall(3, 4000.0, 3000.0, 0.0, 3000.0),
                wall(4, 0.0, 3000.0, 0.0, 0.0),
            ],
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn engine_states_are_consistent() {
        let mut e = engine();
        assert!(e.validate_consistency().is_empty());
        let r = e.add_wall(wall(5, 2000.0, 0.0, 2000.0, 3000.0), &EditOptions::default());
        assert!(r.ok());
        assert_eq!(e.validate_consistency(), Vec::new());
    }

    #[test]
    fn tampered_states_are_reported() {
        let e = engine();
        let mut state = e.state().clone();
        let options = e.options().clone();

        state.walls.get_mut(&WallId(1)).unwrap().connected_wall_ids.push(WallId(3));
        state.walls.get_mut(&WallId(2)).unwrap().connected_wall_ids.push(WallId(77));
        state.selected_wall_ids.insert(WallId(99));
        let room = state.rooms.values_mut().next().unwrap();
        room.depth = 2;
        room.parent_room_id = Some(RoomId(500));

        let issues = validate_consistency(&state, &options);
        assert!(issues.contains(&ConsistencyIssue::AsymmetricAdjacency {
            wall: WallId(1),
            other: WallId(3)
        }));
        assert!(issues.contains(&ConsistencyIssue::UnknownAdjacentWall {
            wall: WallId(2),
            other: WallId(77)
        }));
        assert!(issues.contains(&ConsistencyIssue::StaleAdjacency { wall: WallId(1) }));
        assert!(issues.contains(&ConsistencyIssue::InvalidSelection { wall: WallId(99) }));
        assert!(issues
            .iter()
            .any(|i| matches!(i, ConsistencyIssue::MissingParentRoom { parent, .. } if *parent == RoomId(500))));
    }

    #[test]
    fn dirty_aspects_are_skipped() {
        let e = engine();
        let mut state = e.state().clone();
        state.walls.get_mut(&WallId(1)).unwrap().connected_wall_ids.clear();
        state.dirty.topology = true;
        assert!(validate_consistency(&state, e.options()).is_empty());
    }
}
