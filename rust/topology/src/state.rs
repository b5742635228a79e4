// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The authoritative editor snapshot.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::keys::{RoomId, WallId};
use crate::types::{Room, WallSegment};

/// Derived aspects that are out of date with respect to the walls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtyFlags {
    pub geometry: bool,
    pub topology: bool,
    pub rooms: bool,
    pub spatial_index: bool,
    pub selection: bool,
}

impl DirtyFlags {
    /// Everything derived from wall geometry is stale.
    pub fn all_derived() -> Self {
        Self {
            geometry: true,
            topology: true,
            rooms: true,
            spatial_index: true,
            selection: false,
        }
    }

    pub fn any(&self) -> bool {
        self.geometry || self.topology || self.rooms || self.spatial_index || self.selection
    }

    /// Flags set in either.
    pub fn merge(self, other: DirtyFlags) -> Self {
        Self {
            geometry: self.geometry || other.geometry,
            topology: self.topology || other.topology,
            rooms: self.rooms || other.rooms,
            spatial_index: self.spatial_index || other.spatial_index,
            selection: self.selection || other.selection,
        }
    }
}

/// Room id allocator and the default-name counters.
///
/// Top-level rooms are named `Room N` and nested rooms `Sub-room N`, each
/// with its own counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomNaming {
    pub next_room_id: u32,
    pub next_top_level: u32,
    pub next_nested: u32,
}

impl Default for RoomNaming {
    fn default() -> Self {
        Self {
            next_room_id: 1,
            next_top_level: 1,
            next_nested: 1,
        }
    }
}

impl RoomNaming {
    pub fn allocate_id(&mut self) -> RoomId {
        let id = RoomId(self.next_room_id);
        self.next_room_id += 1;
        id
    }

    /// Makes sure `id` is never handed out again.
    pub fn reserve(&mut self, id: RoomId) {
        self.next_room_id = self.next_room_id.max(id.0.saturating_add(1));
    }

    pub fn top_level_name(&mut self) -> String {
        let name = format!("Room {}", self.next_top_level);
        self.next_top_level += 1;
        name
    }

    pub fn nested_name(&mut self) -> String {
        let name = format!("Sub-room {}", self.next_nested);
        self.next_nested += 1;
        name
    }
}

/// One immutable revision of the editor.
///
/// Every successful edit produces a new snapshot; undo and redo swap whole
/// snapshots. Archived rooms and the naming counters live here so that
/// restoring a snapshot restores them too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorState {
    pub walls: BTreeMap<WallId, WallSegment>,
    pub rooms: BTreeMap<RoomId, Room>,
    #[serde(default)]
    pub archived_rooms: BTreeMap<RoomId, Room>,
    #[serde(default)]
    pub selected_wall_ids: BTreeSet<WallId>,
    #[serde(default)]
    pub dirty: DirtyFlags,
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub naming: RoomNaming,
}

impl EditorState {
    pub fn wall(&self, id: WallId) -> Option<&WallSegment> {
        self.walls.get(&id)
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    /// Selected walls that still exist, in id order.
    pub fn selected_walls(&self) -> impl Iterator<Item = &WallSegment> {
        self.selected_wall_ids.iter().filter_map(|id| self.walls.get(id))
    }

    /// Drops selected ids that no longer name a wall. Returns true if any were removed.
    pub fn prune_selection(&mut self) -> bool {
        let before = self.selected_wall_ids.len();
        let walls = &self.walls;
        self.selected_wall_ids.retain(|id| walls.contains_key(id));
        before != self.selected_wall_ids.len()
    }
}
