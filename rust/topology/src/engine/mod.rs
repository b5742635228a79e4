// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The mutation engine.
//!
//! Every structural edit runs through one pipeline:
//!
//! 1. build a draft of the wall map with the edit applied,
//! 2. reject drafts with no geometric change or out-of-range walls,
//! 3. check the changed walls for collisions,
//! 4. refresh adjacency, rooms and the spatial index (or mark them dirty),
//! 5. install the new snapshot, record it for undo and notify listeners.
//!
//! A rejected edit leaves the current snapshot untouched.

mod edits;
mod gesture;
mod selection;

use std::collections::{BTreeMap, BTreeSet};
use std::mem;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collision::{Collision, CollisionDetector};
use crate::config::EngineOptions;
use crate::error::{EditError, Result};
use crate::events::{EngineEvent, EventBus, EventKind, SubscriptionId};
use crate::graph::WallGraph;
use crate::history::{Command, CommandHistory};
use crate::keys::WallId;
use crate::rooms::{self, RoomDetector, RoomSet};
use crate::spatial::SpatialIndex;
use crate::state::{DirtyFlags, EditorState};
use crate::types::{Room, WallSegment};
use crate::validate::{self, ConsistencyIssue};

pub use edits::{ChainOptions, CornerOptions, ParallelOptions, ResizeAnchor, ResizeOptions, RotateOptions, RotatePivot, ThicknessMode, TransformOptions};
pub use gesture::Gesture;
pub use selection::{ChainSelectOptions, HitMode, SelectOptions, SelectionMode};

/// Initial contents of an engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineInit {
    pub walls: Vec<WallSegment>,
    /// Known rooms whose identity (ids, names, colors) should be kept when
    /// their boundary is found again.
    pub rooms: Option<Vec<Room>>,
    pub selected_wall_ids: BTreeSet<WallId>,
    pub options: EngineOptions,
}

/// What happens to an edit that produces collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Abort the edit.
    #[default]
    Reject,
    /// Commit anyway and report.
    Allow,
}

/// Options shared by every edit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditOptions {
    /// Move endpoints of walls sharing a moved junction along with it.
    pub propagate_to_adjacent: bool,
    pub collision_policy: CollisionPolicy,
    /// Overrides [`EngineOptions::default_clearance`] for this edit.
    pub min_clearance: Option<f64>,
    /// Leave rooms, adjacency and the index stale until
    /// [`Engine::flush_derived_state`].
    pub defer_recalculation: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            propagate_to_adjacent: true,
            collision_policy: CollisionPolicy::Reject,
            min_clearance: None,
            defer_recalculation: false,
        }
    }
}

impl EditOptions {
    pub fn isolated() -> Self {
        Self {
            propagate_to_adjacent: false,
            ..Self::default()
        }
    }

    pub fn allow_collisions(mut self) -> Self {
        self.collision_policy = CollisionPolicy::Allow;
        self
    }

    pub fn deferred(mut self) -> Self {
        self.defer_recalculation = true;
        self
    }
}

/// Outcome of an edit. `state` is the current snapshot after the call, which
/// on failure is the unchanged snapshot from before it.
#[derive(Debug, Clone, PartialEq)]
pub struct EditResult {
    pub outcome: Result<()>,
    pub changed_wall_ids: BTreeSet<WallId>,
    pub collisions: Vec<Collision>,
    pub state: EditorState,
}

impl EditResult {
    pub fn ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn reason(&self) -> Option<&EditError> {
        self.outcome.as_ref().err()
    }
}

/// Graph and index matching the walls of a given generation.
#[derive(Debug, Clone)]
struct Derived {
    generation: u64,
    graph: WallGraph,
    index: SpatialIndex<WallId>,
}

impl Derived {
    fn build(walls: &BTreeMap<WallId, WallSegment>, tolerance: f64, generation: u64) -> Self {
        Self {
            generation,
            graph: WallGraph::build(walls.values(), tolerance),
            index: wall_index(walls),
        }
    }
}

pub(crate) fn wall_index(walls: &BTreeMap<WallId, WallSegment>) -> SpatialIndex<WallId> {
    SpatialIndex::new(walls.values().map(|w| (w.bounds(), w.id)))
}

/// Walls added, removed or geometrically changed between two wall maps.
fn changed_walls(old: &BTreeMap<WallId, WallSegment>, new: &BTreeMap<WallId, WallSegment>) -> BTreeSet<WallId> {
    let same = |a: &WallSegment, b: &WallSegment| a.start == b.start && a.end == b.end && a.thickness == b.thickness;
    let mut changed: BTreeSet<WallId> = old.keys().filter(|id| !new.contains_key(id)).copied().collect();
    for (id, wall) in new {
        match old.get(id) {
            Some(prev) if same(prev, wall) => {}
            _ => {
                changed.insert(*id);
            }
        }
    }
    changed
}

/// An open gesture session.
#[derive(Debug, Clone)]
struct GestureSession {
    before: Arc<EditorState>,
    changed: BTreeSet<WallId>,
}

/// Owns the current snapshot, the undo history and the listeners.
pub struct Engine {
    options: EngineOptions,
    detector: RoomDetector,
    state: Arc<EditorState>,
    history: CommandHistory,
    events: EventBus,
    generation: u64,
    derived: Option<Derived>,
    /// Walls changed since rooms were last derived.
    pending: BTreeSet<WallId>,
    /// Set when the current rooms were not derived from the current walls
    /// and `pending` no longer says which walls differ.
    rooms_stale: bool,
    gesture: Option<GestureSession>,
}

impl Engine {
    pub fn new(init: EngineInit) -> Result<Self> {
        let options = init.options;
        let mut walls = BTreeMap::new();
        for wall in init.walls {
            let id = wall.id;
            if walls.insert(id, wall).is_some() {
                return Err(EditError::DuplicateWall(id));
            }
        }
        let all: BTreeSet<WallId> = walls.keys().copied().collect();
        check_walls(&options, &walls, &all)?;

        let mut state = EditorState {
            walls,
            selected_wall_ids: init.selected_wall_ids,
            ..Default::default()
        };
        state.prune_selection();
        if let Some(rooms) = init.rooms {
            for room in rooms {
                state.naming.reserve(room.id);
                state.rooms.insert(room.id, room);
            }
        }

        let mut engine = Self {
            detector: RoomDetector::new(&options),
            history: CommandHistory::new(options.max_history),
            options,
            state: Arc::new(EditorState::default()),
            events: EventBus::default(),
            generation: 0,
            derived: None,
            pending: BTreeSet::new(),
            rooms_stale: false,
            gesture: None,
        };
        let index = wall_index(&state.walls);
        let graph = engine.refresh(&mut state);
        engine.state = Arc::new(state);
        engine.derived = Some(Derived {
            generation: engine.generation,
            graph,
            index,
        });
        info!(
            walls = engine.state.walls.len(),
            rooms = engine.state.rooms.len(),
            "engine initialised"
        );
        Ok(engine)
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// Shared handle to the current snapshot.
    pub fn snapshot(&self) -> Arc<EditorState> {
        Arc::clone(&self.state)
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn subscribe(&mut self, kind: EventKind, listener: impl FnMut(&EngineEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(kind, listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn validate_consistency(&self) -> Vec<ConsistencyIssue> {
        validate::validate_consistency(&self.state, &self.options)
    }

    /// Junction graph of the current walls.
    pub fn graph(&mut self) -> &WallGraph {
        &self.derived().graph
    }

    fn derived(&mut self) -> &Derived {
        let derived = match self.derived.take() {
            Some(d) if d.generation == self.generation => d,
            _ => {
                debug!(generation = self.generation, "rebuilding wall graph and spatial index");
                Derived::build(&self.state.walls, self.options.node_tolerance, self.generation)
            }
        };
        self.derived.insert(derived)
    }

    /// Runs the pipeline for a draft wall map.
    fn commit(&mut self, label: &str, walls: BTreeMap<WallId, WallSegment>, options: &EditOptions) -> EditResult {
        let changed = changed_walls(&self.state.walls, &walls);
        if changed.is_empty() {
            return self.reject(label, EditError::NoGeometricChange, changed, Vec::new());
        }
        if let Err(err) = check_walls(&self.options, &walls, &changed) {
            return self.reject(label, err, changed, Vec::new());
        }

        let clearance = options.min_clearance.unwrap_or(self.options.default_clearance);
        let index = wall_index(&walls);
        let collisions = CollisionDetector::new(self.options.node_tolerance, clearance).detect(&walls, &index, &changed);
        if !collisions.is_empty() {
            let committed = options.collision_policy == CollisionPolicy::Allow;
            self.events.emit(&EngineEvent::CollisionDetected {
                collisions: collisions.clone().into(),
                committed,
            });
            if !committed {
                let count = collisions.len();
                return self.reject(label, EditError::CollisionRejected { count }, changed, collisions);
            }
        }

        let before = Arc::clone(&self.state);
        let mut next = (*before).clone();
        next.walls = walls;
        self.pending.extend(changed.iter().copied());
        self.generation += 1;

        if options.defer_recalculation || self.gesture.is_some() {
            next.dirty = next.dirty.merge(DirtyFlags::all_derived());
            if next.prune_selection() {
                next.dirty.selection = true;
            }
        } else {
            let graph = self.refresh(&mut next);
            next.prune_selection();
            self.derived = Some(Derived {
                generation: self.generation,
                graph,
                index,
            });
        }
        next.revision = before.revision + 1;

        let next = Arc::new(next);
        self.state = Arc::clone(&next);
        match &mut self.gesture {
            Some(session) => session.changed.extend(changed.iter().copied()),
            None => {
                self.history.push(Command::new(label, Arc::clone(&before), Arc::clone(&next)));
                info!(label, revision = next.revision, changed = changed.len(), "command executed");
            }
        }

        self.notify_transition(&before, &next);
        if self.gesture.is_none() {
            self.events.emit(&EngineEvent::CommandExecuted {
                label: label.to_string(),
                revision: next.revision,
            });
        }

        EditResult {
            outcome: Ok(()),
            changed_wall_ids: changed,
            collisions,
            state: (*next).clone(),
        }
    }

    fn reject(
        &self,
        label: &str,
        err: EditError,
        changed: BTreeSet<WallId>,
        collisions: Vec<Collision>,
    ) -> EditResult {
        warn!(label, error = %err, "edit rejected");
        EditResult {
            outcome: Err(err),
            changed_wall_ids: changed,
            collisions,
            state: (*self.state).clone(),
        }
    }

    /// Re-derives adjacency, rooms and wall annotations in place and clears
    /// the derived dirty flags. Returns the graph it built.
    fn refresh(&mut self, state: &mut EditorState) -> WallGraph {
        let graph = WallGraph::build(state.walls.values(), self.options.node_tolerance);
        let previous = RoomSet {
            rooms: mem::take(&mut state.rooms),
            archived: mem::take(&mut state.archived_rooms),
            naming: state.naming.clone(),
        };
        let changed = mem::take(&mut self.pending);
        let stale = mem::take(&mut self.rooms_stale);
        let set = if self.options.incremental_rooms && !stale && !changed.is_empty() {
            self.detector.detect_incremental(&state.walls, &graph, &previous, &changed)
        } else {
            self.detector.detect(&state.walls, &previous)
        };
        state.rooms = set.rooms;
        state.archived_rooms = set.archived;
        state.naming = set.naming;

        let tolerance = self.options.node_tolerance;
        for wall in state.walls.values_mut() {
            wall.connected_wall_ids = graph.neighbors(wall.id).collect();
            let smallest = state
                .rooms
                .values()
                .filter(|r| r.wall_ids.contains(&wall.id))
                .min_by(|a, b| a.area.total_cmp(&b.area));
            wall.interior_side = smallest.and_then(|room| rooms::interior_side(wall, room, tolerance));
        }

        state.dirty.geometry = false;
        state.dirty.topology = false;
        state.dirty.rooms = false;
        state.dirty.spatial_index = false;
        state.dirty.selection = false;
        debug!(
            walls = state.walls.len(),
            nodes = graph.node_count(),
            rooms = state.rooms.len(),
            archived = state.archived_rooms.len(),
            "derived state refreshed"
        );
        graph
    }

    /// Brings rooms, adjacency and the index up to date after deferred edits.
    /// Does not record a command.
    pub fn flush_derived_state(&mut self) -> EditorState {
        if !self.state.dirty.any() {
            return (*self.state).clone();
        }
        let before = Arc::clone(&self.state);
        let mut next = (*before).clone();
        let index = wall_index(&next.walls);
        let graph = self.refresh(&mut next);
        next.prune_selection();
        next.revision = before.revision + 1;
        self.generation += 1;
        self.derived = Some(Derived {
            generation: self.generation,
            graph,
            index,
        });
        let next = Arc::new(next);
        self.state = Arc::clone(&next);
        self.notify_transition(&before, &next);
        (*next).clone()
    }

    pub fn undo(&mut self) -> Result<EditorState> {
        if self.gesture.is_some() {
            return Err(EditError::GestureInProgress);
        }
        let (label, restored) = match self.history.undo() {
            Some(command) => (command.label.clone(), command.undo()),
            None => return Err(EditError::NothingToUndo),
        };
        self.restore(restored);
        info!(label = %label, revision = self.state.revision, "command undone");
        self.events.emit(&EngineEvent::CommandUndone {
            label,
            revision: self.state.revision,
        });
        Ok((*self.state).clone())
    }

    pub fn redo(&mut self) -> Result<EditorState> {
        if self.gesture.is_some() {
            return Err(EditError::GestureInProgress);
        }
        let (label, restored) = match self.history.redo() {
            Some(command) => (command.label.clone(), command.execute()),
            None => return Err(EditError::NothingToRedo),
        };
        self.restore(restored);
        info!(label = %label, revision = self.state.revision, "command redone");
        self.events.emit(&EngineEvent::CommandRedone {
            label,
            revision: self.state.revision,
        });
        Ok((*self.state).clone())
    }

    pub fn can_undo(&self) -> bool {
        self.gesture.is_none() && self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.gesture.is_none() && self.history.can_redo()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Installs a recorded snapshot verbatim.
    fn restore(&mut self, state: Arc<EditorState>) {
        let before = mem::replace(&mut self.state, state);
        self.pending.clear();
        self.rooms_stale = self.state.dirty.rooms || self.state.dirty.topology;
        if self.rooms_stale {
            debug!(revision = self.state.revision, "restored snapshot has stale rooms");
        }
        self.generation += 1;
        let after = Arc::clone(&self.state);
        self.notify_transition(&before, &after);
    }

    /// State, dirty and selection notifications for a snapshot change.
    fn notify_transition(&mut self, before: &EditorState, after: &Arc<EditorState>) {
        self.events.emit(&EngineEvent::StateChanged {
            revision: after.revision,
            state: Arc::clone(after),
        });
        if before.dirty != after.dirty {
            self.events.emit(&EngineEvent::DirtyChanged { dirty: after.dirty });
        }
        if before.selected_wall_ids != after.selected_wall_ids {
            self.events.emit(&EngineEvent::SelectionChanged {
                selected: after.selected_wall_ids.clone(),
            });
        }
    }
}

/// Length, thickness and finiteness checks for the listed walls.
fn check_walls(options: &EngineOptions, walls: &BTreeMap<WallId, WallSegment>, ids: &BTreeSet<WallId>) -> Result<()> {
    for wall in ids.iter().filter_map(|id| walls.get(id)) {
        let finite = [wall.start.x, wall.start.y, wall.end.x, wall.end.y, wall.thickness]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(EditError::InvalidParameter(format!("{} has non-finite geometry", wall.id)));
        }
        let length = wall.length();
        if length < options.min_wall_length {
            return Err(EditError::BelowMinLength {
                wall: wall.id,
                length,
                min: options.min_wall_length,
            });
        }
        if wall.thickness < options.min_thickness || wall.thickness > options.max_thickness {
            return Err(EditError::ThicknessOutOfRange {
                wall: wall.id,
                thickness: wall.thickness,
                min: options.min_thickness,
                max: options.max_thickness,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Vector};
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    pub(crate) fn wall(id: u32, x0: f64, y0: f64, x1: f64, y1: f64) -> WallSegment {
        WallSegment::new(WallId(id), Point::new(x0, y0), Point::new(x1, y1), 100.0)
    }

    pub(crate) fn rectangle() -> Vec<WallSegment> {
        vec![
            wall(1, 0.0, 0.0, 4000.0, 0.0),
            wall(2, 4000.0, 0.0, 4000.0, 3000.0),
            wall(3, 4000.0, 3000.0, 0.0, 3000.0),
            wall(4, 0.0, 3000.0, 0.0, 0.0),
        ]
    }

    pub(crate) fn engine(walls: Vec<WallSegment>) -> Engine {
        Engine::new(EngineInit {
            walls,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn construction_derives_rooms_and_adjacency() {
        let e = engine(rectangle());
        assert_eq!(e.state().rooms.len(), 1);
        let room = e.state().rooms.values().next().unwrap();
        assert_relative_eq!(room.area, 12_000_000.0, max_relative = 1e-9);
        assert_eq!(room.name(), "Room 1");
        let w1 = e.state().wall(WallId(1)).unwrap();
        assert_eq!(w1.connected_wall_ids, vec![WallId(2), WallId(4)]);
        assert!(w1.interior_side.is_some());
        assert_eq!(e.state().revision, 0);
    }

    #[test]
    fn construction_rejects_bad_input() {
        let dup = Engine::new(EngineInit {
            walls: vec![wall(1, 0.0, 0.0, 100.0, 0.0), wall(1, 0.0, 50.0, 100.0, 50.0)],
            ..Default::default()
        });
        assert_eq!(dup.err(), Some(EditError::DuplicateWall(WallId(1))));

        let short = Engine::new(EngineInit {
            walls: vec![wall(1, 0.0, 0.0, 1.0, 0.0)],
            ..Default::default()
        });
        assert!(matches!(short.err(), Some(EditError::BelowMinLength { .. })));
    }

    #[test]
    fn supplied_rooms_keep_their_identity() {
        let seed = engine(rectangle());
        let mut room = seed.state().rooms.values().next().unwrap().clone();
        room.identity.name = "Kitchen".into();
        room.identity.color = Some("#ffcc00".into());
        room.id = crate::keys::RoomId(42);

        let e = Engine::new(EngineInit {
            walls: rectangle(),
            rooms: Some(vec![room]),
            ..Default::default()
        })
        .unwrap();
        let kept = e.state().room(crate::keys::RoomId(42)).unwrap();
        assert_eq!(kept.name(), "Kitchen");
        assert_eq!(kept.identity.color.as_deref(), Some("#ffcc00"));
    }

    #[test]
    fn deferred_edits_mark_dirty_until_flushed() {
        let mut e = engine(rectangle());
        let dirty = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&dirty);
        e.subscribe(EventKind::DirtyChanged, move |ev| {
            if let EngineEvent::DirtyChanged { dirty } = ev {
                sink.borrow_mut().push(dirty.rooms);
            }
        });

        let r = e.move_wall(WallId(2), Vector::new(500.0, 0.0), &EditOptions::default().deferred());
        assert!(r.ok());
        assert!(r.state.dirty.rooms);
        let stale_area = r.state.rooms.values().next().unwrap().area;
        assert_relative_eq!(stale_area, 12_000_000.0, max_relative = 1e-9);

        let flushed = e.flush_derived_state();
        assert!(!flushed.dirty.any());
        let area = flushed.rooms.values().next().unwrap().area;
        assert_relative_eq!(area, 4500.0 * 3000.0, max_relative = 1e-9);
        assert_eq!(*dirty.borrow(), vec![true, false]);
    }

    #[test]
    fn undo_and_redo_swap_snapshots() {
        let mut e = engine(rectangle());
        let original = e.state().clone();
        let moved = e.move_wall(WallId(2), Vector::new(500.0, 0.0), &EditOptions::default());
        assert!(moved.ok());
        assert_eq!(moved.state.revision, 1);

        assert_eq!(e.undo().unwrap(), original);
        assert!(e.can_redo());
        assert_eq!(e.redo().unwrap(), moved.state);
        assert_eq!(e.redo().err(), Some(EditError::NothingToRedo));
    }

    #[test]
    fn clearing_history_keeps_the_state() {
        let mut e = engine(rectangle());
        assert!(e.move_wall(WallId(2), Vector::new(100.0, 0.0), &EditOptions::default()).ok());
        let current = e.state().clone();
        e.clear_history();
        assert!(!e.can_undo());
        assert_eq!(e.undo().err(), Some(EditError::NothingToUndo));
        assert_eq!(*e.state(), current);
    }

    #[test]
    fn history_is_bounded() {
        let mut e = Engine::new(EngineInit {
            walls: rectangle(),
            options: EngineOptions {
                max_history: 2,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        for _ in 0..3 {
            assert!(e.move_wall(WallId(2), Vector::new(10.0, 0.0), &EditOptions::default()).ok());
        }
        assert!(e.undo().is_ok());
        assert!(e.undo().is_ok());
        assert_eq!(e.undo().err(), Some(EditError::NothingToUndo));
        assert_eq!(e.state().revision, 1);
    }
}
