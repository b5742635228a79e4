// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Plan-Lite Topology
//!
//! Wall-graph topology engine for 2D floor plans.
//!
//! Walls are centerline segments with a thickness. From them the engine
//! derives:
//!
//! - a junction graph, merging endpoints within a tolerance ([`WallGraph`]),
//! - rooms: minimal enclosed polygons with stable identity, nested under the
//!   room a divider wall split them from ([`rooms`]),
//! - a packed bounding-box index for hit-testing and collision checks
//!   ([`SpatialIndex`]).
//!
//! All structural edits go through [`Engine`], which applies them
//! transactionally: an edit either commits a new [`EditorState`] snapshot
//! (recorded for undo) or is rejected with an [`EditError`] and changes
//! nothing.
//!
//! ```no_run
//! use plan_lite_topology::{EditOptions, Engine, EngineInit, Point, Vector, WallId, WallSegment};
//!
//! let wall = |id, x0, y0, x1, y1| WallSegment::new(WallId(id), Point::new(x0, y0), Point::new(x1, y1), 100.0);
//! let mut engine = Engine::new(EngineInit {
//!     walls: vec![
//!         wall(1, 0.0, 0.0, 4000.0, 0.0),
//!         wall(2, 4000.0, 0.0, 4000.0, 3000.0),
//!         wall(3, 4000.0, 3000.0, 0.0, 3000.0),
//!         wall(4, 0.0, 3000.0, 0.0, 0.0),
//!     ],
//!     ..Default::default()
//! })?;
//! assert_eq!(engine.state().rooms.len(), 1);
//!
//! let result = engine.move_wall(WallId(2), Vector::new(500.0, 0.0), &EditOptions::default());
//! assert!(result.ok());
//! engine.undo()?;
//! # Ok::<(), plan_lite_topology::EditError>(())
//! ```
//!
//! The library logs through `tracing` and never installs a subscriber.

pub mod collision;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod geometry;
pub mod graph;
pub mod history;
pub mod keys;
pub mod rooms;
pub mod solver;
pub mod spatial;
pub mod state;
pub mod types;
pub mod validate;

pub use collision::{Collision, CollisionDetector, CollisionReason};
pub use config::EngineOptions;
pub use engine::{
    ChainOptions, ChainSelectOptions, CollisionPolicy, CornerOptions, EditOptions, EditResult, Engine, EngineInit,
    Gesture, HitMode, ParallelOptions, ResizeAnchor, ResizeOptions, RotateOptions, RotatePivot, SelectOptions, SelectionMode,
    ThicknessMode, TransformOptions,
};
pub use error::{EditError, Result};
pub use events::{EngineEvent, EventKind, SubscriptionId};
pub use geometry::{Bounds, Point, Vector};
pub use graph::{JunctionNode, WallGraph};
pub use history::{Command, CommandHistory};
pub use keys::{Endpoint, EndpointRef, NodeKey, RoomId, VertexId, WallId};
pub use rooms::{DetectionStrategy, RoomDetector, RoomSet};
pub use solver::{
    AngleDistribution, Constraint, ConstraintGraph, ConstraintKind, SolveResult, SolverOptions, Violation,
    ViolationKind,
};
pub use spatial::SpatialIndex;
pub use state::{DirtyFlags, EditorState, RoomNaming};
pub use types::{Room, RoomIdentity, WallSegment, WallSide};
pub use validate::{validate_consistency, ConsistencyIssue};
