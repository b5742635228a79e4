// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for wall edits.

use crate::keys::WallId;
use crate::solver::Violation;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EditError>;

/// Reasons an edit can be rejected.
///
/// Every variant leaves the editor state untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("wall not found: {0}")]
    WallNotFound(WallId),

    #[error("duplicate wall id: {0}")]
    DuplicateWall(WallId),

    /// A direction or displacement vector had zero length.
    #[error("direction vector has zero length")]
    ZeroLengthDirection,

    #[error("{wall} would be {length:.3} long, below the minimum of {min:.3}")]
    BelowMinLength { wall: WallId, length: f64, min: f64 },

    #[error("thickness {thickness:.3} of {wall} is outside [{min:.3}, {max:.3}]")]
    ThicknessOutOfRange {
        wall: WallId,
        thickness: f64,
        min: f64,
        max: f64,
    },

    #[error("edit produces no geometric change")]
    NoGeometricChange,

    #[error("no walls selected")]
    EmptySelection,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Walls passed to a parallel move are not parallel to the first one.
    #[error("{0} is not parallel to the reference wall")]
    NotParallel(WallId),

    /// The walls do not meet at a shared junction.
    #[error("{0} and {1} do not share a corner")]
    NoSharedCorner(WallId, WallId),

    #[error("edit rejected by {count} collision(s)")]
    CollisionRejected { count: usize },

    /// The solver could not satisfy a hard constraint.
    #[error("constraint solve failed with {} violation(s)", .0.len())]
    ConstraintViolation(Vec<Violation>),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("a gesture is already in progress")]
    GestureInProgress,

    #[error("no gesture in progress")]
    NoGesture,
}
