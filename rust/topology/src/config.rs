// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::rooms::DetectionStrategy;

/// Tunables for the engine. Lengths are in plan units (millimetres by
/// convention), areas in square plan units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Wall endpoints within this distance share a junction node.
    pub node_tolerance: f64,
    /// Minimum clearance between unconnected walls; `0` disables the check.
    pub default_clearance: f64,
    /// Maximum number of undo entries kept.
    pub max_history: usize,
    pub min_wall_length: f64,
    pub min_thickness: f64,
    pub max_thickness: f64,
    /// Faces at or below this area are not rooms.
    pub min_room_area: f64,
    pub detection_strategy: DetectionStrategy,
    /// Longest cycle (in nodes) the fallback cycle search explores.
    pub max_cycle_depth: usize,
    /// Re-detect rooms only around changed walls.
    pub incremental_rooms: bool,
    pub max_solver_iterations: usize,
    pub solver_tolerance: f64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            node_tolerance: 5.0,
            default_clearance: 0.0,
            max_history: 100,
            min_wall_length: 10.0,
            min_thickness: 1.0,
            max_thickness: 2000.0,
            min_room_area: 1000.0,
            detection_strategy: DetectionStrategy::CycleSearch,
            max_cycle_depth: 64,
            incremental_rooms: true,
            max_solver_iterations: 50,
            solver_tolerance: 1e-6,
        }
    }
}
