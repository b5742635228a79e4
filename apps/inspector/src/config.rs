// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inspector configuration loaded from environment variables.

use std::str::FromStr;

use plan_lite_topology::{DetectionStrategy, EngineOptions};

/// Engine tunables that can be overridden from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Endpoint merge distance (`PLAN_NODE_TOLERANCE`).
    pub node_tolerance: f64,
    /// Minimum gap between unconnected walls, `0` for none (`PLAN_DEFAULT_CLEARANCE`).
    pub default_clearance: f64,
    /// Undo depth (`PLAN_MAX_HISTORY`).
    pub max_history: usize,
    /// Smallest area reported as a room (`PLAN_MIN_ROOM_AREA`).
    pub min_room_area: f64,
    /// `half-edge` or `cycle-search` (`PLAN_DETECTION`).
    pub detection: DetectionStrategy,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`. Missing or unparsable values
    /// fall back to the engine defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = EngineOptions::default();
        Self {
            node_tolerance: parsed(&lookup, "PLAN_NODE_TOLERANCE").unwrap_or(defaults.node_tolerance),
            default_clearance: parsed(&lookup, "PLAN_DEFAULT_CLEARANCE").unwrap_or(defaults.default_clearance),
            max_history: parsed(&lookup, "PLAN_MAX_HISTORY").unwrap_or(defaults.max_history),
            min_room_area: parsed(&lookup, "PLAN_MIN_ROOM_AREA").unwrap_or(defaults.min_room_area),
            detection: parsed(&lookup, "PLAN_DETECTION").unwrap_or(defaults.detection_strategy),
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            node_tolerance: self.node_tolerance,
            default_clearance: self.default_clearance,
            max_history: self.max_history,
            min_room_area: self.min_room_area,
            detection_strategy: self.detection,
            ..EngineOptions::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}
