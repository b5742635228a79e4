// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identifier types for walls, rooms, solver vertices and junction nodes.
//!
//! Walls and rooms are addressed by small `Copy` ids that stay stable across
//! edits. Junction nodes only live for the duration of one graph rebuild, so
//! they get generational `slotmap` keys instead.

use std::fmt;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Key for a junction node inside one [`crate::graph::WallGraph`].
    ///
    /// Keys from one rebuild are meaningless in another.
    pub struct NodeKey;
}

/// Stable identity of a wall segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WallId(pub u32);

/// Stable identity of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u32);

/// Vertex of a constraint-solver graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(pub u32);

impl fmt::Display for WallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wall#{}", self.0)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room#{}", self.0)
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// One of the two ends of a wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endpoint {
    Start,
    End,
}

impl Endpoint {
    /// Both endpoints, start first.
    pub const BOTH: [Endpoint; 2] = [Endpoint::Start, Endpoint::End];

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Start => "start",
            Endpoint::End => "end",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A wall endpoint reference as stored on junction nodes.
pub type EndpointRef = (WallId, Endpoint);
