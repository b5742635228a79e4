// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structural edits. Each builds a draft wall map and hands it to the
//! commit pipeline.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use nalgebra::Rotation2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EditOptions, EditResult, Engine};
use crate::config::EngineOptions;
use crate::error::{EditError, Result};
use crate::geometry::{self, Bounds, Point, Vector};
use crate::graph::WallGraph;
use crate::keys::{Endpoint, EndpointRef, NodeKey, VertexId, WallId};
use crate::solver::{self, AngleDistribution, Constraint, ConstraintGraph, ConstraintKind, SolverOptions};
use crate::spatial::SpatialIndex;
use crate::state::EditorState;
use crate::types::{WallSegment, WallSide};

/// Which point of a wall stays put when it is resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeAnchor {
    #[default]
    Start,
    End,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeOptions {
    pub anchor: ResizeAnchor,
    /// Overrides the engine minimum for this resize.
    pub min_length: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotatePivot {
    Start,
    End,
    #[default]
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotateOptions {
    pub pivot: RotatePivot,
    /// Drag the endpoints of walls joined at a moving end along.
    pub stretch_connected_at_moving_end: bool,
}

impl Default for RotateOptions {
    fn default() -> Self {
        Self {
            pivot: RotatePivot::Center,
            stretch_connected_at_moving_end: true,
        }
    }
}

/// Which face of a wall stays in place when its thickness changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThicknessMode {
    /// Both faces move; the centerline stays.
    #[default]
    Centerline,
    InteriorFixed,
    ExteriorFixed,
}

/// Affine transform of the selected walls: scale about the pivot, rotate
/// about the pivot, then translate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    pub translate: Vector,
    pub rotate_deg: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Use `scale_x` for both axes.
    pub lock_aspect_ratio: bool,
    /// Defaults to the center of the selection's bounds.
    pub pivot: Option<Point>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            translate: Vector::zeros(),
            rotate_deg: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            lock_aspect_ratio: false,
            pivot: None,
        }
    }
}

/// How far a chain walk extends from its seed wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainOptions {
    /// Continue past junctions joining more than two walls.
    pub through_junctions: bool,
    pub max_depth: usize,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            through_junctions: false,
            max_depth: 64,
        }
    }
}

/// Walls offset by `move_parallel_walls`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelOptions {
    /// Defaults to the selection. The first wall sets the direction.
    pub wall_ids: Option<Vec<WallId>>,
    pub angle_tolerance_deg: f64,
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self {
            wall_ids: None,
            angle_tolerance_deg: 1.0,
        }
    }
}

/// Parameters of a corner solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerOptions {
    /// Requested interior angle, degrees.
    pub target_deg: f64,
    /// Angles the target snaps to when within `snap_tolerance_deg`.
    pub snap_angles: Vec<f64>,
    pub snap_tolerance_deg: f64,
    pub distribution: AngleDistribution,
    pub prevent_intersections: bool,
}

impl Default for CornerOptions {
    fn default() -> Self {
        Self {
            target_deg: 90.0,
            snap_angles: vec![45.0, 90.0, 135.0, 180.0],
            snap_tolerance_deg: 0.0,
            distribution: AngleDistribution::Weighted,
            prevent_intersections: true,
        }
    }
}

/// Applies endpoint targets to a copy of `walls`. With `propagate`, every
/// other endpoint at a moved junction is displaced by the same vector.
pub(crate) fn apply_moves(
    walls: &BTreeMap<WallId, WallSegment>,
    graph: &WallGraph,
    moves: &BTreeMap<EndpointRef, Point>,
    propagate: bool,
) -> BTreeMap<WallId, WallSegment> {
    let mut targets = moves.clone();
    if propagate {
        for (&(wall, which), to) in moves {
            let Some(segment) = walls.get(&wall) else {
                continue;
            };
            let delta = *to - segment.endpoint(which);
            for &(other, other_end) in graph.endpoints_at(wall, which) {
                if targets.contains_key(&(other, other_end)) {
                    continue;
                }
                if let Some(o) = walls.get(&other) {
                    targets.insert((other, other_end), o.endpoint(other_end) + delta);
                }
            }
        }
    }

    let mut out = walls.clone();
    for ((wall, which), to) in targets {
        if let Some(segment) = out.get_mut(&wall) {
            segment.set_endpoint(which, to);
        }
    }
    out
}

fn finite(v: &Vector) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

impl Engine {
    fn fail(&self, label: &str, err: EditError) -> EditResult {
        self.reject(label, err, BTreeSet::new(), Vec::new())
    }

    /// Wall map with `moves` applied against the current junction graph.
    fn draft_moves(&mut self, moves: &BTreeMap<EndpointRef, Point>, propagate: bool) -> BTreeMap<WallId, WallSegment> {
        let state = Arc::clone(&self.state);
        let graph = &self.derived().graph;
        apply_moves(&state.walls, graph, moves, propagate)
    }

    fn translate(&mut self, label: &str, ids: &[WallId], delta: Vector, options: &EditOptions) -> EditResult {
        if ids.is_empty() {
            return self.fail(label, EditError::EmptySelection);
        }
        if !finite(&delta) {
            return self.fail(label, EditError::InvalidParameter("translation must be finite".into()));
        }
        let mut moves = BTreeMap::new();
        for id in ids {
            let Some(wall) = self.state.walls.get(id) else {
                return self.fail(label, EditError::WallNotFound(*id));
            };
            for which in Endpoint::BOTH {
                moves.insert((*id, which), wall.endpoint(which) + delta);
            }
        }
        let walls = self.draft_moves(&moves, options.propagate_to_adjacent);
        self.commit(label, walls, options)
    }

    /// Rotates every endpoint of `ids` about `pivot`.
    fn rotate_about(
        &mut self,
        label: &str,
        ids: &[WallId],
        degrees: f64,
        pivot: Point,
        propagate: bool,
        options: &EditOptions,
    ) -> EditResult {
        if !degrees.is_finite() {
            return self.fail(label, EditError::InvalidParameter("rotation must be finite".into()));
        }
        let radians = degrees.to_radians();
        let mut moves = BTreeMap::new();
        for id in ids {
            let Some(wall) = self.state.walls.get(id) else {
                return self.fail(label, EditError::WallNotFound(*id));
            };
            for which in Endpoint::BOTH {
                let p = wall.endpoint(which);
                let to = geometry::rotate_point(&p, &pivot, radians);
                if (to - p).norm() > geometry::EPSILON {
                    moves.insert((*id, which), to);
                }
            }
        }
        let walls = self.draft_moves(&moves, propagate);
        self.commit(label, walls, options)
    }

    pub fn move_wall(&mut self, id: WallId, delta: Vector, options: &EditOptions) -> EditResult {
        self.translate("move wall", &[id], delta, options)
    }

    pub fn move_walls(&mut self, ids: &[WallId], delta: Vector, options: &EditOptions) -> EditResult {
        self.translate("move walls", ids, delta, options)
    }

    /// Moves a wall along its left normal by `distance`.
    pub fn move_wall_perpendicular(&mut self, id: WallId, distance: f64, options: &EditOptions) -> EditResult {
        let label = "move wall perpendicular";
        let Some(wall) = self.state.walls.get(&id) else {
            return self.fail(label, EditError::WallNotFound(id));
        };
        let Some(normal) = wall.normal() else {
            return self.fail(label, EditError::ZeroLengthDirection);
        };
        self.translate(label, &[id], normal * distance, options)
    }

    pub fn move_wall_endpoint(&mut self, id: WallId, which: Endpoint, to: Point, options: &EditOptions) -> EditResult {
        let label = "move wall endpoint";
        if !self.state.walls.contains_key(&id) {
            return self.fail(label, EditError::WallNotFound(id));
        }
        if !finite(&to.coords) {
            return self.fail(label, EditError::InvalidParameter("endpoint must be finite".into()));
        }
        let moves = BTreeMap::from([((id, which), to)]);
        let walls = self.draft_moves(&moves, options.propagate_to_adjacent);
        self.commit(label, walls, options)
    }

    /// Grows (or, with a negative `delta_length`, shrinks) a wall along its
    /// own direction, keeping the anchor point.
    pub fn resize_wall(
        &mut self,
        id: WallId,
        delta_length: f64,
        resize: &ResizeOptions,
        options: &EditOptions,
    ) -> EditResult {
        let label = "resize wall";
        let Some(wall) = self.state.walls.get(&id) else {
            return self.fail(label, EditError::WallNotFound(id));
        };
        if !delta_length.is_finite() {
            return self.fail(label, EditError::InvalidParameter("length change must be finite".into()));
        }
        let dir = wall.direction();
        let current = dir.norm();
        if current < geometry::EPSILON {
            return self.fail(label, EditError::ZeroLengthDirection);
        }
        let length = current + delta_length;
        let min = resize.min_length.unwrap_or(self.options.min_wall_length);
        if length < min {
            return self.fail(label, EditError::BelowMinLength { wall: id, length, min });
        }
        let unit = dir / current;
        let (start, end) = match resize.anchor {
            ResizeAnchor::Start => (wall.start, wall.start + unit * length),
            ResizeAnchor::End => (wall.end - unit * length, wall.end),
            ResizeAnchor::Center => {
                let mid = wall.midpoint();
                (mid - unit * (length * 0.5), mid + unit * (length * 0.5))
            }
        };
        let mut moves = BTreeMap::new();
        if start != wall.start {
            moves.insert((id, Endpoint::Start), start);
        }
        if end != wall.end {
            moves.insert((id, Endpoint::End), end);
        }
        let walls = self.draft_moves(&moves, options.propagate_to_adjacent);
        self.commit(label, walls, options)
    }

    /// Rotates a wall by `degrees` (counter-clockwise) about one of its points.
    /// Walls joined at a moving end follow only when
    /// `stretch_connected_at_moving_end` and propagation are both on.
    pub fn rotate_wall(&mut self, id: WallId, degrees: f64, rotate: &RotateOptions, options: &EditOptions) -> EditResult {
        let label = "rotate wall";
        let Some(wall) = self.state.walls.get(&id) else {
            return self.fail(label, EditError::WallNotFound(id));
        };
        let pivot = match rotate.pivot {
            RotatePivot::Start => wall.start,
            RotatePivot::End => wall.end,
            RotatePivot::Center => wall.midpoint(),
        };
        let propagate = options.propagate_to_adjacent && rotate.stretch_connected_at_moving_end;
        self.rotate_about(label, &[id], degrees, pivot, propagate, options)
    }

    /// Changes a wall's thickness. Fixing a face shifts the centerline by
    /// half the change, away from that face.
    pub fn adjust_wall_thickness(
        &mut self,
        id: WallId,
        thickness: f64,
        mode: ThicknessMode,
        options: &EditOptions,
    ) -> EditResult {
        let label = "adjust wall thickness";
        let Some(wall) = self.state.walls.get(&id).cloned() else {
            return self.fail(label, EditError::WallNotFound(id));
        };
        if !thickness.is_finite() || thickness < self.options.min_thickness || thickness > self.options.max_thickness {
            return self.fail(
                label,
                EditError::ThicknessOutOfRange {
                    wall: id,
                    thickness,
                    min: self.options.min_thickness,
                    max: self.options.max_thickness,
                },
            );
        }

        let half_change = (thickness - wall.thickness) * 0.5;
        let shift = match mode {
            ThicknessMode::Centerline => None,
            ThicknessMode::InteriorFixed | ThicknessMode::ExteriorFixed => {
                let Some(left) = wall.normal() else {
                    return self.fail(label, EditError::ZeroLengthDirection);
                };
                // Walls with no known interior treat the left side as interior.
                let interior = match wall.interior_side {
                    Some(WallSide::Right) => -left,
                    _ => left,
                };
                Some(match mode {
                    ThicknessMode::InteriorFixed => -interior * half_change,
                    _ => interior * half_change,
                })
            }
        };

        let mut walls = match shift {
            Some(v) if v.norm() > geometry::EPSILON => {
                let moves = BTreeMap::from([
                    ((id, Endpoint::Start), wall.start + v),
                    ((id, Endpoint::End), wall.end + v),
                ]);
                self.draft_moves(&moves, options.propagate_to_adjacent)
            }
            _ => self.state.walls.clone(),
        };
        if let Some(w) = walls.get_mut(&id) {
            w.thickness = thickness;
        }
        self.commit(label, walls, options)
    }

    /// Scales, rotates and translates the selected walls as a group.
    pub fn transform_selected_walls(&mut self, transform: &TransformOptions, options: &EditOptions) -> EditResult {
        let label = "transform selected walls";
        let selected: Vec<WallSegment> = self.state.selected_walls().cloned().collect();
        if selected.is_empty() {
            return self.fail(label, EditError::EmptySelection);
        }
        let scale_x = transform.scale_x;
        let scale_y = if transform.lock_aspect_ratio {
            scale_x
        } else {
            transform.scale_y
        };
        let valid_scale = |s: f64| s.is_finite() && s > 0.0;
        if !valid_scale(scale_x) || !valid_scale(scale_y) {
            return self.fail(label, EditError::InvalidParameter("scale factors must be positive".into()));
        }
        if !transform.rotate_deg.is_finite() || !finite(&transform.translate) {
            return self.fail(label, EditError::InvalidParameter("transform must be finite".into()));
        }

        let pivot = transform.pivot.unwrap_or_else(|| {
            Bounds::from_points(selected.iter().flat_map(|w| [&w.start, &w.end])).center()
        });
        let rotation = Rotation2::new(transform.rotate_deg.to_radians());
        let map = |p: &Point| {
            let local = *p - pivot;
            let scaled = Vector::new(local.x * scale_x, local.y * scale_y);
            pivot + rotation * scaled + transform.translate
        };

        let mut moves = BTreeMap::new();
        for wall in &selected {
            for which in Endpoint::BOTH {
                moves.insert((wall.id, which), map(&wall.endpoint(which)));
            }
        }
        let walls = self.draft_moves(&moves, options.propagate_to_adjacent);
        self.commit(label, walls, options)
    }

    /// Offsets a set of parallel walls by `distance` along the first wall's
    /// left normal. Fails if any wall deviates from the first by more than
    /// `angle_tolerance_deg`.
    pub fn move_parallel_walls(&mut self, distance: f64, parallel: &ParallelOptions, options: &EditOptions) -> EditResult {
        let label = "move parallel walls";
        let ids: Vec<WallId> = match &parallel.wall_ids {
            Some(ids) => ids.clone(),
            None => self.state.selected_wall_ids.iter().copied().collect(),
        };
        if !distance.is_finite() {
            return self.fail(label, EditError::InvalidParameter("distance must be finite".into()));
        }
        let Some(first) = ids.first() else {
            return self.fail(label, EditError::EmptySelection);
        };
        let Some(reference) = self.state.walls.get(first) else {
            return self.fail(label, EditError::WallNotFound(*first));
        };
        let Some(normal) = reference.normal() else {
            return self.fail(label, EditError::ZeroLengthDirection);
        };
        let reference_dir = reference.direction();
        let tolerance = parallel.angle_tolerance_deg.to_radians();
        for id in &ids[1..] {
            let Some(wall) = self.state.walls.get(id) else {
                return self.fail(label, EditError::WallNotFound(*id));
            };
            let angle = geometry::unsigned_angle(&reference_dir, &wall.direction());
            let deviation = angle.min(std::f64::consts::PI - angle);
            if deviation > tolerance {
                return self.fail(label, EditError::NotParallel(*id));
            }
        }
        self.translate(label, &ids, normal * distance, options)
    }

    /// Translates the chain of walls reachable from `seed`.
    pub fn move_wall_chain(
        &mut self,
        seed: WallId,
        delta: Vector,
        chain: &ChainOptions,
        options: &EditOptions,
    ) -> EditResult {
        let label = "move wall chain";
        if !self.state.walls.contains_key(&seed) {
            return self.fail(label, EditError::WallNotFound(seed));
        }
        let ids = self.graph().walk_chain(seed, chain.through_junctions, chain.max_depth);
        self.translate(label, &ids, delta, options)
    }

    /// Rotates the chain reachable from `seed` about `pivot`, or the center
    /// of the chain's bounds.
    pub fn rotate_wall_chain(
        &mut self,
        seed: WallId,
        degrees: f64,
        pivot: Option<Point>,
        chain: &ChainOptions,
        options: &EditOptions,
    ) -> EditResult {
        let label = "rotate wall chain";
        if !self.state.walls.contains_key(&seed) {
            return self.fail(label, EditError::WallNotFound(seed));
        }
        let ids = self.graph().walk_chain(seed, chain.through_junctions, chain.max_depth);
        let pivot = pivot.unwrap_or_else(|| {
            Bounds::from_points(
                ids.iter()
                    .filter_map(|id| self.state.walls.get(id))
                    .flat_map(|w| [&w.start, &w.end]),
            )
            .center()
        });
        self.rotate_about(label, &ids, degrees, pivot, options.propagate_to_adjacent, options)
    }

    /// Inserts a wall. A wall lying inside a room with its midpoint strictly
    /// inside is tagged as a divider of that room.
    pub fn add_wall(&mut self, mut wall: WallSegment, options: &EditOptions) -> EditResult {
        let label = "add wall";
        if self.state.walls.contains_key(&wall.id) {
            return self.fail(label, EditError::DuplicateWall(wall.id));
        }
        let tolerance = self.options.node_tolerance;
        let mid = wall.midpoint();
        wall.connected_wall_ids.clear();
        wall.interior_side = None;
        wall.is_divider = self.state.rooms.values().any(|room| {
            geometry::point_inside_or_on(&wall.start, &room.polygon, tolerance)
                && geometry::point_inside_or_on(&wall.end, &room.polygon, tolerance)
                && geometry::point_strictly_inside(&mid, &room.polygon, tolerance)
        });
        if wall.is_divider {
            debug!(wall = %wall.id, "inserted wall divides a room");
        }
        let mut walls = self.state.walls.clone();
        walls.insert(wall.id, wall);
        self.commit(label, walls, options)
    }

    pub fn remove_wall(&mut self, id: WallId, options: &EditOptions) -> EditResult {
        let label = "remove wall";
        let mut walls = self.state.walls.clone();
        if walls.remove(&id).is_none() {
            return self.fail(label, EditError::WallNotFound(id));
        }
        self.commit(label, walls, options)
    }

    /// Solves the corner shared by two walls to a (snapped) target angle.
    /// Walls near the corner take part as fixed obstacles.
    pub fn solve_corner(
        &mut self,
        wall_a: WallId,
        wall_b: WallId,
        corner: &CornerOptions,
        options: &EditOptions,
    ) -> EditResult {
        let label = "solve corner";
        for id in [wall_a, wall_b] {
            if !self.state.walls.contains_key(&id) {
                return self.fail(label, EditError::WallNotFound(id));
            }
        }
        let state = Arc::clone(&self.state);
        let engine_options = self.options.clone();
        let moves = {
            let derived = self.derived();
            corner_moves(
                &state,
                &derived.graph,
                &derived.index,
                &engine_options,
                (wall_a, wall_b),
                corner,
                options.propagate_to_adjacent,
            )
        };
        match moves {
            Ok(moves) => {
                let walls = self.draft_moves(&moves, false);
                self.commit(label, walls, options)
            }
            Err(err) => self.fail(label, err),
        }
    }
}

/// Builds the solver problem around a corner and turns its answer into
/// endpoint moves.
fn corner_moves(
    state: &EditorState,
    graph: &WallGraph,
    index: &SpatialIndex<WallId>,
    engine_options: &EngineOptions,
    (wall_a, wall_b): (WallId, WallId),
    corner: &CornerOptions,
    propagate: bool,
) -> Result<BTreeMap<EndpointRef, Point>> {
    let no_corner = || EditError::NoSharedCorner(wall_a, wall_b);
    let (a0, a1) = graph.wall_nodes(wall_a).ok_or_else(no_corner)?;
    let (b0, b1) = graph.wall_nodes(wall_b).ok_or_else(no_corner)?;
    let shared = [a0, a1].into_iter().find(|k| *k == b0 || *k == b1).ok_or_else(no_corner)?;
    let far = |(n0, n1): (NodeKey, NodeKey)| if n0 == shared { n1 } else { n0 };
    let (far_a, far_b) = (far((a0, a1)), far((b0, b1)));
    if far_a == far_b || far_a == shared || far_b == shared {
        return Err(EditError::InvalidParameter(format!(
            "{wall_a} and {wall_b} do not form a corner"
        )));
    }

    let mut cg = ConstraintGraph::new();
    let mut vertex_of: BTreeMap<NodeKey, VertexId> = BTreeMap::new();
    let mut add_wall = |cg: &mut ConstraintGraph, wall: WallId| {
        let Some((n0, n1)) = graph.wall_nodes(wall) else {
            return;
        };
        let mut vertex = |key: NodeKey| {
            let next = VertexId(vertex_of.len() as u32);
            *vertex_of.entry(key).or_insert_with(|| {
                if let Some(node) = graph.node(key) {
                    cg.add_vertex(next, node.position);
                }
                next
            })
        };
        let (v0, v1) = (vertex(n0), vertex(n1));
        cg.add_wall(wall, v0, v1);
    };
    add_wall(&mut cg, wall_a);
    add_wall(&mut cg, wall_b);

    let mut reach = Bounds::empty();
    for id in [wall_a, wall_b] {
        if let Some(w) = state.walls.get(&id) {
            reach = reach.union(&w.bounds().inflate(w.length()));
        }
    }
    for other in index.search(&reach) {
        if other != wall_a && other != wall_b {
            add_wall(&mut cg, other);
        }
    }

    let free = |key: NodeKey| propagate || graph.degree(key) == 1;
    let free_vertices: BTreeSet<VertexId> = [far_a, far_b]
        .into_iter()
        .filter(|k| free(*k))
        .filter_map(|k| vertex_of.get(&k).copied())
        .collect();

    let target = solver::snap_angle(corner.target_deg, &corner.snap_angles, corner.snap_tolerance_deg);
    let mut constraints = vec![Constraint::hard(ConstraintKind::TargetAngle {
        wall_a,
        wall_b,
        degrees: target,
        distribution: corner.distribution,
    })];
    for (vertex, position) in &cg.vertices {
        if !free_vertices.contains(vertex) {
            constraints.push(Constraint::hard(ConstraintKind::FixedPoint {
                vertex: *vertex,
                position: *position,
            }));
        }
    }

    let result = solver::solve(
        &cg,
        &constraints,
        &SolverOptions {
            max_iterations: engine_options.max_solver_iterations,
            tolerance: engine_options.solver_tolerance,
            prevent_intersections: corner.prevent_intersections,
        },
    );
    if result.has_hard_violation() {
        return Err(EditError::ConstraintViolation(result.violations));
    }

    let node_of: BTreeMap<VertexId, NodeKey> = vertex_of.iter().map(|(k, v)| (*v, *k)).collect();
    let mut moves = BTreeMap::new();
    for (vertex, position) in result.moved(&cg) {
        let Some(key) = node_of.get(&vertex) else {
            continue;
        };
        let Some(node) = graph.node(*key) else {
            continue;
        };
        for &(wall, which) in &node.endpoints {
            if propagate || wall == wall_a || wall == wall_b {
                moves.insert((wall, which), position);
            }
        }
    }
    debug!(
        %wall_a,
        %wall_b,
        target,
        iterations = result.iterations,
        moved = moves.len(),
        "corner solved"
    );
    Ok(moves)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{engine, rectangle, wall};
    use super::*;
    use approx::assert_abs_diff_eq;

    fn t_junction() -> Vec<WallSegment> {
        vec![
            wall(1, 0.0, 0.0, 1000.0, 0.0),
            wall(2, 1000.0, 0.0, 2000.0, 0.0),
            wall(3, 1000.0, 0.0, 1000.0, 1000.0),
        ]
    }

    #[test]
    fn propagation_keeps_junctions_together() {
        let mut e = engine(t_junction());
        let r = e.move_wall(WallId(3), Vector::new(100.0, 0.0), &EditOptions::default());
        assert!(r.ok());
        assert_eq!(r.changed_wall_ids, BTreeSet::from([WallId(1), WallId(2), WallId(3)]));
        assert_eq!(r.state.walls[&WallId(1)].end, Point::new(1100.0, 0.0));
        assert_eq!(r.state.walls[&WallId(2)].start, Point::new(1100.0, 0.0));

        let mut e = engine(t_junction());
        let r = e.move_wall(WallId(3), Vector::new(100.0, 0.0), &EditOptions::isolated());
        assert!(r.ok());
        assert_eq!(r.changed_wall_ids, BTreeSet::from([WallId(3)]));
        assert_eq!(r.state.walls[&WallId(1)].end, Point::new(1000.0, 0.0));
    }

    #[test]
    fn zero_move_and_unknown_wall_are_rejected() {
        let mut e = engine(rectangle());
        let r = e.move_wall(WallId(1), Vector::zeros(), &EditOptions::default());
        assert_eq!(r.reason(), Some(&EditError::NoGeometricChange));
        let r = e.move_wall(WallId(99), Vector::new(1.0, 0.0), &EditOptions::default());
        assert_eq!(r.reason(), Some(&EditError::WallNotFound(WallId(99))));
        assert_eq!(e.state().revision, 0);
        assert!(!e.can_undo());
    }

    #[test]
    fn perpendicular_move_uses_left_normal() {
        let mut e = engine(rectangle());
        // Wall 1 runs +x, so its left normal is +y.
        let r = e.move_wall_perpendicular(WallId(1), 200.0, &EditOptions::default());
        assert!(r.ok());
        assert_eq!(r.state.walls[&WallId(1)].start, Point::new(0.0, 200.0));
        let room = r.state.rooms.values().next().unwrap();
        assert_abs_diff_eq!(room.area, 4000.0 * 2800.0, epsilon = 1e-3);
    }

    #[test]
    fn resize_respects_anchor_and_minimum() {
        let mut e = engine(vec![wall(1, 0.0, 0.0, 1000.0, 0.0)]);
        let r = e.resize_wall(
            WallId(1),
            -400.0,
            &ResizeOptions {
                anchor: ResizeAnchor::Center,
                min_length: None,
            },
            &EditOptions::default(),
        );
        assert!(r.ok());
        assert_eq!(r.state.walls[&WallId(1)].start, Point::new(200.0, 0.0));
        assert_eq!(r.state.walls[&WallId(1)].end, Point::new(800.0, 0.0));

        let r = e.resize_wall(
            WallId(1),
            -550.0,
            &ResizeOptions {
                anchor: ResizeAnchor::Start,
                min_length: Some(100.0),
            },
            &EditOptions::default(),
        );
        assert!(matches!(
            r.reason(),
            Some(EditError::BelowMinLength { length, min, .. }) if *min == 100.0 && (*length - 50.0).abs() < 1e-9
        ));
        assert_eq!(e.state().walls[&WallId(1)].length(), 600.0);
    }

    #[test]
    fn resize_adds_to_the_current_length() {
        let mut e = engine(vec![wall(1, 0.0, 0.0, 4000.0, 0.0)]);
        let r = e.resize_wall(WallId(1), 500.0, &ResizeOptions::default(), &EditOptions::default());
        assert!(r.ok(), "{:?}", r.reason());
        assert_eq!(r.state.walls[&WallId(1)].start, Point::new(0.0, 0.0));
        assert_eq!(r.state.walls[&WallId(1)].end, Point::new(4500.0, 0.0));

        let end_anchor = ResizeOptions {
            anchor: ResizeAnchor::End,
            min_length: None,
        };
        let r = e.resize_wall(WallId(1), -1500.0, &end_anchor, &EditOptions::default());
        assert!(r.ok(), "{:?}", r.reason());
        assert_eq!(r.state.walls[&WallId(1)].start, Point::new(1500.0, 0.0));
        assert_eq!(r.state.walls[&WallId(1)].end, Point::new(4500.0, 0.0));

        let r = e.resize_wall(WallId(1), f64::NAN, &ResizeOptions::default(), &EditOptions::default());
        assert!(matches!(r.reason(), Some(EditError::InvalidParameter(_))));
    }

    #[test]
    fn rotate_about_start_keeps_start() {
        let mut e = engine(vec![wall(1, 0.0, 0.0, 1000.0, 0.0)]);
        let r = e.rotate_wall(
            WallId(1),
            90.0,
            &RotateOptions {
                pivot: RotatePivot::Start,
                ..Default::default()
            },
            &EditOptions::default(),
        );
        assert!(r.ok());
        let w = &r.state.walls[&WallId(1)];
        assert_eq!(w.start, Point::origin());
        assert_abs_diff_eq!(w.end.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(w.end.y, 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn thickness_modes() {
        let mut e = engine(rectangle());
        let r = e.adjust_wall_thickness(WallId(1), 300.0, ThicknessMode::Centerline, &EditOptions::default());
        assert!(r.ok());
        assert_eq!(r.state.walls[&WallId(1)].start, Point::origin());
        assert_eq!(r.state.walls[&WallId(1)].thickness, 300.0);

        // Interior of wall 1 is +y; fixing it pushes the centerline down by 50.
        let mut e = engine(rectangle());
        let r = e.adjust_wall_thickness(WallId(1), 200.0, ThicknessMode::InteriorFixed, &EditOptions::default());
        assert!(r.ok());
        assert_abs_diff_eq!(r.state.walls[&WallId(1)].start.y, -50.0, epsilon = 1e-9);

        let r = e.adjust_wall_thickness(WallId(1), 0.0, ThicknessMode::Centerline, &EditOptions::default());
        assert!(matches!(r.reason(), Some(EditError::ThicknessOutOfRange { .. })));
    }

    #[test]
    fn transform_requires_selection_and_scales_about_pivot() {
        let mut e = engine(vec![wall(1, 0.0, 0.0, 1000.0, 0.0)]);
        let r = e.transform_selected_walls(&TransformOptions::default(), &EditOptions::default());
        assert_eq!(r.reason(), Some(&EditError::EmptySelection));

        e.set_selected_walls(&[WallId(1)], crate::engine::SelectionMode::Replace).unwrap();
        let r = e.transform_selected_walls(
            &TransformOptions {
                scale_x: 2.0,
                lock_aspect_ratio: true,
                ..Default::default()
            },
            &EditOptions::default(),
        );
        assert!(r.ok());
        let w = &r.state.walls[&WallId(1)];
        assert_abs_diff_eq!(w.start.x, -500.0, epsilon = 1e-9);
        assert_abs_diff_eq!(w.end.x, 1500.0, epsilon = 1e-9);
    }

    #[test]
    fn parallel_walls_move_together() {
        let mut e = engine(vec![
            wall(1, 0.0, 0.0, 1000.0, 0.0),
            wall(2, 0.0, 500.0, 1000.0, 501.0),
            wall(3, 2000.0, 0.0, 2000.0, 1000.0),
        ]);
        let listed = |ids: &[u32]| ParallelOptions {
            wall_ids: Some(ids.iter().map(|&i| WallId(i)).collect()),
            ..Default::default()
        };
        let r = e.move_parallel_walls(100.0, &listed(&[1, 3]), &EditOptions::default());
        assert_eq!(r.reason(), Some(&EditError::NotParallel(WallId(3))));

        let r = e.move_parallel_walls(100.0, &listed(&[1, 2]), &EditOptions::default());
        assert!(r.ok());
        assert_eq!(r.state.walls[&WallId(2)].start, Point::new(0.0, 600.0));
    }

    #[test]
    fn parallel_moves_default_to_the_selection() {
        let mut e = engine(vec![
            wall(1, 0.0, 0.0, 1000.0, 0.0),
            wall(2, 0.0, 500.0, 1000.0, 500.0),
            wall(3, 0.0, 1000.0, 1000.0, 1000.0),
        ]);
        let r = e.move_parallel_walls(50.0, &ParallelOptions::default(), &EditOptions::default());
        assert_eq!(r.reason(), Some(&EditError::EmptySelection));

        e.select_walls_by_rectangle(&Bounds::new(-10.0, -10.0, 1010.0, 510.0), &Default::default());
        assert_eq!(e.state().selected_wall_ids, BTreeSet::from([WallId(1), WallId(2)]));
        let r = e.move_parallel_walls(50.0, &ParallelOptions::default(), &EditOptions::default());
        assert!(r.ok(), "{:?}", r.reason());
        assert_eq!(r.changed_wall_ids, BTreeSet::from([WallId(1), WallId(2)]));
        assert_eq!(r.state.walls[&WallId(1)].start, Point::new(0.0, 50.0));
        assert_eq!(r.state.walls[&WallId(2)].end, Point::new(1000.0, 550.0));
        assert_eq!(r.state.walls[&WallId(3)].start, Point::new(0.0, 1000.0));
    }

    #[test]
    fn chain_moves_stop_at_junctions() {
        let mut walls = t_junction();
        walls.push(wall(4, 2000.0, 0.0, 3000.0, 0.0));
        let mut e = engine(walls);
        let r = e.move_wall_chain(
            WallId(4),
            Vector::new(0.0, 100.0),
            &ChainOptions::default(),
            &EditOptions::isolated().allow_collisions(),
        );
        assert!(r.ok());
        assert_eq!(r.changed_wall_ids, BTreeSet::from([WallId(2), WallId(4)]));
    }

    #[test]
    fn chain_rotation_turns_the_whole_loop() {
        let mut e = engine(rectangle());
        let r = e.rotate_wall_chain(WallId(1), 90.0, None, &ChainOptions::default(), &EditOptions::default());
        assert!(r.ok(), "{:?}", r.reason());
        assert_eq!(r.changed_wall_ids.len(), 4);
        let start = r.state.walls[&WallId(1)].start;
        assert_abs_diff_eq!(start.x, 3500.0, epsilon = 1e-9);
        assert_abs_diff_eq!(start.y, -500.0, epsilon = 1e-9);
        let room = r.state.rooms.values().next().unwrap();
        assert_abs_diff_eq!(room.area, 12_000_000.0, epsilon = 1e-3);
    }

    #[test]
    fn add_and_remove_walls() {
        let mut e = engine(rectangle());
        let r = e.add_wall(wall(1, 0.0, 0.0, 10.0, 10.0), &EditOptions::default());
        assert_eq!(r.reason(), Some(&EditError::DuplicateWall(WallId(1))));

        let r = e.add_wall(wall(5, 2000.0, 0.0, 2000.0, 3000.0), &EditOptions::default());
        assert!(r.ok());
        assert!(r.state.walls[&WallId(5)].is_divider);
        assert_eq!(r.state.rooms.len(), 2);
        assert_eq!(r.state.archived_rooms.len(), 1);

        let r = e.remove_wall(WallId(5), &EditOptions::default());
        assert!(r.ok());
        assert_eq!(r.state.rooms.len(), 1);
        assert!(r.state.archived_rooms.is_empty());
    }

    #[test]
    fn endpoint_drag_carries_the_corner() {
        let mut e = engine(rectangle());
        let to = Point::new(4500.0, -200.0);
        let r = e.move_wall_endpoint(WallId(2), Endpoint::Start, to, &EditOptions::default());
        assert!(r.ok());
        assert_eq!(r.state.walls[&WallId(1)].end, to);
        assert_eq!(r.state.walls[&WallId(2)].end, Point::new(4000.0, 3000.0));
        assert_eq!(r.state.rooms.len(), 1);

        let mut e = engine(rectangle());
        let r = e.move_wall_endpoint(WallId(2), Endpoint::Start, to, &EditOptions::isolated());
        assert!(r.ok());
        assert_eq!(r.state.walls[&WallId(1)].end, Point::new(4000.0, 0.0));
        assert!(r.state.rooms.is_empty());
    }

    #[test]
    fn group_moves_translate_every_wall() {
        let mut e = engine(rectangle());
        let r = e.move_walls(&[WallId(1), WallId(3)], Vector::new(0.0, 100.0), &EditOptions::default());
        assert!(r.ok());
        assert_eq!(r.state.walls[&WallId(1)].start, Point::new(0.0, 100.0));
        assert_eq!(r.state.walls[&WallId(3)].end, Point::new(0.0, 3100.0));
        assert_eq!(r.state.walls[&WallId(4)].start, Point::new(0.0, 3100.0));
        let room = r.state.rooms.values().next().unwrap();
        assert_abs_diff_eq!(room.area, 12_000_000.0, epsilon = 1e-3);
    }

    #[test]
    fn corner_solve_squares_a_dead_end() {
        let mut e = engine(vec![
            wall(1, 0.0, 0.0, 1000.0, 0.0),
            wall(2, 0.0, 0.0, 100.0, 1000.0),
        ]);
        let r = e.solve_corner(WallId(1), WallId(2), &CornerOptions::default(), &EditOptions::default());
        assert!(r.ok(), "{:?}", r.reason());
        let a = r.state.walls[&WallId(1)].direction();
        let b = r.state.walls[&WallId(2)].direction();
        assert_abs_diff_eq!(geometry::unsigned_angle(&a, &b).to_degrees(), 90.0, epsilon = 1e-4);
        assert_eq!(r.state.walls[&WallId(1)].start, Point::origin());
    }

    #[test]
    fn corner_without_shared_node_is_rejected() {
        let mut e = engine(vec![wall(1, 0.0, 0.0, 1000.0, 0.0), wall(2, 0.0, 500.0, 1000.0, 900.0)]);
        let r = e.solve_corner(WallId(1), WallId(2), &CornerOptions::default(), &EditOptions::default());
        assert_eq!(r.reason(), Some(&EditError::NoSharedCorner(WallId(1), WallId(2))));
    }
}
