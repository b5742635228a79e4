// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Corner and angle constraint solver.
//!
//! Gauss-Seidel relaxation over a small vertex/wall graph: each pass applies
//! every constraint's correction in turn, directly moving vertex positions,
//! until the worst remaining error is below tolerance or the iteration budget
//! runs out. Angle corrections rotate the two arms of a corner about the
//! shared vertex; by default the correction is split by squared arm length
//! so the longer arm moves less.
//!
//! The solver never fails outright. It returns its best positions together
//! with the list of constraints it could not satisfy.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{self, Point, SegmentIntersection, Vector};
use crate::keys::{VertexId, WallId};

/// Vertices and the walls connecting them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintGraph {
    pub vertices: BTreeMap<VertexId, Point>,
    pub walls: BTreeMap<WallId, (VertexId, VertexId)>,
}

impl ConstraintGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, id: VertexId, position: Point) -> &mut Self {
        self.vertices.insert(id, position);
        self
    }

    pub fn add_wall(&mut self, id: WallId, a: VertexId, b: VertexId) -> &mut Self {
        self.walls.insert(id, (a, b));
        self
    }

    /// Vertex the two walls have in common.
    pub fn shared_vertex(&self, a: WallId, b: WallId) -> Option<VertexId> {
        let (a0, a1) = *self.walls.get(&a)?;
        let (b0, b1) = *self.walls.get(&b)?;
        [a0, a1].into_iter().find(|v| *v == b0 || *v == b1)
    }

    /// Unsigned interior angle at the shared corner of two walls, in degrees.
    pub fn corner_angle(&self, a: WallId, b: WallId) -> Option<f64> {
        let corner = Corner::resolve(self, &self.vertices, a, b)?;
        Some(corner.angle(&self.vertices).abs().to_degrees())
    }
}

/// How a target-angle correction is shared between the two arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AngleDistribution {
    /// Proportional to the other arm's squared length.
    #[default]
    Weighted,
    RotateOnlyA,
    RotateOnlyB,
    Even,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConstraintKind {
    /// Pins a vertex to a position.
    FixedPoint { vertex: VertexId, position: Point },
    /// Interior angle at the shared corner equals `degrees`.
    TargetAngle {
        wall_a: WallId,
        wall_b: WallId,
        degrees: f64,
        #[serde(default)]
        distribution: AngleDistribution,
    },
    MinAngle { wall_a: WallId, wall_b: WallId, degrees: f64 },
    MaxAngle { wall_a: WallId, wall_b: WallId, degrees: f64 },
    Perpendicular { wall_a: WallId, wall_b: WallId },
    Parallel { wall_a: WallId, wall_b: WallId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    /// Hard constraints must converge or the edit is rejected.
    pub hard: bool,
    /// Strength of a soft constraint's correction, in `[0, 1]`.
    pub weight: f64,
}

impl Constraint {
    pub fn hard(kind: ConstraintKind) -> Self {
        Self {
            kind,
            hard: true,
            weight: 1.0,
        }
    }

    pub fn soft(kind: ConstraintKind, weight: f64) -> Self {
        Self {
            kind,
            hard: false,
            weight,
        }
    }

    fn strength(&self) -> f64 {
        if self.hard {
            1.0
        } else {
            self.weight.clamp(0.0, 1.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub max_iterations: usize,
    /// Largest acceptable error (radians for angles, plan units for points).
    pub tolerance: f64,
    /// Report new crossings between moved walls and the rest.
    pub prevent_intersections: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-6,
            prevent_intersections: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ViolationKind {
    /// The constraint still has error after the last iteration.
    NotConverged,
    /// Two walls cross after solving but did not before.
    Intersection { wall_a: WallId, wall_b: WallId },
    /// A referenced wall or vertex is not in the graph.
    MissingEntity,
    /// Angle constraint between walls without a common vertex.
    NoSharedVertex,
}

/// A constraint the solver could not satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Index into the constraint list, if the violation belongs to one.
    pub constraint: Option<usize>,
    pub hard: bool,
    pub kind: ViolationKind,
    pub error: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    pub positions: BTreeMap<VertexId, Point>,
    pub iterations: usize,
    pub converged: bool,
    pub max_error: f64,
    pub violations: Vec<Violation>,
}

impl SolveResult {
    pub fn has_hard_violation(&self) -> bool {
        self.violations.iter().any(|v| v.hard)
    }

    /// Vertices whose position differs from `graph`.
    pub fn moved(&self, graph: &ConstraintGraph) -> BTreeMap<VertexId, Point> {
        self.positions
            .iter()
            .filter(|(id, p)| graph.vertices.get(*id).is_some_and(|q| (*p - q).norm() > geometry::EPSILON))
            .map(|(id, p)| (*id, *p))
            .collect()
    }
}

/// Returns the snap value nearest to `degrees` if it is within `tolerance`,
/// otherwise `degrees` unchanged.
pub fn snap_angle(degrees: f64, snaps: &[f64], tolerance: f64) -> f64 {
    snaps
        .iter()
        .map(|s| (s, (s - degrees).abs()))
        .filter(|(_, d)| *d <= tolerance)
        .min_by(|x, y| x.1.total_cmp(&y.1))
        .map(|(s, _)| *s)
        .unwrap_or(degrees)
}

/// A corner: shared vertex plus the far vertex of each arm.
#[derive(Debug, Clone, Copy)]
struct Corner {
    vertex: VertexId,
    far_a: VertexId,
    far_b: VertexId,
}

impl Corner {
    fn resolve(graph: &ConstraintGraph, positions: &BTreeMap<VertexId, Point>, a: WallId, b: WallId) -> Option<Self> {
        let vertex = graph.shared_vertex(a, b)?;
        let other = |w: WallId| {
            let (v0, v1) = graph.walls[&w];
            if v0 == vertex {
                v1
            } else {
                v0
            }
        };
        let corner = Self {
            vertex,
            far_a: other(a),
            far_b: other(b),
        };
        [corner.vertex, corner.far_a, corner.far_b]
            .iter()
            .all(|v| positions.contains_key(v))
            .then_some(corner)
    }

    fn arms(&self, positions: &BTreeMap<VertexId, Point>) -> (Vector, Vector) {
        let c = positions[&self.vertex];
        (positions[&self.far_a] - c, positions[&self.far_b] - c)
    }

    /// Signed angle from arm A to arm B, radians.
    fn angle(&self, positions: &BTreeMap<VertexId, Point>) -> f64 {
        let (u, v) = self.arms(positions);
        geometry::signed_angle(&u, &v)
    }
}

/// Error of each constraint kind, and the correction that removes it.
struct Relaxation<'a> {
    graph: &'a ConstraintGraph,
    positions: BTreeMap<VertexId, Point>,
    pinned: BTreeSet<VertexId>,
}

impl Relaxation<'_> {
    /// Current error of a constraint, `None` when it cannot be evaluated.
    fn error(&self, constraint: &Constraint) -> Option<f64> {
        match &constraint.kind {
            ConstraintKind::FixedPoint { vertex, position } => {
                Some((self.positions.get(vertex)? - position).norm())
            }
            ConstraintKind::TargetAngle { wall_a, wall_b, degrees, .. } => {
                let phi = self.corner(*wall_a, *wall_b)?.angle(&self.positions);
                Some((phi.abs() - degrees.to_radians()).abs())
            }
            ConstraintKind::MinAngle { wall_a, wall_b, degrees } => {
                let phi = self.corner(*wall_a, *wall_b)?.angle(&self.positions).abs();
                Some((degrees.to_radians() - phi).max(0.0))
            }
            ConstraintKind::MaxAngle { wall_a, wall_b, degrees } => {
                let phi = self.corner(*wall_a, *wall_b)?.angle(&self.positions).abs();
                Some((phi - degrees.to_radians()).max(0.0))
            }
            ConstraintKind::Perpendicular { wall_a, wall_b } => {
                let delta = self.line_delta(*wall_a, *wall_b, std::f64::consts::FRAC_PI_2)?;
                Some(delta.abs())
            }
            ConstraintKind::Parallel { wall_a, wall_b } => Some(self.line_delta(*wall_a, *wall_b, 0.0)?.abs()),
        }
    }

    fn corner(&self, a: WallId, b: WallId) -> Option<Corner> {
        Corner::resolve(self.graph, &self.positions, a, b)
    }

    fn direction(&self, wall: WallId) -> Option<Vector> {
        let (a, b) = self.graph.walls.get(&wall)?;
        Some(self.positions.get(b)? - self.positions.get(a)?)
    }

    /// Rotation of wall B's line (mod π) needed to sit at `target` from wall A's line.
    fn line_delta(&self, a: WallId, b: WallId, target: f64) -> Option<f64> {
        let da = self.direction(a)?;
        let db = self.direction(b)?;
        let current = geometry::signed_angle(&da, &db);
        Some(wrap_half_turn(current - target))
    }

    fn apply(&mut self, constraint: &Constraint) {
        let strength = constraint.strength();
        match &constraint.kind {
            ConstraintKind::FixedPoint { vertex, position } => {
                if let Some(p) = self.positions.get_mut(vertex) {
                    *p += (*position - *p) * strength;
                }
            }
            ConstraintKind::TargetAngle {
                wall_a,
                wall_b,
                degrees,
                distribution,
            } => self.rotate_corner(*wall_a, *wall_b, degrees.to_radians(), *distribution, strength),
            ConstraintKind::MinAngle { wall_a, wall_b, degrees } => {
                if let Some(c) = self.corner(*wall_a, *wall_b) {
                    if c.angle(&self.positions).abs() < degrees.to_radians() {
                        self.rotate_corner(*wall_a, *wall_b, degrees.to_radians(), AngleDistribution::Weighted, strength);
                    }
                }
            }
            ConstraintKind::MaxAngle { wall_a, wall_b, degrees } => {
                if let Some(c) = self.corner(*wall_a, *wall_b) {
                    if c.angle(&self.positions).abs() > degrees.to_radians() {
                        self.rotate_corner(*wall_a, *wall_b, degrees.to_radians(), AngleDistribution::Weighted, strength);
                    }
                }
            }
            ConstraintKind::Perpendicular { wall_a, wall_b } => {
                self.align_lines(*wall_a, *wall_b, std::f64::consts::FRAC_PI_2, strength)
            }
            ConstraintKind::Parallel { wall_a, wall_b } => self.align_lines(*wall_a, *wall_b, 0.0, strength),
        }
    }

    /// Rotates the arms of the A/B corner so its unsigned angle becomes `target`.
    fn rotate_corner(&mut self, a: WallId, b: WallId, target: f64, distribution: AngleDistribution, strength: f64) {
        let Some(corner) = self.corner(a, b) else {
            return;
        };
        let phi = corner.angle(&self.positions);
        let sign = if phi < 0.0 { -1.0 } else { 1.0 };
        let delta = (sign * target - phi) * strength;
        if delta.abs() < f64::EPSILON {
            return;
        }

        let (u, v) = corner.arms(&self.positions);
        let (mut share_a, mut share_b) = match distribution {
            AngleDistribution::Weighted => {
                let (la, lb) = (u.norm_squared(), v.norm_squared());
                let total = la + lb;
                if total < geometry::EPSILON {
                    (0.5, 0.5)
                } else {
                    (lb / total, la / total)
                }
            }
            AngleDistribution::RotateOnlyA => (1.0, 0.0),
            AngleDistribution::RotateOnlyB => (0.0, 1.0),
            AngleDistribution::Even => (0.5, 0.5),
        };
        // A pinned far vertex hands its share to the other arm.
        match (self.pinned.contains(&corner.far_a), self.pinned.contains(&corner.far_b)) {
            (true, true) => return,
            (true, false) => {
                share_a = 0.0;
                share_b = 1.0;
            }
            (false, true) => {
                share_a = 1.0;
                share_b = 0.0;
            }
            (false, false) => {}
        }

        let pivot = self.positions[&corner.vertex];
        if share_a > 0.0 {
            let p = self.positions[&corner.far_a];
            self.positions.insert(corner.far_a, geometry::rotate_point(&p, &pivot, -delta * share_a));
        }
        if share_b > 0.0 {
            let p = self.positions[&corner.far_b];
            self.positions.insert(corner.far_b, geometry::rotate_point(&p, &pivot, delta * share_b));
        }
    }

    /// Rotates one wall (B unless it is fully pinned) so the lines meet at `target` mod π.
    fn align_lines(&mut self, a: WallId, b: WallId, target: f64, strength: f64) {
        let Some(delta) = self.line_delta(a, b, target) else {
            return;
        };
        let delta = delta * strength;
        if delta.abs() < f64::EPSILON {
            return;
        }
        // Rotating B by -delta closes the gap; rotating A by +delta does too.
        if !self.rotate_wall(b, -delta) {
            self.rotate_wall(a, delta);
        }
    }

    /// Rotates a wall about its pinned or shared end, else its midpoint.
    fn rotate_wall(&mut self, wall: WallId, radians: f64) -> bool {
        let Some(&(v0, v1)) = self.graph.walls.get(&wall) else {
            return false;
        };
        let (Some(&p0), Some(&p1)) = (self.positions.get(&v0), self.positions.get(&v1)) else {
            return false;
        };
        let shared = |v: VertexId| self.graph.walls.iter().any(|(w, (x, y))| *w != wall && (*x == v || *y == v));
        let pinned0 = self.pinned.contains(&v0);
        let pinned1 = self.pinned.contains(&v1);
        match (pinned0, pinned1) {
            (true, true) => false,
            (true, false) => {
                self.positions.insert(v1, geometry::rotate_point(&p1, &p0, radians));
                true
            }
            (false, true) => {
                self.positions.insert(v0, geometry::rotate_point(&p0, &p1, radians));
                true
            }
            (false, false) => {
                if shared(v0) {
                    self.positions.insert(v1, geometry::rotate_point(&p1, &p0, radians));
                } else if shared(v1) {
                    self.positions.insert(v0, geometry::rotate_point(&p0, &p1, radians));
                } else {
                    let mid = Point::from((p0.coords + p1.coords) * 0.5);
                    self.positions.insert(v0, geometry::rotate_point(&p0, &mid, radians));
                    self.positions.insert(v1, geometry::rotate_point(&p1, &mid, radians));
                }
                true
            }
        }
    }
}

/// Wraps an angle into `(-π/2, π/2]`.
fn wrap_half_turn(radians: f64) -> f64 {
    let pi = std::f64::consts::PI;
    let mut r = radians % pi;
    if r <= -pi / 2.0 {
        r += pi;
    } else if r > pi / 2.0 {
        r -= pi;
    }
    r
}

/// Relaxes `constraints` over `graph`.
pub fn solve(graph: &ConstraintGraph, constraints: &[Constraint], options: &SolverOptions) -> SolveResult {
    let pinned: BTreeSet<VertexId> = constraints
        .iter()
        .filter(|c| c.hard)
        .filter_map(|c| match c.kind {
            ConstraintKind::FixedPoint { vertex, .. } => Some(vertex),
            _ => None,
        })
        .collect();
    let mut relax = Relaxation {
        graph,
        positions: graph.vertices.clone(),
        pinned,
    };

    let mut violations = Vec::new();
    let mut active = Vec::new();
    for (i, c) in constraints.iter().enumerate() {
        match structural_problem(graph, c) {
            Some(kind) => violations.push(Violation {
                constraint: Some(i),
                hard: c.hard,
                kind,
                error: f64::INFINITY,
            }),
            None => active.push(i),
        }
    }

    let worst = |relax: &Relaxation<'_>| {
        active
            .iter()
            .filter_map(|&i| relax.error(&constraints[i]))
            .fold(0.0f64, f64::max)
    };

    let mut max_error = worst(&relax);
    let mut iterations = 0;
    while max_error > options.tolerance && iterations < options.max_iterations {
        for &i in &active {
            relax.apply(&constraints[i]);
        }
        iterations += 1;
        max_error = worst(&relax);
    }
    let converged = max_error <= options.tolerance;

    if !converged {
        for &i in &active {
            let c = &constraints[i];
            if let Some(error) = relax.error(c).filter(|e| *e > options.tolerance) {
                violations.push(Violation {
                    constraint: Some(i),
                    hard: c.hard,
                    kind: ViolationKind::NotConverged,
                    error,
                });
            }
        }
    }

    if options.prevent_intersections {
        violations.extend(new_intersections(graph, &relax.positions));
    }

    debug!(
        constraints = constraints.len(),
        iterations,
        converged,
        max_error,
        violations = violations.len(),
        "solved constraints"
    );

    SolveResult {
        positions: relax.positions,
        iterations,
        converged,
        max_error,
        violations,
    }
}

fn structural_problem(graph: &ConstraintGraph, constraint: &Constraint) -> Option<ViolationKind> {
    let walls_exist = |a: &WallId, b: &WallId| graph.walls.contains_key(a) && graph.walls.contains_key(b);
    match &constraint.kind {
        ConstraintKind::FixedPoint { vertex, .. } => {
            (!graph.vertices.contains_key(vertex)).then_some(ViolationKind::MissingEntity)
        }
        ConstraintKind::TargetAngle { wall_a, wall_b, .. }
        | ConstraintKind::MinAngle { wall_a, wall_b, .. }
        | ConstraintKind::MaxAngle { wall_a, wall_b, .. } => {
            if !walls_exist(wall_a, wall_b) {
                Some(ViolationKind::MissingEntity)
            } else if Corner::resolve(graph, &graph.vertices, *wall_a, *wall_b).is_none() {
                Some(ViolationKind::NoSharedVertex)
            } else {
                None
            }
        }
        ConstraintKind::Perpendicular { wall_a, wall_b } | ConstraintKind::Parallel { wall_a, wall_b } => {
            (!walls_exist(wall_a, wall_b)).then_some(ViolationKind::MissingEntity)
        }
    }
}

/// Crossings between moved walls and any other wall that did not exist before.
fn new_intersections(graph: &ConstraintGraph, positions: &BTreeMap<VertexId, Point>) -> Vec<Violation> {
    let moved: BTreeSet<VertexId> = positions
        .iter()
        .filter(|(id, p)| graph.vertices.get(*id).is_some_and(|q| (*p - q).norm() > geometry::EPSILON))
        .map(|(id, _)| *id)
        .collect();
    if moved.is_empty() {
        return Vec::new();
    }

    let crosses = |at: &BTreeMap<VertexId, Point>, a: &(VertexId, VertexId), b: &(VertexId, VertexId)| {
        let (Some(a0), Some(a1), Some(b0), Some(b1)) = (at.get(&a.0), at.get(&a.1), at.get(&b.0), at.get(&b.1)) else {
            return false;
        };
        match geometry::segment_intersection(a0, a1, b0, b1) {
            SegmentIntersection::Point { t, u, .. } => {
                let inside = |s: f64| s > 1e-9 && s < 1.0 - 1e-9;
                inside(t) && inside(u)
            }
            SegmentIntersection::Collinear => true,
            SegmentIntersection::None => false,
        }
    };

    let mut out = Vec::new();
    for (wa, ea) in &graph.walls {
        if !moved.contains(&ea.0) && !moved.contains(&ea.1) {
            continue;
        }
        for (wb, eb) in &graph.walls {
            if wa == wb || [ea.0, ea.1].iter().any(|v| *v == eb.0 || *v == eb.1) {
                continue;
            }
            let b_moved = moved.contains(&eb.0) || moved.contains(&eb.1);
            if b_moved && wb < wa {
                continue;
            }
            if crosses(positions, ea, eb) && !crosses(&graph.vertices, ea, eb) {
                let (wall_a, wall_b) = if wa < wb { (*wa, *wb) } else { (*wb, *wa) };
                out.push(Violation {
                    constraint: None,
                    hard: true,
                    kind: ViolationKind::Intersection { wall_a, wall_b },
                    error: 0.0,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Corner at the origin: wall 1 along +x (length `la`), wall 2 at `deg`.
    fn corner(la: f64, lb: f64, deg: f64) -> ConstraintGraph {
        let r = deg.to_radians();
        let mut g = ConstraintGraph::new();
        g.add_vertex(VertexId(0), Point::origin())
            .add_vertex(VertexId(1), Point::new(la, 0.0))
            .add_vertex(VertexId(2), Point::new(lb * r.cos(), lb * r.sin()))
            .add_wall(WallId(1), VertexId(0), VertexId(1))
            .add_wall(WallId(2), VertexId(0), VertexId(2));
        g
    }

    fn target(deg: f64, distribution: AngleDistribution) -> Constraint {
        Constraint::hard(ConstraintKind::TargetAngle {
            wall_a: WallId(1),
            wall_b: WallId(2),
            degrees: deg,
            distribution,
        })
    }

    #[test]
    fn snap_picks_nearest_within_tolerance() {
        assert_eq!(snap_angle(91.0, &[90.0], 2.0), 90.0);
        assert_eq!(snap_angle(95.0, &[90.0], 2.0), 95.0);
        assert_eq!(snap_angle(44.0, &[45.0, 90.0], 2.0), 45.0);
    }

    #[test]
    fn target_angle_converges() {
        let g = corner(1000.0, 1000.0, 91.0);
        let result = solve(&g, &[target(90.0, AngleDistribution::Weighted)], &SolverOptions::default());
        assert!(result.converged);
        assert!(result.iterations < 50);
        assert!(result.violations.is_empty());
        let mut solved = g.clone();
        solved.vertices = result.positions;
        assert_abs_diff_eq!(solved.corner_angle(WallId(1), WallId(2)).unwrap(), 90.0, epsilon = 1e-6);
    }

    #[test]
    fn longer_arm_moves_less() {
        let g = corner(3000.0, 1000.0, 100.0);
        let result = solve(&g, &[target(90.0, AngleDistribution::Weighted)], &SolverOptions::default());
        let moved_a = (result.positions[&VertexId(1)] - g.vertices[&VertexId(1)]).norm() / 3000.0;
        let moved_b = (result.positions[&VertexId(2)] - g.vertices[&VertexId(2)]).norm() / 1000.0;
        assert!(moved_a < moved_b);
    }

    #[test]
    fn rotate_only_and_pinned_vertices() {
        let g = corner(1000.0, 1000.0, 80.0);
        let only_b = solve(&g, &[target(90.0, AngleDistribution::RotateOnlyB)], &SolverOptions::default());
        assert_eq!(only_b.positions[&VertexId(1)], g.vertices[&VertexId(1)]);

        let pinned_b = vec![
            target(90.0, AngleDistribution::RotateOnlyB),
            Constraint::hard(ConstraintKind::FixedPoint {
                vertex: VertexId(2),
                position: g.vertices[&VertexId(2)],
            }),
        ];
        let result = solve(&g, &pinned_b, &SolverOptions::default());
        assert!(result.converged);
        assert_eq!(result.positions[&VertexId(2)], g.vertices[&VertexId(2)]);
        assert!(result.moved(&g).contains_key(&VertexId(1)));
    }

    #[test]
    fn fully_pinned_corner_reports_violation() {
        let g = corner(1000.0, 1000.0, 80.0);
        let constraints = vec![
            target(90.0, AngleDistribution::Weighted),
            Constraint::hard(ConstraintKind::FixedPoint {
                vertex: VertexId(1),
                position: g.vertices[&VertexId(1)],
            }),
            Constraint::hard(ConstraintKind::FixedPoint {
                vertex: VertexId(2),
                position: g.vertices[&VertexId(2)],
            }),
        ];
        let options = SolverOptions {
            max_iterations: 5,
            ..Default::default()
        };
        let result = solve(&g, &constraints, &options);
        assert!(!result.converged);
        assert_eq!(result.iterations, 5);
        assert!(result.has_hard_violation());
        assert_eq!(result.violations[0].kind, ViolationKind::NotConverged);
        assert_eq!(result.violations[0].constraint, Some(0));
    }

    #[test]
    fn unrelated_walls_have_no_shared_vertex() {
        let mut g = corner(1000.0, 1000.0, 90.0);
        g.add_vertex(VertexId(3), Point::new(5000.0, 0.0))
            .add_vertex(VertexId(4), Point::new(6000.0, 0.0))
            .add_wall(WallId(3), VertexId(3), VertexId(4));
        let c = Constraint::hard(ConstraintKind::TargetAngle {
            wall_a: WallId(1),
            wall_b: WallId(3),
            degrees: 90.0,
            distribution: AngleDistribution::Weighted,
        });
        let result = solve(&g, &[c], &SolverOptions::default());
        assert_eq!(result.violations[0].kind, ViolationKind::NoSharedVertex);
    }

    #[test]
    fn parallel_and_perpendicular_lines() {
        let mut g = ConstraintGraph::new();
        g.add_vertex(VertexId(0), Point::new(0.0, 0.0))
            .add_vertex(VertexId(1), Point::new(1000.0, 0.0))
            .add_vertex(VertexId(2), Point::new(0.0, 500.0))
            .add_vertex(VertexId(3), Point::new(1000.0, 560.0))
            .add_wall(WallId(1), VertexId(0), VertexId(1))
            .add_wall(WallId(2), VertexId(2), VertexId(3));
        let parallel = Constraint::hard(ConstraintKind::Parallel {
            wall_a: WallId(1),
            wall_b: WallId(2),
        });
        let result = solve(&g, &[parallel], &SolverOptions::default());
        assert!(result.converged);
        let d = result.positions[&VertexId(3)] - result.positions[&VertexId(2)];
        assert_abs_diff_eq!(d.y, 0.0, epsilon = 1e-6);

        let perpendicular = Constraint::hard(ConstraintKind::Perpendicular {
            wall_a: WallId(1),
            wall_b: WallId(2),
        });
        let result = solve(&g, &[perpendicular], &SolverOptions::default());
        assert!(result.converged);
        let d = result.positions[&VertexId(3)] - result.positions[&VertexId(2)];
        assert_abs_diff_eq!(d.x, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn new_crossings_are_reported() {
        // Rotating wall 2 to 30 degrees sweeps it across wall 3.
        let mut g = corner(1000.0, 1000.0, 90.0);
        g.add_vertex(VertexId(3), Point::new(300.0, 100.0))
            .add_vertex(VertexId(4), Point::new(300.0, 900.0))
            .add_wall(WallId(3), VertexId(3), VertexId(4));
        let constraints = vec![target(30.0, AngleDistribution::RotateOnlyB)];
        let result = solve(&g, &constraints, &SolverOptions::default());
        assert!(result.converged);
        assert!(result.violations.iter().any(|v| v.kind
            == ViolationKind::Intersection {
                wall_a: WallId(2),
                wall_b: WallId(3)
            }));
    }
}
