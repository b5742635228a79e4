// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Selection queries. These touch only `selected_wall_ids`: no revision
//! bump, no history entry, no geometry change.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Engine;
use crate::error::{EditError, Result};
use crate::events::EngineEvent;
use crate::geometry::{self, Bounds, Point, SegmentIntersection};
use crate::keys::WallId;
use crate::types::WallSegment;

/// How a query result combines with the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMode {
    #[default]
    Replace,
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HitMode {
    /// Any part of the wall touches the region.
    #[default]
    Intersects,
    /// The whole wall lies inside the region.
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectOptions {
    pub merge_mode: SelectionMode,
    pub hit_mode: HitMode,
    /// Extra reach around each centerline, in plan units. Pass half the wall
    /// thickness to hit-test wall faces instead of centerlines.
    pub thickness_padding: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSelectOptions {
    pub through_junctions: bool,
    pub max_depth: usize,
    /// Replace the selection with the chain.
    pub update_selection: bool,
}

impl Default for ChainSelectOptions {
    fn default() -> Self {
        Self {
            through_junctions: false,
            max_depth: 64,
            update_selection: true,
        }
    }
}

/// Whether a wall centerline, padded by `padding`, hits a polygon region.
fn hits_polygon(wall: &WallSegment, polygon: &[Point], mode: HitMode, padding: f64) -> bool {
    let n = polygon.len();
    let edges = || (0..n).map(move |i| (&polygon[i], &polygon[(i + 1) % n]));
    let inside = |p: &Point| geometry::point_inside_or_on(p, polygon, geometry::EPSILON);
    match mode {
        HitMode::Intersects => {
            inside(&wall.start)
                || inside(&wall.end)
                || edges().any(|(a, b)| geometry::segment_distance(&wall.start, &wall.end, a, b) <= padding)
        }
        HitMode::Contains => {
            if !inside(&wall.start) || !inside(&wall.end) {
                return false;
            }
            edges().all(|(a, b)| {
                let crosses = match geometry::segment_intersection(&wall.start, &wall.end, a, b) {
                    SegmentIntersection::Point { t, u, .. } => {
                        t > geometry::EPSILON && t < 1.0 - geometry::EPSILON && u > geometry::EPSILON && u < 1.0 - geometry::EPSILON
                    }
                    _ => false,
                };
                !crosses && (padding <= 0.0 || geometry::segment_distance(&wall.start, &wall.end, a, b) >= padding)
            })
        }
    }
}

impl Engine {
    /// Combines `ids` into the selection. Unknown ids are rejected.
    pub fn set_selected_walls(&mut self, ids: &[WallId], mode: SelectionMode) -> Result<BTreeSet<WallId>> {
        if let Some(missing) = ids.iter().find(|id| !self.state.walls.contains_key(id)) {
            return Err(EditError::WallNotFound(*missing));
        }
        Ok(self.apply_selection(ids.iter().copied().collect(), mode))
    }

    pub fn clear_selection(&mut self) -> BTreeSet<WallId> {
        self.apply_selection(BTreeSet::new(), SelectionMode::Replace)
    }

    /// Selects walls hitting an axis-aligned box. Returns the hits.
    pub fn select_walls_by_rectangle(&mut self, rect: &Bounds, options: &SelectOptions) -> BTreeSet<WallId> {
        let hits = self.hit_test(&rect.corners(), options);
        self.apply_selection(hits.clone(), options.merge_mode);
        hits
    }

    /// Selects walls hitting a simple polygon. Returns the hits.
    pub fn select_walls_by_polygon(&mut self, polygon: &[Point], options: &SelectOptions) -> Result<BTreeSet<WallId>> {
        if polygon.len() < 3 {
            return Err(EditError::InvalidParameter("selection polygon needs at least three vertices".into()));
        }
        let hits = self.hit_test(polygon, options);
        self.apply_selection(hits.clone(), options.merge_mode);
        Ok(hits)
    }

    /// Walks the chain of walls from `seed`, optionally making it the selection.
    pub fn select_wall_chain(&mut self, seed: WallId, options: &ChainSelectOptions) -> Result<Vec<WallId>> {
        if !self.state.walls.contains_key(&seed) {
            return Err(EditError::WallNotFound(seed));
        }
        let chain = self.graph().walk_chain(seed, options.through_junctions, options.max_depth);
        if options.update_selection {
            self.apply_selection(chain.iter().copied().collect(), SelectionMode::Replace);
        }
        Ok(chain)
    }

    fn hit_test(&mut self, polygon: &[Point], options: &SelectOptions) -> BTreeSet<WallId> {
        let padding = options.thickness_padding.max(0.0);
        let region = Bounds::from_points(polygon).inflate(padding);
        let state = Arc::clone(&self.state);
        let candidates = self.derived().index.search(&region);
        candidates
            .into_iter()
            .filter(|id| {
                state
                    .walls
                    .get(id)
                    .is_some_and(|w| hits_polygon(w, polygon, options.hit_mode, padding))
            })
            .collect()
    }

    fn apply_selection(&mut self, ids: BTreeSet<WallId>, mode: SelectionMode) -> BTreeSet<WallId> {
        let current = &self.state.selected_wall_ids;
        let next: BTreeSet<WallId> = match mode {
            SelectionMode::Replace => ids,
            SelectionMode::Add => current.union(&ids).copied().collect(),
            SelectionMode::Remove => current.difference(&ids).copied().collect(),
        };
        if next != self.state.selected_wall_ids {
            Arc::make_mut(&mut self.state).selected_wall_ids = next.clone();
            self.events.emit(&EngineEvent::SelectionChanged { selected: next.clone() });
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{engine, rectangle, wall};
    use super::*;
    use crate::events::EventKind;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn rectangle_hit_modes() {
        let mut e = engine(rectangle());
        let rect = Bounds::new(-100.0, -100.0, 2000.0, 3100.0);

        let touched = e.select_walls_by_rectangle(&rect, &SelectOptions::default());
        assert_eq!(touched, BTreeSet::from([WallId(1), WallId(3), WallId(4)]));

        let contained = e.select_walls_by_rectangle(
            &rect,
            &SelectOptions {
                hit_mode: HitMode::Contains,
                ..Default::default()
            },
        );
        assert_eq!(contained, BTreeSet::from([WallId(4)]));
        assert_eq!(e.state().selected_wall_ids, contained);
    }

    #[test]
    fn padding_reaches_nearby_walls() {
        let mut e = engine(vec![wall(1, 0.0, 0.0, 1000.0, 0.0)]);
        let rect = Bounds::new(0.0, 30.0, 1000.0, 500.0);
        assert!(e.select_walls_by_rectangle(&rect, &SelectOptions::default()).is_empty());
        let padded = SelectOptions {
            thickness_padding: 50.0,
            ..Default::default()
        };
        assert_eq!(e.select_walls_by_rectangle(&rect, &padded), BTreeSet::from([WallId(1)]));
    }

    #[test]
    fn polygon_contains_respects_concavity() {
        let mut e = engine(vec![wall(1, 100.0, 100.0, 900.0, 100.0)]);
        // U shape whose notch cuts across the wall.
        let u = [
            Point::new(0.0, 0.0),
            Point::new(1000.0, 0.0),
            Point::new(1000.0, 1000.0),
            Point::new(600.0, 1000.0),
            Point::new(600.0, 50.0),
            Point::new(400.0, 50.0),
            Point::new(400.0, 1000.0),
            Point::new(0.0, 1000.0),
        ];
        let contains = SelectOptions {
            hit_mode: HitMode::Contains,
            ..Default::default()
        };
        assert!(e.select_walls_by_polygon(&u, &contains).unwrap().is_empty());
        assert_eq!(e.select_walls_by_polygon(&u, &SelectOptions::default()).unwrap().len(), 1);
        assert!(e.select_walls_by_polygon(&u[..2], &contains).is_err());
    }

    #[test]
    fn merge_modes_and_events() {
        let mut e = engine(rectangle());
        let changes = Rc::new(Cell::new(0));
        let counter = Rc::clone(&changes);
        e.subscribe(EventKind::SelectionChanged, move |_| counter.set(counter.get() + 1));

        e.set_selected_walls(&[WallId(1)], SelectionMode::Replace).unwrap();
        e.set_selected_walls(&[WallId(2)], SelectionMode::Add).unwrap();
        let now = e.set_selected_walls(&[WallId(1)], SelectionMode::Remove).unwrap();
        assert_eq!(now, BTreeSet::from([WallId(2)]));
        e.set_selected_walls(&[WallId(2)], SelectionMode::Add).unwrap();
        assert_eq!(changes.get(), 3);
        assert!(e.clear_selection().is_empty());
        assert!(e.clear_selection().is_empty());
        assert_eq!(changes.get(), 4);
        assert_eq!(e.state().revision, 0);
        assert!(!e.can_undo());
        assert_eq!(
            e.set_selected_walls(&[WallId(9)], SelectionMode::Add),
            Err(EditError::WallNotFound(WallId(9)))
        );
    }

    #[test]
    fn chain_selection_walks_corners() {
        let mut e = engine(rectangle());
        let chain = e.select_wall_chain(WallId(1), &ChainSelectOptions::default()).unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain[0], WallId(1));
        assert_eq!(e.state().selected_wall_ids.len(), 4);
    }

    #[test]
    fn removed_walls_leave_the_selection() {
        let mut e = engine(rectangle());
        e.set_selected_walls(&[WallId(1), WallId(2)], SelectionMode::Replace).unwrap();
        let r = e.remove_wall(WallId(2), &crate::engine::EditOptions::default());
        assert!(r.ok());
        assert_eq!(r.state.selected_wall_ids, BTreeSet::from([WallId(1)]));
    }
}
