// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Gesture sessions: a begin/end bracket around high-frequency edits (a drag)
//! that is recorded as a single command.
//!
//! Inside a session every edit commits with derived state deferred and
//! nothing is pushed to the history. Ending the session flushes rooms and
//! adjacency once and records one command from the pre-gesture snapshot to
//! the final one.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{changed_walls, CornerOptions, EditOptions, EditResult, Engine, GestureSession, ResizeOptions, RotateOptions, ThicknessMode};
use crate::error::{EditError, Result};
use crate::events::EngineEvent;
use crate::geometry::{Point, Vector};
use crate::history::Command;
use crate::keys::{Endpoint, WallId};
use crate::state::EditorState;

/// One step of an interactive edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Gesture {
    Translate {
        wall_ids: Vec<WallId>,
        delta: Vector,
    },
    Endpoint {
        wall_id: WallId,
        endpoint: Endpoint,
        to: Point,
    },
    Thickness {
        wall_id: WallId,
        thickness: f64,
        #[serde(default)]
        mode: ThicknessMode,
    },
    Rotate {
        wall_id: WallId,
        degrees: f64,
        #[serde(default)]
        options: RotateOptions,
    },
    Resize {
        wall_id: WallId,
        delta_length: f64,
        #[serde(default)]
        options: ResizeOptions,
    },
    Corner {
        wall_a: WallId,
        wall_b: WallId,
        #[serde(default)]
        options: CornerOptions,
    },
}

impl Gesture {
    pub fn label(&self) -> &'static str {
        match self {
            Gesture::Translate { .. } => "translate",
            Gesture::Endpoint { .. } => "drag endpoint",
            Gesture::Thickness { .. } => "thickness",
            Gesture::Rotate { .. } => "rotate",
            Gesture::Resize { .. } => "resize",
            Gesture::Corner { .. } => "corner",
        }
    }
}

impl Engine {
    pub fn begin_gesture(&mut self) -> Result<()> {
        if self.gesture.is_some() {
            return Err(EditError::GestureInProgress);
        }
        self.gesture = Some(GestureSession {
            before: Arc::clone(&self.state),
            changed: BTreeSet::new(),
        });
        debug!(revision = self.state.revision, "gesture started");
        Ok(())
    }

    pub fn gesture_active(&self) -> bool {
        self.gesture.is_some()
    }

    /// Applies one gesture step. Derived state stays stale until the
    /// session ends.
    pub fn apply_gesture(&mut self, gesture: &Gesture, options: &EditOptions) -> EditResult {
        if self.gesture.is_none() {
            return self.reject(gesture.label(), EditError::NoGesture, BTreeSet::new(), Vec::new());
        }
        match gesture {
            Gesture::Translate { wall_ids, delta } => self.move_walls(wall_ids, *delta, options),
            Gesture::Endpoint { wall_id, endpoint, to } => self.move_wall_endpoint(*wall_id, *endpoint, *to, options),
            Gesture::Thickness { wall_id, thickness, mode } => {
                self.adjust_wall_thickness(*wall_id, *thickness, *mode, options)
            }
            Gesture::Rotate {
                wall_id,
                degrees,
                options: rotate,
            } => self.rotate_wall(*wall_id, *degrees, rotate, options),
            Gesture::Resize {
                wall_id,
                delta_length,
                options: resize,
            } => self.resize_wall(*wall_id, *delta_length, resize, options),
            Gesture::Corner {
                wall_a,
                wall_b,
                options: corner,
            } => self.solve_corner(*wall_a, *wall_b, corner, options),
        }
    }

    /// Closes the session, refreshes derived state and records one command.
    /// A session whose edits cancel out is rolled back and reported as
    /// [`EditError::NoGeometricChange`].
    pub fn end_gesture(&mut self, label: &str) -> EditResult {
        let Some(session) = self.gesture.take() else {
            return self.reject(label, EditError::NoGesture, BTreeSet::new(), Vec::new());
        };
        let changed = changed_walls(&session.before.walls, &self.state.walls);
        if changed.is_empty() {
            if !session.changed.is_empty() {
                self.restore(Arc::clone(&session.before));
            }
            return self.reject(label, EditError::NoGeometricChange, changed, Vec::new());
        }

        self.flush_derived_state();
        let after = Arc::clone(&self.state);
        self.history.push(Command::new(label, Arc::clone(&session.before), Arc::clone(&after)));
        info!(label, revision = after.revision, changed = changed.len(), "gesture recorded");
        self.events.emit(&EngineEvent::CommandExecuted {
            label: label.to_string(),
            revision: after.revision,
        });
        EditResult {
            outcome: Ok(()),
            changed_wall_ids: changed,
            collisions: Vec::new(),
            state: (*after).clone(),
        }
    }

    /// Discards every edit of the open session.
    pub fn cancel_gesture(&mut self) -> Result<EditorState> {
        let session = self.gesture.take().ok_or(EditError::NoGesture)?;
        if !Arc::ptr_eq(&session.before, &self.state) {
            self.restore(session.before);
        }
        debug!(revision = self.state.revision, "gesture cancelled");
        Ok((*self.state).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{engine, rectangle};
    use super::*;
    use crate::events::EventKind;
    use std::cell::Cell;
    use std::rc::Rc;

    fn drag(e: &mut Engine, steps: usize) {
        for _ in 0..steps {
            let r = e.apply_gesture(
                &Gesture::Translate {
                    wall_ids: vec![WallId(2)],
                    delta: Vector::new(100.0, 0.0),
                },
                &EditOptions::default(),
            );
            assert!(r.ok());
            assert!(r.state.dirty.rooms);
        }
    }

    #[test]
    fn gesture_records_one_command() {
        let mut e = engine(rectangle());
        let executed = Rc::new(Cell::new(0));
        let counter = Rc::clone(&executed);
        e.subscribe(EventKind::CommandExecuted, move |_| counter.set(counter.get() + 1));

        let before = e.state().clone();
        e.begin_gesture().unwrap();
        assert_eq!(e.begin_gesture(), Err(EditError::GestureInProgress));
        assert_eq!(e.undo().err(), Some(EditError::GestureInProgress));
        drag(&mut e, 5);
        let r = e.end_gesture("drag wall");
        assert!(r.ok());
        assert!(!r.state.dirty.any());
        assert_eq!(e.history().undo_len(), 1);
        assert_eq!(executed.get(), 1);
        let room = r.state.rooms.values().next().unwrap();
        assert!((room.area - 4500.0 * 3000.0).abs() < 1e-3);

        assert_eq!(e.undo().unwrap(), before);
    }

    #[test]
    fn cancel_restores_pre_gesture_snapshot() {
        let mut e = engine(rectangle());
        let before = e.state().clone();
        e.begin_gesture().unwrap();
        drag(&mut e, 3);
        assert_eq!(e.cancel_gesture().unwrap(), before);
        assert!(!e.can_undo());
        assert_eq!(e.cancel_gesture().err(), Some(EditError::NoGesture));
    }

    #[test]
    fn steps_outside_a_session_are_rejected() {
        let mut e = engine(rectangle());
        let r = e.apply_gesture(
            &Gesture::Thickness {
                wall_id: WallId(1),
                thickness: 200.0,
                mode: ThicknessMode::Centerline,
            },
            &EditOptions::default(),
        );
        assert_eq!(r.reason(), Some(&EditError::NoGesture));
        assert_eq!(e.end_gesture("nothing").reason(), Some(&EditError::NoGesture));
    }

    #[test]
    fn gesture_steps_decode_from_json() {
        let g: Gesture = serde_json::from_str(r#"{"kind":"resize","wall_id":3,"delta_length":-200.0}"#).unwrap();
        assert_eq!(g.label(), "resize");
        assert!(matches!(g, Gesture::Resize { wall_id: WallId(3), .. }));
    }
}
