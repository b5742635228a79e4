// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change notifications for renderers and UI collaborators.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::collision::Collision;
use crate::keys::WallId;
use crate::state::{DirtyFlags, EditorState};

/// Event kinds listeners subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    StateChanged,
    SelectionChanged,
    DirtyChanged,
    CommandExecuted,
    CommandUndone,
    CommandRedone,
    CollisionDetected,
}

/// Payloads are immutable snapshots.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    StateChanged {
        revision: u64,
        state: Arc<EditorState>,
    },
    SelectionChanged {
        selected: BTreeSet<WallId>,
    },
    DirtyChanged {
        dirty: DirtyFlags,
    },
    CommandExecuted {
        label: String,
        revision: u64,
    },
    CommandUndone {
        label: String,
        revision: u64,
    },
    CommandRedone {
        label: String,
        revision: u64,
    },
    /// Emitted whenever an edit finds collisions, whether or not it committed.
    CollisionDetected {
        collisions: Arc<[Collision]>,
        committed: bool,
    },
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::StateChanged { .. } => EventKind::StateChanged,
            EngineEvent::SelectionChanged { .. } => EventKind::SelectionChanged,
            EngineEvent::DirtyChanged { .. } => EventKind::DirtyChanged,
            EngineEvent::CommandExecuted { .. } => EventKind::CommandExecuted,
            EngineEvent::CommandUndone { .. } => EventKind::CommandUndone,
            EngineEvent::CommandRedone { .. } => EventKind::CommandRedone,
            EngineEvent::CollisionDetected { .. } => EventKind::CollisionDetected,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type Listener = Box<dyn FnMut(&EngineEvent)>;

/// Synchronous listener registry. Listeners run on the emitting thread in
/// subscription order.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<(SubscriptionId, EventKind, Listener)>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventBus {
    pub fn subscribe(&mut self, kind: EventKind, listener: impl FnMut(&EngineEvent) + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.listeners.push((id, kind, Box::new(listener)));
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _, _)| *sid != id);
        before != self.listeners.len()
    }

    pub fn emit(&mut self, event: &EngineEvent) {
        let kind = event.kind();
        for (_, k, listener) in &mut self.listeners {
            if *k == kind {
                listener(event);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
