// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Snapshot-based undo/redo.
//!
//! A command stores the state before and after an edit. Undo and redo swap
//! whole snapshots instead of replaying operations, so restoring is exact.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::state::EditorState;

/// One recorded edit.
#[derive(Debug, Clone)]
pub struct Command {
    pub label: String,
    /// Milliseconds since the Unix epoch when the edit committed.
    pub timestamp_ms: u64,
    pub before: Arc<EditorState>,
    pub after: Arc<EditorState>,
}

impl Command {
    pub fn new(label: impl Into<String>, before: Arc<EditorState>, after: Arc<EditorState>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            label: label.into(),
            timestamp_ms,
            before,
            after,
        }
    }

    /// State to install when the command is (re)applied.
    pub fn execute(&self) -> Arc<EditorState> {
        Arc::clone(&self.after)
    }

    /// State to install when the command is reverted.
    pub fn undo(&self) -> Arc<EditorState> {
        Arc::clone(&self.before)
    }
}

/// Bounded undo stack plus redo stack.
#[derive(Debug, Clone)]
pub struct CommandHistory {
    undo_stack: VecDeque<Command>,
    redo_stack: Vec<Command>,
    max_history: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(100)
    }
}

impl CommandHistory {
    pub fn new(max_history: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_history,
        }
    }

    /// Records a committed edit. Clears redo and evicts the oldest entry
    /// once the stack exceeds `max_history`.
    pub fn push(&mut self, command: Command) {
        self.redo_stack.clear();
        if self.max_history == 0 {
            return;
        }
        self.undo_stack.push_back(command);
        while self.undo_stack.len() > self.max_history {
            self.undo_stack.pop_front();
        }
    }

    /// Moves the newest command to the redo stack and returns it.
    pub fn undo(&mut self) -> Option<&Command> {
        let command = self.undo_stack.pop_back()?;
        self.redo_stack.push(command);
        self.redo_stack.last()
    }

    /// Moves the newest undone command back to the undo stack and returns it.
    pub fn redo(&mut self) -> Option<&Command> {
        let command = self.redo_stack.pop()?;
        self.undo_stack.push_back(command);
        self.undo_stack.back()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Label of the command `undo` would revert.
    pub fn peek_undo(&self) -> Option<&str> {
        self.undo_stack.back().map(|c| c.label.as_str())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
