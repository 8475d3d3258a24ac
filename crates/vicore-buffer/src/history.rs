//! Undo/redo history organised in undo blocks.
//!
//! ## Learning: The Command Pattern
//!
//! Each edit is stored as a value that can be applied, inverted, and
//! re-applied. Edits recorded between two *sync points* form one undo
//! block, so a whole Insert-mode session or a `dd` undoes in one step.
//! The caller decides where the sync points go by calling
//! [`History::sync`].

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// The type of edit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditKind {
    /// Text was inserted
    Insert,
    /// Text was deleted
    Delete,
}

/// A single edit operation, addressed by character index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub kind: EditKind,
    pub position: usize,
    pub content: String,
}

impl Edit {
    /// Creates an insert edit.
    pub fn insert(position: usize, content: impl Into<String>) -> Self {
        Self {
            kind: EditKind::Insert,
            position,
            content: content.into(),
        }
    }

    /// Creates a delete edit.
    pub fn delete(position: usize, content: impl Into<String>) -> Self {
        Self {
            kind: EditKind::Delete,
            position,
            content: content.into(),
        }
    }

    /// Returns the inverse of this edit.
    pub fn inverse(&self) -> Self {
        Self {
            kind: match self.kind {
                EditKind::Insert => EditKind::Delete,
                EditKind::Delete => EditKind::Insert,
            },
            position: self.position,
            content: self.content.clone(),
        }
    }

    /// Number of characters this edit covers.
    pub fn len_chars(&self) -> usize {
        self.content.chars().count()
    }

    /// Returns true if `next` directly continues this edit.
    ///
    /// Typing extends an insert at its end; backspace extends a delete at
    /// its start and forward delete at the same index.
    pub fn can_coalesce(&self, next: &Edit) -> bool {
        if self.kind != next.kind {
            return false;
        }
        match self.kind {
            EditKind::Insert => self.position + self.len_chars() == next.position,
            EditKind::Delete => {
                next.position + next.len_chars() == self.position || next.position == self.position
            }
        }
    }

    /// Merges `next` into this edit. Only valid after [`Edit::can_coalesce`].
    pub fn coalesce(&mut self, next: Edit) {
        match self.kind {
            EditKind::Insert => self.content.push_str(&next.content),
            EditKind::Delete if next.position < self.position => {
                self.content = next.content + &self.content;
                self.position = next.position;
            }
            EditKind::Delete => self.content.push_str(&next.content),
        }
    }
}

/// Edits that are undone and redone together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoBlock {
    pub edits: Vec<Edit>,
}

impl UndoBlock {
    fn push(&mut self, edit: Edit) {
        match self.edits.last_mut() {
            Some(last) if last.can_coalesce(&edit) => last.coalesce(edit),
            _ => self.edits.push(edit),
        }
    }

    /// Character index where the first edit of the block happened.
    pub fn first_position(&self) -> Option<usize> {
        self.edits.first().map(|e| e.position)
    }
}

/// Bounded undo/redo history.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<UndoBlock>,
    redo_stack: Vec<UndoBlock>,
    max_blocks: usize,
    /// When true the next edit opens a new block.
    synced: bool,
}

impl History {
    /// Creates a history keeping at most `max_blocks` undo blocks.
    pub fn new(max_blocks: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_blocks: max_blocks.max(1),
            synced: true,
        }
    }

    /// Records an edit. Clears the redo stack.
    pub fn push(&mut self, edit: Edit) {
        self.redo_stack.clear();

        if self.synced {
            self.undo_stack.push_back(UndoBlock::default());
            self.synced = false;
        }
        if let Some(block) = self.undo_stack.back_mut() {
            block.push(edit);
        }

        while self.undo_stack.len() > self.max_blocks {
            self.undo_stack.pop_front();
        }
    }

    /// Closes the current undo block.
    pub fn sync(&mut self) {
        self.synced = true;
    }

    /// Pops the most recent block for undoing.
    ///
    /// The caller applies the inverse of each edit in reverse order.
    pub fn undo(&mut self) -> Option<UndoBlock> {
        self.synced = true;
        let block = self.undo_stack.pop_back()?;
        self.redo_stack.push(block.clone());
        Some(block)
    }

    /// Pops the most recently undone block for redoing.
    pub fn redo(&mut self) -> Option<UndoBlock> {
        self.synced = true;
        let block = self.redo_stack.pop()?;
        self.undo_stack.push_back(block.clone());
        Some(block)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Drops all history.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.synced = true;
    }

    /// Returns the number of undo blocks available.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_inverse() {
        let insert = Edit::insert(0, "hello");
        let inverse = insert.inverse();

        assert_eq!(inverse.kind, EditKind::Delete);
        assert_eq!(inverse.position, 0);
        assert_eq!(inverse.content, "hello");
    }

    #[test]
    fn test_edits_between_syncs_share_a_block() {
        let mut history = History::new(100);
        history.push(Edit::insert(0, "a"));
        history.push(Edit::insert(1, "b"));
        history.sync();
        history.push(Edit::insert(2, "c"));

        assert_eq!(history.undo_count(), 2);
        let block = history.undo().unwrap();
        assert_eq!(block.edits, vec![Edit::insert(2, "c")]);
        let block = history.undo().unwrap();
        assert_eq!(block.edits, vec![Edit::insert(0, "ab")]);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_redo_cleared_by_new_edit() {
        let mut history = History::new(100);
        history.push(Edit::insert(0, "a"));
        history.undo();
        assert!(history.can_redo());

        history.push(Edit::insert(0, "b"));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_backspace_coalescing() {
        let mut e1 = Edit::delete(5, "e");
        let e2 = Edit::delete(4, "d");

        assert!(e1.can_coalesce(&e2));
        e1.coalesce(e2);
        assert_eq!(e1.content, "de");
        assert_eq!(e1.position, 4);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = History::new(2);
        for i in 0..3 {
            history.push(Edit::insert(i * 10, "x"));
            history.sync();
        }
        assert_eq!(history.undo_count(), 2);
    }
}
