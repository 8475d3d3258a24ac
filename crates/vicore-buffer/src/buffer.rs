//! Rope-backed text content for one buffer record.
//!
//! ## Why Rope?
//!
//! Ropes give O(log n) insertion and deletion anywhere in the text, which
//! keeps Insert mode cheap even at the end of a very large file.
//!
//! ## Learning: Ownership in Action
//!
//! ```rust,ignore
//! let buffer = TextBuffer::new();  // buffer OWNS the rope
//! let line = buffer.line(0)?;      // line BORROWS from buffer
//! // buffer.insert(0, "x");        // ERROR! Can't mutate while borrowed
//! drop(line);
//! buffer.insert(0, "x")?;          // Now OK!
//! ```

use ropey::Rope;
use std::borrow::Cow;
use std::ops::Range;
use std::path::Path;

use crate::history::{EditKind, History, Edit};
use crate::{BufferError, BufferResult, Position};

/// Default number of undo blocks kept per buffer.
pub const DEFAULT_UNDO_LEVELS: usize = 1000;

/// Text content plus its undo history.
///
/// Every successful mutation (including undo and redo) bumps the change
/// tick, which is how callers notice that content moved under them.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    rope: Rope,
    history: History,
    modified: bool,
    change_tick: u64,
}

impl TextBuffer {
    /// Creates a new empty buffer.
    ///
    /// # Example
    /// ```
    /// use vicore_buffer::TextBuffer;
    ///
    /// let buffer = TextBuffer::new();
    /// assert!(buffer.is_empty());
    /// assert_eq!(buffer.len_lines(), 1);
    /// ```
    pub fn new() -> Self {
        Self::with_undo_levels(DEFAULT_UNDO_LEVELS)
    }

    /// Creates an empty buffer keeping at most `levels` undo blocks.
    pub fn with_undo_levels(levels: usize) -> Self {
        Self {
            rope: Rope::new(),
            history: History::new(levels),
            modified: false,
            change_tick: 0,
        }
    }

    /// Reads a buffer from a file.
    pub fn from_file(path: impl AsRef<Path>) -> BufferResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::from(content.as_str()))
    }

    // ==================== Text Access ====================

    /// Returns the entire text.
    pub fn text(&self) -> Cow<'_, str> {
        self.rope.slice(..).into()
    }

    /// Returns line `line_idx` without its line break.
    pub fn line(&self, line_idx: usize) -> BufferResult<Cow<'_, str>> {
        if line_idx >= self.len_lines() {
            return Err(BufferError::PositionOutOfBounds {
                line: line_idx,
                column: 0,
            });
        }
        let line = self.rope.line(line_idx);
        let len = Self::content_len(line);
        Ok(line.slice(..len).into())
    }

    /// Returns a slice of text by character range.
    pub fn slice(&self, range: Range<usize>) -> BufferResult<Cow<'_, str>> {
        if range.start > range.end || range.end > self.len_chars() {
            return Err(BufferError::InvalidCharIndex(range.end));
        }
        Ok(self.rope.slice(range).into())
    }

    // ==================== Measurements ====================

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    #[inline]
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// Number of lines. An empty buffer has one (empty) line, and a
    /// trailing newline opens an empty last line the cursor can sit on.
    #[inline]
    pub fn len_lines(&self) -> usize {
        self.rope.len_lines()
    }

    /// Length of a line in characters, excluding the line break.
    pub fn line_len(&self, line_idx: usize) -> BufferResult<usize> {
        if line_idx >= self.len_lines() {
            return Err(BufferError::PositionOutOfBounds {
                line: line_idx,
                column: 0,
            });
        }
        Ok(Self::content_len(self.rope.line(line_idx)))
    }

    fn content_len(line: ropey::RopeSlice<'_>) -> usize {
        let len = line.len_chars();
        if len > 0 && line.char(len - 1) == '\n' {
            if len > 1 && line.char(len - 2) == '\r' {
                len - 2
            } else {
                len - 1
            }
        } else {
            len
        }
    }

    // ==================== Mutations ====================

    /// Inserts text at a character index.
    pub fn insert(&mut self, char_idx: usize, text: &str) -> BufferResult<()> {
        if char_idx > self.len_chars() {
            return Err(BufferError::InvalidCharIndex(char_idx));
        }
        if text.is_empty() {
            return Ok(());
        }

        self.history.push(Edit::insert(char_idx, text));
        self.rope.insert(char_idx, text);
        self.touch();
        Ok(())
    }

    /// Inserts text at a line/column position.
    pub fn insert_at(&mut self, pos: Position, text: &str) -> BufferResult<()> {
        let char_idx = self.position_to_char_idx(pos)?;
        self.insert(char_idx, text)
    }

    /// Deletes a character range and returns the removed text.
    pub fn delete(&mut self, range: Range<usize>) -> BufferResult<String> {
        if range.start > range.end || range.end > self.len_chars() {
            return Err(BufferError::InvalidCharIndex(range.end));
        }
        if range.is_empty() {
            return Ok(String::new());
        }

        let deleted: String = self.rope.slice(range.clone()).into();
        self.history.push(Edit::delete(range.start, deleted.clone()));
        self.rope.remove(range);
        self.touch();
        Ok(deleted)
    }

    /// Deletes whole lines `lines`, including their line breaks.
    ///
    /// Deleting every line leaves one empty line behind.
    pub fn delete_lines(&mut self, lines: Range<usize>) -> BufferResult<String> {
        let total = self.len_lines();
        if lines.start >= total || lines.start >= lines.end {
            return Err(BufferError::PositionOutOfBounds {
                line: lines.start,
                column: 0,
            });
        }
        let end_line = lines.end.min(total);
        let mut start = self.rope.line_to_char(lines.start);
        let end = if end_line < total {
            self.rope.line_to_char(end_line)
        } else {
            self.len_chars()
        };
        // Removing the tail of the buffer also takes the preceding line break.
        if end_line == total && lines.start > 0 && end == self.len_chars() {
            let prev = self.rope.line(lines.start - 1);
            let brk = prev.len_chars() - Self::content_len(prev);
            start -= brk;
        }
        self.delete(start..end)
    }

    // ==================== Undo/Redo ====================

    /// Closes the current undo block.
    pub fn sync_undo(&mut self) {
        self.history.sync();
    }

    /// Undoes the last block and returns where the cursor should go.
    pub fn undo(&mut self) -> BufferResult<Position> {
        let block = self.history.undo().ok_or(BufferError::NothingToUndo)?;

        for edit in block.edits.iter().rev() {
            self.apply_raw(&edit.inverse());
        }
        self.touch();
        let idx = block.first_position().unwrap_or(0).min(self.len_chars());
        self.char_idx_to_position(idx)
    }

    /// Redoes the last undone block and returns where the cursor should go.
    pub fn redo(&mut self) -> BufferResult<Position> {
        let block = self.history.redo().ok_or(BufferError::NothingToRedo)?;

        for edit in &block.edits {
            self.apply_raw(edit);
        }
        self.touch();
        let idx = block.first_position().unwrap_or(0).min(self.len_chars());
        self.char_idx_to_position(idx)
    }

    /// Applies an edit without recording it.
    fn apply_raw(&mut self, edit: &Edit) {
        match edit.kind {
            EditKind::Insert => self.rope.insert(edit.position, &edit.content),
            EditKind::Delete => {
                let end = edit.position + edit.len_chars();
                self.rope.remove(edit.position..end);
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ==================== Position Conversion ====================

    /// Converts a position to a character index.
    ///
    /// The column may sit one past the last character (for appending).
    pub fn position_to_char_idx(&self, pos: Position) -> BufferResult<usize> {
        let line_len = self.line_len(pos.line)?;
        if pos.column > line_len {
            return Err(BufferError::PositionOutOfBounds {
                line: pos.line,
                column: pos.column,
            });
        }
        Ok(self.rope.line_to_char(pos.line) + pos.column)
    }

    /// Converts a character index to a position.
    pub fn char_idx_to_position(&self, char_idx: usize) -> BufferResult<Position> {
        if char_idx > self.len_chars() {
            return Err(BufferError::InvalidCharIndex(char_idx));
        }
        let line = self.rope.char_to_line(char_idx);
        let column = char_idx - self.rope.line_to_char(line);
        Ok(Position::new(line, column))
    }

    /// Clamps a position into the buffer.
    ///
    /// With `past_end` the column may sit after the last character, as in
    /// Insert mode; otherwise it stops on the last character, as in Normal
    /// mode.
    pub fn clamp(&self, pos: Position, past_end: bool) -> Position {
        let line = pos.line.min(self.len_lines() - 1);
        let len = self.line_len(line).unwrap_or(0);
        let max_col = if past_end { len } else { len.saturating_sub(1) };
        Position::new(line, pos.column.min(max_col))
    }

    // ==================== State Queries ====================

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Marks the content as matching what is on disk.
    pub fn set_unmodified(&mut self) {
        self.modified = false;
    }

    /// Counter bumped on every content change.
    pub fn change_tick(&self) -> u64 {
        self.change_tick
    }

    fn touch(&mut self) {
        self.modified = true;
        self.change_tick += 1;
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TextBuffer {
    fn from(s: &str) -> Self {
        Self {
            rope: Rope::from_str(s),
            ..Self::new()
        }
    }
}

impl From<String> for TextBuffer {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_newline_opens_empty_line() {
        let buffer = TextBuffer::from("one\ntwo\n");
        assert_eq!(buffer.len_lines(), 3);
        assert_eq!(buffer.line(1).unwrap(), "two");
        assert_eq!(buffer.line(2).unwrap(), "");
        assert_eq!(buffer.line_len(0).unwrap(), 3);
    }

    #[test]
    fn test_crlf_line_len() {
        let buffer = TextBuffer::from("ab\r\ncd");
        assert_eq!(buffer.line_len(0).unwrap(), 2);
        assert_eq!(buffer.line(0).unwrap(), "ab");
    }

    #[test]
    fn test_change_tick_counts_mutations() {
        let mut buffer = TextBuffer::new();
        assert_eq!(buffer.change_tick(), 0);
        buffer.insert(0, "hi").unwrap();
        buffer.delete(0..1).unwrap();
        assert_eq!(buffer.change_tick(), 2);
        buffer.undo().unwrap();
        assert_eq!(buffer.change_tick(), 3);
    }

    #[test]
    fn test_undo_block_restores_text_and_cursor() {
        let mut buffer = TextBuffer::from("hello");
        buffer.insert(5, " ").unwrap();
        buffer.insert(6, "world").unwrap();
        buffer.sync_undo();

        let pos = buffer.undo().unwrap();
        assert_eq!(buffer.text(), "hello");
        assert_eq!(pos, Position::new(0, 5));

        buffer.redo().unwrap();
        assert_eq!(buffer.text(), "hello world");
    }

    #[test]
    fn test_delete_middle_line() {
        let mut buffer = TextBuffer::from("a\nb\nc\n");
        let removed = buffer.delete_lines(1..2).unwrap();
        assert_eq!(removed, "b\n");
        assert_eq!(buffer.text(), "a\nc\n");
    }

    #[test]
    fn test_delete_last_line_takes_previous_break() {
        let mut buffer = TextBuffer::from("a\nb");
        buffer.delete_lines(1..2).unwrap();
        assert_eq!(buffer.text(), "a");
        assert_eq!(buffer.len_lines(), 1);
    }

    #[test]
    fn test_delete_only_line_leaves_empty_buffer() {
        let mut buffer = TextBuffer::from("only\n");
        buffer.delete_lines(0..1).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len_lines(), 1);
    }

    #[test]
    fn test_clamp() {
        let buffer = TextBuffer::from("abc\nde");
        assert_eq!(buffer.clamp(Position::new(9, 9), false), Position::new(1, 1));
        assert_eq!(buffer.clamp(Position::new(0, 9), true), Position::new(0, 3));
        let empty = TextBuffer::new();
        assert_eq!(empty.clamp(Position::new(3, 3), false), Position::ZERO);
    }

    #[test]
    fn test_index_after_final_break_is_on_new_line() {
        let mut buffer = TextBuffer::from("ab");
        buffer.insert(2, "\n").unwrap();
        let pos = buffer.char_idx_to_position(3).unwrap();
        assert_eq!(pos, Position::new(1, 0));
        assert_eq!(buffer.clamp(pos, true), pos);
        assert_eq!(buffer.position_to_char_idx(pos).unwrap(), 3);

        buffer.insert_at(pos, "cd").unwrap();
        assert_eq!(buffer.text(), "ab\ncd");
    }
}
