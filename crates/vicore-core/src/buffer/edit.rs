//! Text edits and cursor motions on the current buffer.
//!
//! Every content change goes through [`BufferRegistry::touch`], which
//! bumps the record's change tick and refreshes its modified flag.
//! Edits on a buffer whose content is not loaded do nothing.

use vicore_buffer::{BufferError, Position};

use super::{BufferId, BufferRegistry};
use crate::CoreResult;

impl BufferRegistry {
    /// Inserts `s` at the cursor and moves the cursor after it.
    pub fn insert_text(&mut self, s: &str) -> CoreResult<()> {
        let id = self.curbuf;
        let cursor = self.cursor();
        let Some(text) = self.storage.text_mut(id) else {
            return Ok(());
        };
        let pos = text.clamp(cursor, true);
        let idx = text.position_to_char_idx(pos)?;
        text.insert(idx, s)?;
        let end = text.char_idx_to_position(idx + s.chars().count())?;
        self.windows.current_mut().cursor = end;
        self.touch(id);
        Ok(())
    }

    /// Deletes the character before the cursor, joining lines at the
    /// start of a line. Returns false at the start of the buffer.
    pub fn delete_before_cursor(&mut self) -> CoreResult<bool> {
        let id = self.curbuf;
        let cursor = self.cursor();
        let Some(text) = self.storage.text_mut(id) else {
            return Ok(false);
        };
        let idx = text.position_to_char_idx(text.clamp(cursor, true))?;
        if idx == 0 {
            return Ok(false);
        }
        let mut start = idx - 1;
        if start > 0 && text.slice(start - 1..idx)? == "\r\n" {
            start -= 1;
        }
        text.delete(start..idx)?;
        let pos = text.char_idx_to_position(start)?;
        self.windows.current_mut().cursor = pos;
        self.touch(id);
        Ok(true)
    }

    /// Deletes up to `count` characters under and after the cursor (`x`).
    pub fn delete_under_cursor(&mut self, count: usize) -> CoreResult<String> {
        let id = self.curbuf;
        let cursor = self.cursor();
        let Some(text) = self.storage.text_mut(id) else {
            return Ok(String::new());
        };
        let pos = text.clamp(cursor, false);
        let len = text.line_len(pos.line)?;
        if len == 0 {
            return Ok(String::new());
        }
        let idx = text.position_to_char_idx(pos)?;
        let n = count.max(1).min(len - pos.column);
        let deleted = text.delete(idx..idx + n)?;
        let pos = text.clamp(pos, false);
        self.windows.current_mut().cursor = pos;
        self.touch(id);
        Ok(deleted)
    }

    /// Deletes `count` lines starting at the cursor line (`dd`).
    pub fn delete_lines(&mut self, count: usize) -> CoreResult<String> {
        let id = self.curbuf;
        let line = self.cursor().line;
        let Some(text) = self.storage.text_mut(id) else {
            return Ok(String::new());
        };
        let deleted = text.delete_lines(line..line + count.max(1))?;
        let pos = text.clamp(Position::line_start(line), false);
        self.windows.current_mut().cursor = pos;
        self.touch(id);
        Ok(deleted)
    }

    /// Opens a new line below the cursor line and moves onto it (`o`).
    pub fn open_line_below(&mut self) -> CoreResult<()> {
        let line = self.cursor().line;
        let Some(len) = self
            .storage
            .text(self.curbuf)
            .and_then(|text| text.line_len(line).ok())
        else {
            return Ok(());
        };
        self.windows.current_mut().cursor = Position::new(line, len);
        self.insert_text("\n")
    }

    // ==================== Undo ====================

    /// Undoes up to `count` changes.
    pub fn undo(&mut self, count: usize) -> CoreResult<()> {
        self.undo_redo(count, true)
    }

    /// Redoes up to `count` changes.
    pub fn redo(&mut self, count: usize) -> CoreResult<()> {
        self.undo_redo(count, false)
    }

    fn undo_redo(&mut self, count: usize, undo: bool) -> CoreResult<()> {
        let id = self.curbuf;
        let Some(text) = self.storage.text_mut(id) else {
            return Ok(());
        };
        text.sync_undo();
        let mut last = None;
        for _ in 0..count.max(1) {
            let step = if undo { text.undo() } else { text.redo() };
            match step {
                Ok(pos) => last = Some(pos),
                Err(BufferError::NothingToUndo) | Err(BufferError::NothingToRedo) => break,
                Err(e) => return Err(e.into()),
            }
        }
        let Some(pos) = last else {
            let msg = if undo {
                "Already at oldest change"
            } else {
                "Already at newest change"
            };
            self.messages.msg(msg);
            return Ok(());
        };
        let pos = text.clamp(pos, false);
        self.windows.current_mut().cursor = pos;
        self.touch(id);
        Ok(())
    }

    /// Ends the current undo block.
    pub fn sync_undo(&mut self) {
        if let Some(text) = self.storage.text_mut(self.curbuf) {
            text.sync_undo();
        }
    }

    /// Cursor fix-up when Insert mode ends: one left, onto a character.
    pub fn leave_insert(&mut self) {
        self.sync_undo();
        let cursor = self.cursor();
        let left = cursor.with_column(cursor.column.saturating_sub(1));
        self.set_cursor(left);
    }

    // ==================== Motions ====================

    pub fn move_left(&mut self, count: usize) {
        let cursor = self.cursor();
        self.set_cursor(cursor.with_column(cursor.column.saturating_sub(count)));
    }

    /// Moves right; `past_end` lets the cursor sit after the last
    /// character, as in Insert mode.
    pub fn move_right(&mut self, count: usize, past_end: bool) {
        let cursor = self.cursor().with_column(self.cursor().column + count);
        self.place_cursor(cursor, past_end);
    }

    pub fn move_up(&mut self, count: usize) {
        let cursor = self.cursor();
        self.set_cursor(cursor.with_line(cursor.line.saturating_sub(count)));
    }

    pub fn move_down(&mut self, count: usize) {
        let cursor = self.cursor();
        self.set_cursor(cursor.with_line(cursor.line.saturating_add(count)));
    }

    pub fn move_line_start(&mut self) {
        let cursor = self.cursor();
        self.set_cursor(cursor.with_column(0));
    }

    pub fn move_line_end(&mut self, past_end: bool) {
        let cursor = self.cursor().with_column(usize::MAX);
        self.place_cursor(cursor, past_end);
    }

    /// Goes to 1-based line `line`, or the last line for `None`.
    pub fn goto_line(&mut self, line: Option<usize>) {
        let last = self.line_count().saturating_sub(1);
        let target = line.map_or(last, |l| l.saturating_sub(1).min(last));
        self.set_cursor(Position::line_start(target));
    }

    /// Lines in the current buffer.
    pub fn line_count(&self) -> usize {
        self.storage.line_count(self.curbuf)
    }

    fn place_cursor(&mut self, pos: Position, past_end: bool) {
        let pos = self
            .storage
            .text(self.curbuf)
            .map_or(Position::ZERO, |text| text.clamp(pos, past_end));
        self.windows.current_mut().cursor = pos;
    }

    /// Records a content change.
    fn touch(&mut self, id: BufferId) {
        let Some(record) = self.records.get(&id) else {
            return;
        };
        let modified = self.storage.is_modified(record);
        if let Some(record) = self.records.get_mut(&id) {
            record.modified = modified;
            record.change_tick += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(registry: &BufferRegistry) -> String {
        registry.current_text().unwrap().text().into_owned()
    }

    #[test]
    fn test_insert_moves_cursor_and_ticks() {
        let mut registry = BufferRegistry::default();
        let buf = registry.current_buffer();
        let tick = registry.record(buf).unwrap().change_tick();

        registry.insert_text("hello\nwor").unwrap();
        assert_eq!(text_of(&registry), "hello\nwor");
        assert_eq!(registry.cursor(), Position::new(1, 3));
        let record = registry.record(buf).unwrap();
        assert!(record.is_modified());
        assert!(record.change_tick() > tick);
    }

    #[test]
    fn test_newline_at_end_moves_onto_new_line() {
        let mut registry = BufferRegistry::default();
        registry.insert_text("one").unwrap();
        registry.insert_text("\n").unwrap();
        assert_eq!(registry.cursor(), Position::new(1, 0));
        registry.insert_text("two").unwrap();
        assert_eq!(text_of(&registry), "one\ntwo");

        registry.open_line_below().unwrap();
        assert_eq!(registry.cursor(), Position::new(2, 0));
        registry.goto_line(None);
        assert_eq!(registry.cursor().line, 2);
    }

    #[test]
    fn test_backspace_joins_lines() {
        let mut registry = BufferRegistry::default();
        registry.insert_text("ab\ncd").unwrap();
        registry.move_line_start();
        assert!(registry.delete_before_cursor().unwrap());
        assert_eq!(text_of(&registry), "abcd");
        assert_eq!(registry.cursor(), Position::new(0, 2));

        registry.set_cursor(Position::ZERO);
        assert!(!registry.delete_before_cursor().unwrap());
    }

    #[test]
    fn test_x_and_dd() {
        let mut registry = BufferRegistry::default();
        registry.insert_text("one\ntwo\nthree").unwrap();
        registry.goto_line(Some(1));
        assert_eq!(registry.delete_under_cursor(2).unwrap(), "on");
        assert_eq!(text_of(&registry), "e\ntwo\nthree");

        registry.delete_lines(2).unwrap();
        assert_eq!(text_of(&registry), "three");
        assert_eq!(registry.cursor(), Position::ZERO);
    }

    #[test]
    fn test_undo_redo_restore_text() {
        let mut registry = BufferRegistry::default();
        registry.insert_text("first").unwrap();
        registry.sync_undo();
        registry.insert_text(" second").unwrap();

        registry.undo(1).unwrap();
        assert_eq!(text_of(&registry), "first");
        registry.undo(1).unwrap();
        assert_eq!(text_of(&registry), "");
        registry.undo(1).unwrap();
        assert_eq!(
            registry.messages().last().map(|m| m.text.as_str()),
            Some("Already at oldest change")
        );
        registry.redo(2).unwrap();
        assert_eq!(text_of(&registry), "first second");
    }

    #[test]
    fn test_motions_clamp() {
        let mut registry = BufferRegistry::default();
        registry.insert_text("abc\nde").unwrap();
        registry.goto_line(Some(1));
        registry.move_line_end(false);
        assert_eq!(registry.cursor(), Position::new(0, 2));
        registry.move_down(5);
        assert_eq!(registry.cursor(), Position::new(1, 1));
        registry.move_right(3, true);
        assert_eq!(registry.cursor(), Position::new(1, 2));
        registry.goto_line(None);
        assert_eq!(registry.cursor().line, 1);
    }
}
