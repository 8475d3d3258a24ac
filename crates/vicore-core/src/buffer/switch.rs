//! Changing the current buffer and the current window.

use vicore_buffer::Position;

use super::{BufferId, BufferRecord, BufferRef, BufferRegistry, CloseAction};
use crate::autocmd::AutocmdEvent;
use crate::event::EditorEvent;
use crate::window::WindowId;
use crate::{CoreError, CoreResult};

impl BufferRegistry {
    /// Makes `target` current, as `:buffer` does.
    ///
    /// A modified current buffer is only abandoned with `force` or when
    /// its hide policy keeps it loaded.
    pub fn goto_buffer(&mut self, target: BufferRef, force: bool) -> CoreResult<()> {
        let id = self.resolve(target)?;
        if id == self.curbuf {
            return Ok(());
        }
        if !force && !self.may_abandon(self.curbuf) {
            return Err(self.decline(CoreError::UnsavedChanges(self.curbuf)));
        }
        self.switch_current(target, None)
    }

    /// Switches to the alternate buffer (`Ctrl-^`, `:b #`).
    pub fn goto_alternate(&mut self, force: bool) -> CoreResult<()> {
        let alt = self.alternate().ok_or(CoreError::NoAlternateFile)?;
        self.goto_buffer(alt, force)
    }

    /// The current window's alternate buffer, if it still exists.
    pub fn alternate(&self) -> Option<BufferRef> {
        self.windows
            .current()
            .alt
            .filter(|id| self.records.contains_key(id))
            .map(|id| self.ref_of(id))
    }

    /// Leaves the current buffer and enters `target`.
    ///
    /// With `action` the outgoing buffer is closed that way; without, it
    /// is unloaded unless it is modified or its hide policy keeps it.
    /// Autocommands may destroy either buffer or switch somewhere else on
    /// their own, so the buffer that ends up current is worked out again
    /// at the end rather than assumed to be `target`.
    pub fn switch_current(
        &mut self,
        target: BufferRef,
        action: Option<CloseAction>,
    ) -> CoreResult<()> {
        self.resolve(target)?;
        let prev = self.current_buffer();
        let win = self.windows.current_id();

        let window = self.windows.current_mut();
        window.alt = Some(prev.id());
        let (cursor, topline) = (window.cursor, window.topline);
        if let Some(record) = self.records.get_mut(&prev.id()) {
            record.remember(win, cursor, topline);
        }
        if let Some(text) = self.storage.text_mut(prev.id()) {
            text.sync_undo();
        }

        let mut aborted = self.fire(AutocmdEvent::BufLeave, prev).is_break();
        if aborted {
            self.abort(AutocmdEvent::BufLeave);
        }

        if !aborted && self.is_valid(prev) && self.is_valid(target) {
            let close_action = match action {
                Some(action) => {
                    if action.unloads() {
                        self.close_windows_showing(prev.id());
                    }
                    action
                }
                None if self.may_unload(prev.id()) => CloseAction::Unload,
                None => CloseAction::Hide,
            };
            let current = self.windows.current_id();
            let shown_here = self.windows.current().buffer == Some(prev.id());
            match self.close_buffer(shown_here.then_some(current), prev, close_action) {
                Ok(outcome) => tracing::debug!("Left buffer {}: {:?}", prev.id(), outcome),
                Err(e) if e.is_declined() => self.detach_current_window(prev.id()),
                Err(_) => aborted = true,
            }
        }

        let detached = self.windows.current().buffer.is_none();
        let target_alive = self.is_valid(target) && self.records.contains_key(&target.id());
        if (target_alive && target.id() != self.curbuf && !aborted) || detached {
            let next = if target_alive {
                target.id()
            } else {
                self.fallback_buffer(prev.id())
            };
            if let Err(e) = self.enter(next) {
                aborted |= matches!(e, CoreError::ReentrancyAbort);
            }
        }

        if aborted {
            return Err(CoreError::ReentrancyAbort);
        }
        Ok(())
    }

    /// Shows `id` in the current window and makes it current.
    ///
    /// Loads the content if it never was, puts the cursor where this
    /// window (or failing that, the most recent one) left it, then fires
    /// BufEnter and BufWinEnter.
    pub(crate) fn enter(&mut self, id: BufferId) -> CoreResult<()> {
        let window = self.windows.current_mut();
        let previous = window.buffer.replace(id);
        if let Some(old) = previous.filter(|old| *old != id) {
            if let Some(record) = self.records.get_mut(&old) {
                record.nwindows = record.nwindows.saturating_sub(1);
            }
        }
        if previous != Some(id) {
            if let Some(record) = self.records.get_mut(&id) {
                record.nwindows += 1;
            }
        }
        self.curbuf = id;
        tracing::debug!("Entering buffer {}", id);
        self.activate(id)
    }

    /// Re-runs the enter sequence for the current buffer, after its
    /// record was recycled for a new file.
    pub(crate) fn reenter_current(&mut self) -> CoreResult<()> {
        self.activate(self.curbuf)
    }

    fn activate(&mut self, id: BufferId) -> CoreResult<()> {
        let buf = self.ref_of(id);
        if self.records.get(&id).is_some_and(|r| !r.is_loaded()) {
            match self.materialize(id) {
                Ok(()) => self.fire_checked(AutocmdEvent::BufReadPost, buf)?,
                Err(e) => self.messages.emsg(e.user_message()),
            }
        }
        self.restore_cursor(id);
        self.fire_checked(AutocmdEvent::BufEnter, buf)?;
        self.fire_checked(AutocmdEvent::BufWinEnter, buf)?;
        self.events.emit(EditorEvent::BufferEntered(buf));
        Ok(())
    }

    fn restore_cursor(&mut self, id: BufferId) {
        let win = self.windows.current_id();
        let default = Position::line_start(self.options.start_line.saturating_sub(1));
        let (cursor, topline) = self
            .records
            .get(&id)
            .and_then(|r| r.cursor_for(win))
            .map_or((default, 0), |info| (info.cursor, info.topline));
        let cursor = self
            .storage
            .text(id)
            .map_or(Position::ZERO, |text| text.clamp(cursor, false));
        let window = self.windows.current_mut();
        window.cursor = cursor;
        window.topline = topline.min(cursor.line);
    }

    /// Buffer to enter when the intended one is gone.
    ///
    /// Prefers another listed buffer, then `leaving` itself if it is
    /// still listed. Only when no listed buffer is left is a fresh empty
    /// one created.
    fn fallback_buffer(&mut self, leaving: BufferId) -> BufferId {
        if let Some(id) = self.pick_replacement(leaving) {
            return id;
        }
        if self.records.get(&leaving).is_some_and(|r| r.listed) {
            return leaving;
        }
        let id = BufferId::new(self.next_id);
        self.next_id += 1;
        let mut record = BufferRecord::new(id);
        record.listed = true;
        self.order.push(id);
        self.records.insert(id, record);
        tracing::debug!("No listed buffer left, created {}", id);
        self.events.emit(EditorEvent::BufferCreated(self.ref_of(id)));
        id
    }

    fn detach_current_window(&mut self, id: BufferId) {
        let window = self.windows.current_mut();
        if window.buffer == Some(id) {
            window.buffer = None;
            if let Some(record) = self.records.get_mut(&id) {
                record.nwindows = record.nwindows.saturating_sub(1);
            }
        }
    }

    /// Modified buffers and those kept by their hide policy stay loaded.
    pub(crate) fn may_abandon(&self, id: BufferId) -> bool {
        self.records
            .get(&id)
            .is_none_or(|r| !r.modified || r.bufhidden.hides(self.options.hidden))
    }

    fn may_unload(&self, id: BufferId) -> bool {
        self.records
            .get(&id)
            .is_some_and(|r| !r.modified && !r.bufhidden.hides(self.options.hidden))
    }

    // ==================== Windows ====================

    /// Splits the current window; both show the current buffer.
    pub fn split_window(&mut self) -> WindowId {
        let (cursor, topline) = {
            let window = self.windows.current();
            (window.cursor, window.topline)
        };
        let id = self.windows.split();
        if let Some(record) = self.records.get_mut(&self.curbuf) {
            record.nwindows += 1;
            record.remember(id, cursor, topline);
        }
        tracing::debug!("Opened window {}", id);
        self.events.emit(EditorEvent::WindowOpened(id));
        id
    }

    /// Closes a window, as `:close` does.
    ///
    /// Its buffer is hidden when modified or kept by policy, unloaded
    /// otherwise. A modified buffer in its last window needs `force`
    /// unless it may be hidden.
    pub fn close_window(&mut self, id: WindowId, force: bool) -> CoreResult<()> {
        if self.windows.len() <= 1 {
            return Err(self.decline(CoreError::LastWindow));
        }
        let window = self.windows.get(id).ok_or(CoreError::WindowNotFound(id))?;
        let shown = window.buffer.and_then(|buf| self.records.get(&buf));
        let (need_hide, hides, buf) = match shown {
            Some(r) => (
                r.modified && r.nwindows <= 1,
                r.bufhidden.hides(self.options.hidden),
                Some(r.id()),
            ),
            None => (false, true, None),
        };
        if let Some(buf) = buf {
            if need_hide && !hides && !force {
                return Err(self.decline(CoreError::UnsavedChanges(buf)));
            }
        }
        let action = if !need_hide && !hides {
            CloseAction::Unload
        } else {
            CloseAction::Hide
        };
        self.close_window_with(id, action)
    }

    pub(crate) fn close_window_with(&mut self, id: WindowId, action: CloseAction) -> CoreResult<()> {
        if self.windows.len() <= 1 {
            return Err(self.decline(CoreError::LastWindow));
        }
        let window = self.windows.get(id).ok_or(CoreError::WindowNotFound(id))?;
        if let Some(buf) = window.buffer {
            let buf = self.ref_of(buf);
            match self.close_buffer(Some(id), buf, action) {
                Ok(_) => {}
                Err(e) if e.is_declined() => return Err(e),
                Err(e) => tracing::debug!("Closing window {} anyway: {}", id, e),
            }
        }

        let was_current = self.windows.current_id() == id;
        let Some(window) = self.windows.remove(id) else {
            // Autocommands already closed it, or it is now the last one.
            return Ok(());
        };
        if let Some(buf) = window.buffer {
            if let Some(record) = self.records.get_mut(&buf) {
                record.nwindows = record.nwindows.saturating_sub(1);
            }
        }
        for record in self.records.values_mut() {
            record.detach_window(id);
        }
        tracing::debug!("Closed window {}", id);
        self.events.emit(EditorEvent::WindowClosed(id));

        if was_current {
            self.follow_current_window();
        }
        Ok(())
    }

    /// Makes another window current.
    pub fn set_current_window(&mut self, id: WindowId) -> CoreResult<()> {
        if !self.windows.set_current(id) {
            return Err(CoreError::WindowNotFound(id));
        }
        self.follow_current_window();
        Ok(())
    }

    /// Points `curbuf` at whatever the current window shows.
    fn follow_current_window(&mut self) {
        let shown = self.windows.current().buffer;
        match shown {
            Some(id) if self.records.contains_key(&id) => {
                if id != self.curbuf {
                    self.curbuf = id;
                    let buf = self.ref_of(id);
                    if self.fire_checked(AutocmdEvent::BufEnter, buf).is_ok() {
                        self.events.emit(EditorEvent::BufferEntered(buf));
                    }
                }
            }
            _ => {
                let id = self.fallback_buffer(shown.unwrap_or(self.curbuf));
                if let Err(e) = self.enter(id) {
                    tracing::debug!("Entering buffer {} after window change: {}", id, e);
                }
            }
        }
    }

    /// Moves the cursor of the current window, clamped to the text.
    pub fn set_cursor(&mut self, pos: Position) {
        let pos = self
            .storage
            .text(self.curbuf)
            .map_or(Position::ZERO, |text| text.clamp(pos, false));
        self.windows.current_mut().cursor = pos;
    }
}
