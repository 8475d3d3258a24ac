//! Closing, unloading, deleting and wiping buffers.

use super::{BufferId, BufferRef, BufferRegistry, CloseAction, CloseOutcome};
use crate::autocmd::AutocmdEvent;
use crate::event::EditorEvent;
use crate::window::WindowId;
use crate::{CoreError, CoreResult};

impl BufferRegistry {
    /// Closes `buf`, the host-facing form of `:bunload`, `:bdelete` and
    /// `:bwipeout`.
    ///
    /// Windows showing the buffer are closed or switched to another
    /// buffer first. Deleting the only listed buffer turns it into an
    /// empty one instead of removing it.
    pub fn close(
        &mut self,
        buf: BufferRef,
        action: CloseAction,
        force: bool,
    ) -> CoreResult<CloseOutcome> {
        let id = self.resolve(buf)?;
        let Some(record) = self.records.get(&id) else {
            return Err(CoreError::InvalidReference(id));
        };
        if record.lock_count > 0 {
            return Err(self.decline(CoreError::LockedRecord(id)));
        }
        if action != CloseAction::Wipe && !record.is_loaded() && !record.listed {
            return Ok(CloseOutcome::Deleted);
        }
        if !force && record.modified {
            return Err(self.decline(CoreError::UnsavedChanges(id)));
        }
        if self.redrawing && record.nwindows > 0 {
            return Err(self.decline(CoreError::RedrawInProgress));
        }

        let others_listed = self.iter().any(|r| r.listed && r.id() != id);
        if !others_listed && id == self.curbuf {
            return self.empty_current(action);
        }

        // Close windows until the current one shows something else.
        while self.curbuf == id && self.windows.len() > 1 {
            let current = self.windows.current_id();
            if self.close_window_with(current, CloseAction::Hide).is_err() {
                break;
            }
        }

        if id != self.curbuf {
            self.close_windows_showing(id);
            let idle = self.record(buf).is_some_and(|r| r.nwindows == 0);
            if !idle {
                return Ok(CloseOutcome::StillShown);
            }
            return self.close_buffer(None, buf, action);
        }

        let Some(next) = self.pick_replacement(id) else {
            return self.empty_current(action);
        };
        self.switch_current(self.ref_of(next), Some(action))?;
        Ok(self.outcome_of(buf))
    }

    /// Closes `buf` in window `win` (or in no window) with `action`.
    ///
    /// Events fire in a fixed order: BufWinLeave, BufHidden, BufUnload,
    /// BufDelete, BufWipeout. After each one the record is checked again
    /// and the close stops if it is gone or the handler aborted.
    pub(crate) fn close_buffer(
        &mut self,
        win: Option<WindowId>,
        buf: BufferRef,
        action: CloseAction,
    ) -> CoreResult<CloseOutcome> {
        let id = self.resolve(buf)?;
        let Some(record) = self.records.get(&id) else {
            return Err(CoreError::InvalidReference(id));
        };
        if record.lock_count > 0 {
            return Err(self.decline(CoreError::LockedRecord(id)));
        }
        if self.redrawing && record.nwindows > 0 {
            return Err(self.decline(CoreError::RedrawInProgress));
        }

        let Some(record) = self.records.get_mut(&id) else {
            return Err(CoreError::InvalidReference(id));
        };
        let mut action = record.bufhidden.upgrade(action);
        if action.unloads() && record.has_running_job() {
            let stopped = record.job.as_mut().is_some_and(|job| job.try_terminate());
            if stopped {
                tracing::debug!("Stopped job of buffer {}", id);
                record.job = None;
            } else {
                tracing::debug!("Job of buffer {} keeps running, hiding instead", id);
                action = CloseAction::Hide;
            }
        }

        let win = win.filter(|w| {
            self.windows
                .get(*w)
                .is_some_and(|window| window.buffer == Some(id))
        });
        if let Some(w) = win {
            if let Some(window) = self.windows.get(w) {
                let (cursor, topline) = (window.cursor, window.topline);
                if let Some(record) = self.records.get_mut(&id) {
                    record.remember(w, cursor, topline);
                }
            }
            if self.records.get(&id).is_some_and(|r| r.nwindows == 1) {
                self.fire_locked(AutocmdEvent::BufWinLeave, buf)?;
                if !action.unloads() {
                    self.fire_locked(AutocmdEvent::BufHidden, buf)?;
                }
            }
            if let Some(window) = self.windows.get_mut(w) {
                if window.buffer == Some(id) {
                    window.buffer = None;
                    if let Some(record) = self.records.get_mut(&id) {
                        record.nwindows = record.nwindows.saturating_sub(1);
                    }
                }
            }
        }

        let Some(record) = self.records.get(&id) else {
            return Err(CoreError::InvalidReference(id));
        };
        if record.nwindows > 0 {
            return Ok(CloseOutcome::StillShown);
        }
        if !action.unloads() {
            return Ok(CloseOutcome::Hidden);
        }
        // A buffer without a name has nothing to come back to.
        if record.full_name.is_none() {
            action = action.max(CloseAction::Delete);
        }

        let was_current = self.curbuf == id;
        let (loaded, listed) = (record.is_loaded(), record.listed);
        if loaded {
            self.fire_locked(AutocmdEvent::BufUnload, buf)?;
        }
        if action.deletes() && listed {
            self.fire_locked(AutocmdEvent::BufDelete, buf)?;
        }
        if action.wipes() {
            self.fire_locked(AutocmdEvent::BufWipeout, buf)?;
        }
        let reshown = !self.windows.showing(id).is_empty();
        if reshown || (self.curbuf == id && !was_current) {
            return Err(self.abort(AutocmdEvent::BufUnload));
        }

        self.release(id);
        if action.wipes() {
            self.destroy(id);
            return Ok(CloseOutcome::Wiped);
        }
        if let Some(record) = self.records.get_mut(&id) {
            record.change_tick += 1;
            if action.deletes() {
                record.reset_to_placeholder();
                tracing::debug!("Deleted buffer {}", id);
                return Ok(CloseOutcome::Deleted);
            }
        }
        tracing::debug!("Unloaded buffer {}", id);
        Ok(CloseOutcome::Unloaded)
    }

    /// Unlinks a record and advances the epoch.
    fn destroy(&mut self, id: BufferId) {
        self.order.retain(|other| *other != id);
        self.records.remove(&id);
        self.destroy_epoch += 1;
        for window in self.windows.iter_mut() {
            if window.alt == Some(id) {
                window.alt = None;
            }
        }
        tracing::debug!("Wiped buffer {} (epoch {})", id, self.destroy_epoch);
        self.events.emit(EditorEvent::BufferWiped(id));
    }

    /// Turns the current buffer into an empty unnamed one in place.
    fn empty_current(&mut self, action: CloseAction) -> CoreResult<CloseOutcome> {
        if !action.deletes() {
            return Err(self.decline(CoreError::LastBufferGuard));
        }
        let id = self.curbuf;
        let buf = self.ref_of(id);
        self.close_windows_showing(id);

        let (loaded, listed) = self
            .records
            .get(&id)
            .map_or((false, false), |r| (r.is_loaded(), r.listed));
        if loaded {
            self.fire_locked(AutocmdEvent::BufUnload, buf)?;
        }
        if listed {
            self.fire_locked(AutocmdEvent::BufDelete, buf)?;
        }
        if action.wipes() {
            self.fire_locked(AutocmdEvent::BufWipeout, buf)?;
        }
        if self.curbuf != id {
            return Err(self.abort(AutocmdEvent::BufDelete));
        }

        self.release(id);
        if let Some(record) = self.records.get_mut(&id) {
            record.reset_to_placeholder();
            record.full_name = None;
            record.short_name = None;
            record.file_id = None;
            record.listed = true;
        }
        if let Err(e) = self.materialize(id) {
            self.messages.emsg(e.user_message());
        }
        let window = self.windows.current_mut();
        window.cursor = vicore_buffer::Position::ZERO;
        window.topline = 0;

        tracing::debug!("Emptied last buffer {}", id);
        self.events.emit(EditorEvent::BufferEntered(buf));
        Ok(CloseOutcome::Emptied)
    }

    /// Listed buffer to show after `id` goes away.
    ///
    /// The alternate buffer wins, then the nearest loaded listed buffer
    /// after and before `id`, then the nearest unloaded one. `id` may
    /// already be wiped, in which case the whole list is searched from
    /// the end.
    pub(crate) fn pick_replacement(&self, id: BufferId) -> Option<BufferId> {
        let usable = |other: BufferId| {
            other != id && self.records.get(&other).is_some_and(|r| r.listed)
        };
        if let Some(alt) = self.windows.current().alt.filter(|alt| usable(*alt)) {
            return Some(alt);
        }

        let pos = self
            .order
            .iter()
            .position(|other| *other == id)
            .unwrap_or(self.order.len());
        let after = self.order.get(pos + 1..).unwrap_or_default().iter();
        let before = self.order[..pos].iter().rev();
        let mut unloaded = None;
        for other in after.chain(before).copied().filter(|o| usable(*o)) {
            if self.records.get(&other).is_some_and(|r| r.is_loaded()) {
                return Some(other);
            }
            unloaded.get_or_insert(other);
        }
        unloaded
    }

    /// Closes every window but the current one that shows `id`.
    pub(crate) fn close_windows_showing(&mut self, id: BufferId) {
        let current = self.windows.current_id();
        for w in self.windows.showing(id) {
            if w != current && self.windows.len() > 1 {
                if let Err(e) = self.close_window_with(w, CloseAction::Hide) {
                    tracing::debug!("Window {} stays open: {}", w, e);
                }
            }
        }
    }

    fn outcome_of(&self, buf: BufferRef) -> CloseOutcome {
        match self.record(buf) {
            None => CloseOutcome::Wiped,
            Some(r) if r.nwindows > 0 => CloseOutcome::StillShown,
            Some(r) if !r.listed && !r.is_loaded() => CloseOutcome::Deleted,
            Some(r) if !r.is_loaded() => CloseOutcome::Unloaded,
            Some(_) => CloseOutcome::Hidden,
        }
    }
}
