//! Creating buffer records, or finding the one that already exists.

use std::path::Path;

use bitflags::bitflags;
use vicore_buffer::Position;

use super::path::{self, FileIdentity};
use super::{BufferId, BufferRecord, BufferRef, BufferRegistry};
use crate::autocmd::AutocmdEvent;
use crate::event::EditorEvent;
use crate::{CoreError, CoreResult};

bitflags! {
    /// How [`BufferRegistry::open_or_reuse`] may satisfy a request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u8 {
        /// The record appears in the buffer list
        const LISTED = 1 << 0;
        /// The empty unnamed current buffer may be recycled
        const CURBUF = 1 << 1;
        /// Always create a record, even if one exists for the path
        const NEW = 1 << 2;
        /// Do not remember the preferred line for the current window
        const NOCURWIN = 1 << 3;
    }
}

impl BufferRegistry {
    /// Returns the record for `path`, creating one if needed.
    ///
    /// `lnum` is a 1-based preferred cursor line, 0 for none. `None` as
    /// the path asks for a new unnamed buffer.
    pub fn open_or_reuse(
        &mut self,
        path: Option<&Path>,
        lnum: usize,
        flags: OpenFlags,
    ) -> CoreResult<BufferRef> {
        let full = path.map(|p| path::full_name(p, &self.cwd));
        let file_id = full.as_deref().and_then(FileIdentity::of);

        if let Some(full) = full.as_deref() {
            if !flags.contains(OpenFlags::NEW) {
                if let Some(id) = self.find_existing(full, file_id) {
                    return self.reopen(id, lnum, flags);
                }
            }
        }

        let id = if flags.contains(OpenFlags::CURBUF) && self.curbuf_reusable() {
            self.recycle_current()?
        } else {
            let id = BufferId::new(self.next_id);
            self.next_id += 1;
            self.order.push(id);
            self.records.insert(id, BufferRecord::new(id));
            tracing::debug!("Created buffer {}", id);
            id
        };

        let short = full.as_deref().map(|f| path::short_name(f, &self.cwd));
        if let Some(record) = self.records.get_mut(&id) {
            record.full_name = full;
            record.short_name = short;
            record.file_id = file_id;
            record.listed = flags.contains(OpenFlags::LISTED);
        }
        if lnum > 0 && !flags.contains(OpenFlags::NOCURWIN) {
            self.remember_line(id, lnum);
        }

        let buf = self.ref_of(id);
        self.events.emit(EditorEvent::BufferCreated(buf));

        self.fire_checked(AutocmdEvent::BufNew, buf)?;
        if flags.contains(OpenFlags::LISTED) {
            self.fire_checked(AutocmdEvent::BufAdd, buf)?;
        }
        Ok(buf)
    }

    /// Opens `path` in the current window, as `:edit` does.
    pub fn edit_file(&mut self, path: &Path, force: bool) -> CoreResult<BufferRef> {
        let full = path::full_name(path, &self.cwd);
        let same = self
            .records
            .get(&self.curbuf)
            .is_some_and(|r| r.full_name.as_deref() == Some(full.as_path()));
        if !same && !force && !self.may_abandon(self.curbuf) {
            return Err(self.decline(CoreError::UnsavedChanges(self.curbuf)));
        }

        let target = self.open_or_reuse(Some(path), 0, OpenFlags::LISTED | OpenFlags::CURBUF)?;
        if target.id() == self.curbuf {
            self.reenter_current()?;
        } else {
            self.switch_current(target, None)?;
        }
        Ok(self.current_buffer())
    }

    /// Finds a record by full name, then by file identity.
    pub(crate) fn find_existing(
        &self,
        full: &Path,
        file_id: Option<FileIdentity>,
    ) -> Option<BufferId> {
        self.iter()
            .find(|r| r.full_name.as_deref() == Some(full))
            .or_else(|| {
                let file_id = file_id?;
                self.iter().find(|r| r.file_id == Some(file_id))
            })
            .map(BufferRecord::id)
    }

    fn reopen(&mut self, id: BufferId, lnum: usize, flags: OpenFlags) -> CoreResult<BufferRef> {
        tracing::debug!("Buffer {} already open", id);
        if lnum > 0 && !flags.contains(OpenFlags::NOCURWIN) {
            self.remember_line(id, lnum);
        }
        let buf = self.ref_of(id);
        let newly_listed = flags.contains(OpenFlags::LISTED)
            && self.records.get(&id).is_some_and(|r| !r.listed);
        if newly_listed {
            if let Some(record) = self.records.get_mut(&id) {
                record.listed = true;
            }
            self.fire_checked(AutocmdEvent::BufAdd, buf)?;
        }
        Ok(buf)
    }

    fn remember_line(&mut self, id: BufferId, lnum: usize) {
        let window = self.windows.current_id();
        if let Some(record) = self.records.get_mut(&id) {
            record.remember(window, Position::line_start(lnum - 1), 0);
        }
    }

    /// Empty, unnamed, unmodified, and in at most one window.
    fn curbuf_reusable(&self) -> bool {
        if !self.options.reuse_empty {
            return false;
        }
        let Some(record) = self.records.get(&self.curbuf) else {
            return false;
        };
        let (lines, empty) = self
            .storage
            .text(self.curbuf)
            .map_or((0, true), |t| (t.len_lines(), t.is_empty()));
        record.nwindows <= 1
            && !self.storage.is_modified(record)
            && record.is_empty_unnamed(lines, empty)
    }

    /// Treats the current buffer as deleted and hands back its number.
    fn recycle_current(&mut self) -> CoreResult<BufferId> {
        let id = self.curbuf;
        let buf = self.ref_of(id);
        tracing::debug!("Reusing empty buffer {}", id);

        if self.records.get(&id).is_some_and(|r| r.is_loaded()) {
            self.fire_locked(AutocmdEvent::BufUnload, buf)?;
        }
        if self.records.get(&id).is_some_and(|r| r.listed) {
            self.fire_locked(AutocmdEvent::BufDelete, buf)?;
        }
        self.fire_locked(AutocmdEvent::BufWipeout, buf)?;
        if self.curbuf != id {
            return Err(self.abort(AutocmdEvent::BufWipeout));
        }

        self.release(id);
        if let Some(record) = self.records.get_mut(&id) {
            record.reset_to_placeholder();
            record.change_tick += 1;
        }
        Ok(id)
    }
}
