//! The buffer registry: every open buffer, the windows showing them, and
//! the autocommands that fire while they come and go.
//!
//! ## Learning: Arena Plus Handles
//!
//! Records live in one map owned by [`BufferRegistry`]. Everything else
//! names them by [`BufferRef`], an `(id, epoch)` pair. The registry bumps
//! `destroy_epoch` each time a record is destroyed, so
//!
//! ```text
//! is_valid(r) = r.epoch == destroy_epoch   // nothing died since r was made
//!            || index.contains(r.id)       // something died, but not r
//! ```
//!
//! Each multi-step operation follows the same rhythm: capture a ref, fire
//! an event, re-check the ref, and stop if it no longer resolves or the
//! handler asked to abort.

mod close;
mod edit;
mod handle;
mod list;
mod open;
mod path;
mod record;
mod switch;

pub use handle::{BufferId, BufferRef};
pub use list::BufferSummary;
pub use open::OpenFlags;
pub use path::FileIdentity;
pub use record::{
    BufHidden, BufferRecord, CloseAction, CloseOutcome, JobHandle, LoadState, WinInfo,
};

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::PathBuf;

use vicore_buffer::{Position, TextBuffer};

use crate::autocmd::{AutocmdEvent, AutocmdHandler};
use crate::config::Config;
use crate::event::EventBus;
use crate::message::Messages;
use crate::storage::{RopeStorage, TextStorage};
use crate::window::{WindowId, WindowList};
use crate::{CoreError, CoreResult};

/// Registry-wide settings.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Keep abandoned buffers loaded
    pub hidden: bool,
    /// Recycle the empty unnamed current buffer when opening a file
    pub reuse_empty: bool,
    /// 1-based line for buffers without a remembered cursor
    pub start_line: usize,
    /// Messages kept in the log
    pub message_history: usize,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RegistryOptions {
    fn from(config: &Config) -> Self {
        Self {
            hidden: config.buffers.hidden,
            reuse_empty: config.buffers.reuse_empty,
            start_line: config.buffers.start_line.max(1),
            message_history: config.messages.history,
        }
    }
}

/// Owner of all buffer records.
///
/// There is always a current window and it always shows the current
/// buffer once an operation has finished.
pub struct BufferRegistry {
    /// Insertion order, for listing
    order: Vec<BufferId>,
    records: HashMap<BufferId, BufferRecord>,
    next_id: u32,
    destroy_epoch: u64,
    curbuf: BufferId,
    windows: WindowList,
    storage: Box<dyn TextStorage>,
    /// Taken out while a handler runs
    autocmds: Option<Box<dyn AutocmdHandler>>,
    events: EventBus,
    messages: Messages,
    options: RegistryOptions,
    redrawing: bool,
    cwd: PathBuf,
}

impl BufferRegistry {
    /// Creates a registry holding one empty, listed buffer in one window.
    pub fn new(options: RegistryOptions, storage: Box<dyn TextStorage>) -> Self {
        let first = BufferId::new(1);
        let mut record = BufferRecord::new(first);
        record.listed = true;
        record.nwindows = 1;

        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let mut registry = Self {
            order: vec![first],
            records: HashMap::new(),
            next_id: 2,
            destroy_epoch: 0,
            curbuf: first,
            windows: WindowList::new(first),
            storage,
            autocmds: None,
            events: EventBus::new(),
            messages: Messages::new(options.message_history),
            options,
            redrawing: false,
            cwd,
        };
        registry.records.insert(first, record);
        if let Err(e) = registry.materialize(first) {
            tracing::warn!("Could not create initial buffer: {}", e);
        }
        registry
    }

    /// Creates a registry with rope storage configured from `config`.
    pub fn from_config(config: &Config) -> Self {
        let storage = RopeStorage::new(config.buffers.undo_levels);
        Self::new(RegistryOptions::from(config), Box::new(storage))
    }

    // ==================== References ====================

    /// Captures a reference to the live record `id` at the current epoch.
    ///
    /// Returns `None` when no record has that number.
    pub fn make_ref(&self, id: BufferId) -> Option<BufferRef> {
        self.records.contains_key(&id).then(|| self.ref_of(id))
    }

    /// Reference to `id`, which the caller knows to be live.
    pub(crate) fn ref_of(&self, id: BufferId) -> BufferRef {
        BufferRef::new(id, self.destroy_epoch)
    }

    /// Whether `buf` still names a live record.
    pub fn is_valid(&self, buf: BufferRef) -> bool {
        buf.epoch() == self.destroy_epoch || self.records.contains_key(&buf.id())
    }

    /// Number of records destroyed so far.
    pub fn destroy_epoch(&self) -> u64 {
        self.destroy_epoch
    }

    pub(crate) fn resolve(&self, buf: BufferRef) -> CoreResult<BufferId> {
        if self.is_valid(buf) && self.records.contains_key(&buf.id()) {
            Ok(buf.id())
        } else {
            Err(CoreError::InvalidReference(buf.id()))
        }
    }

    /// The record behind `buf`, if it is still alive.
    pub fn record(&self, buf: BufferRef) -> Option<&BufferRecord> {
        if self.is_valid(buf) {
            self.records.get(&buf.id())
        } else {
            None
        }
    }

    pub fn get(&self, id: BufferId) -> Option<&BufferRecord> {
        self.records.get(&id)
    }

    /// All records in list order.
    pub fn iter(&self) -> impl Iterator<Item = &BufferRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ==================== Current State ====================

    pub fn current_buffer(&self) -> BufferRef {
        self.ref_of(self.curbuf)
    }

    pub fn current_window(&self) -> WindowId {
        self.windows.current_id()
    }

    pub fn windows(&self) -> &WindowList {
        &self.windows
    }

    /// Cursor of the current window.
    pub fn cursor(&self) -> Position {
        self.windows.current().cursor
    }

    /// Text of a buffer, if it is loaded.
    pub fn text(&self, buf: BufferRef) -> Option<&TextBuffer> {
        self.record(buf)?;
        self.storage.text(buf.id())
    }

    /// Text of the current buffer.
    pub fn current_text(&self) -> Option<&TextBuffer> {
        self.storage.text(self.curbuf)
    }

    pub fn storage(&self) -> &dyn TextStorage {
        self.storage.as_ref()
    }

    // ==================== Options ====================

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.options.hidden = hidden;
    }

    /// Marks a full redraw as running; closing shown buffers is refused
    /// until it ends.
    pub fn set_redrawing(&mut self, redrawing: bool) {
        self.redrawing = redrawing;
    }

    pub fn set_bufhidden(&mut self, buf: BufferRef, policy: BufHidden) -> CoreResult<()> {
        let id = self.resolve(buf)?;
        if let Some(record) = self.records.get_mut(&id) {
            record.bufhidden = policy;
        }
        Ok(())
    }

    /// Attaches a running process to a buffer.
    pub fn attach_job(&mut self, buf: BufferRef, job: Box<dyn JobHandle>) -> CoreResult<()> {
        let id = self.resolve(buf)?;
        if let Some(record) = self.records.get_mut(&id) {
            record.job = Some(job);
        }
        Ok(())
    }

    // ==================== Collaborators ====================

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut Messages {
        &mut self.messages
    }

    /// Installs the autocommand handler, returning the previous one.
    pub fn set_autocmd_handler(
        &mut self,
        handler: Box<dyn AutocmdHandler>,
    ) -> Option<Box<dyn AutocmdHandler>> {
        self.autocmds.replace(handler)
    }

    pub fn take_autocmd_handler(&mut self) -> Option<Box<dyn AutocmdHandler>> {
        self.autocmds.take()
    }

    /// Puts an error in the message log unless the registry already did.
    pub fn report_error(&mut self, err: &CoreError) {
        if !err.is_reported() {
            self.messages.emsg(err.user_message());
        }
    }

    // ==================== Internals ====================

    /// Logs and returns a refused operation.
    pub(crate) fn decline(&mut self, err: CoreError) -> CoreError {
        tracing::warn!("Declined: {}", err);
        self.messages.emsg(err.user_message());
        err
    }

    fn abort(&mut self, event: AutocmdEvent) -> CoreError {
        tracing::warn!("{} autocommands aborted the operation", event);
        let err = CoreError::ReentrancyAbort;
        self.messages.emsg(err.user_message());
        err
    }

    /// Runs the handler for `event`. Nested events are skipped.
    pub(crate) fn fire(&mut self, event: AutocmdEvent, buf: BufferRef) -> ControlFlow<()> {
        let Some(mut handler) = self.autocmds.take() else {
            return ControlFlow::Continue(());
        };
        tracing::trace!("Firing {} for buffer {}", event, buf.id());
        let flow = handler.fire(event, buf, self);
        // A handler that installed a replacement keeps it.
        if self.autocmds.is_none() {
            self.autocmds = Some(handler);
        }
        flow
    }

    /// Fires `event` and fails if the handler aborted or `buf` died.
    pub(crate) fn fire_checked(&mut self, event: AutocmdEvent, buf: BufferRef) -> CoreResult<()> {
        let flow = self.fire(event, buf);
        self.after_fire(event, buf, flow)
    }

    /// Like [`Self::fire_checked`] but with the record locked against
    /// deletion while the handler runs.
    pub(crate) fn fire_locked(&mut self, event: AutocmdEvent, buf: BufferRef) -> CoreResult<()> {
        if let Some(record) = self.records.get_mut(&buf.id()) {
            record.lock_count += 1;
        }
        let flow = self.fire(event, buf);
        if let Some(record) = self.records.get_mut(&buf.id()) {
            record.lock_count = record.lock_count.saturating_sub(1);
        }
        self.after_fire(event, buf, flow)
    }

    fn after_fire(
        &mut self,
        event: AutocmdEvent,
        buf: BufferRef,
        flow: ControlFlow<()>,
    ) -> CoreResult<()> {
        if !self.is_valid(buf) || flow.is_break() {
            return Err(self.abort(event));
        }
        Ok(())
    }

    /// Reads a record's content into storage.
    fn materialize(&mut self, id: BufferId) -> CoreResult<()> {
        let Some(record) = self.records.get(&id) else {
            return Err(CoreError::InvalidReference(id));
        };
        self.storage.materialize(record)?;
        let modified = self.storage.is_modified(record);
        if let Some(record) = self.records.get_mut(&id) {
            record.load_state = LoadState::Loaded;
            record.modified = modified;
            record.change_tick += 1;
        }
        Ok(())
    }

    /// Releases a record's content.
    fn release(&mut self, id: BufferId) {
        if let Some(record) = self.records.get(&id) {
            self.storage.release_storage(record);
        }
        if let Some(record) = self.records.get_mut(&id) {
            if record.load_state == LoadState::Loaded {
                record.load_state = LoadState::Unloaded;
            }
            record.modified = false;
        }
    }
}

impl Default for BufferRegistry {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl std::fmt::Debug for BufferRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferRegistry")
            .field("order", &self.order)
            .field("curbuf", &self.curbuf)
            .field("destroy_epoch", &self.destroy_epoch)
            .field("windows", &self.windows)
            .finish_non_exhaustive()
    }
}
