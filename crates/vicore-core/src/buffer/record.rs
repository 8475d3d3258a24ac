//! One buffer record and the small enums describing its lifecycle.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use vicore_buffer::Position;

use super::handle::BufferId;
use super::path::FileIdentity;
use crate::window::WindowId;
use crate::{CoreError, CoreResult};

/// Whether a record's text has been read into storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadState {
    /// Content was never materialized (or the record was deleted)
    NeverLoaded,
    /// Content is in storage
    Loaded,
    /// Content was released; the record remembers its name and cursor
    Unloaded,
}

/// What closing a buffer in a window does to the record.
///
/// Ordered from weakest to strongest, so a hide policy can only ever
/// upgrade a request with `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum CloseAction {
    /// Keep everything, just stop showing it
    Hide,
    /// Release the content
    Unload,
    /// Release the content and unlist the record
    Delete,
    /// Destroy the record
    Wipe,
}

impl CloseAction {
    pub fn unloads(self) -> bool {
        self >= CloseAction::Unload
    }

    pub fn deletes(self) -> bool {
        self >= CloseAction::Delete
    }

    pub fn wipes(self) -> bool {
        self == CloseAction::Wipe
    }
}

/// Per-record hide policy, the `'bufhidden'` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BufHidden {
    /// Follow the global `hidden` setting
    #[default]
    UseGlobal,
    Hide,
    Unload,
    Delete,
    Wipe,
}

impl BufHidden {
    /// Upgrades a requested close action to what this policy forces.
    pub fn upgrade(self, action: CloseAction) -> CloseAction {
        let forced = match self {
            BufHidden::UseGlobal | BufHidden::Hide => return action,
            BufHidden::Unload => CloseAction::Unload,
            BufHidden::Delete => CloseAction::Delete,
            BufHidden::Wipe => CloseAction::Wipe,
        };
        action.max(forced)
    }

    /// Whether an abandoned buffer with this policy stays loaded.
    pub fn hides(self, global_hidden: bool) -> bool {
        match self {
            BufHidden::UseGlobal => global_hidden,
            BufHidden::Hide => true,
            BufHidden::Unload | BufHidden::Delete | BufHidden::Wipe => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BufHidden::UseGlobal => "",
            BufHidden::Hide => "hide",
            BufHidden::Unload => "unload",
            BufHidden::Delete => "delete",
            BufHidden::Wipe => "wipe",
        }
    }
}

impl FromStr for BufHidden {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "" => Ok(BufHidden::UseGlobal),
            "hide" => Ok(BufHidden::Hide),
            "unload" => Ok(BufHidden::Unload),
            "delete" => Ok(BufHidden::Delete),
            "wipe" => Ok(BufHidden::Wipe),
            other => Err(CoreError::InvalidArgument(format!("bufhidden={other}"))),
        }
    }
}

/// What a close did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CloseOutcome {
    /// Another window still shows it
    StillShown,
    /// Loaded but not shown
    Hidden,
    Unloaded,
    /// Unloaded and unlisted; the number still resolves
    Deleted,
    /// Gone for good
    Wiped,
    /// It was the last listed buffer and now is an empty one
    Emptied,
}

/// Cursor and view a window last had in a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinInfo {
    /// `None` once the window itself was closed
    pub window: Option<WindowId>,
    pub cursor: Position,
    pub topline: usize,
}

/// An external process feeding a buffer, such as a terminal job.
pub trait JobHandle: std::fmt::Debug {
    fn is_running(&self) -> bool;

    /// Tries to stop the process. Returns false if it refuses to stop.
    fn try_terminate(&mut self) -> bool;
}

/// Identity and metadata of one open buffer.
///
/// The text itself lives in [`crate::TextStorage`]; the record only
/// tracks what the buffer list needs.
#[derive(Debug)]
pub struct BufferRecord {
    id: BufferId,
    pub(crate) full_name: Option<PathBuf>,
    pub(crate) short_name: Option<String>,
    pub(crate) file_id: Option<FileIdentity>,
    pub(crate) modified: bool,
    pub(crate) change_tick: u64,
    pub(crate) load_state: LoadState,
    pub(crate) nwindows: usize,
    pub(crate) lock_count: usize,
    /// Most recently used first
    pub(crate) wininfo: Vec<WinInfo>,
    pub(crate) listed: bool,
    pub(crate) bufhidden: BufHidden,
    pub(crate) job: Option<Box<dyn JobHandle>>,
}

impl BufferRecord {
    pub(crate) fn new(id: BufferId) -> Self {
        Self {
            id,
            full_name: None,
            short_name: None,
            file_id: None,
            modified: false,
            change_tick: 0,
            load_state: LoadState::NeverLoaded,
            nwindows: 0,
            lock_count: 0,
            wininfo: Vec::new(),
            listed: false,
            bufhidden: BufHidden::UseGlobal,
            job: None,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn full_name(&self) -> Option<&Path> {
        self.full_name.as_deref()
    }

    pub fn short_name(&self) -> Option<&str> {
        self.short_name.as_deref()
    }

    /// Name as shown to the user.
    pub fn display_name(&self) -> &str {
        self.short_name.as_deref().unwrap_or("[No Name]")
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn change_tick(&self) -> u64 {
        self.change_tick
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn is_loaded(&self) -> bool {
        self.load_state == LoadState::Loaded
    }

    /// Loaded but shown in no window.
    pub fn is_hidden(&self) -> bool {
        self.is_loaded() && self.nwindows == 0
    }

    pub fn window_count(&self) -> usize {
        self.nwindows
    }

    pub fn lock_count(&self) -> usize {
        self.lock_count
    }

    pub fn is_listed(&self) -> bool {
        self.listed
    }

    pub fn bufhidden(&self) -> BufHidden {
        self.bufhidden
    }

    pub fn wininfo(&self) -> &[WinInfo] {
        &self.wininfo
    }

    pub fn has_running_job(&self) -> bool {
        self.job.as_ref().is_some_and(|job| job.is_running())
    }

    /// An unnamed, never modified, empty buffer that may be recycled.
    pub(crate) fn is_empty_unnamed(&self, line_count: usize, empty: bool) -> bool {
        self.full_name.is_none() && !self.modified && line_count <= 1 && empty
    }

    /// Remembered view for `window`, or the most recent one of any window.
    pub fn cursor_for(&self, window: WindowId) -> Option<&WinInfo> {
        self.wininfo
            .iter()
            .find(|info| info.window == Some(window))
            .or_else(|| self.wininfo.first())
    }

    /// Records where `window` left this buffer and makes it most recent.
    pub(crate) fn remember(&mut self, window: WindowId, cursor: Position, topline: usize) {
        self.wininfo.retain(|info| info.window != Some(window));
        self.wininfo.insert(
            0,
            WinInfo {
                window: Some(window),
                cursor,
                topline,
            },
        );
    }

    /// Drops the window link when a window closes; the position stays.
    pub(crate) fn detach_window(&mut self, window: WindowId) {
        for info in &mut self.wininfo {
            if info.window == Some(window) {
                info.window = None;
            }
        }
    }

    /// Forgets everything except identity and name, as after `:bdelete`.
    pub(crate) fn reset_to_placeholder(&mut self) {
        self.load_state = LoadState::NeverLoaded;
        self.modified = false;
        self.listed = false;
        self.wininfo.clear();
        self.bufhidden = BufHidden::UseGlobal;
        self.job = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bufhidden_upgrade() {
        assert_eq!(BufHidden::UseGlobal.upgrade(CloseAction::Hide), CloseAction::Hide);
        assert_eq!(BufHidden::Delete.upgrade(CloseAction::Unload), CloseAction::Delete);
        assert_eq!(BufHidden::Unload.upgrade(CloseAction::Wipe), CloseAction::Wipe);
        assert!(BufHidden::Hide.hides(false));
        assert!(!BufHidden::Wipe.hides(true));
        assert_eq!("wipe".parse::<BufHidden>().unwrap(), BufHidden::Wipe);
        assert!("sometimes".parse::<BufHidden>().is_err());
    }

    #[test]
    fn test_wininfo_most_recent_first() {
        let mut record = BufferRecord::new(BufferId::new(1));
        let (a, b) = (WindowId::new(1), WindowId::new(2));
        record.remember(a, Position::new(3, 0), 0);
        record.remember(b, Position::new(7, 2), 4);
        record.remember(a, Position::new(5, 1), 0);

        assert_eq!(record.wininfo().len(), 2);
        assert_eq!(record.cursor_for(b).unwrap().cursor, Position::new(7, 2));
        assert_eq!(
            record.cursor_for(WindowId::new(9)).unwrap().cursor,
            Position::new(5, 1)
        );

        record.detach_window(a);
        assert_eq!(record.cursor_for(a).unwrap().window, None);
    }

    #[test]
    fn test_close_action_order() {
        assert!(CloseAction::Wipe.deletes());
        assert!(CloseAction::Delete.unloads());
        assert!(!CloseAction::Hide.unloads());
        assert!(!CloseAction::Delete.wipes());
    }
}
