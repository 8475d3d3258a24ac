//! # Vicore Core
//!
//! The headless heart of a Vim-style editor: keystrokes go in, buffer
//! mutations come out.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Editor                             │
//! │  ┌──────────────┐  ┌──────────┐  ┌──────────────────────────┐│
//! │  │ StateMachine │  │  Keymap  │  │          Config          ││
//! │  │  Literal     │  └──────────┘  └──────────────────────────┘│
//! │  │  Insert      │                                            │
//! │  │  CmdLine     │                                            │
//! │  │  Normal      │                                            │
//! │  └──────┬───────┘                                            │
//! │  ┌──────┴─────────────────────────────────────────────┐      │
//! │  │                 BufferRegistry                     │      │
//! │  │  records · windows · epoch · autocommands · storage│      │
//! │  └────────────────────────────────────────────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys flow into the [`StateMachine`], whose top [`ModeState`] frame
//! edits buffers through the [`BufferRegistry`]. The registry fires
//! autocommands that may run arbitrary logic, including wiping the very
//! buffer being operated on, so every step after a fired event
//! re-validates its [`BufferRef`] before touching the record again.

pub mod autocmd;
pub mod buffer;
pub mod command;
pub mod config;
pub mod editor;
pub mod event;
pub mod keymap;
pub mod message;
pub mod state;
pub mod storage;
pub mod window;

pub use autocmd::{AutocmdEvent, AutocmdHandler, AutocmdTable};
pub use buffer::{
    BufHidden, BufferId, BufferRecord, BufferRef, BufferRegistry, BufferSummary, CloseAction,
    CloseOutcome, FileIdentity, JobHandle, LoadState, OpenFlags, RegistryOptions, WinInfo,
};
pub use command::{BufferArg, ExCommand};
pub use config::Config;
pub use editor::Editor;
pub use event::{EditorEvent, EventBus, EventHandler};
pub use keymap::{Keymap, MapMatch, MapMode, parse_keys};
pub use message::{Message, MessageKind, Messages};
pub use state::{
    ExecutionStatus, LiteralMode, ModeContext, ModeKind, ModeState, Operator, StateMachine,
};
pub use storage::{RopeStorage, TextStorage};
pub use window::{Window, WindowId, WindowList};

pub use vicore_buffer::Position;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
///
/// The first four are the lifecycle failures every multi-step buffer
/// operation has to reckon with; declined operations leave the registry
/// exactly as it was.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Autocommands caused command to abort")]
    ReentrancyAbort,

    #[error("Cannot unload last buffer")]
    LastBufferGuard,

    #[error("Attempt to delete a buffer that is in use: {0}")]
    LockedRecord(BufferId),

    #[error("Buffer {0} no longer exists")]
    InvalidReference(BufferId),

    #[error("No write since last change for buffer {0} (add ! to override)")]
    UnsavedChanges(BufferId),

    #[error("Cannot close a displayed buffer while redrawing")]
    RedrawInProgress,

    #[error("Buffer {0} does not exist")]
    NoSuchBuffer(u32),

    #[error("No alternate file")]
    NoAlternateFile,

    #[error("No matching buffer for {0}")]
    NoMatchingBuffer(String),

    #[error("More than one match for {0}")]
    AmbiguousBuffer(String),

    #[error("No such window: {0}")]
    WindowNotFound(WindowId),

    #[error("Cannot close last window")]
    LastWindow,

    #[error("Not an editor command: {0}")]
    UnknownCommand(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer error: {0}")]
    Buffer(#[from] vicore_buffer::BufferError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl CoreError {
    /// The Vim error number shown in front of the message, if there is one.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            CoreError::ReentrancyAbort => Some("E855"),
            CoreError::LastBufferGuard => Some("E90"),
            CoreError::LockedRecord(_) => Some("E937"),
            CoreError::InvalidReference(_) => Some("E86"),
            CoreError::UnsavedChanges(_) => Some("E89"),
            CoreError::NoSuchBuffer(_) => Some("E86"),
            CoreError::NoAlternateFile => Some("E23"),
            CoreError::NoMatchingBuffer(_) => Some("E94"),
            CoreError::AmbiguousBuffer(_) => Some("E93"),
            CoreError::LastWindow => Some("E444"),
            CoreError::UnknownCommand(_) => Some("E492"),
            CoreError::InvalidArgument(_) => Some("E474"),
            _ => None,
        }
    }

    /// The message as shown to the user, with its error number.
    pub fn user_message(&self) -> String {
        match self.code() {
            Some(code) => format!("{code}: {self}"),
            None => self.to_string(),
        }
    }

    /// True for operations that were refused and left state untouched.
    pub fn is_declined(&self) -> bool {
        matches!(
            self,
            CoreError::LastBufferGuard
                | CoreError::LockedRecord(_)
                | CoreError::UnsavedChanges(_)
                | CoreError::RedrawInProgress
                | CoreError::LastWindow
        )
    }

    /// True for errors the registry already put in the message log.
    pub fn is_reported(&self) -> bool {
        self.is_declined() || matches!(self, CoreError::ReentrancyAbort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_has_code() {
        let err = CoreError::LockedRecord(BufferId::new(3));
        assert_eq!(
            err.user_message(),
            "E937: Attempt to delete a buffer that is in use: 3"
        );
        assert!(err.is_declined());
        assert!(!CoreError::ReentrancyAbort.is_declined());
    }
}
