//! Main editor orchestration.
//!
//! ## Learning: The Facade Pattern
//!
//! `Editor` acts as a facade, providing a simple interface to
//! complex subsystems. A host only needs to open files, feed keys and
//! watch events; the registry, the mode stack and the keymap stay
//! behind this one type.
//!
//! ## Learning: Splitting Borrows
//!
//! Modes need the registry and the keymap mutably while the machine that
//! drives them is itself borrowed mutably. Because they are separate
//! fields, `feed_keys` can borrow all three at once:
//!
//! ```ignore
//! let mut ctx = ModeContext::new(&mut self.buffers, &mut self.keymap);
//! self.machine.execute_keys(keys, &mut ctx);
//! ```

use std::path::Path;

use tokio::sync::broadcast;

use crate::autocmd::AutocmdHandler;
use crate::buffer::{BufferRef, BufferRegistry, CloseAction, CloseOutcome, OpenFlags, RegistryOptions};
use crate::command::ExCommand;
use crate::config::Config;
use crate::event::EditorEvent;
use crate::keymap::Keymap;
use crate::message::Messages;
use crate::state::{ModeContext, ModeKind, StateMachine};
use crate::storage::{RopeStorage, TextStorage};
use crate::CoreResult;

/// The main editor state.
///
/// ## Thread Safety
///
/// `Editor` is designed to be owned by a single thread. Autocommand
/// handlers run synchronously on that thread; the display layer learns
/// about changes through [`Editor::subscribe`].
pub struct Editor {
    /// Editor configuration
    config: Config,

    /// Buffers, windows and autocommands
    buffers: BufferRegistry,

    /// Mode stack and typeahead
    machine: StateMachine,

    /// Key mappings
    keymap: Keymap,
}

impl Editor {
    /// Creates a new editor with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an editor with custom configuration.
    pub fn with_config(config: Config) -> Self {
        let storage = RopeStorage::new(config.buffers.undo_levels);
        Self::with_storage(config, Box::new(storage))
    }

    /// Creates an editor whose buffer content lives in `storage`.
    pub fn with_storage(config: Config, storage: Box<dyn TextStorage>) -> Self {
        let buffers = BufferRegistry::new(RegistryOptions::from(&config), storage);
        let keymap = Keymap::from_config(&config.input);
        Self {
            config,
            buffers,
            machine: StateMachine::new(),
            keymap,
        }
    }

    // ==================== Buffers ====================

    /// Finds or creates the buffer for `path` without switching to it.
    pub fn open_or_reuse(
        &mut self,
        path: Option<&Path>,
        preferred_line: usize,
        flags: OpenFlags,
    ) -> CoreResult<BufferRef> {
        self.buffers.open_or_reuse(path, preferred_line, flags)
    }

    /// Opens `path` in the current window, as `:edit` does.
    pub fn edit(&mut self, path: impl AsRef<Path>, force: bool) -> CoreResult<BufferRef> {
        self.buffers.edit_file(path.as_ref(), force)
    }

    /// Unloads, deletes or wipes a buffer.
    pub fn close(
        &mut self,
        buf: BufferRef,
        action: CloseAction,
        force: bool,
    ) -> CoreResult<CloseOutcome> {
        self.buffers.close(buf, action, force)
    }

    /// The buffer in the current window.
    pub fn current_buffer(&self) -> BufferRef {
        self.buffers.current_buffer()
    }

    /// Text of the current buffer, empty if it is not loaded.
    pub fn current_text(&self) -> String {
        self.buffers
            .current_text()
            .map(|t| t.text().into_owned())
            .unwrap_or_default()
    }

    pub fn buffers(&self) -> &BufferRegistry {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut BufferRegistry {
        &mut self.buffers
    }

    /// Installs the autocommand handler, returning the previous one.
    pub fn set_autocmd_handler(
        &mut self,
        handler: Box<dyn AutocmdHandler>,
    ) -> Option<Box<dyn AutocmdHandler>> {
        self.buffers.set_autocmd_handler(handler)
    }

    // ==================== Input ====================

    /// Feeds raw key bytes to the mode stack.
    ///
    /// Returns the key a mode could not handle yet, if dispatch stopped.
    pub fn feed_keys(&mut self, keys: &[u8]) -> Option<u8> {
        let mut ctx = ModeContext::new(&mut self.buffers, &mut self.keymap);
        self.machine.execute_keys(keys, &mut ctx)
    }

    /// Dispatches keys held back for a possible mapping.
    pub fn flush_keys(&mut self) -> Option<u8> {
        let mut ctx = ModeContext::new(&mut self.buffers, &mut self.keymap);
        self.machine.flush(&mut ctx)
    }

    /// Mode on top of the stack; Normal before the first key.
    pub fn mode(&self) -> ModeKind {
        self.machine.mode().unwrap_or(ModeKind::Normal)
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Pops every mode and drops pending keys.
    pub fn reset_modes(&mut self) {
        let mut ctx = ModeContext::new(&mut self.buffers, &mut self.keymap);
        self.machine.clear(&mut ctx);
    }

    /// Parses and runs one Ex command line.
    pub fn execute_command(&mut self, line: &str) -> CoreResult<()> {
        let result = ExCommand::parse(line).and_then(|cmd| cmd.execute(&mut self.buffers));
        if let Err(e) = &result {
            self.buffers.report_error(e);
        }
        result
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn keymap_mut(&mut self) -> &mut Keymap {
        &mut self.keymap
    }

    // ==================== Configuration ====================

    /// Returns the editor configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ==================== Events ====================

    /// Subscribes to editor events.
    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.buffers.events().subscribe()
    }

    pub fn messages(&self) -> &Messages {
        self.buffers.messages()
    }

    pub fn messages_mut(&mut self) -> &mut Messages {
        self.buffers.messages_mut()
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("buffers", &self.buffers)
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_editor() {
        let editor = Editor::new();
        assert_eq!(editor.mode(), ModeKind::Normal);
        assert_eq!(editor.buffers().len(), 1);
        assert_eq!(editor.current_text(), "");
    }

    #[test]
    fn test_feed_keys_edits_current_buffer() {
        let mut editor = Editor::new();
        editor.feed_keys(b"ihi\x1b");
        assert_eq!(editor.current_text(), "hi");
        assert_eq!(editor.mode(), ModeKind::Normal);
    }

    #[test]
    fn test_configured_mapping() {
        let config: Config = toml::from_str(
            r#"
            [[input.mappings]]
            mode = "insert"
            lhs = "jk"
            rhs = "<Esc>"
            "#,
        )
        .unwrap();
        let mut editor = Editor::with_config(config);
        editor.feed_keys(b"iabjk");
        assert_eq!(editor.mode(), ModeKind::Normal);
        assert_eq!(editor.current_text(), "ab");
    }

    #[test]
    fn test_command_line_through_keys() {
        let mut editor = Editor::new();
        editor.feed_keys(b":set hidden\r");
        assert!(editor.buffers().options().hidden);
        assert_eq!(editor.mode(), ModeKind::Normal);
    }

    #[tokio::test]
    async fn test_mode_changes_are_broadcast() {
        let mut editor = Editor::new();
        let mut rx = editor.subscribe();
        editor.feed_keys(b"i");

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let EditorEvent::ModeChanged(kind) = event {
                kinds.push(kind);
            }
        }
        assert_eq!(kinds, vec![ModeKind::Normal, ModeKind::Insert]);
    }
}
