//! Modal key dispatch.
//!
//! ## Learning: A Stack of Trait Objects
//!
//! Each mode is a `Box<dyn ModeState>` frame. Frames form a singly
//! linked list through their `parent` box, so pushing a sub-mode
//! suspends the mode underneath without it knowing:
//!
//! ```text
//! top → LiteralMode → InsertMode → NormalMode → None
//! ```
//!
//! A frame reports how it dealt with each key through
//! [`ExecutionStatus`]. `CompletedUnhandled` is the interesting one: the
//! frame finishes *and* hands the key back, so the resumed mode sees it
//! as if the sub-mode had never been there.

mod cmdline;
mod insert;
mod literal;
mod normal;

pub use cmdline::CmdLineMode;
pub use insert::InsertMode;
pub use literal::{LiteralMode, LiteralSink, Radix};
pub use normal::NormalMode;

use std::collections::VecDeque;

use serde::Serialize;

use crate::buffer::BufferRegistry;
use crate::event::EditorEvent;
use crate::keymap::{Keymap, MapMatch, MapMode};

/// How a mode dealt with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Consumed; keep dispatching
    Handled,
    /// Not consumed; stop dispatching until more input arrives
    Unhandled,
    /// Consumed, and the mode is finished
    Completed,
    /// Not consumed, and the mode is finished; the key goes to the parent
    CompletedUnhandled,
}

/// Mode identity, for display and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ModeKind {
    Normal,
    Insert,
    InsertLiteral,
    CommandLine,
}

impl ModeKind {
    /// Mappings that apply while this mode is on top.
    pub fn map_mode(self) -> Option<MapMode> {
        match self {
            ModeKind::Normal => Some(MapMode::Normal),
            ModeKind::Insert => Some(MapMode::Insert),
            ModeKind::CommandLine => Some(MapMode::CmdLine),
            ModeKind::InsertLiteral => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ModeKind::Normal => "NORMAL",
            ModeKind::Insert => "INSERT",
            ModeKind::InsertLiteral => "INSERT (literal)",
            ModeKind::CommandLine => "COMMAND",
        }
    }
}

impl std::fmt::Display for ModeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An operator waiting for its motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Delete,
}

/// One mode of the dispatch stack.
pub trait ModeState {
    fn kind(&self) -> ModeKind;

    /// Handles one key.
    fn execute(&mut self, ctx: &mut ModeContext<'_>, key: u8) -> ExecutionStatus;

    /// Runs once, when the frame is popped.
    fn cleanup(&mut self, _ctx: &mut ModeContext<'_>) {}

    fn pending_operator(&self) -> Option<Operator> {
        None
    }
}

/// What a mode may touch while it handles a key.
pub struct ModeContext<'a> {
    pub buffers: &'a mut BufferRegistry,
    pub keymap: &'a mut Keymap,
    pushes: Vec<Box<dyn ModeState>>,
}

impl<'a> ModeContext<'a> {
    pub fn new(buffers: &'a mut BufferRegistry, keymap: &'a mut Keymap) -> Self {
        Self {
            buffers,
            keymap,
            pushes: Vec::new(),
        }
    }

    /// Asks for `mode` to be pushed once the current key is dealt with.
    ///
    /// If the requesting mode completes on the same key, it is popped
    /// first and `mode` lands on its parent.
    pub fn push_mode(&mut self, mode: Box<dyn ModeState>) {
        self.pushes.push(mode);
    }
}

struct Frame {
    mode: Box<dyn ModeState>,
    parent: Option<Box<Frame>>,
}

#[derive(Debug, Clone, Copy)]
struct QueuedKey {
    key: u8,
    /// False for keys produced by a mapping or handed back by a mode
    remap: bool,
}

/// The modal cursor of the engine: a stack of modes plus typeahead.
#[derive(Default)]
pub struct StateMachine {
    top: Option<Box<Frame>>,
    pending: VecDeque<QueuedKey>,
    /// The queue front is held back as a possible mapping
    holding: bool,
    depth: usize,
}

impl StateMachine {
    /// Creates an empty machine; the first key pushes Normal mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `mode` on top of the stack.
    pub fn push(&mut self, mode: Box<dyn ModeState>, ctx: &mut ModeContext<'_>) {
        let kind = mode.kind();
        let parent = self.top.take();
        self.top = Some(Box::new(Frame { mode, parent }));
        self.depth += 1;
        tracing::debug!("Entered {} (depth {})", kind, self.depth);
        ctx.buffers.events().emit(EditorEvent::ModeChanged(kind));
    }

    /// Pops the top frame, running its cleanup. Returns false if empty.
    pub fn pop(&mut self, ctx: &mut ModeContext<'_>) -> bool {
        let Some(mut frame) = self.top.take() else {
            return false;
        };
        frame.mode.cleanup(ctx);
        self.top = frame.parent.take();
        self.depth -= 1;

        let kind = self.mode().unwrap_or(ModeKind::Normal);
        tracing::debug!("Left {} for {}", frame.mode.kind(), kind);
        ctx.buffers.events().emit(EditorEvent::ModeChanged(kind));
        true
    }

    /// Pops every frame, running each cleanup, and drops typeahead.
    pub fn clear(&mut self, ctx: &mut ModeContext<'_>) {
        while self.pop(ctx) {}
        self.pending.clear();
        self.holding = false;
    }

    /// Kind of the top frame.
    pub fn mode(&self) -> Option<ModeKind> {
        self.top.as_ref().map(|frame| frame.mode.kind())
    }

    pub fn pending_operator(&self) -> Option<Operator> {
        self.top
            .as_ref()
            .and_then(|frame| frame.mode.pending_operator())
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Keys waiting to be dispatched.
    pub fn pending_keys(&self) -> Vec<u8> {
        self.pending.iter().map(|q| q.key).collect()
    }

    /// Queues `keys` ahead of any earlier typeahead and dispatches.
    ///
    /// Returns the key a mode left unhandled, which stays queued. Keys
    /// that may start a mapping also stay queued until more input
    /// decides it, or until [`StateMachine::flush`]. Those held keys are
    /// typed input themselves, so new keys go right after them.
    pub fn execute_keys(&mut self, keys: &[u8], ctx: &mut ModeContext<'_>) -> Option<u8> {
        let at = if self.holding {
            self.pending.iter().take_while(|q| q.remap).count()
        } else {
            0
        };
        for (i, &key) in keys.iter().enumerate() {
            self.pending.insert(at + i, QueuedKey { key, remap: true });
        }
        self.dispatch(ctx, true)
    }

    /// Dispatches everything queued without waiting for mappings to
    /// complete.
    pub fn flush(&mut self, ctx: &mut ModeContext<'_>) -> Option<u8> {
        self.dispatch(ctx, false)
    }

    fn dispatch(&mut self, ctx: &mut ModeContext<'_>, wait: bool) -> Option<u8> {
        self.holding = false;
        while !self.pending.is_empty() {
            if self.top.is_none() {
                self.push(Box::new(NormalMode::new()), ctx);
            }
            if !self.apply_mapping(ctx.keymap, wait) {
                self.holding = true;
                return None;
            }
            let Some(QueuedKey { key, .. }) = self.pending.pop_front() else {
                break;
            };
            let Some(frame) = self.top.as_mut() else {
                break;
            };

            let status = frame.mode.execute(ctx, key);
            tracing::trace!("{:?} for key {:#04x}", status, key);
            match status {
                ExecutionStatus::Handled => {}
                ExecutionStatus::Unhandled => {
                    self.pending.push_front(QueuedKey { key, remap: false });
                    self.push_requested(ctx);
                    return Some(key);
                }
                ExecutionStatus::Completed => {
                    self.pop(ctx);
                }
                ExecutionStatus::CompletedUnhandled => {
                    self.pop(ctx);
                    self.pending.push_front(QueuedKey { key, remap: false });
                }
            }
            self.push_requested(ctx);
        }
        None
    }

    /// Replaces a mapped key sequence at the front of the queue.
    ///
    /// Returns false when the queued keys may still become a mapping
    /// and dispatch should wait for more.
    fn apply_mapping(&mut self, keymap: &Keymap, wait: bool) -> bool {
        let Some(mode) = self.mode().and_then(ModeKind::map_mode) else {
            return true;
        };
        if !keymap.is_active() {
            return true;
        }
        let typed: Vec<u8> = self
            .pending
            .iter()
            .take_while(|q| q.remap)
            .map(|q| q.key)
            .collect();
        if typed.is_empty() {
            return true;
        }

        let found = if wait {
            keymap.lookup(mode, &typed)
        } else {
            keymap.lookup_complete(mode, &typed)
        };
        match found {
            MapMatch::Full { len, rhs } => {
                self.pending.drain(..len);
                for &key in rhs.iter().rev() {
                    self.pending.push_front(QueuedKey { key, remap: false });
                }
                true
            }
            MapMatch::Partial => false,
            MapMatch::None => true,
        }
    }

    fn push_requested(&mut self, ctx: &mut ModeContext<'_>) {
        for mode in std::mem::take(&mut ctx.pushes) {
            self.push(mode, ctx);
        }
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut modes = Vec::with_capacity(self.depth);
        let mut frame = self.top.as_deref();
        while let Some(current) = frame {
            modes.push(current.mode.kind());
            frame = current.parent.as_deref();
        }
        f.debug_struct("StateMachine")
            .field("modes", &modes)
            .field("pending", &self.pending_keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::keys;
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Reacts to keys by script: `c` completes, `C` completes unhandled,
    /// `p` pushes another scripted frame, `u` is unhandled.
    struct Scripted {
        cleanups: Rc<Cell<usize>>,
        pushes: Rc<Cell<usize>>,
    }

    impl Scripted {
        fn boxed(cleanups: &Rc<Cell<usize>>, pushes: &Rc<Cell<usize>>) -> Box<dyn ModeState> {
            pushes.set(pushes.get() + 1);
            Box::new(Self {
                cleanups: Rc::clone(cleanups),
                pushes: Rc::clone(pushes),
            })
        }
    }

    impl ModeState for Scripted {
        fn kind(&self) -> ModeKind {
            ModeKind::Insert
        }

        fn execute(&mut self, ctx: &mut ModeContext<'_>, key: u8) -> ExecutionStatus {
            match key {
                b'c' => ExecutionStatus::Completed,
                b'C' => ExecutionStatus::CompletedUnhandled,
                b'u' => ExecutionStatus::Unhandled,
                b'p' => {
                    ctx.push_mode(Scripted::boxed(&self.cleanups, &self.pushes));
                    ExecutionStatus::Handled
                }
                _ => ExecutionStatus::Handled,
            }
        }

        fn cleanup(&mut self, _ctx: &mut ModeContext<'_>) {
            self.cleanups.set(self.cleanups.get() + 1);
        }
    }

    fn fixture() -> (BufferRegistry, Keymap) {
        (BufferRegistry::default(), Keymap::new())
    }

    fn text(buffers: &BufferRegistry) -> String {
        buffers
            .current_text()
            .map(|t| t.text().into_owned())
            .unwrap_or_default()
    }

    #[test]
    fn test_lazy_normal_frame() {
        let (mut buffers, mut keymap) = fixture();
        let mut ctx = ModeContext::new(&mut buffers, &mut keymap);
        let mut machine = StateMachine::new();
        assert_eq!(machine.mode(), None);

        machine.execute_keys(b"l", &mut ctx);
        assert_eq!(machine.mode(), Some(ModeKind::Normal));
        assert_eq!(machine.depth(), 1);
    }

    #[test]
    fn test_completed_unhandled_redelivers_key() {
        let (mut buffers, mut keymap) = fixture();
        let mut ctx = ModeContext::new(&mut buffers, &mut keymap);
        let mut machine = StateMachine::new();
        let cleanups = Rc::new(Cell::new(0));
        let pushes = Rc::new(Cell::new(0));

        machine.execute_keys(b"i", &mut ctx);
        machine.push(Scripted::boxed(&cleanups, &pushes), &mut ctx);
        // `C` ends the scripted frame, then Insert mode inserts it.
        machine.execute_keys(b"C", &mut ctx);

        assert_eq!(cleanups.get(), 1);
        assert_eq!(machine.mode(), Some(ModeKind::Insert));
        assert_eq!(text(ctx.buffers), "C");
    }

    #[test]
    fn test_unhandled_stops_and_keeps_key() {
        let (mut buffers, mut keymap) = fixture();
        let mut ctx = ModeContext::new(&mut buffers, &mut keymap);
        let mut machine = StateMachine::new();
        let cleanups = Rc::new(Cell::new(0));
        let pushes = Rc::new(Cell::new(0));
        machine.push(Scripted::boxed(&cleanups, &pushes), &mut ctx);

        assert_eq!(machine.execute_keys(b"xuy", &mut ctx), Some(b'u'));
        assert_eq!(machine.pending_keys(), b"uy");

        // New input goes in front of what is still queued; the rest then
        // reaches the lazily pushed Normal frame.
        assert_eq!(machine.execute_keys(b"c", &mut ctx), None);
        assert_eq!(cleanups.get(), 1);
        assert_eq!(machine.mode(), Some(ModeKind::Normal));
        assert!(machine.pending_keys().is_empty());
    }

    #[test]
    fn test_mapping_waits_for_more_keys() {
        let (mut buffers, mut keymap) = fixture();
        keymap.map(MapMode::Insert, b"jk", &[keys::ESC]);
        let mut ctx = ModeContext::new(&mut buffers, &mut keymap);
        let mut machine = StateMachine::new();

        machine.execute_keys(b"ij", &mut ctx);
        assert_eq!(machine.pending_keys(), b"j");
        machine.execute_keys(b"k", &mut ctx);
        assert_eq!(machine.mode(), Some(ModeKind::Normal));
        assert_eq!(text(ctx.buffers), "");

        machine.execute_keys(b"ij", &mut ctx);
        machine.flush(&mut ctx);
        assert!(machine.pending_keys().is_empty());
        assert_eq!(text(ctx.buffers), "j");
    }

    #[test]
    fn test_mapping_rhs_is_not_remapped() {
        let (mut buffers, mut keymap) = fixture();
        keymap.map(MapMode::Insert, b"a", b"ab");
        let mut ctx = ModeContext::new(&mut buffers, &mut keymap);
        let mut machine = StateMachine::new();

        machine.execute_keys(b"ia", &mut ctx);
        assert_eq!(text(ctx.buffers), "ab");
    }

    #[test]
    fn test_clear_runs_every_cleanup() {
        let (mut buffers, mut keymap) = fixture();
        let mut ctx = ModeContext::new(&mut buffers, &mut keymap);
        let mut machine = StateMachine::new();
        let cleanups = Rc::new(Cell::new(0));
        let pushes = Rc::new(Cell::new(0));

        machine.push(Scripted::boxed(&cleanups, &pushes), &mut ctx);
        machine.execute_keys(b"pp", &mut ctx);
        assert_eq!(machine.depth(), 3);

        machine.clear(&mut ctx);
        assert_eq!(machine.depth(), 0);
        assert_eq!(cleanups.get(), 3);
    }

    proptest! {
        #[test]
        fn prop_cleanup_once_per_push(script in proptest::collection::vec(
            prop_oneof![Just(b'c'), Just(b'C'), Just(b'p'), Just(b'h')],
            0..64,
        )) {
            let (mut buffers, mut keymap) = fixture();
            let mut ctx = ModeContext::new(&mut buffers, &mut keymap);
            let mut machine = StateMachine::new();
            let cleanups = Rc::new(Cell::new(0));
            let pushes = Rc::new(Cell::new(0));

            machine.push(Scripted::boxed(&cleanups, &pushes), &mut ctx);
            for key in script {
                if machine.mode() != Some(ModeKind::Insert) {
                    machine.push(Scripted::boxed(&cleanups, &pushes), &mut ctx);
                }
                machine.execute_keys(&[key], &mut ctx);
                prop_assert!(cleanups.get() <= pushes.get());
            }
            machine.clear(&mut ctx);
            prop_assert_eq!(cleanups.get(), pushes.get());
        }
    }
}
