//! The autocommand firing contract.
//!
//! ## Learning: Trait Objects That Borrow Their Owner
//!
//! A handler gets `&mut BufferRegistry`, yet it is stored *inside* the
//! registry. The registry makes that legal by taking the handler out of
//! its slot for the duration of the call and putting it back afterwards:
//!
//! ```rust,ignore
//! let mut handler = self.autocmds.take()?;   // slot is now None
//! let flow = handler.fire(event, buf, self); // free to borrow self mutably
//! self.autocmds.get_or_insert(handler);      // restore
//! ```
//!
//! A side effect is that autocommands do not nest: events fired by a
//! handler while it runs find an empty slot and are skipped.
//!
//! Registration and pattern matching are left to the host; the
//! [`AutocmdTable`] here is the minimal per-event list most hosts need.

use std::collections::HashMap;
use std::ops::ControlFlow;

use serde::Serialize;

use crate::buffer::{BufferRef, BufferRegistry};

/// Buffer lifecycle events, in Vim's naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AutocmdEvent {
    /// A record was created or an empty one recycled
    BufNew,
    /// A record was added to the buffer list
    BufAdd,
    /// Content was read into a record
    BufReadPost,
    /// A buffer became current
    BufEnter,
    /// A buffer was shown in a window
    BufWinEnter,
    /// The current buffer is about to change
    BufLeave,
    /// A buffer is about to disappear from its last window
    BufWinLeave,
    /// A buffer is about to become hidden
    BufHidden,
    /// Content is about to be released
    BufUnload,
    /// A buffer is about to be unlisted
    BufDelete,
    /// A record is about to be destroyed
    BufWipeout,
}

impl AutocmdEvent {
    pub fn name(self) -> &'static str {
        match self {
            AutocmdEvent::BufNew => "BufNew",
            AutocmdEvent::BufAdd => "BufAdd",
            AutocmdEvent::BufReadPost => "BufReadPost",
            AutocmdEvent::BufEnter => "BufEnter",
            AutocmdEvent::BufWinEnter => "BufWinEnter",
            AutocmdEvent::BufLeave => "BufLeave",
            AutocmdEvent::BufWinLeave => "BufWinLeave",
            AutocmdEvent::BufHidden => "BufHidden",
            AutocmdEvent::BufUnload => "BufUnload",
            AutocmdEvent::BufDelete => "BufDelete",
            AutocmdEvent::BufWipeout => "BufWipeout",
        }
    }
}

impl std::fmt::Display for AutocmdEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives lifecycle events.
///
/// A handler may do anything to the registry, including wiping `buf`.
/// Returning `ControlFlow::Break(())` aborts the operation that fired the
/// event.
pub trait AutocmdHandler {
    fn fire(
        &mut self,
        event: AutocmdEvent,
        buf: BufferRef,
        registry: &mut BufferRegistry,
    ) -> ControlFlow<()>;
}

impl<F> AutocmdHandler for F
where
    F: FnMut(AutocmdEvent, BufferRef, &mut BufferRegistry) -> ControlFlow<()>,
{
    fn fire(
        &mut self,
        event: AutocmdEvent,
        buf: BufferRef,
        registry: &mut BufferRegistry,
    ) -> ControlFlow<()> {
        self(event, buf, registry)
    }
}

type Callback = Box<dyn FnMut(BufferRef, &mut BufferRegistry) -> ControlFlow<()>>;

/// Callbacks grouped by event, run in registration order.
#[derive(Default)]
pub struct AutocmdTable {
    callbacks: HashMap<AutocmdEvent, Vec<Callback>>,
}

impl AutocmdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a callback for `event`.
    pub fn on<F>(&mut self, event: AutocmdEvent, callback: F) -> &mut Self
    where
        F: FnMut(BufferRef, &mut BufferRegistry) -> ControlFlow<()> + 'static,
    {
        self.callbacks
            .entry(event)
            .or_default()
            .push(Box::new(callback));
        self
    }

    /// Removes every callback for `event`.
    pub fn clear(&mut self, event: AutocmdEvent) {
        self.callbacks.remove(&event);
    }

    pub fn len(&self) -> usize {
        self.callbacks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AutocmdHandler for AutocmdTable {
    fn fire(
        &mut self,
        event: AutocmdEvent,
        buf: BufferRef,
        registry: &mut BufferRegistry,
    ) -> ControlFlow<()> {
        let Some(callbacks) = self.callbacks.get_mut(&event) else {
            return ControlFlow::Continue(());
        };
        for callback in callbacks.iter_mut() {
            callback(buf, registry)?;
        }
        ControlFlow::Continue(())
    }
}

impl std::fmt::Debug for AutocmdTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.callbacks.iter().map(|(event, cbs)| (event, cbs.len())))
            .finish()
    }
}
