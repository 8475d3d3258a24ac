//! Notifications for the display layer.
//!
//! ## Learning: Observer Pattern in Rust
//!
//! Instead of holding references to observers, the engine broadcasts
//! plain values over a `tokio::sync::broadcast` channel. The display layer
//! subscribes and refreshes its cached view state when, for example, a
//! different buffer becomes current.

use crate::buffer::{BufferId, BufferRef};
use crate::state::ModeKind;
use crate::window::WindowId;
use tokio::sync::broadcast;

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// A buffer record was created (or an empty one reused)
    BufferCreated(BufferRef),
    /// A buffer became current in the current window
    BufferEntered(BufferRef),
    /// A buffer record was destroyed
    BufferWiped(BufferId),
    /// A window was opened
    WindowOpened(WindowId),
    /// A window was closed
    WindowClosed(WindowId),
    /// The top of the mode stack changed
    ModeChanged(ModeKind),
}

/// Event bus for broadcasting engine events.
///
/// Lagging receivers never block the engine; sending with no subscribers
/// is not an error.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EditorEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Emits an event to all subscribers.
    pub fn emit(&self, event: EditorEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper for consuming events asynchronously.
///
/// ## Example
///
/// ```ignore
/// let mut handler = EventHandler::new(editor.subscribe());
///
/// tokio::spawn(async move {
///     while let Some(event) = handler.next().await {
///         if let EditorEvent::BufferEntered(buf) = event {
///             // refresh the view for `buf`
///         }
///     }
/// });
/// ```
pub struct EventHandler {
    receiver: broadcast::Receiver<EditorEvent>,
}

impl EventHandler {
    pub fn new(receiver: broadcast::Receiver<EditorEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event; `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<EditorEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event handler lagged, missed {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns an event if one is already queued.
    pub fn try_next(&mut self) -> Option<EditorEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(EditorEvent::BufferWiped(BufferId::new(4)));

        let event = rx.recv().await.unwrap();
        assert_eq!(event, EditorEvent::BufferWiped(BufferId::new(4)));
    }

    #[tokio::test]
    async fn test_handler_ends_when_bus_dropped() {
        let bus = EventBus::new();
        let mut handler = EventHandler::new(bus.subscribe());
        bus.emit(EditorEvent::ModeChanged(ModeKind::Insert));
        drop(bus);

        assert_eq!(
            handler.next().await,
            Some(EditorEvent::ModeChanged(ModeKind::Insert))
        );
        assert_eq!(handler.next().await, None);
    }
}
