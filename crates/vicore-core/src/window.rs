//! Windows: views onto buffer records.
//!
//! The engine only tracks what the buffer registry needs from a window:
//! which record it shows, where its cursor is, and its alternate buffer.
//! Layout and drawing belong to the display layer.

use vicore_buffer::Position;

use crate::buffer::BufferId;

/// Window identifier, unique for the life of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u32);

impl WindowId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single window.
#[derive(Debug, Clone)]
pub struct Window {
    pub id: WindowId,
    /// Shown record; `None` only transiently while a buffer is being closed
    pub buffer: Option<BufferId>,
    pub cursor: Position,
    pub topline: usize,
    /// Alternate buffer (`#`)
    pub alt: Option<BufferId>,
}

impl Window {
    fn new(id: WindowId, buffer: BufferId) -> Self {
        Self {
            id,
            buffer: Some(buffer),
            cursor: Position::ZERO,
            topline: 0,
            alt: None,
        }
    }
}

/// All windows plus the current one.
#[derive(Debug, Clone)]
pub struct WindowList {
    windows: Vec<Window>,
    current: WindowId,
    next_id: u32,
}

impl WindowList {
    /// Creates a list with one window showing `buffer`.
    pub fn new(buffer: BufferId) -> Self {
        let first = WindowId(1);
        Self {
            windows: vec![Window::new(first, buffer)],
            current: first,
            next_id: 2,
        }
    }

    pub fn current_id(&self) -> WindowId {
        self.current
    }

    pub fn current(&self) -> &Window {
        // The current window is never removed without choosing a new one.
        self.windows
            .iter()
            .find(|w| w.id == self.current)
            .unwrap_or(&self.windows[0])
    }

    pub fn current_mut(&mut self) -> &mut Window {
        let current = self.current;
        let idx = self
            .windows
            .iter()
            .position(|w| w.id == current)
            .unwrap_or(0);
        &mut self.windows[idx]
    }

    pub fn get(&self, id: WindowId) -> Option<&Window> {
        self.windows.iter().find(|w| w.id == id)
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.iter_mut().find(|w| w.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Window> {
        self.windows.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Window> {
        self.windows.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Windows showing `buffer`, in order.
    pub fn showing(&self, buffer: BufferId) -> Vec<WindowId> {
        self.windows
            .iter()
            .filter(|w| w.buffer == Some(buffer))
            .map(|w| w.id)
            .collect()
    }

    /// Opens a copy of the current window after it and makes it current.
    pub fn split(&mut self) -> WindowId {
        let id = WindowId(self.next_id);
        self.next_id += 1;

        let mut window = self.current().clone();
        window.id = id;
        let at = self
            .windows
            .iter()
            .position(|w| w.id == self.current)
            .map_or(self.windows.len(), |i| i + 1);
        self.windows.insert(at, window);
        self.current = id;
        id
    }

    /// Removes a window. The last window can never be removed.
    ///
    /// When the current window goes, the window before it (or the new
    /// first one) becomes current.
    pub fn remove(&mut self, id: WindowId) -> Option<Window> {
        if self.windows.len() <= 1 {
            return None;
        }
        let idx = self.windows.iter().position(|w| w.id == id)?;
        let window = self.windows.remove(idx);
        if self.current == id {
            self.current = self.windows[idx.saturating_sub(1)].id;
        }
        Some(window)
    }

    /// Makes `id` the current window.
    pub fn set_current(&mut self, id: WindowId) -> bool {
        if self.get(id).is_some() {
            self.current = id;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_and_remove() {
        let mut windows = WindowList::new(BufferId::new(1));
        let first = windows.current_id();
        let second = windows.split();

        assert_eq!(windows.len(), 2);
        assert_eq!(windows.current_id(), second);
        assert_eq!(windows.showing(BufferId::new(1)), vec![first, second]);

        windows.remove(second).unwrap();
        assert_eq!(windows.current_id(), first);
        assert!(windows.remove(first).is_none());
    }
}
