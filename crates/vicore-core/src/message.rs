//! Message log shown to the user.

use std::collections::VecDeque;

/// Severity of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Error,
}

/// A single logged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
}

/// Bounded log of user-visible messages, oldest first.
#[derive(Debug, Clone)]
pub struct Messages {
    entries: VecDeque<Message>,
    capacity: usize,
}

impl Messages {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Records an informational message.
    pub fn msg(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::info!("{}", text);
        self.push(MessageKind::Info, text);
    }

    /// Records an error message.
    pub fn emsg(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!("{}", text);
        self.push(MessageKind::Error, text);
    }

    fn push(&mut self, kind: MessageKind, text: String) {
        self.entries.push_back(Message { kind, text });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// The most recent message.
    pub fn last(&self) -> Option<&Message> {
        self.entries.back()
    }

    /// The most recent error message.
    pub fn last_error(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|m| m.kind == MessageKind::Error)
            .map(|m| m.text.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    /// Removes and returns every message.
    pub fn drain(&mut self) -> Vec<Message> {
        self.entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Messages {
    fn default() -> Self {
        Self::new(200)
    }
}
