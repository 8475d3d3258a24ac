//! Where buffer text lives.
//!
//! The registry never touches text directly when a record is created or
//! destroyed; it asks a [`TextStorage`] to materialize or release it.
//! [`RopeStorage`] is the default, one `TextBuffer` per loaded record.

use std::collections::HashMap;

use vicore_buffer::TextBuffer;

use crate::buffer::{BufferId, BufferRecord};
use crate::CoreResult;

/// Owner of buffer contents.
pub trait TextStorage {
    /// Creates the content for `record`, reading its file if there is one.
    fn materialize(&mut self, record: &BufferRecord) -> CoreResult<()>;

    /// Drops the content and undo history of `record`.
    fn release_storage(&mut self, record: &BufferRecord);

    /// Whether the content differs from what was read.
    fn is_modified(&self, record: &BufferRecord) -> bool;

    fn text(&self, id: BufferId) -> Option<&TextBuffer>;

    fn text_mut(&mut self, id: BufferId) -> Option<&mut TextBuffer>;

    /// Number of lines, 0 when not materialized.
    fn line_count(&self, id: BufferId) -> usize {
        self.text(id).map_or(0, TextBuffer::len_lines)
    }
}

/// Rope-backed storage.
#[derive(Debug, Default)]
pub struct RopeStorage {
    texts: HashMap<BufferId, TextBuffer>,
    undo_levels: usize,
}

impl RopeStorage {
    pub fn new(undo_levels: usize) -> Self {
        Self {
            texts: HashMap::new(),
            undo_levels,
        }
    }

    /// Number of materialized records.
    pub fn loaded(&self) -> usize {
        self.texts.len()
    }
}

impl TextStorage for RopeStorage {
    fn materialize(&mut self, record: &BufferRecord) -> CoreResult<()> {
        let text = match record.full_name() {
            Some(path) if path.exists() => {
                tracing::debug!("Reading {} into buffer {}", path.display(), record.id());
                TextBuffer::from_file(path)?
            }
            _ => TextBuffer::with_undo_levels(self.undo_levels),
        };
        self.texts.insert(record.id(), text);
        Ok(())
    }

    fn release_storage(&mut self, record: &BufferRecord) {
        self.texts.remove(&record.id());
    }

    fn is_modified(&self, record: &BufferRecord) -> bool {
        self.texts
            .get(&record.id())
            .is_some_and(TextBuffer::is_modified)
    }

    fn text(&self, id: BufferId) -> Option<&TextBuffer> {
        self.texts.get(&id)
    }

    fn text_mut(&mut self, id: BufferId) -> Option<&mut TextBuffer> {
        self.texts.get_mut(&id)
    }
}
