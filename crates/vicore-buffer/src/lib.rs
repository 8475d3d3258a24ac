//! # Vicore Buffer
//!
//! The default text storage behind each buffer record: a rope holding the
//! content, an undo history cut into blocks at explicit sync points, and a
//! change tick bumped on every mutation.
//!
//! ## Key Concepts for Learning Rust
//!
//! ### Ownership & Borrowing
//! - `TextBuffer` owns the rope
//! - Reads hand out `Cow<str>` borrowed from the rope where possible
//! - Mutations require `&mut self` (exclusive access)

mod buffer;
mod history;
mod position;

pub use buffer::{DEFAULT_UNDO_LEVELS, TextBuffer};
pub use history::{Edit, EditKind, History, UndoBlock};
pub use position::Position;

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer operations
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("Position {line}:{column} is out of bounds")]
    PositionOutOfBounds { line: usize, column: usize },

    #[error("Invalid character index: {0}")]
    InvalidCharIndex(usize),

    #[error("Already at oldest change")]
    NothingToUndo,

    #[error("Already at newest change")]
    NothingToRedo,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    #[test]
    fn test_buffer_creation() {
        let buffer = TextBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len_chars(), 0);
        assert!(!buffer.is_modified());
    }

    #[test]
    fn test_insert_and_delete() {
        let mut buffer = TextBuffer::new();
        buffer.insert(0, "Hello").unwrap();
        buffer.insert(5, ", World!").unwrap();
        assert_eq!(buffer.text(), "Hello, World!");

        buffer.delete(5..7).unwrap();
        assert_eq!(buffer.text(), "HelloWorld!");
        assert!(buffer.is_modified());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Line 1\nLine 2\n").unwrap();

        let buffer = TextBuffer::from_file(file.path()).unwrap();
        assert_eq!(buffer.len_lines(), 3);
        assert_eq!(buffer.line(1).unwrap(), "Line 2");
        assert!(!buffer.is_modified());
    }

    #[test]
    fn test_nothing_to_undo() {
        let mut buffer = TextBuffer::new();
        assert!(matches!(buffer.undo(), Err(BufferError::NothingToUndo)));
    }

    proptest! {
        #[test]
        fn prop_undo_everything_restores_original(
            original in "[a-z\n]{0,40}",
            inserts in proptest::collection::vec((0usize..64, "[a-z]{1,4}"), 1..8),
        ) {
            let mut buffer = TextBuffer::from(original.as_str());
            for (at, text) in &inserts {
                let idx = (*at).min(buffer.len_chars());
                buffer.insert(idx, text).unwrap();
                buffer.sync_undo();
            }
            while buffer.can_undo() {
                buffer.undo().unwrap();
            }
            prop_assert_eq!(buffer.text().into_owned(), original);
        }
    }
}
