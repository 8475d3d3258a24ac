//! Line/column coordinates.
//!
//! ## Learning: Newtype Pattern
//!
//! `Position` wraps line/column coordinates instead of passing a bare
//! `(usize, usize)`, so the two can never be swapped by accident and
//! ordering comes for free from `Ord`.

use serde::{Deserialize, Serialize};

/// A position in a text buffer.
///
/// Both line and column are 0-indexed; the column counts characters, not
/// bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// Line number (0-indexed)
    pub line: usize,
    /// Column number (0-indexed, in characters)
    pub column: usize,
}

impl Position {
    /// Position at the start of the buffer.
    pub const ZERO: Position = Position { line: 0, column: 0 };

    /// Creates a new position.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Creates a position at the first column of `line`.
    pub fn line_start(line: usize) -> Self {
        Self { line, column: 0 }
    }

    /// Returns this position with the line replaced.
    pub fn with_line(self, line: usize) -> Self {
        Self { line, ..self }
    }

    /// Returns this position with the column replaced.
    pub fn with_column(self, column: usize) -> Self {
        Self { column, ..self }
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.line
            .cmp(&other.line)
            .then_with(|| self.column.cmp(&other.column))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 1-indexed for user-facing output
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}
