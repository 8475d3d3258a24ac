//! Buffer identity and epoch-checked references.
//!
//! ## Learning: Handles Instead of References
//!
//! Autocommands can wipe any buffer while an operation on it is in
//! flight, so nothing outside the registry ever keeps a `&BufferRecord`
//! across a callback. Code holds a [`BufferRef`] instead: a plain `Copy`
//! value that says which record it meant and when it looked. The
//! registry decides whether it still resolves.

use serde::{Deserialize, Serialize};

/// Buffer number, as shown by `:ls`.
///
/// Numbers are handed out in increasing order and are never given to a
/// second record while the first is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BufferId(u32);

impl BufferId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reference to a buffer record that survives callbacks.
///
/// Captures the registry's destroy epoch at creation. If no record has
/// been destroyed since, the reference is valid without a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRef {
    id: BufferId,
    epoch: u64,
}

impl BufferRef {
    pub(crate) fn new(id: BufferId, epoch: u64) -> Self {
        Self { id, epoch }
    }

    /// The referenced buffer number.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// The destroy epoch observed when this reference was made.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl std::fmt::Display for BufferRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.epoch)
    }
}
