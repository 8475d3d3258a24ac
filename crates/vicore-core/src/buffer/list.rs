//! Buffer list queries: `:ls`, lookup by number or name, and the
//! `:bnext` / `:bprevious` order.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::path::{self, FileIdentity};
use super::{BufferId, BufferRef, BufferRegistry};

/// One line of `:ls` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferSummary {
    pub number: u32,
    pub listed: bool,
    pub current: bool,
    pub alternate: bool,
    /// Loaded and shown in a window
    pub active: bool,
    /// Loaded but not shown
    pub hidden: bool,
    pub modified: bool,
    pub name: String,
    /// 1-based cursor line
    pub line: usize,
}

impl fmt::Display for BufferSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = format!(
            "{:>3}{}{}{} {} \"{}\"",
            self.number,
            if self.listed { ' ' } else { 'u' },
            if self.current {
                '%'
            } else if self.alternate {
                '#'
            } else {
                ' '
            },
            if self.active {
                'a'
            } else if self.hidden {
                'h'
            } else {
                ' '
            },
            if self.modified { '+' } else { ' ' },
            self.name,
        );
        let pad = 40usize.saturating_sub(head.chars().count()).max(1);
        write!(f, "{head}{:pad$}line {}", "", self.line)
    }
}

impl BufferRegistry {
    /// Rows for `:ls`; unlisted buffers only with `include_unlisted`.
    pub fn list_buffers(&self, include_unlisted: bool) -> Vec<BufferSummary> {
        let window = self.windows.current();
        self.iter()
            .filter(|r| include_unlisted || r.listed)
            .map(|r| {
                let current = r.id() == self.curbuf;
                let line = if current {
                    window.cursor.line + 1
                } else {
                    r.cursor_for(window.id).map_or(1, |info| info.cursor.line + 1)
                };
                BufferSummary {
                    number: r.id().get(),
                    listed: r.listed,
                    current,
                    alternate: window.alt == Some(r.id()),
                    active: r.is_loaded() && r.nwindows > 0,
                    hidden: r.is_hidden(),
                    modified: r.modified,
                    name: r.display_name().to_string(),
                    line,
                }
            })
            .collect()
    }

    /// The live buffer with number `n`.
    pub fn find_by_number(&self, n: u32) -> Option<BufferRef> {
        let id = BufferId::new(n);
        self.make_ref(id)
    }

    /// The buffer editing `path` (or a hard link to it).
    pub fn find_by_path(&self, path: &Path) -> Option<BufferRef> {
        let full = path::full_name(path, &self.cwd);
        let file_id = FileIdentity::of(&full);
        self.find_existing(&full, file_id).map(|id| self.ref_of(id))
    }

    /// The `count`th listed buffer after the current one, wrapping.
    pub fn next_listed(&self, count: usize) -> Option<BufferRef> {
        self.step_listed(count, true)
    }

    /// The `count`th listed buffer before the current one, wrapping.
    pub fn prev_listed(&self, count: usize) -> Option<BufferRef> {
        self.step_listed(count, false)
    }

    fn step_listed(&self, count: usize, forward: bool) -> Option<BufferRef> {
        let len = self.order.len();
        let mut pos = self.order.iter().position(|id| *id == self.curbuf)?;
        for _ in 0..count.max(1) {
            // At most one full lap per step.
            let mut found = false;
            for _ in 0..len {
                pos = if forward {
                    (pos + 1) % len
                } else {
                    (pos + len - 1) % len
                };
                if self.records.get(&self.order[pos]).is_some_and(|r| r.listed) {
                    found = true;
                    break;
                }
            }
            if !found {
                return None;
            }
        }
        Some(self.ref_of(self.order[pos]))
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Changes the directory relative names are resolved and shown
    /// against.
    pub fn set_cwd(&mut self, cwd: impl Into<PathBuf>) {
        self.cwd = cwd.into();
        for record in self.records.values_mut() {
            if let Some(full) = record.full_name.as_deref() {
                record.short_name = Some(path::short_name(full, &self.cwd));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::OpenFlags;

    fn registry_in(dir: &Path) -> BufferRegistry {
        let mut registry = BufferRegistry::default();
        registry.set_cwd(dir);
        registry
    }

    #[test]
    fn test_ls_format() {
        let summary = BufferSummary {
            number: 3,
            listed: true,
            current: true,
            alternate: false,
            active: true,
            hidden: false,
            modified: true,
            name: "src/main.rs".to_string(),
            line: 12,
        };
        let line = summary.to_string();
        assert!(line.starts_with("  3 %a + \"src/main.rs\""));
        assert!(line.ends_with("line 12"));
        assert_eq!(line.find("line"), Some(40));
    }

    #[test]
    fn test_list_marks_current_and_alternate() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = registry_in(dir.path());
        let a = registry
            .open_or_reuse(Some(Path::new("a.txt")), 0, OpenFlags::LISTED)
            .unwrap();
        let b = registry
            .open_or_reuse(Some(Path::new("b.txt")), 0, OpenFlags::LISTED)
            .unwrap();
        registry.goto_buffer(a, false).unwrap();
        registry.goto_buffer(b, false).unwrap();

        let rows = registry.list_buffers(false);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].alternate && !rows[0].current);
        assert!(rows[1].current && rows[1].active);
        assert_eq!(rows[1].name, "b.txt");

        // The unnamed first buffer was deleted when a.txt replaced it.
        assert_eq!(registry.list_buffers(true).len(), 3);
    }

    #[test]
    fn test_next_and_prev_wrap() {
        let mut registry = BufferRegistry::default();
        let first = registry.current_buffer();
        let a = registry
            .open_or_reuse(Some(Path::new("a.txt")), 0, OpenFlags::LISTED)
            .unwrap();
        registry
            .open_or_reuse(Some(Path::new("hidden.txt")), 0, OpenFlags::empty())
            .unwrap();

        assert_eq!(registry.next_listed(1).map(|r| r.id()), Some(a.id()));
        assert_eq!(registry.next_listed(2).map(|r| r.id()), Some(first.id()));
        assert_eq!(registry.prev_listed(1).map(|r| r.id()), Some(a.id()));
    }

    #[test]
    fn test_find_by_number_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = registry_in(dir.path());
        let a = registry
            .open_or_reuse(Some(Path::new("a.txt")), 0, OpenFlags::LISTED)
            .unwrap();

        assert_eq!(registry.find_by_number(a.id().get()), Some(a));
        assert_eq!(registry.find_by_path(&dir.path().join("a.txt")), Some(a));
        assert_eq!(registry.find_by_path(Path::new("./a.txt")), Some(a));
        assert!(registry.find_by_number(99).is_none());
    }
}
