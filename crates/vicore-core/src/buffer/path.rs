//! File names for buffer records.
//!
//! Names are made absolute and cleaned up lexically, without touching the
//! file system, because the file may not exist yet. Hard links are caught
//! separately by comparing device and inode numbers.

use std::path::{Component, Path, PathBuf};

/// Device and inode of an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    /// Reads the identity of `path`, if the file exists.
    #[cfg(unix)]
    pub fn of(path: &Path) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;

        let meta = std::fs::metadata(path).ok()?;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    pub fn of(_path: &Path) -> Option<Self> {
        None
    }
}

/// Makes `path` absolute against `cwd` and removes `.` and `..`.
pub fn full_name(path: &Path, cwd: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `/..` stays `/`
                if out.parent().is_some() {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Name relative to `cwd` when the file is below it, else the full name.
pub fn short_name(full: &Path, cwd: &Path) -> String {
    match full.strip_prefix(cwd) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.display().to_string(),
        _ => full.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_is_lexical() {
        let cwd = Path::new("/home/user/project");
        assert_eq!(
            full_name(Path::new("src/../README.md"), cwd),
            PathBuf::from("/home/user/project/README.md")
        );
        assert_eq!(
            full_name(Path::new("./a/./b.txt"), cwd),
            PathBuf::from("/home/user/project/a/b.txt")
        );
        assert_eq!(full_name(Path::new("/../etc"), cwd), PathBuf::from("/etc"));
    }

    #[test]
    fn test_short_name() {
        let cwd = Path::new("/home/user/project");
        assert_eq!(
            short_name(Path::new("/home/user/project/src/main.rs"), cwd),
            "src/main.rs"
        );
        assert_eq!(short_name(Path::new("/etc/hosts"), cwd), "/etc/hosts");
    }

    #[cfg(unix)]
    #[test]
    fn test_hard_links_share_identity() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("a.txt");
        let link = dir.path().join("b.txt");
        std::fs::write(&original, "hello\n").unwrap();
        std::fs::hard_link(&original, &link).unwrap();

        assert_eq!(FileIdentity::of(&original), FileIdentity::of(&link));
        assert!(FileIdentity::of(&dir.path().join("missing")).is_none());
    }
}
