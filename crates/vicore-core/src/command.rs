//! Ex commands for the buffer list.
//!
//! ## Learning: The Command Pattern
//!
//! A typed command line becomes an [`ExCommand`] value first and only
//! then runs against the registry:
//! - Parsing errors never touch editor state
//! - Commands can be built directly by the host, skipping the parser
//! - Tests can check parsing and execution separately
//!
//! Command names may be abbreviated down to a minimum length, as in Vim:
//! `:b`, `:bd`, `:bun`, `:bw`, `:sp`, `:clo`.

use std::path::PathBuf;
use std::str::FromStr;

use crate::buffer::{BufHidden, BufferRef, BufferRegistry, CloseAction};
use crate::{CoreError, CoreResult};

/// How a command names a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferArg {
    Number(u32),
    /// `#`
    Alternate,
    /// `%`
    Current,
    /// Part of a buffer name
    Name(String),
}

impl BufferArg {
    fn parse(arg: &str) -> CoreResult<Self> {
        match arg {
            "#" => Ok(BufferArg::Alternate),
            "%" => Ok(BufferArg::Current),
            _ if arg.bytes().all(|b| b.is_ascii_digit()) => arg
                .parse()
                .map(BufferArg::Number)
                .map_err(|_| CoreError::InvalidArgument(arg.to_string())),
            _ => Ok(BufferArg::Name(arg.to_string())),
        }
    }

    /// Looks the buffer up in `registry`.
    pub fn resolve(&self, registry: &BufferRegistry) -> CoreResult<BufferRef> {
        match self {
            BufferArg::Number(n) => registry
                .find_by_number(*n)
                .ok_or(CoreError::NoSuchBuffer(*n)),
            BufferArg::Alternate => registry.alternate().ok_or(CoreError::NoAlternateFile),
            BufferArg::Current => Ok(registry.current_buffer()),
            BufferArg::Name(name) => resolve_name(registry, name),
        }
    }
}

/// Exact path first, then a unique listed buffer whose name contains
/// `name`.
fn resolve_name(registry: &BufferRegistry, name: &str) -> CoreResult<BufferRef> {
    if let Some(found) = registry.find_by_path(name.as_ref()) {
        return Ok(found);
    }
    let mut matches = registry
        .iter()
        .filter(|r| r.is_listed() && r.short_name().is_some_and(|s| s.contains(name)));
    match (matches.next(), matches.next()) {
        (Some(record), None) => Ok(registry.ref_of(record.id())),
        (Some(_), Some(_)) => Err(CoreError::AmbiguousBuffer(name.to_string())),
        (None, _) => Err(CoreError::NoMatchingBuffer(name.to_string())),
    }
}

/// A parsed Ex command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExCommand {
    /// `:e[dit][!] [file]`
    Edit { path: Option<PathBuf>, force: bool },
    /// `:b[uffer][!] [N|#|%|name]`; no target stays put
    Buffer {
        target: Option<BufferArg>,
        force: bool,
    },
    /// `:[N]bn[ext][!]`
    BufferNext { count: usize, force: bool },
    /// `:[N]bp[revious][!]`, `:[N]bN[ext][!]`
    BufferPrev { count: usize, force: bool },
    /// `:bun[load]`, `:bd[elete]`, `:bw[ipeout]`; no target is the
    /// current buffer
    BufferDelete {
        target: Option<BufferArg>,
        action: CloseAction,
        force: bool,
    },
    /// `:ls`, `:buffers`, `:files`; `!` shows unlisted buffers too
    List { include_unlisted: bool },
    /// `:sp[lit] [file]`
    Split { path: Option<PathBuf> },
    /// `:clo[se][!]`
    Close { force: bool },
    /// `:set [no]hidden`
    SetHidden(bool),
    /// `:setlocal bufhidden={value}`
    SetLocalBufHidden(BufHidden),
}

/// Command names with the shortest accepted abbreviation.
const NAMES: &[(&str, usize)] = &[
    ("edit", 1),
    ("buffer", 1),
    ("bnext", 2),
    ("bNext", 2),
    ("bprevious", 2),
    ("bdelete", 2),
    ("bunload", 3),
    ("bwipeout", 2),
    ("buffers", 7),
    ("ls", 2),
    ("files", 5),
    ("split", 2),
    ("close", 3),
    ("setlocal", 4),
    ("set", 2),
];

fn full_name(abbrev: &str) -> Option<&'static str> {
    NAMES
        .iter()
        .find(|(name, min)| abbrev.len() >= *min && name.starts_with(abbrev))
        .map(|(name, _)| *name)
}

impl ExCommand {
    /// Parses a command line, with or without its leading `:`.
    pub fn parse(line: &str) -> CoreResult<Self> {
        let line = line.trim().trim_start_matches(':').trim_start();
        let unknown = || CoreError::UnknownCommand(line.to_string());

        let digits = line.bytes().take_while(u8::is_ascii_digit).count();
        let (count, rest) = line.split_at(digits);
        let count: Option<usize> = if count.is_empty() {
            None
        } else {
            Some(count.parse().map_err(|_| unknown())?)
        };

        let name_len = rest.bytes().take_while(u8::is_ascii_alphabetic).count();
        let (name, rest) = rest.split_at(name_len);
        let (force, arg) = match rest.strip_prefix('!') {
            Some(arg) => (true, arg.trim()),
            None => (false, rest.trim()),
        };
        // `:b2` needs no space before its argument.
        if !rest.is_empty()
            && !force
            && !rest.starts_with(|c: char| c.is_whitespace() || c.is_ascii_digit())
        {
            return Err(unknown());
        }
        let name = full_name(name).ok_or_else(unknown)?;

        let path = || (!arg.is_empty()).then(|| PathBuf::from(arg));
        let target = || -> CoreResult<Option<BufferArg>> {
            match (arg.is_empty(), count) {
                (false, _) => BufferArg::parse(arg).map(Some),
                (true, Some(n)) => Ok(Some(BufferArg::Number(
                    u32::try_from(n).map_err(|_| CoreError::InvalidArgument(n.to_string()))?,
                ))),
                (true, None) => Ok(None),
            }
        };
        let step = || -> CoreResult<usize> {
            if arg.is_empty() {
                Ok(count.unwrap_or(1))
            } else {
                arg.parse()
                    .map_err(|_| CoreError::InvalidArgument(arg.to_string()))
            }
        };
        let delete = |action| -> CoreResult<Self> {
            Ok(ExCommand::BufferDelete {
                target: target()?,
                action,
                force,
            })
        };

        match name {
            "edit" => Ok(ExCommand::Edit {
                path: path(),
                force,
            }),
            "buffer" => Ok(ExCommand::Buffer {
                target: target()?,
                force,
            }),
            "bnext" => Ok(ExCommand::BufferNext {
                count: step()?,
                force,
            }),
            "bNext" | "bprevious" => Ok(ExCommand::BufferPrev {
                count: step()?,
                force,
            }),
            "bunload" => delete(CloseAction::Unload),
            "bdelete" => delete(CloseAction::Delete),
            "bwipeout" => delete(CloseAction::Wipe),
            "ls" | "buffers" | "files" => Ok(ExCommand::List {
                include_unlisted: force,
            }),
            "split" => Ok(ExCommand::Split { path: path() }),
            "close" => Ok(ExCommand::Close { force }),
            "set" => match arg {
                "hidden" | "hid" => Ok(ExCommand::SetHidden(true)),
                "nohidden" | "nohid" => Ok(ExCommand::SetHidden(false)),
                _ => Err(CoreError::InvalidArgument(arg.to_string())),
            },
            "setlocal" => {
                let (option, value) = arg
                    .split_once('=')
                    .ok_or_else(|| CoreError::InvalidArgument(arg.to_string()))?;
                match option {
                    "bufhidden" | "bh" => BufHidden::from_str(value).map(ExCommand::SetLocalBufHidden),
                    _ => Err(CoreError::InvalidArgument(arg.to_string())),
                }
            }
            _ => Err(unknown()),
        }
    }

    /// Runs the command.
    pub fn execute(self, registry: &mut BufferRegistry) -> CoreResult<()> {
        match self {
            ExCommand::Edit { path, force } => {
                let path = match path {
                    Some(path) => path,
                    None => registry
                        .get(registry.current_buffer().id())
                        .and_then(|r| r.full_name())
                        .map(PathBuf::from)
                        .ok_or_else(|| CoreError::InvalidArgument("No file name".into()))?,
                };
                registry.edit_file(&path, force)?;
            }
            ExCommand::Buffer { target, force } => {
                if let Some(target) = target {
                    let buf = target.resolve(registry)?;
                    registry.goto_buffer(buf, force)?;
                }
            }
            ExCommand::BufferNext { count, force } => {
                if let Some(buf) = registry.next_listed(count) {
                    registry.goto_buffer(buf, force)?;
                }
            }
            ExCommand::BufferPrev { count, force } => {
                if let Some(buf) = registry.prev_listed(count) {
                    registry.goto_buffer(buf, force)?;
                }
            }
            ExCommand::BufferDelete {
                target,
                action,
                force,
            } => {
                let buf = match target {
                    Some(target) => target.resolve(registry)?,
                    None => registry.current_buffer(),
                };
                let outcome = registry.close(buf, action, force)?;
                tracing::debug!("Closed buffer {}: {:?}", buf.id(), outcome);
            }
            ExCommand::List { include_unlisted } => {
                let rows = registry.list_buffers(include_unlisted);
                for row in rows {
                    registry.messages_mut().msg(row.to_string());
                }
            }
            ExCommand::Split { path } => {
                registry.split_window();
                if let Some(path) = path {
                    registry.edit_file(&path, false)?;
                }
            }
            ExCommand::Close { force } => {
                let win = registry.current_window();
                registry.close_window(win, force)?;
            }
            ExCommand::SetHidden(hidden) => registry.set_hidden(hidden),
            ExCommand::SetLocalBufHidden(policy) => {
                let buf = registry.current_buffer();
                registry.set_bufhidden(buf, policy)?;
            }
        }
        Ok(())
    }
}

impl FromStr for ExCommand {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::OpenFlags;

    #[test]
    fn test_abbreviations() {
        assert_eq!(
            ExCommand::parse("b 2").unwrap(),
            ExCommand::Buffer {
                target: Some(BufferArg::Number(2)),
                force: false
            }
        );
        assert_eq!(
            ExCommand::parse(":bun!").unwrap(),
            ExCommand::BufferDelete {
                target: None,
                action: CloseAction::Unload,
                force: true
            }
        );
        assert_eq!(
            ExCommand::parse("bw #").unwrap(),
            ExCommand::BufferDelete {
                target: Some(BufferArg::Alternate),
                action: CloseAction::Wipe,
                force: false
            }
        );
        assert_eq!(
            ExCommand::parse("3bN").unwrap(),
            ExCommand::BufferPrev {
                count: 3,
                force: false
            }
        );
        assert_eq!(
            ExCommand::parse("files!").unwrap(),
            ExCommand::List {
                include_unlisted: true
            }
        );
        assert_eq!(
            ExCommand::parse("setl bh=wipe").unwrap(),
            ExCommand::SetLocalBufHidden(BufHidden::Wipe)
        );
        assert_eq!(ExCommand::parse("se nohid").unwrap(), ExCommand::SetHidden(false));
    }

    #[test]
    fn test_count_as_buffer_number() {
        assert_eq!(
            ExCommand::parse("4bd").unwrap(),
            ExCommand::BufferDelete {
                target: Some(BufferArg::Number(4)),
                action: CloseAction::Delete,
                force: false
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ExCommand::parse("cl"),
            Err(CoreError::UnknownCommand(_))
        ));
        assert!(matches!(
            ExCommand::parse("bufferx"),
            Err(CoreError::UnknownCommand(_))
        ));
        assert!(matches!(
            ExCommand::parse("bd-"),
            Err(CoreError::UnknownCommand(_))
        ));
        assert_eq!(
            ExCommand::parse("b2").unwrap(),
            ExCommand::Buffer {
                target: Some(BufferArg::Number(2)),
                force: false
            }
        );
        assert!(matches!(
            ExCommand::parse("set number"),
            Err(CoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            ExCommand::parse("setlocal bufhidden=never"),
            Err(CoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_edit_and_switch() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "alpha\n").unwrap();
        std::fs::write(&b, "beta\n").unwrap();

        let mut registry = BufferRegistry::default();
        ExCommand::parse(&format!("e {}", a.display()))
            .unwrap()
            .execute(&mut registry)
            .unwrap();
        let first = registry.current_buffer();
        ExCommand::parse(&format!("e {}", b.display()))
            .unwrap()
            .execute(&mut registry)
            .unwrap();
        assert_ne!(registry.current_buffer(), first);

        ExCommand::parse("b #").unwrap().execute(&mut registry).unwrap();
        assert_eq!(registry.current_buffer(), first);
        ExCommand::parse("b b.txt").unwrap().execute(&mut registry).unwrap();
        assert_ne!(registry.current_buffer(), first);
        ExCommand::parse("bn").unwrap().execute(&mut registry).unwrap();
        assert_eq!(registry.current_buffer(), first);
    }

    #[test]
    fn test_ambiguous_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = BufferRegistry::default();
        registry.set_cwd(dir.path());
        for name in ["one.rs", "two.rs"] {
            let path = dir.path().join(name);
            registry
                .open_or_reuse(Some(path.as_path()), 1, OpenFlags::LISTED)
                .unwrap();
        }
        let err = ExCommand::parse("b .rs")
            .unwrap()
            .execute(&mut registry)
            .unwrap_err();
        assert!(matches!(err, CoreError::AmbiguousBuffer(_)));
        let err = ExCommand::parse("b zzz")
            .unwrap()
            .execute(&mut registry)
            .unwrap_err();
        assert_eq!(err.user_message(), "E94: No matching buffer for zzz");
    }

    #[test]
    fn test_list_writes_messages() {
        let mut registry = BufferRegistry::default();
        ExCommand::parse("ls").unwrap().execute(&mut registry).unwrap();
        let last = registry.messages().last().unwrap();
        assert!(last.text.contains("[No Name]"));
    }

    #[test]
    fn test_bdelete_only_buffer_empties_it() {
        let mut registry = BufferRegistry::default();
        let only = registry.current_buffer();
        ExCommand::parse("bd").unwrap().execute(&mut registry).unwrap();
        assert!(registry.is_valid(only));
        assert_eq!(registry.current_buffer().id(), only.id());
        assert_eq!(registry.len(), 1);
        assert!(registry.get(only.id()).unwrap().is_listed());
    }
}
