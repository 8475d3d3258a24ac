//! Key remapping.
//!
//! ## Learning: State Machines
//!
//! Matching a mapping is a small state machine of its own:
//! - No match: the queued key is dispatched as typed
//! - Pending: the queued keys start a longer mapping, wait for more
//! - Match: the mapped keys replace the typed ones
//!
//! Keys are raw bytes, exactly what a terminal delivers. Mappings are
//! written in key notation (`<Esc>`, `<CR>`, `<C-v>`) and parsed once.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::str::FromStr;

use crate::config::InputConfig;
use crate::{CoreError, CoreResult};

/// Byte values of the keys the engine reacts to.
pub mod keys {
    /// Typed `Ctrl-@`; stands for a NUL, which text cannot hold
    pub const KEY_ZERO: u8 = 0x00;
    pub const BS: u8 = 0x08;
    pub const TAB: u8 = 0x09;
    pub const NL: u8 = 0x0a;
    pub const CR: u8 = 0x0d;
    pub const CTRL_C: u8 = 0x03;
    pub const CTRL_R: u8 = 0x12;
    pub const CTRL_V: u8 = 0x16;
    pub const ESC: u8 = 0x1b;
    pub const CTRL_HAT: u8 = 0x1e;
    pub const DEL: u8 = 0x7f;
}

/// Modes a mapping can apply in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    Normal,
    Insert,
    CmdLine,
}

impl FromStr for MapMode {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "n" | "normal" => Ok(MapMode::Normal),
            "i" | "insert" => Ok(MapMode::Insert),
            "c" | "cmdline" => Ok(MapMode::CmdLine),
            other => Err(CoreError::InvalidArgument(format!("map mode {other}"))),
        }
    }
}

/// Result of looking up queued keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapMatch<'a> {
    /// The first `len` keys map to `rhs`
    Full { len: usize, rhs: &'a [u8] },
    /// The keys start a longer mapping
    Partial,
    None,
}

/// Per-mode byte mappings.
#[derive(Debug, Clone)]
pub struct Keymap {
    maps: HashMap<MapMode, BTreeMap<Vec<u8>, Vec<u8>>>,
    /// Nesting count of `suppress` calls
    suppressed: usize,
    enabled: bool,
}

impl Keymap {
    /// Creates an empty keymap.
    pub fn new() -> Self {
        Self {
            maps: HashMap::new(),
            suppressed: 0,
            enabled: true,
        }
    }

    /// Creates a keymap from configuration.
    ///
    /// Mappings that fail to parse are skipped with a warning.
    pub fn from_config(config: &InputConfig) -> Self {
        let mut keymap = Self::new();
        keymap.enabled = config.remap;

        for mapping in &config.mappings {
            let parsed = MapMode::from_str(&mapping.mode).and_then(|mode| {
                Ok((mode, parse_keys(&mapping.lhs)?, parse_keys(&mapping.rhs)?))
            });
            match parsed {
                Ok((mode, lhs, rhs)) => keymap.map(mode, &lhs, &rhs),
                Err(e) => tracing::warn!("Skipping mapping {:?}: {}", mapping.lhs, e),
            }
        }
        keymap
    }

    /// Adds or replaces a mapping.
    pub fn map(&mut self, mode: MapMode, lhs: &[u8], rhs: &[u8]) {
        if lhs.is_empty() {
            return;
        }
        self.maps
            .entry(mode)
            .or_default()
            .insert(lhs.to_vec(), rhs.to_vec());
    }

    /// Removes a mapping; returns whether it existed.
    pub fn unmap(&mut self, mode: MapMode, lhs: &[u8]) -> bool {
        self.maps
            .get_mut(&mode)
            .is_some_and(|map| map.remove(lhs).is_some())
    }

    /// Mappings of a mode, ordered by left-hand side.
    pub fn mappings(&self, mode: MapMode) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.maps
            .get(&mode)
            .into_iter()
            .flatten()
            .map(|(lhs, rhs)| (lhs.as_slice(), rhs.as_slice()))
    }

    /// Turns remapping off until the matching [`Keymap::restore`].
    pub fn suppress(&mut self) {
        self.suppressed += 1;
    }

    pub fn restore(&mut self) {
        self.suppressed = self.suppressed.saturating_sub(1);
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed > 0
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether lookups can match at all.
    pub fn is_active(&self) -> bool {
        self.enabled && self.suppressed == 0
    }

    /// Matches the queued `keys` against the mappings of `mode`.
    ///
    /// A possible longer match wins over a shorter complete one, so `j`
    /// alone waits when both `j` and `jk` are mapped.
    pub fn lookup(&self, mode: MapMode, keys: &[u8]) -> MapMatch<'_> {
        if !self.is_active() || keys.is_empty() {
            return MapMatch::None;
        }
        let Some(map) = self.maps.get(&mode) else {
            return MapMatch::None;
        };

        if map
            .range::<[u8], _>((Bound::Excluded(keys), Bound::Unbounded))
            .next()
            .is_some_and(|(lhs, _)| lhs.starts_with(keys))
        {
            return MapMatch::Partial;
        }
        self.lookup_complete(mode, keys)
    }

    /// Like [`Keymap::lookup`] but never waits: the longest mapping the
    /// keys already complete, if any. Used once no more input will come.
    pub fn lookup_complete(&self, mode: MapMode, keys: &[u8]) -> MapMatch<'_> {
        if !self.is_active() {
            return MapMatch::None;
        }
        self.maps
            .get(&mode)
            .into_iter()
            .flatten()
            .filter(|(lhs, _)| keys.starts_with(lhs))
            .max_by_key(|(lhs, _)| lhs.len())
            .map_or(MapMatch::None, |(lhs, rhs)| MapMatch::Full {
                len: lhs.len(),
                rhs,
            })
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses key notation into bytes.
///
/// Understands `<Esc>`, `<CR>`, `<NL>`, `<BS>`, `<Tab>`, `<Del>`,
/// `<Space>`, `<lt>`, `<Bar>`, `<Nul>` and `<C-x>`, case-insensitively.
/// Anything else, including an unknown `<...>`, is taken literally.
pub fn parse_keys(notation: &str) -> CoreResult<Vec<u8>> {
    let mut out = Vec::with_capacity(notation.len());
    let mut rest = notation;

    while !rest.is_empty() {
        if rest.starts_with('<') {
            if let Some(end) = rest.find('>') {
                if let Some(byte) = special_key(&rest[1..end]) {
                    out.push(byte);
                    rest = &rest[end + 1..];
                    continue;
                }
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
        rest = chars.as_str();
    }

    if out.is_empty() && !notation.is_empty() {
        return Err(CoreError::InvalidArgument(notation.to_string()));
    }
    Ok(out)
}

fn special_key(name: &str) -> Option<u8> {
    let lower = name.to_ascii_lowercase();
    let byte = match lower.as_str() {
        "esc" => keys::ESC,
        "cr" | "enter" | "return" => keys::CR,
        "nl" => keys::NL,
        "bs" => keys::BS,
        "tab" => keys::TAB,
        "del" => keys::DEL,
        "space" => b' ',
        "lt" => b'<',
        "bar" => b'|',
        "nul" => keys::KEY_ZERO,
        _ => {
            let ctrl = lower.strip_prefix("c-")?;
            let &[c] = ctrl.as_bytes() else {
                return None;
            };
            match c {
                b'a'..=b'z' => c - b'a' + 1,
                b'@' => 0x00,
                b'[' => keys::ESC,
                b'\\' => 0x1c,
                b']' => 0x1d,
                b'^' | b'6' => keys::CTRL_HAT,
                b'_' => 0x1f,
                _ => return None,
            }
        }
    };
    Some(byte)
}

/// Renders bytes in key notation, for listing mappings.
pub fn key_notation(bytes: &[u8]) -> String {
    let mut out = String::new();
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            match c {
                '\x1b' => out.push_str("<Esc>"),
                '\r' => out.push_str("<CR>"),
                '\n' => out.push_str("<NL>"),
                '\x08' => out.push_str("<BS>"),
                '\t' => out.push_str("<Tab>"),
                '\x7f' => out.push_str("<Del>"),
                '\0' => out.push_str("<Nul>"),
                '<' => out.push_str("<lt>"),
                c if (c as u32) < 0x20 => {
                    out.push_str(&format!("<C-{}>", ((c as u8) + b'@') as char));
                }
                c => out.push(c),
            }
        }
        for byte in chunk.invalid() {
            out.push_str(&format!("<{byte:#04x}>"));
        }
    }
    out
}
