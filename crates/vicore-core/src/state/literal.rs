//! Literal character entry (`Ctrl-V` in Insert mode).
//!
//! `Ctrl-V 065` inserts `A`, `Ctrl-V x41` too, `Ctrl-V u20ac` inserts
//! `€`. A key that is not a digit of the chosen radix ends entry early
//! and is handed back to the mode underneath. With no digits at all the
//! key itself is the character, which is how `Ctrl-V <Esc>` inserts an
//! escape.

use super::{ExecutionStatus, ModeContext, ModeKind, ModeState};
use crate::keymap::{Keymap, keys};

/// Receives the resolved code point when entry ends.
pub type LiteralSink = Box<dyn FnOnce(u32, &mut ModeContext<'_>)>;

/// Digit alphabet of a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Decimal,
    Octal,
    Hex,
    /// `u`: up to four hex digits, any code point
    Unicode4,
    /// `U`: up to eight hex digits, any code point
    Unicode8,
}

impl Radix {
    fn base(self) -> u32 {
        match self {
            Radix::Decimal => 10,
            Radix::Octal => 8,
            Radix::Hex | Radix::Unicode4 | Radix::Unicode8 => 16,
        }
    }

    fn max_digits(self) -> usize {
        match self {
            Radix::Decimal | Radix::Octal => 3,
            Radix::Hex => 2,
            Radix::Unicode4 => 4,
            Radix::Unicode8 => 8,
        }
    }

    fn is_unicode(self) -> bool {
        matches!(self, Radix::Unicode4 | Radix::Unicode8)
    }
}

/// The literal entry sub-mode.
pub struct LiteralMode {
    radix: Option<Radix>,
    value: u32,
    digits: usize,
    /// Key that ended entry without being a digit
    terminator: Option<u8>,
    sink: Option<LiteralSink>,
    suppressed: bool,
}

impl LiteralMode {
    /// Starts entry; key remapping stays off until cleanup.
    pub fn initialize(keymap: &mut Keymap, sink: LiteralSink) -> Self {
        keymap.suppress();
        Self {
            radix: None,
            value: 0,
            digits: 0,
            terminator: None,
            sink: Some(sink),
            suppressed: true,
        }
    }

    pub fn radix(&self) -> Option<Radix> {
        self.radix
    }

    /// Code point entry resolves to so far.
    pub fn value(&self) -> u32 {
        if self.digits == 0 {
            return match self.terminator {
                Some(keys::KEY_ZERO) => u32::from(b'\n'),
                Some(key) => u32::from(key),
                None => 0,
            };
        }
        // Text cannot hold a NUL.
        if self.value == 0 {
            u32::from(b'\n')
        } else {
            self.value
        }
    }

    fn digit(&mut self, radix: Radix, key: u8) -> ExecutionStatus {
        let Some(d) = char::from(key).to_digit(radix.base()) else {
            self.terminator = Some(key);
            return if self.digits == 0 {
                ExecutionStatus::Completed
            } else {
                ExecutionStatus::CompletedUnhandled
            };
        };

        self.value = self.value.saturating_mul(radix.base()).saturating_add(d);
        if !radix.is_unicode() {
            self.value = self.value.min(255);
        }
        self.digits += 1;

        if self.digits == radix.max_digits() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Handled
        }
    }
}

impl ModeState for LiteralMode {
    fn kind(&self) -> ModeKind {
        ModeKind::InsertLiteral
    }

    fn execute(&mut self, _ctx: &mut ModeContext<'_>, key: u8) -> ExecutionStatus {
        let radix = match self.radix {
            Some(radix) => radix,
            None => {
                let chosen = match key {
                    b'x' | b'X' => Radix::Hex,
                    b'o' | b'O' => Radix::Octal,
                    b'u' => Radix::Unicode4,
                    b'U' => Radix::Unicode8,
                    _ => {
                        self.radix = Some(Radix::Decimal);
                        return self.digit(Radix::Decimal, key);
                    }
                };
                self.radix = Some(chosen);
                return ExecutionStatus::Handled;
            }
        };
        self.digit(radix, key)
    }

    fn cleanup(&mut self, ctx: &mut ModeContext<'_>) {
        let value = self.value();
        if let Some(sink) = self.sink.take() {
            sink(value, ctx);
        }
        if std::mem::take(&mut self.suppressed) {
            ctx.keymap.restore();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferRegistry;
    use crate::state::ExecutionStatus::{Completed, CompletedUnhandled, Handled};
    use std::cell::Cell;
    use std::rc::Rc;

    /// Feeds `input` to a fresh literal mode; returns the statuses and
    /// the value the sink received.
    fn run(input: &[u8]) -> (Vec<ExecutionStatus>, Option<u32>) {
        let mut buffers = BufferRegistry::default();
        let mut keymap = Keymap::new();
        let mut ctx = ModeContext::new(&mut buffers, &mut keymap);
        let got = Rc::new(Cell::new(None));
        let slot = Rc::clone(&got);
        let mut mode = LiteralMode::initialize(
            ctx.keymap,
            Box::new(move |value: u32, _ctx: &mut ModeContext<'_>| slot.set(Some(value))),
        );
        assert!(ctx.keymap.is_suppressed());

        let mut statuses = Vec::new();
        for &key in input {
            let status = mode.execute(&mut ctx, key);
            statuses.push(status);
            if status != ExecutionStatus::Handled {
                break;
            }
        }
        mode.cleanup(&mut ctx);
        mode.cleanup(&mut ctx);
        assert!(!ctx.keymap.is_suppressed());
        (statuses, got.get())
    }

    #[test]
    fn test_decimal_completes_at_three_digits() {
        let (statuses, value) = run(b"065");
        assert_eq!(statuses, vec![Handled, Handled, Completed]);
        assert_eq!(value, Some(65));
    }

    #[test]
    fn test_non_digit_is_handed_back() {
        let (statuses, value) = run(b"9x");
        assert_eq!(statuses, vec![Handled, CompletedUnhandled]);
        assert_eq!(value, Some(9));
    }

    #[test]
    fn test_radix_prefixes() {
        assert_eq!(run(b"x41").1, Some(0x41));
        assert_eq!(run(b"X7e").1, Some(0x7e));
        assert_eq!(run(b"o101").1, Some(65));
        assert_eq!(run(b"u20ac").1, Some(0x20ac));
        assert_eq!(run(b"U0001f600").1, Some(0x1f600));
    }

    #[test]
    fn test_clamps_below_unicode() {
        assert_eq!(run(b"999").1, Some(255));
        assert_eq!(run(b"o777").1, Some(255));
    }

    #[test]
    fn test_no_digits_uses_the_key() {
        let (statuses, value) = run(&[keys::ESC]);
        assert_eq!(statuses, vec![Completed]);
        assert_eq!(value, Some(0x1b));

        assert_eq!(run(b"xg").1, Some(u32::from(b'g')));
        assert_eq!(run(&[keys::KEY_ZERO]).1, Some(u32::from(b'\n')));
    }

    #[test]
    fn test_zero_value_becomes_newline() {
        assert_eq!(run(b"000").1, Some(u32::from(b'\n')));
    }
}
