//! Insert mode.

use super::{ExecutionStatus, LiteralMode, ModeContext, ModeKind, ModeState};
use crate::keymap::keys;

/// Inserts typed text into the current buffer.
#[derive(Debug, Default)]
pub struct InsertMode {
    /// Bytes of a multi-byte character still being typed
    partial: Vec<u8>,
}

impl InsertMode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects `key` into a UTF-8 character, inserting it when whole.
    fn typed(&mut self, ctx: &mut ModeContext<'_>, key: u8) {
        self.partial.push(key);
        match std::str::from_utf8(&self.partial) {
            Ok(s) => {
                let result = ctx.buffers.insert_text(s);
                self.partial.clear();
                if let Err(e) = result {
                    ctx.buffers.report_error(&e);
                }
            }
            // Incomplete sequence; wait for the rest.
            Err(e) if e.error_len().is_none() => {}
            Err(_) => {
                tracing::debug!("Dropping invalid UTF-8 input {:?}", self.partial);
                self.partial.clear();
            }
        }
    }
}

/// Inserts the character a literal resolved to.
fn insert_literal(value: u32, ctx: &mut ModeContext<'_>) {
    let Some(c) = char::from_u32(value) else {
        tracing::debug!("Ignoring literal {:#x}: not a character", value);
        return;
    };
    let mut buf = [0u8; 4];
    if let Err(e) = ctx.buffers.insert_text(c.encode_utf8(&mut buf)) {
        ctx.buffers.report_error(&e);
    }
}

impl ModeState for InsertMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Insert
    }

    fn execute(&mut self, ctx: &mut ModeContext<'_>, key: u8) -> ExecutionStatus {
        if key >= 0x80 {
            self.typed(ctx, key);
            return ExecutionStatus::Handled;
        }
        self.partial.clear();

        let result = match key {
            keys::ESC => {
                ctx.buffers.leave_insert();
                return ExecutionStatus::Completed;
            }
            keys::CR | keys::NL => ctx.buffers.insert_text("\n"),
            keys::BS | keys::DEL => ctx.buffers.delete_before_cursor().map(|_| ()),
            keys::TAB => ctx.buffers.insert_text("\t"),
            keys::CTRL_V => {
                let literal = LiteralMode::initialize(ctx.keymap, Box::new(insert_literal));
                ctx.push_mode(Box::new(literal));
                Ok(())
            }
            0x20..=0x7e => {
                self.typed(ctx, key);
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            ctx.buffers.report_error(&e);
        }
        ExecutionStatus::Handled
    }

    fn cleanup(&mut self, _ctx: &mut ModeContext<'_>) {
        self.partial.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferRegistry;
    use crate::keymap::Keymap;
    use crate::state::StateMachine;

    fn feed(input: &[u8]) -> (String, StateMachine, BufferRegistry) {
        let mut buffers = BufferRegistry::default();
        let mut keymap = Keymap::new();
        let mut machine = StateMachine::new();
        {
            let mut ctx = ModeContext::new(&mut buffers, &mut keymap);
            machine.push(Box::new(InsertMode::new()), &mut ctx);
            machine.execute_keys(input, &mut ctx);
        }
        let text = buffers
            .current_text()
            .map(|t| t.text().into_owned())
            .unwrap_or_default();
        (text, machine, buffers)
    }

    #[test]
    fn test_typing_and_backspace() {
        let (text, _, buffers) = feed(b"helo\x08lo\rworld");
        assert_eq!(text, "hello\nworld");
        assert!(buffers.get(buffers.current_buffer().id()).unwrap().is_modified());
    }

    #[test]
    fn test_multibyte_input() {
        let (text, _, _) = feed("héllo €".as_bytes());
        assert_eq!(text, "héllo €");
    }

    #[test]
    fn test_ctrl_v_literal() {
        let (text, machine, _) = feed(b"\x16065");
        assert_eq!(text, "A");
        assert_eq!(machine.mode(), Some(ModeKind::Insert));

        let (text, machine, _) = feed(b"\x169x");
        assert_eq!(text, "\tx");
        assert_eq!(machine.mode(), Some(ModeKind::Insert));

        let (text, _, _) = feed(b"\x16u20ac");
        assert_eq!(text, "€");
    }

    #[test]
    fn test_ctrl_v_escape_is_inserted() {
        let (text, machine, _) = feed(b"\x16\x1b");
        assert_eq!(text, "\x1b");
        assert_eq!(machine.mode(), Some(ModeKind::Insert));
    }

    #[test]
    fn test_escape_completes() {
        let (text, machine, buffers) = feed(b"ab\x1b");
        assert_eq!(text, "ab");
        assert_eq!(machine.mode(), None);
        assert_eq!(buffers.cursor().column, 1);
    }
}
