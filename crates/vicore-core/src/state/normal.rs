//! Normal mode: counts, motions and a few operators.

use super::{CmdLineMode, ExecutionStatus, InsertMode, ModeContext, ModeKind, ModeState, Operator};
use crate::keymap::keys;
use crate::{CoreError, CoreResult};

/// Largest count accepted; more digits are ignored.
const MAX_COUNT: usize = 99_999_999;

#[derive(Debug, Default)]
pub struct NormalMode {
    count: Option<usize>,
    operator: Option<Operator>,
    /// A `g` was typed and waits for its second key
    g_prefix: bool,
}

impl NormalMode {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_digit(&mut self, key: u8) {
        let digit = usize::from(key - b'0');
        let count = self.count.unwrap_or(0).saturating_mul(10).saturating_add(digit);
        self.count = Some(count.min(MAX_COUNT));
    }

    fn reset(&mut self) {
        self.count = None;
        self.operator = None;
        self.g_prefix = false;
    }

    fn run(&mut self, ctx: &mut ModeContext<'_>, key: u8) -> CoreResult<()> {
        let count = self.count.unwrap_or(1);
        let buffers = &mut *ctx.buffers;

        if self.g_prefix {
            if key == b'g' {
                buffers.goto_line(Some(count));
            }
            return Ok(());
        }
        if let Some(Operator::Delete) = self.operator {
            if key == b'd' {
                buffers.delete_lines(count)?;
            }
            return Ok(());
        }

        match key {
            b'h' | keys::BS => buffers.move_left(count),
            b'l' | b' ' => buffers.move_right(count, false),
            b'j' => buffers.move_down(count),
            b'k' => buffers.move_up(count),
            b'0' => buffers.move_line_start(),
            b'$' => buffers.move_line_end(false),
            b'G' => buffers.goto_line(self.count),
            b'x' => {
                buffers.delete_under_cursor(count)?;
            }
            b'u' => buffers.undo(count)?,
            keys::CTRL_R => buffers.redo(count)?,
            b'i' => ctx.push_mode(Box::new(InsertMode::new())),
            b'a' => {
                buffers.move_right(1, true);
                ctx.push_mode(Box::new(InsertMode::new()));
            }
            b'A' => {
                buffers.move_line_end(true);
                ctx.push_mode(Box::new(InsertMode::new()));
            }
            b'I' => {
                buffers.move_line_start();
                ctx.push_mode(Box::new(InsertMode::new()));
            }
            b'o' => {
                buffers.open_line_below()?;
                ctx.push_mode(Box::new(InsertMode::new()));
            }
            b':' => ctx.push_mode(Box::new(CmdLineMode::new())),
            keys::CTRL_HAT => match self.count {
                Some(n) => {
                    let n = u32::try_from(n).unwrap_or(u32::MAX);
                    let target = buffers.find_by_number(n).ok_or(CoreError::NoSuchBuffer(n))?;
                    buffers.goto_buffer(target, false)?;
                }
                None => buffers.goto_alternate(false)?,
            },
            _ => {}
        }
        Ok(())
    }
}

impl ModeState for NormalMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Normal
    }

    fn execute(&mut self, ctx: &mut ModeContext<'_>, key: u8) -> ExecutionStatus {
        let pending = self.g_prefix || self.operator.is_some();
        match key {
            b'1'..=b'9' if !pending => {
                self.push_digit(key);
                return ExecutionStatus::Handled;
            }
            b'0' if !pending && self.count.is_some() => {
                self.push_digit(key);
                return ExecutionStatus::Handled;
            }
            b'g' if !pending => {
                self.g_prefix = true;
                return ExecutionStatus::Handled;
            }
            b'd' if !pending => {
                self.operator = Some(Operator::Delete);
                return ExecutionStatus::Handled;
            }
            keys::ESC => {
                self.reset();
                return ExecutionStatus::Handled;
            }
            _ => {}
        }

        if let Err(e) = self.run(ctx, key) {
            ctx.buffers.report_error(&e);
        }
        self.reset();
        ExecutionStatus::Handled
    }

    fn pending_operator(&self) -> Option<Operator> {
        self.operator
    }
}
