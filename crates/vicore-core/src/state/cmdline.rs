//! Command-line mode: collects an Ex command after `:`.

use super::{ExecutionStatus, ModeContext, ModeKind, ModeState};
use crate::command::ExCommand;
use crate::keymap::keys;

#[derive(Debug, Default)]
pub struct CmdLineMode {
    line: Vec<u8>,
}

impl CmdLineMode {
    pub fn new() -> Self {
        Self::default()
    }

    /// The command typed so far.
    pub fn line(&self) -> String {
        String::from_utf8_lossy(&self.line).into_owned()
    }

    fn run(&self, ctx: &mut ModeContext<'_>) {
        let line = self.line();
        if line.trim().is_empty() {
            return;
        }
        tracing::debug!("Executing :{}", line);
        let result = ExCommand::parse(&line).and_then(|cmd| cmd.execute(ctx.buffers));
        if let Err(e) = result {
            ctx.buffers.report_error(&e);
        }
    }

    /// Removes the last character, not just its last byte.
    fn backspace(&mut self) {
        while let Some(byte) = self.line.pop() {
            if byte & 0xc0 != 0x80 {
                break;
            }
        }
    }
}

impl ModeState for CmdLineMode {
    fn kind(&self) -> ModeKind {
        ModeKind::CommandLine
    }

    fn execute(&mut self, ctx: &mut ModeContext<'_>, key: u8) -> ExecutionStatus {
        match key {
            keys::CR | keys::NL => {
                self.run(ctx);
                ExecutionStatus::Completed
            }
            keys::ESC | keys::CTRL_C => ExecutionStatus::Completed,
            keys::BS | keys::DEL => {
                if self.line.is_empty() {
                    return ExecutionStatus::Completed;
                }
                self.backspace();
                ExecutionStatus::Handled
            }
            0x20..=0xff | keys::TAB => {
                self.line.push(key);
                ExecutionStatus::Handled
            }
            _ => ExecutionStatus::Handled,
        }
    }
}
