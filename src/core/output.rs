//! Typed terminal output commands and a single output gate.
//!
//! Invariant: all terminal writes flow through `OutputGate::flush(..)`.

use std::io;

use crate::core::capabilities::Capability;
use crate::core::terminal::Terminal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCmd {
    /// Raw bytes/control sequences (UTF-8 string) to be written to the terminal.
    Bytes(String),
    /// Static raw bytes/control sequences.
    BytesStatic(&'static str),
    /// Capability resolved against the terminal's table at flush time. Skipped when the
    /// terminal lacks it.
    Capability(Capability, Vec<i32>),

    /// Cursor visibility.
    HideCursor,
    ShowCursor,
}

impl TerminalCmd {
    pub fn bytes(data: impl Into<String>) -> Self {
        Self::Bytes(data.into())
    }

    pub fn capability(cap: Capability) -> Self {
        Self::Capability(cap, Vec::new())
    }
}

#[derive(Debug, Default)]
pub struct OutputGate {
    cmds: Vec<TerminalCmd>,
}

impl OutputGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: TerminalCmd) {
        self.cmds.push(cmd);
    }

    pub fn extend<I>(&mut self, cmds: I)
    where
        I: IntoIterator<Item = TerminalCmd>,
    {
        self.cmds.extend(cmds);
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    pub fn clear(&mut self) {
        self.cmds.clear();
    }

    /// Write buffered commands and flush the terminal.
    ///
    /// This is the single write gate: `Terminal::write(..)` must not be called
    /// from anywhere else. Commands that fail to write are dropped with the rest.
    pub fn flush<T: Terminal + ?Sized>(&mut self, term: &mut T) -> io::Result<()> {
        let cmds = std::mem::take(&mut self.cmds);
        for cmd in cmds {
            match cmd {
                TerminalCmd::Bytes(data) => term.write(&data)?,
                TerminalCmd::BytesStatic(data) => term.write(data)?,
                TerminalCmd::Capability(cap, params) => {
                    if let Some(data) = term.capabilities().tput(cap, &params) {
                        term.write(&data)?;
                    }
                }
                TerminalCmd::HideCursor => {
                    if let Some(data) = term.capabilities().tput(Capability::CursorInvisible, &[]) {
                        term.write(&data)?;
                    }
                }
                TerminalCmd::ShowCursor => {
                    if let Some(data) = term.capabilities().tput(Capability::CursorNormal, &[]) {
                        term.write(&data)?;
                    }
                }
            }
        }
        term.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::{OutputGate, TerminalCmd};
    use crate::core::capabilities::{Capabilities, Capability};
    use crate::platform::virtual_terminal::VirtualTerminal;
    use pretty_assertions::assert_eq;

    #[test]
    fn capabilities_resolve_at_flush_time() {
        let mut term = VirtualTerminal::new(2, 10);
        let mut gate = OutputGate::new();
        gate.push(TerminalCmd::capability(Capability::KeypadXmit));
        gate.push(TerminalCmd::bytes("hi"));
        gate.push(TerminalCmd::Capability(Capability::ParmLeftCursor, vec![2]));
        gate.flush(&mut term).unwrap();
        assert!(gate.is_empty());
        assert_eq!(term.output(), "\x1b[?1h\x1b=hi\x1b[2D");
        assert_eq!(term.flush_count(), 1);
    }

    #[test]
    fn missing_capabilities_are_skipped() {
        let mut term = VirtualTerminal::with_capabilities(2, 10, Capabilities::dumb());
        let mut gate = OutputGate::new();
        gate.extend([
            TerminalCmd::HideCursor,
            TerminalCmd::BytesStatic("ok"),
            TerminalCmd::ShowCursor,
        ]);
        gate.flush(&mut term).unwrap();
        assert_eq!(term.output(), "ok");
    }
}
