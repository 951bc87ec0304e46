//! Terminal trait and scoped raw-mode guard.

use std::io;
use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::core::capabilities::Capabilities;

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub rows: u16,
    pub columns: u16,
}

impl Size {
    pub fn new(rows: u16, columns: u16) -> Self {
        Self { rows, columns }
    }

    /// Linear cursor position of `(row, column)` on a screen of this width.
    pub fn cursor_pos(&self, row: usize, column: usize) -> usize {
        row * self.columns as usize + column
    }

    pub fn is_degenerate(&self) -> bool {
        self.rows == 0 || self.columns == 0
    }
}

/// Output side of a terminal plus its raw-mode state.
///
/// Writes may be buffered; nothing is guaranteed to reach the device before `flush`.
pub trait Terminal {
    /// Switch to raw mode. Calling it while already raw is a no-op.
    fn enter_raw_mode(&mut self) -> io::Result<()>;

    /// Restore the mode saved by the first `enter_raw_mode`. No-op when not raw.
    fn restore(&mut self) -> io::Result<()>;

    fn is_raw(&self) -> bool;

    fn write(&mut self, data: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    fn size(&self) -> Size;

    fn capabilities(&self) -> &Capabilities;

    fn columns(&self) -> u16 {
        self.size().columns
    }

    fn rows(&self) -> u16 {
        self.size().rows
    }
}

impl<T: Terminal + ?Sized> Terminal for &mut T {
    fn enter_raw_mode(&mut self) -> io::Result<()> {
        (**self).enter_raw_mode()
    }

    fn restore(&mut self) -> io::Result<()> {
        (**self).restore()
    }

    fn is_raw(&self) -> bool {
        (**self).is_raw()
    }

    fn write(&mut self, data: &str) -> io::Result<()> {
        (**self).write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn size(&self) -> Size {
        (**self).size()
    }

    fn capabilities(&self) -> &Capabilities {
        (**self).capabilities()
    }
}

/// RAII guard that enters raw mode and restores the terminal on drop.
///
/// Nested guards are harmless: only the guard that actually switched modes restores.
pub struct TerminalGuard<'a, T: Terminal + ?Sized> {
    terminal: &'a mut T,
    entered: bool,
}

impl<'a, T: Terminal + ?Sized> TerminalGuard<'a, T> {
    pub fn new(terminal: &'a mut T) -> io::Result<Self> {
        let entered = !terminal.is_raw();
        if entered {
            terminal.enter_raw_mode()?;
        }
        Ok(Self { terminal, entered })
    }

    /// Whether this guard switched the terminal into raw mode.
    pub fn entered(&self) -> bool {
        self.entered
    }
}

impl<T: Terminal + ?Sized> Deref for TerminalGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.terminal
    }
}

impl<T: Terminal + ?Sized> DerefMut for TerminalGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.terminal
    }
}

impl<T: Terminal + ?Sized> Drop for TerminalGuard<'_, T> {
    fn drop(&mut self) {
        let _ = self.terminal.flush();
        if self.entered {
            if let Err(err) = self.terminal.restore() {
                debug!(%err, "failed to restore terminal mode");
            }
        }
    }
}
