//! Terminal implementations.

#[cfg(unix)]
pub mod process_terminal;
pub mod stdin_buffer;
pub mod virtual_terminal;

#[cfg(unix)]
pub use process_terminal::{ProcessTerminal, TtyReader};
pub use virtual_terminal::VirtualTerminal;
