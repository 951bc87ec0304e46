//! Text helpers (ANSI escapes, display width, styled cells).
//!
//! These helpers are pure and live under `core` so the display engine and the widgets can
//! share them.

pub mod ansi;
pub mod cells;
pub mod width;
