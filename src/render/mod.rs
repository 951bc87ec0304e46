//! Rendering: the minimal-diff [`Display`].

pub mod display;

pub use display::Display;
