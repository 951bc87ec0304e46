//! Line-oriented terminal toolkit.
//!
//! Invariant: single output gate. Only `core::output::OutputGate::flush(..)` writes to the
//! terminal.
//!
//! # Public API Overview
//! - Bind key sequences to actions with [`KeyMap`] and decode input with [`BindingReader`].
//! - Redraw a block of lines with the minimal-diff [`Display`].
//! - Page through long lists with [`ListRange`].
//! - Ask questions with the prompt widgets, or chain them in a [`ConsolePrompt`] session.

#![allow(
    clippy::derivable_impls,
    clippy::needless_range_loop,
    clippy::too_many_arguments,
    clippy::type_complexity
)]

pub mod config;
pub mod error;
pub mod logging;

pub mod core;
pub mod platform;
pub mod render;
pub mod widgets;

pub use crate::config::{env_config, EnvConfig, UiConfig};
pub use crate::error::{KeyMapError, PromptError, ReadError};

/// Key sequences, bindings and decoding.
pub use crate::core::binding_reader::BindingReader;
pub use crate::core::input::{CharSource, ReadResult, ScriptedInput};
pub use crate::core::keymap::KeyMap;

/// Terminal interfaces and capabilities.
pub use crate::core::capabilities::{Capabilities, Capability};
pub use crate::core::output::{OutputGate, TerminalCmd};
pub use crate::core::terminal::{Size, Terminal, TerminalGuard};
#[cfg(unix)]
pub use crate::platform::{ProcessTerminal, TtyReader};
pub use crate::platform::VirtualTerminal;

pub use crate::render::Display;

/// Prompt widgets.
pub use crate::widgets::{
    CheckboxPrompt, ChoiceOutcome, ChoicePrompt, ConfirmPrompt, ConsolePrompt, InputAnswer,
    InputPrompt, Item, ItemKind, ListPrompt, ListRange, PageSize, PromptElement, PromptResult,
    PromptResults, TextEditor,
};

/// Visible width helper that ignores ANSI control sequences.
pub use crate::core::text::width::visible_width;
