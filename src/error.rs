//! Error types shared by the key map, the decoder and the prompt widgets.

use std::io;

use thiserror::Error;

/// Failures reported synchronously when building a [`crate::KeyMap`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyMapError {
    #[error("key range bounds must not be empty")]
    EmptyRange,
    #[error("key range bounds differ in length ({start} vs {end} codepoints)")]
    LengthMismatch { start: usize, end: usize },
    #[error("key range bounds must share every codepoint but the last")]
    PrefixMismatch,
    #[error("key range start {start:?} is after end {end:?}")]
    Misordered { start: char, end: char },
    #[error("malformed key range {0:?}")]
    Malformed(String),
}

/// Terminal conditions raised while reading input.
///
/// End of input and an interrupt are distinct: callers can tell a closed stream from a user
/// abort, and neither is ever reported as "no match yet".
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("end of input")]
    EndOfInput,
    #[error("interrupted")]
    Interrupted,
    #[error("terminal read failed: {0}")]
    Io(#[from] io::Error),
}

/// Failures surfaced by prompt widgets and the console prompt session.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt interrupted by user")]
    Interrupted,
    #[error("input closed before the prompt completed")]
    EndOfInput,
    #[error("terminal i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("console prompt is not open")]
    NotOpen,
    #[error("prompt {0:?} has no selectable items")]
    Empty(String),
    #[error("no text editor configured for editor prompts")]
    NoEditor,
}

impl From<ReadError> for PromptError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::EndOfInput => PromptError::EndOfInput,
            ReadError::Interrupted => PromptError::Interrupted,
            ReadError::Io(err) => PromptError::Io(err),
        }
    }
}
