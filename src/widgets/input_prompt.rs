//! Single-line text input prompt.

use crate::config::UiConfig;
use crate::core::binding_reader::BindingReader;
use crate::core::capabilities::{Capabilities, Capability};
use crate::core::input::CharSource;
use crate::core::keymap::KeyMap;
use crate::core::keys::{ctrl, del, key};
use crate::core::terminal::Terminal;
use crate::core::text::width::visible_width;
use crate::error::PromptError;
use crate::widgets::prompt_view::{bind_exit_keys, bind_printable, PromptView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Insert,
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    Exit,
    Cancel,
    Interrupt,
}

/// Value typed by the user and what was shown for it (masked for passwords).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputAnswer {
    pub value: String,
    pub display: String,
}

#[derive(Debug, Clone)]
pub struct InputPrompt {
    message: String,
    default: Option<String>,
    mask: Option<char>,
}

impl InputPrompt {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            default: None,
            mask: None,
        }
    }

    /// Value returned when Enter is pressed on an empty line.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Echo `mask` instead of the typed characters.
    pub fn with_mask(mut self, mask: char) -> Self {
        self.mask = Some(mask);
        self
    }

    fn key_map(caps: &Capabilities, config: &UiConfig) -> KeyMap<Op> {
        let mut map = KeyMap::new();
        map.set_unicode(Op::Insert);
        bind_printable(&mut map, Op::Insert);
        map.bind_all([del(), ctrl('H')], Op::Backspace);
        map.bind_all(key(caps, Capability::KeyBackspace), Op::Backspace);
        map.bind(&ctrl('D'), Op::Delete);
        map.bind_all(key(caps, Capability::KeyDc), Op::Delete);
        map.bind_all([ctrl('B'), "\x1b[D".to_string()], Op::Left);
        map.bind_all(key(caps, Capability::KeyLeft), Op::Left);
        map.bind_all([ctrl('F'), "\x1b[C".to_string()], Op::Right);
        map.bind_all(key(caps, Capability::KeyRight), Op::Right);
        map.bind_all([ctrl('A'), "\x1b[H".to_string()], Op::Home);
        map.bind_all(key(caps, Capability::KeyHome), Op::Home);
        map.bind_all([ctrl('E'), "\x1b[F".to_string()], Op::End);
        map.bind_all(key(caps, Capability::KeyEnd), Op::End);
        bind_exit_keys(&mut map, config, Op::Exit, Op::Cancel, Op::Interrupt);
        map
    }

    fn shown(&self, value: &[char]) -> String {
        match self.mask {
            Some(mask) => std::iter::repeat(mask).take(value.len()).collect(),
            None => value.iter().collect(),
        }
    }

    pub fn execute<T, S>(
        &self,
        terminal: &mut T,
        reader: &mut BindingReader<S>,
        header: &[String],
        config: &UiConfig,
    ) -> Result<Option<InputAnswer>, PromptError>
    where
        T: Terminal + ?Sized,
        S: CharSource,
    {
        let keys = Self::key_map(terminal.capabilities(), config);
        let mut view = PromptView::new(&*terminal, config, header, self.message.clone(), 0);
        let start = view.message_width();
        let mut value: Vec<char> = Vec::new();
        let mut cursor = 0;
        loop {
            let shown = self.shown(&value);
            let column = start + visible_width(&self.shown(&value[..cursor]));
            view.draw_buffer(terminal, &shown, false, column)?;
            match reader.read_binding(&keys)? {
                Op::Insert => {
                    for ch in reader.last_binding().chars() {
                        value.insert(cursor, ch);
                        cursor += 1;
                    }
                }
                Op::Backspace => {
                    if cursor > 0 {
                        cursor -= 1;
                        value.remove(cursor);
                    }
                }
                Op::Delete => {
                    if cursor < value.len() {
                        value.remove(cursor);
                    }
                }
                Op::Left => cursor = cursor.saturating_sub(1),
                Op::Right => cursor = (cursor + 1).min(value.len()),
                Op::Home => cursor = 0,
                Op::End => cursor = value.len(),
                Op::Exit => {
                    if value.is_empty() {
                        if let Some(default) = &self.default {
                            value = default.chars().collect();
                        }
                    }
                    return Ok(Some(InputAnswer {
                        display: self.shown(&value),
                        value: value.into_iter().collect(),
                    }));
                }
                Op::Cancel => return Ok(None),
                Op::Interrupt => return Err(PromptError::Interrupted),
            }
        }
    }
}
