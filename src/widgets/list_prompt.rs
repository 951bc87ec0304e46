//! Single-choice list prompt.

use crate::config::UiConfig;
use crate::core::binding_reader::BindingReader;
use crate::core::capabilities::Capabilities;
use crate::core::input::CharSource;
use crate::core::keymap::KeyMap;
use crate::core::terminal::Terminal;
use crate::core::text::ansi::strip_ansi;
use crate::error::PromptError;
use crate::widgets::items::{next_selectable, prev_selectable, Item};
use crate::widgets::prompt_view::{bind_exit_keys, bind_line_motion, bind_printable, PromptView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Down,
    Up,
    Shortcut,
    Exit,
    Cancel,
    Interrupt,
}

/// Pick one item with the arrow keys, `e`/`y`, or an item's shortcut key.
#[derive(Debug, Clone)]
pub struct ListPrompt {
    message: String,
    items: Vec<Item>,
    page_size: usize,
}

impl ListPrompt {
    pub fn new(message: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            message: message.into(),
            items,
            page_size: 0,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    fn key_map(caps: &Capabilities, config: &UiConfig) -> KeyMap<Op> {
        let mut map = KeyMap::new();
        bind_printable(&mut map, Op::Shortcut);
        bind_line_motion(&mut map, caps, Op::Down, Op::Up);
        bind_exit_keys(&mut map, config, Op::Exit, Op::Cancel, Op::Interrupt);
        map
    }

    /// Run the prompt. `Ok(None)` means the user cancelled with Escape.
    pub fn execute<T, S>(
        &self,
        terminal: &mut T,
        reader: &mut BindingReader<S>,
        header: &[String],
        config: &UiConfig,
    ) -> Result<Option<String>, PromptError>
    where
        T: Terminal + ?Sized,
        S: CharSource,
    {
        let Some(mut cursor) = next_selectable(&self.items, None) else {
            return Err(PromptError::Empty(strip_ansi(&self.message).trim().to_string()));
        };
        let keys = Self::key_map(terminal.capabilities(), config);
        let mut view = PromptView::new(
            &*terminal,
            config,
            header,
            self.message.clone(),
            self.page_size,
        );
        loop {
            view.draw_list(terminal, &self.items, cursor)?;
            match reader.read_binding(&keys)? {
                Op::Down => cursor = next_selectable(&self.items, Some(cursor)).unwrap_or(cursor),
                Op::Up => cursor = prev_selectable(&self.items, cursor).unwrap_or(cursor),
                Op::Shortcut => {
                    let typed = reader.last_binding();
                    if let Some(idx) = self.items.iter().position(|item| {
                        item.is_selectable()
                            && item.key().is_some_and(|key| typed.starts_with(key))
                    }) {
                        cursor = idx;
                    }
                }
                Op::Exit => return Ok(Some(self.items[cursor].name.clone())),
                Op::Cancel => return Ok(None),
                Op::Interrupt => return Err(PromptError::Interrupted),
            }
        }
    }
}
