//! Multi-select checkbox prompt.

use std::collections::BTreeSet;

use crate::config::UiConfig;
use crate::core::binding_reader::BindingReader;
use crate::core::capabilities::Capabilities;
use crate::core::input::CharSource;
use crate::core::keymap::KeyMap;
use crate::core::terminal::Terminal;
use crate::core::text::ansi::strip_ansi;
use crate::error::PromptError;
use crate::widgets::items::{next_selectable, prev_selectable, Item};
use crate::widgets::prompt_view::{bind_exit_keys, bind_line_motion, PromptView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Down,
    Up,
    Toggle,
    Exit,
    Cancel,
    Interrupt,
}

/// Toggle any number of items with Space and accept with Enter.
#[derive(Debug, Clone)]
pub struct CheckboxPrompt {
    message: String,
    items: Vec<Item>,
    page_size: usize,
}

impl CheckboxPrompt {
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

    fn key_map(caps: &Capabilities, config: &UiConfig) -> KeyMap<Op> {
        let mut map = KeyMap::new();
        bind_line_motion(&mut map, caps, Op::Down, Op::Up);
        map.bind(" ", Op::Toggle);
        bind_exit_keys(&mut map, config, Op::Exit, Op::Cancel, Op::Interrupt);
        map
    }

    /// Run the prompt and return the names of the checked items, or `None` on Escape.
    ///
    /// Items created with [`Item::checked`] start out selected.
    pub fn execute<T, S>(
        &self,
        terminal: &mut T,
        reader: &mut BindingReader<S>,
        header: &[String],
        config: &UiConfig,
    ) -> Result<Option<BTreeSet<String>>, PromptError>
    where
        T: Terminal + ?Sized,
        S: CharSource,
    {
        let Some(mut cursor) = next_selectable(&self.items, None) else {
            return Err(PromptError::Empty(strip_ansi(&self.message).trim().to_string()));
        };
        let mut selected: BTreeSet<String> = self
            .items
            .iter()
            .filter(|item| item.is_checked())
            .map(|item| item.name.clone())
            .collect();
        let keys = Self::key_map(terminal.capabilities(), config);
        let mut view = PromptView::new(
            &*terminal,
            config,
            header,
            self.message.clone(),
            self.page_size,
        );
        loop {
            view.draw_checkboxes(terminal, &self.items, cursor, &selected)?;
            match reader.read_binding(&keys)? {
                Op::Down => cursor = next_selectable(&self.items, Some(cursor)).unwrap_or(cursor),
                Op::Up => cursor = prev_selectable(&self.items, cursor).unwrap_or(cursor),
                Op::Toggle => {
                    let name = &self.items[cursor].name;
                    if !selected.remove(name) {
                        selected.insert(name.clone());
                    }
                }
                Op::Exit => return Ok(Some(selected)),
                Op::Cancel => return Ok(None),
                Op::Interrupt => return Err(PromptError::Interrupted),
            }
        }
    }
}
