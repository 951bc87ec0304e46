//! Screen layout shared by the prompt widgets.
//!
//! A prompt screen is the accumulated header, one message row, then either the visible
//! window of a list or a free-form buffer row. Everything is redrawn through a
//! full-screen [`Display`], so only the rows that changed between key presses are sent.

use std::collections::BTreeSet;

use crate::config::UiConfig;
use crate::core::capabilities::{Capabilities, Capability};
use crate::core::keymap::{KeyMap, KEYMAP_LENGTH};
use crate::core::keys::{ctrl, esc, key};
use crate::core::output::OutputGate;
use crate::core::terminal::{Size, Terminal};
use crate::core::text::width::visible_width;
use crate::error::PromptError;
use crate::render::display::Display;
use crate::widgets::items::{Item, ItemKind};
use crate::widgets::list_range::ListRange;

const PREFIX_STYLE: &str = "32";
const MESSAGE_STYLE: &str = "1";
const ANSWER_STYLE: &str = "36";
const CURSOR_STYLE: &str = "36";
const BOX_STYLE: &str = "32";
const DISABLED_STYLE: &str = "37";
const SELECTED_STYLE: &str = "36";

/// Wrap `text` in an SGR sequence, resetting afterwards.
pub fn paint(style: &str, text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    format!("\x1b[{style}m{text}\x1b[0m")
}

/// `? message ` optionally followed by the given answer.
pub fn question_line(config: &UiConfig, message: &str, answer: Option<&str>) -> String {
    let mut line = paint(PREFIX_STYLE, &config.message_prefix);
    line.push_str(&paint(MESSAGE_STYLE, message));
    line.push(' ');
    if let Some(answer) = answer {
        line.push_str(&paint(ANSWER_STYLE, answer));
    }
    line
}

pub struct PromptView<'c> {
    config: &'c UiConfig,
    header: Vec<String>,
    message: String,
    page_size: usize,
    size: Size,
    display: Display,
    gate: OutputGate,
    range: Option<ListRange>,
}

impl<'c> PromptView<'c> {
    /// Lay out a prompt under `header` on `terminal`.
    ///
    /// The header is cut from the top so that at least `max(page_size, 3)` rows remain for
    /// the prompt itself.
    pub fn new<T: Terminal + ?Sized>(
        terminal: &T,
        config: &'c UiConfig,
        header: &[String],
        message: String,
        page_size: usize,
    ) -> Self {
        let size = terminal.size();
        let rows = size.rows as usize;
        let list_space = rows.min(page_size.max(3));
        let keep = rows - list_space;
        let header = if header.len() > keep {
            header[header.len() - keep..].to_vec()
        } else {
            header.to_vec()
        };
        let mut display = Display::new(terminal.capabilities().clone(), true);
        display.resize(rows, size.columns as usize);
        display.clear();
        display.reset();
        Self {
            config,
            header,
            message,
            page_size,
            size,
            display,
            gate: OutputGate::new(),
            range: None,
        }
    }

    pub fn config(&self) -> &UiConfig {
        self.config
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Screen row of the message line.
    pub fn message_row(&self) -> usize {
        self.header.len()
    }

    /// Display columns taken by the message line before any typed text.
    pub fn message_width(&self) -> usize {
        visible_width(&self.message)
    }

    /// Rows available for list items.
    pub fn capacity(&self) -> usize {
        let rows = (self.size.rows as usize).saturating_sub(self.header.len() + 1);
        if self.page_size > 0 {
            rows.min(self.page_size)
        } else {
            rows
        }
    }

    pub fn range(&self) -> Option<ListRange> {
        self.range
    }

    /// Draw `lines` and put the cursor at `(row, column)`.
    pub fn draw<T: Terminal + ?Sized>(
        &mut self,
        terminal: &mut T,
        lines: &[String],
        row: usize,
        column: usize,
    ) -> Result<(), PromptError> {
        self.size = terminal.size();
        self.display
            .resize(self.size.rows as usize, self.size.columns as usize);
        let target = self.size.cursor_pos(row, column);
        self.gate.extend(self.display.update(lines, Some(target)));
        self.gate.flush(terminal)?;
        Ok(())
    }

    /// Draw a single-choice list with the cursor on item `cursor`.
    pub fn draw_list<T: Terminal + ?Sized>(
        &mut self,
        terminal: &mut T,
        items: &[Item],
        cursor: usize,
    ) -> Result<(), PromptError> {
        self.size = terminal.size();
        let lines = self.list_lines(items, cursor);
        let row = self.list_end_row();
        self.draw(terminal, &lines, row, 0)
    }

    /// Draw a checkbox list; `selected` holds the names of the checked items.
    pub fn draw_checkboxes<T: Terminal + ?Sized>(
        &mut self,
        terminal: &mut T,
        items: &[Item],
        cursor: usize,
        selected: &BTreeSet<String>,
    ) -> Result<(), PromptError> {
        self.size = terminal.size();
        let lines = self.checkbox_lines(items, cursor, selected);
        let row = self.list_end_row();
        self.draw(terminal, &lines, row, 0)
    }

    /// Draw the message with `buffer` after it, or on a `>> ` row below when `newline`.
    pub fn draw_buffer<T: Terminal + ?Sized>(
        &mut self,
        terminal: &mut T,
        buffer: &str,
        newline: bool,
        column: usize,
    ) -> Result<(), PromptError> {
        let mut lines = self.header.clone();
        if newline {
            lines.push(self.message.clone());
            if buffer.is_empty() {
                lines.push(String::new());
            } else {
                lines.push(format!("{}{buffer}", paint(PREFIX_STYLE, ">> ")));
            }
        } else {
            lines.push(format!("{}{buffer}", self.message));
        }
        let row = self.message_row();
        self.draw(terminal, &lines, row, column)
    }

    fn list_end_row(&self) -> usize {
        let shown = self.range.map_or(0, |range| range.len());
        (self.size.rows as usize)
            .saturating_sub(1)
            .min(self.message_row() + 1 + shown)
    }

    fn window(&mut self, cursor: usize, len: usize) -> ListRange {
        let range = ListRange::fit(self.range, cursor, len, self.capacity());
        self.range = Some(range);
        range
    }

    fn indicator_fill(&self) -> String {
        " ".repeat(visible_width(&self.config.indicator))
    }

    pub fn list_lines(&mut self, items: &[Item], cursor: usize) -> Vec<String> {
        let range = self.window(cursor, items.len());
        let mut lines = self.header.clone();
        lines.push(self.message.clone());
        for idx in range.iter() {
            let item = &items[idx];
            let key = item
                .key()
                .map(|key| format!("{key} - "))
                .unwrap_or_default();
            let line = if idx == cursor {
                format!(
                    "{} {}",
                    paint(CURSOR_STYLE, &self.config.indicator),
                    paint(SELECTED_STYLE, &format!("{key}{}", item.text))
                )
            } else if item.is_separator() {
                item.text.clone()
            } else {
                format!("{} {key}{}", self.indicator_fill(), item.text)
            };
            lines.push(with_disabled_reason(line, item));
        }
        lines
    }

    pub fn checkbox_lines(
        &mut self,
        items: &[Item],
        cursor: usize,
        selected: &BTreeSet<String>,
    ) -> Vec<String> {
        let range = self.window(cursor, items.len());
        let mut lines = self.header.clone();
        lines.push(self.message.clone());
        for idx in range.iter() {
            let item = &items[idx];
            let mut line = String::new();
            if item.is_selectable() {
                if idx == cursor {
                    line.push_str(&paint(CURSOR_STYLE, &self.config.indicator));
                } else {
                    line.push_str(&self.indicator_fill());
                }
                line.push(' ');
                let glyph = if selected.contains(&item.name) {
                    &self.config.checked_box
                } else {
                    &self.config.unchecked_box
                };
                line.push_str(&paint(BOX_STYLE, glyph));
            } else if let ItemKind::Checkbox { .. } = item.kind {
                line.push_str(&self.indicator_fill());
                line.push(' ');
                line.push_str(&paint(DISABLED_STYLE, &self.config.unavailable));
            }
            line.push_str(&item.text);
            lines.push(with_disabled_reason(line, item));
        }
        lines
    }
}

/// Bind every printable codepoint below [`KEYMAP_LENGTH`] to `op`.
pub fn bind_printable<B: Clone>(map: &mut KeyMap<B>, op: B) {
    for cp in 32..KEYMAP_LENGTH as u32 {
        if let Some(ch) = char::from_u32(cp) {
            map.bind(&ch.to_string(), op.clone());
        }
    }
}

/// `e`, `^E` and the down arrow move forward; `y`, `^Y` and the up arrow move back.
pub fn bind_line_motion<B: Clone>(map: &mut KeyMap<B>, caps: &Capabilities, down: B, up: B) {
    map.bind_all(["e".to_string(), ctrl('E')], down.clone());
    map.bind_all(key(caps, Capability::KeyDown), down.clone());
    map.bind_if_not_bound("\x1b[B", down);
    map.bind_all(["y".to_string(), ctrl('Y')], up.clone());
    map.bind_all(key(caps, Capability::KeyUp), up.clone());
    map.bind_if_not_bound("\x1b[A", up);
}

/// Enter accepts, Escape cancels and `^C` interrupts.
pub fn bind_exit_keys<B: Clone>(
    map: &mut KeyMap<B>,
    config: &UiConfig,
    exit: B,
    cancel: B,
    interrupt: B,
) {
    map.bind("\r", exit);
    map.bind(&esc(), cancel);
    map.bind(&ctrl('C'), interrupt);
    map.set_ambiguous_timeout(config.ambiguous_timeout);
}

fn with_disabled_reason(mut line: String, item: &Item) -> String {
    if let Some(reason) = &item.disabled {
        line.push_str(&format!(" ({reason})"));
    }
    line
}
