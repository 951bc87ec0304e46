//! Headless terminal that interprets the control sequences written to it.
//!
//! Understands the subset of xterm output the display engine and prompts emit: cursor
//! movement, erase, insert/delete lines and characters, with pending-wrap (`xenl`)
//! semantics at the right margin. SGR and mode sequences are accepted and ignored.

use std::io;

use unicode_segmentation::UnicodeSegmentation;

use crate::core::capabilities::Capabilities;
use crate::core::terminal::{Size, Terminal};
use crate::core::text::width::grapheme_width;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScreenCell {
    Blank,
    Text(String),
    /// Right half of a wide character.
    Continuation,
}

pub struct VirtualTerminal {
    rows: usize,
    columns: usize,
    grid: Vec<Vec<ScreenCell>>,
    row: usize,
    col: usize,
    pending_wrap: bool,
    caps: Capabilities,
    raw: bool,
    raw_entries: usize,
    staged: String,
    output: String,
    flushes: usize,
    parse_tail: String,
}

impl VirtualTerminal {
    pub fn new(rows: u16, columns: u16) -> Self {
        Self::with_capabilities(rows, columns, Capabilities::xterm())
    }

    pub fn with_capabilities(rows: u16, columns: u16, caps: Capabilities) -> Self {
        let (rows, columns) = (rows as usize, columns as usize);
        Self {
            rows,
            columns,
            grid: vec![vec![ScreenCell::Blank; columns]; rows],
            row: 0,
            col: 0,
            pending_wrap: false,
            caps,
            raw: false,
            raw_entries: 0,
            staged: String::new(),
            output: String::new(),
            flushes: 0,
            parse_tail: String::new(),
        }
    }

    /// Change the screen size, keeping the top-left content.
    pub fn resize(&mut self, rows: u16, columns: u16) {
        let (rows, columns) = (rows as usize, columns as usize);
        self.grid.resize(rows, vec![ScreenCell::Blank; columns]);
        for line in &mut self.grid {
            line.resize(columns, ScreenCell::Blank);
        }
        self.rows = rows;
        self.columns = columns;
        self.row = self.row.min(rows.saturating_sub(1));
        self.col = self.col.min(columns.saturating_sub(1));
        self.pending_wrap = false;
    }

    /// Every byte flushed so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    pub fn raw_mode_entries(&self) -> usize {
        self.raw_entries
    }

    /// `(row, column)` of the cursor.
    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// Screen rows with trailing blanks trimmed.
    pub fn screen_lines(&self) -> Vec<String> {
        self.grid
            .iter()
            .map(|line| {
                let mut text = String::new();
                for cell in line {
                    match cell {
                        ScreenCell::Blank => text.push(' '),
                        ScreenCell::Text(value) => text.push_str(value),
                        ScreenCell::Continuation => {}
                    }
                }
                text.trim_end().to_string()
            })
            .collect()
    }

    /// Screen rows up to the last non-empty one.
    pub fn visible_lines(&self) -> Vec<String> {
        let mut lines = self.screen_lines();
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        lines
    }

    fn apply(&mut self, data: &str) {
        let mut input = std::mem::take(&mut self.parse_tail);
        input.push_str(data);
        let mut idx = 0;
        let mut text_start = 0;
        while idx < input.len() {
            let Some(ch) = input[idx..].chars().next() else {
                break;
            };
            if ch != '\x1b' && !ch.is_control() {
                idx += ch.len_utf8();
                continue;
            }
            self.print_text(&input[text_start..idx]);
            if ch == '\x1b' {
                match self.escape(&input[idx..]) {
                    Some(len) => idx += len,
                    None => {
                        self.parse_tail = input[idx..].to_string();
                        return;
                    }
                }
            } else {
                self.control(ch);
                idx += ch.len_utf8();
            }
            text_start = idx;
        }
        self.print_text(&input[text_start..]);
    }

    fn control(&mut self, ch: char) {
        match ch {
            '\r' => {
                self.col = 0;
                self.pending_wrap = false;
            }
            '\n' => {
                self.line_feed();
                self.pending_wrap = false;
            }
            '\x08' => {
                if self.pending_wrap {
                    self.pending_wrap = false;
                } else {
                    self.col = self.col.saturating_sub(1);
                }
            }
            '\t' => {
                let next = (self.col / 8 + 1) * 8;
                self.col = next.min(self.columns.saturating_sub(1));
            }
            _ => {}
        }
    }

    fn line_feed(&mut self) {
        if self.row + 1 >= self.rows {
            if !self.grid.is_empty() {
                self.grid.remove(0);
                self.grid.push(vec![ScreenCell::Blank; self.columns]);
            }
        } else {
            self.row += 1;
        }
    }

    /// Length of the escape sequence at the start of `input`, or `None` when incomplete.
    fn escape(&mut self, input: &str) -> Option<usize> {
        let bytes = input.as_bytes();
        let &kind = bytes.get(1)?;
        match kind {
            b'[' => {
                let mut end = 2;
                while end < bytes.len() && !(0x40..=0x7e).contains(&bytes[end]) {
                    end += 1;
                }
                if end >= bytes.len() {
                    return None;
                }
                self.csi(&input[2..end], bytes[end] as char);
                Some(end + 1)
            }
            b']' => {
                let mut end = 2;
                while end < bytes.len() {
                    if bytes[end] == 0x07 {
                        return Some(end + 1);
                    }
                    if bytes[end] == 0x1b && bytes.get(end + 1) == Some(&b'\\') {
                        return Some(end + 2);
                    }
                    end += 1;
                }
                None
            }
            _ => Some(2),
        }
    }

    fn csi(&mut self, params: &str, final_byte: char) {
        if params.starts_with('?') || final_byte == 'm' {
            return;
        }
        let args: Vec<usize> = params
            .split(';')
            .map(|part| part.parse().unwrap_or(0))
            .collect();
        let arg = |idx: usize| args.get(idx).copied().filter(|&n| n > 0).unwrap_or(1);
        let last_col = self.columns.saturating_sub(1);
        let last_row = self.rows.saturating_sub(1);
        self.pending_wrap = false;
        match final_byte {
            'A' => self.row = self.row.saturating_sub(arg(0)),
            'B' => self.row = (self.row + arg(0)).min(last_row),
            'C' => self.col = (self.col + arg(0)).min(last_col),
            'D' => self.col = self.col.saturating_sub(arg(0)),
            'G' => self.col = (arg(0) - 1).min(last_col),
            'H' | 'f' => {
                self.row = (arg(0) - 1).min(last_row);
                self.col = (arg(1) - 1).min(last_col);
            }
            'J' => {
                let mode = args.first().copied().unwrap_or(0);
                match mode {
                    0 => {
                        self.erase_line_from(self.col);
                        for row in self.row + 1..self.rows {
                            self.grid[row].fill(ScreenCell::Blank);
                        }
                    }
                    1 => {
                        for row in 0..self.row {
                            self.grid[row].fill(ScreenCell::Blank);
                        }
                        self.erase_line_to(self.col);
                    }
                    _ => {
                        for line in &mut self.grid {
                            line.fill(ScreenCell::Blank);
                        }
                    }
                }
            }
            'K' => match args.first().copied().unwrap_or(0) {
                0 => self.erase_line_from(self.col),
                1 => self.erase_line_to(self.col),
                _ => {
                    if let Some(line) = self.grid.get_mut(self.row) {
                        line.fill(ScreenCell::Blank);
                    }
                }
            },
            'L' => {
                for _ in 0..arg(0).min(self.rows - self.row) {
                    self.grid.pop();
                    self.grid.insert(self.row, vec![ScreenCell::Blank; self.columns]);
                }
                self.col = 0;
            }
            'M' => {
                for _ in 0..arg(0).min(self.rows - self.row) {
                    self.grid.remove(self.row);
                    self.grid.push(vec![ScreenCell::Blank; self.columns]);
                }
                self.col = 0;
            }
            '@' => {
                if let Some(line) = self.grid.get_mut(self.row) {
                    for _ in 0..arg(0).min(self.columns - self.col) {
                        line.pop();
                        line.insert(self.col, ScreenCell::Blank);
                    }
                }
            }
            'P' => {
                if let Some(line) = self.grid.get_mut(self.row) {
                    for _ in 0..arg(0).min(self.columns - self.col) {
                        line.remove(self.col);
                        line.push(ScreenCell::Blank);
                    }
                }
            }
            _ => {}
        }
    }

    fn erase_line_from(&mut self, col: usize) {
        if let Some(line) = self.grid.get_mut(self.row) {
            for cell in line.iter_mut().skip(col) {
                *cell = ScreenCell::Blank;
            }
        }
    }

    fn erase_line_to(&mut self, col: usize) {
        if let Some(line) = self.grid.get_mut(self.row) {
            for cell in line.iter_mut().take(col + 1) {
                *cell = ScreenCell::Blank;
            }
        }
    }

    fn print_text(&mut self, text: &str) {
        if self.rows == 0 || self.columns == 0 {
            return;
        }
        for grapheme in text.graphemes(true) {
            let width = grapheme_width(grapheme);
            if width == 0 {
                continue;
            }
            if self.pending_wrap || self.col + width > self.columns {
                self.col = 0;
                self.line_feed();
                self.pending_wrap = false;
            }
            let line = &mut self.grid[self.row];
            line[self.col] = ScreenCell::Text(grapheme.to_string());
            if width == 2 && self.col + 1 < self.columns {
                line[self.col + 1] = ScreenCell::Continuation;
            }
            if self.col + width >= self.columns {
                self.col = self.columns - 1;
                self.pending_wrap = true;
            } else {
                self.col += width;
            }
        }
    }
}

impl Terminal for VirtualTerminal {
    fn enter_raw_mode(&mut self) -> io::Result<()> {
        if !self.raw {
            self.raw = true;
            self.raw_entries += 1;
        }
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        self.raw = false;
        Ok(())
    }

    fn is_raw(&self) -> bool {
        self.raw
    }

    fn write(&mut self, data: &str) -> io::Result<()> {
        self.staged.push_str(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        let data = std::mem::take(&mut self.staged);
        self.apply(&data);
        self.output.push_str(&data);
        Ok(())
    }

    fn size(&self) -> Size {
        Size::new(self.rows as u16, self.columns as u16)
    }

    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }
}
