//! Styled display cells parsed from ANSI text.

use unicode_segmentation::UnicodeSegmentation;

use super::ansi::{escape_at, SgrState};
use super::width::grapheme_width;

/// One grapheme with its display width and the SGR state active when it was written.
///
/// Zero-width graphemes attach to the previous cell, so every cell has width 1 or 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub width: usize,
    /// Absolute SGR sequence (`""` for the default style).
    pub style: String,
}

impl Cell {
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            width: grapheme_width(text),
            style: String::new(),
        }
    }
}

/// Split `line` into display cells.
///
/// SGR sequences update the style; other escape sequences and control characters are
/// dropped. Tabs expand to three spaces.
pub fn parse_cells(line: &str) -> Vec<Cell> {
    let mut cells: Vec<Cell> = Vec::new();
    let mut sgr = SgrState::default();
    let mut style = String::new();
    let mut idx = 0;
    let mut run_start = 0;

    while idx < line.len() {
        if let Some(escape) = escape_at(line, idx) {
            push_run(&mut cells, &line[run_start..idx], &style);
            if escape.is_sgr() {
                sgr.apply(escape.text);
                style = sgr.to_sequence();
            }
            idx += escape.len();
            run_start = idx;
            continue;
        }
        match line[idx..].chars().next() {
            Some(ch) => idx += ch.len_utf8(),
            None => break,
        }
    }
    push_run(&mut cells, &line[run_start..], &style);
    cells
}

fn push_run(cells: &mut Vec<Cell>, run: &str, style: &str) {
    for grapheme in run.graphemes(true) {
        if grapheme == "\t" {
            for _ in 0..3 {
                cells.push(Cell {
                    text: " ".to_string(),
                    width: 1,
                    style: style.to_string(),
                });
            }
            continue;
        }
        if grapheme.chars().any(char::is_control) {
            continue;
        }
        let width = grapheme_width(grapheme);
        if width == 0 {
            if let Some(last) = cells.last_mut() {
                last.text.push_str(grapheme);
            }
            continue;
        }
        cells.push(Cell {
            text: grapheme.to_string(),
            width,
            style: style.to_string(),
        });
    }
}

/// Total display width of `cells`.
pub fn cells_width(cells: &[Cell]) -> usize {
    cells.iter().map(|cell| cell.width).sum()
}

/// Break `cells` into rows no wider than `columns`. A wide cell that would straddle the
/// edge starts the next row. An empty input still yields one empty row.
pub fn split_rows(cells: Vec<Cell>, columns: usize) -> Vec<Vec<Cell>> {
    let columns = columns.max(1);
    let mut rows = Vec::new();
    let mut row: Vec<Cell> = Vec::new();
    let mut width = 0;
    for cell in cells {
        if width + cell.width > columns && !row.is_empty() {
            rows.push(std::mem::take(&mut row));
            width = 0;
        }
        width += cell.width;
        row.push(cell);
    }
    rows.push(row);
    rows
}
