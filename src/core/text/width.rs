//! Display widths in terminal columns.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

use super::ansi::escape_at;

/// Columns a tab expands to.
pub const TAB_WIDTH: usize = 3;

/// Columns taken by one grapheme cluster: 2 for wide characters and emoji, 0 for
/// combining marks and control characters.
pub fn grapheme_width(grapheme: &str) -> usize {
    match grapheme {
        "" => 0,
        "\t" => TAB_WIDTH,
        _ if emojis::get(grapheme).is_some() => 2,
        _ => grapheme
            .chars()
            .map(|ch| UnicodeWidthChar::width(ch).unwrap_or(0))
            .sum(),
    }
}

/// Columns taken by `input` once escape sequences are removed.
pub fn visible_width(input: &str) -> usize {
    let mut width = 0;
    let mut run_start = 0;
    let mut idx = 0;
    while idx < input.len() {
        if let Some(escape) = escape_at(input, idx) {
            width += run_width(&input[run_start..idx]);
            idx += escape.len();
            run_start = idx;
            continue;
        }
        match input[idx..].chars().next() {
            Some(ch) => idx += ch.len_utf8(),
            None => break,
        }
    }
    width + run_width(&input[run_start..])
}

fn run_width(run: &str) -> usize {
    run.graphemes(true).map(grapheme_width).sum()
}

#[cfg(test)]
mod tests {
    use super::{grapheme_width, visible_width};

    #[test]
    fn escapes_take_no_columns() {
        assert_eq!(visible_width("ok\x1b[31m!!\x1b[0m"), 4);
        assert_eq!(visible_width("\x1b]8;;https://example.com\x07link\x1b]8;;\x07"), 4);
    }

    #[test]
    fn wide_and_zero_width_graphemes() {
        assert_eq!(visible_width("中文"), 4);
        assert_eq!(visible_width("e\u{301}"), 1);
        assert_eq!(grapheme_width("\u{7}"), 0);
        assert_eq!(visible_width("😀"), 2);
        assert_eq!(visible_width("a\tb"), 5);
    }
}
