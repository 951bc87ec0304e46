//! Minimal-diff display engine.
//!
//! `Display` caches the rows it last drew and, given the next desired lines plus a cursor
//! target, emits only the cursor moves and text needed to turn one into the other. All
//! positions are linear: `row * columns + column`, relative to the first row of the
//! display.

use tracing::{debug, trace};

use crate::core::capabilities::{BoolCapability, Capabilities, Capability};
use crate::core::output::TerminalCmd;
use crate::core::text::cells::{cells_width, parse_cells, split_rows, Cell};
use crate::core::text::width::visible_width;
use crate::logging::{debug_redraw_enabled, log_debug_redraw};

type Row = Vec<Cell>;

const SGR_RESET: &str = "\x1b[0m";

#[derive(Debug)]
pub struct Display {
    caps: Capabilities,
    full_screen: bool,
    old_rows: Vec<Row>,
    cursor_pos: usize,
    rows: usize,
    columns: usize,
    reset: bool,
    can_scroll: bool,
    no_wrap_at_eol: bool,
    auto_right_margin: bool,
    cursor_down_is_newline: bool,
    out: String,
}

impl Display {
    pub fn new(caps: Capabilities, full_screen: bool) -> Self {
        let can_scroll = can(&caps, Capability::InsertLine, Capability::ParmInsertLine)
            && can(&caps, Capability::DeleteLine, Capability::ParmDeleteLine);
        let auto_right_margin = caps.flag(BoolCapability::AutoRightMargin);
        let no_wrap_at_eol = auto_right_margin && caps.flag(BoolCapability::EatNewlineGlitch);
        let cursor_down_is_newline = caps.get(Capability::CursorDown) == Some("\n");
        Self {
            caps,
            full_screen,
            old_rows: Vec::new(),
            cursor_pos: 0,
            rows: 0,
            columns: 0,
            reset: false,
            can_scroll,
            no_wrap_at_eol,
            auto_right_margin,
            cursor_down_is_newline,
            out: String::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Linear position of the hardware cursor as last left by [`Display::update`].
    pub fn cursor_pos(&self) -> usize {
        self.cursor_pos
    }

    pub fn is_full_screen(&self) -> bool {
        self.full_screen
    }

    /// Adopt new terminal dimensions, re-splitting the cached rows by the new width.
    pub fn resize(&mut self, rows: usize, columns: usize) {
        if self.rows == rows && self.columns == columns {
            return;
        }
        if self.columns > 0 && columns > 0 {
            let row = self.cursor_pos / self.columns;
            let column = self.cursor_pos % self.columns;
            self.cursor_pos = row * columns + column.min(columns - 1);
        }
        self.rows = rows;
        self.columns = columns;
        if columns > 0 {
            self.old_rows = std::mem::take(&mut self.old_rows)
                .into_iter()
                .flat_map(|row| split_rows(row, columns))
                .collect();
        }
    }

    /// Forget what is on screen; the next update redraws every row from the top.
    pub fn reset(&mut self) {
        self.old_rows.clear();
    }

    /// Clear the whole screen before the next update. Full-screen mode only.
    pub fn clear(&mut self) {
        if self.full_screen {
            self.reset = true;
        }
    }

    /// Display width of `text`, ignoring SGR sequences.
    pub fn wcwidth(&self, text: &str) -> usize {
        visible_width(text)
    }

    /// Draw `lines` and leave the cursor at `target` (or after the last row).
    ///
    /// Lines wider than the terminal occupy several rows. Returns the commands to flush;
    /// an empty vector means nothing changed or the geometry is degenerate.
    pub fn update(&mut self, lines: &[String], target: Option<usize>) -> Vec<TerminalCmd> {
        if self.rows == 0 || self.columns == 0 {
            debug!(
                rows = self.rows,
                columns = self.columns,
                "skipping display update for degenerate size"
            );
            return Vec::new();
        }
        let columns = self.columns;
        let new_rows: Vec<Row> = lines
            .iter()
            .flat_map(|line| split_rows(parse_cells(line), columns))
            .collect();

        if debug_redraw_enabled() {
            log_debug_redraw(
                "update",
                self.old_rows.len(),
                new_rows.len(),
                self.rows,
            );
        }

        self.out.clear();
        if self.reset {
            self.puts(Capability::ClearScreen, &[]);
            self.old_rows.clear();
            self.cursor_pos = 0;
            self.reset = false;
        }

        if self.full_screen && self.can_scroll && !self.old_rows.is_empty() {
            self.scroll(&new_rows);
        }

        let common = self.old_rows.len().min(new_rows.len());
        for idx in 0..common {
            let row_start = idx * columns;
            let old = std::mem::take(&mut self.old_rows[idx]);
            self.update_row(row_start, &old, &new_rows[idx]);
        }

        let total = self.old_rows.len().max(new_rows.len());
        if self.old_rows.len() > new_rows.len() {
            self.clear_rows(common, total);
        } else {
            for idx in common..total {
                let row_start = idx * columns;
                self.move_to(row_start);
                self.print_cells(&new_rows[idx]);
                self.after_print(row_start);
            }
        }

        let end = match new_rows.last() {
            Some(last) => (new_rows.len() - 1) * columns + cells_width(last),
            None => 0,
        };
        self.move_to(target.unwrap_or(end));
        self.old_rows = new_rows;

        if self.out.is_empty() {
            return Vec::new();
        }
        trace!(bytes = self.out.len(), "display update");
        vec![TerminalCmd::Bytes(std::mem::take(&mut self.out))]
    }

    /// Full-screen scroll detection: when whole rows moved, shift them with insert/delete
    /// line instead of repainting them.
    fn scroll(&mut self, new_rows: &[Row]) {
        let columns = self.columns;
        let old_len = self.old_rows.len();
        let new_len = new_rows.len();
        let limit = old_len.min(new_len);
        let mut headers = 0;
        while headers < limit && self.old_rows[headers] == new_rows[headers] {
            headers += 1;
        }
        let footer_limit = if old_len == new_len {
            limit.saturating_sub(headers + 1)
        } else {
            limit - headers
        };
        let mut footers = 0;
        while footers < footer_limit
            && self.old_rows[old_len - footers - 1] == new_rows[new_len - footers - 1]
        {
            footers += 1;
        }

        if new_len > old_len {
            if headers + footers == old_len && footers > 0 {
                let nb = new_len - old_len;
                self.move_to(headers * columns);
                if self.insert_lines(nb) {
                    debug!(at = headers, count = nb, "scrolled rows down");
                    for _ in 0..nb {
                        self.old_rows.insert(headers, Row::new());
                    }
                }
            }
            return;
        }
        if new_len < old_len {
            if headers + footers == new_len && footers > 0 {
                let nb = old_len - new_len;
                self.move_to(headers * columns);
                if self.delete_lines(nb) {
                    debug!(at = headers, count = nb, "scrolled rows up");
                    self.old_rows.drain(headers..headers + nb);
                }
            }
            return;
        }

        let new_mid = &new_rows[headers..new_len - footers];
        let old_mid = &self.old_rows[headers..old_len - footers];
        let Some((s1, s2, len)) = longest_common(new_mid, old_mid) else {
            return;
        };
        if len > 1 && s1 < s2 {
            let nb = s2 - s1;
            self.move_to((headers + s1) * columns);
            if !self.delete_lines(nb) {
                return;
            }
            self.old_rows.drain(headers + s1..headers + s1 + nb);
            if footers > 0 {
                self.move_to((headers + s1 + len) * columns);
                if self.insert_lines(nb) {
                    for _ in 0..nb {
                        self.old_rows.insert(headers + s1 + len, Row::new());
                    }
                }
            }
            debug!(at = headers + s1, count = nb, "scrolled rows up");
        } else if len > 1 && s1 > s2 {
            let nb = s1 - s2;
            if footers > 0 {
                self.move_to((headers + s2 + len) * columns);
                if !self.delete_lines(nb) {
                    return;
                }
                self.old_rows.drain(headers + s2 + len..headers + s2 + len + nb);
            }
            self.move_to((headers + s2) * columns);
            if self.insert_lines(nb) {
                for _ in 0..nb {
                    self.old_rows.insert(headers + s2, Row::new());
                }
            }
            debug!(at = headers + s2, count = nb, "scrolled rows down");
        }
    }

    fn update_row(&mut self, row_start: usize, old: &[Cell], new: &[Cell]) {
        if old == new {
            return;
        }
        let mut prefix = 0;
        while prefix < old.len() && prefix < new.len() && old[prefix] == new[prefix] {
            prefix += 1;
        }
        let mut suffix = 0;
        while suffix < old.len() - prefix
            && suffix < new.len() - prefix
            && old[old.len() - suffix - 1] == new[new.len() - suffix - 1]
        {
            suffix += 1;
        }

        let start = row_start + cells_width(&new[..prefix]);
        let old_mid = &old[prefix..old.len() - suffix];
        let new_mid = &new[prefix..new.len() - suffix];
        let old_mid_width = cells_width(old_mid);
        let new_mid_width = cells_width(new_mid);

        if suffix > 0 && old_mid.is_empty() {
            self.move_to(start);
            if self.insert_chars(new_mid_width) {
                self.print_cells(new_mid);
                self.after_print(row_start);
                return;
            }
        } else if suffix > 0 && new_mid.is_empty() {
            self.move_to(start);
            if self.delete_chars(old_mid_width) {
                return;
            }
        } else if old_mid_width == new_mid_width {
            self.move_to(start);
            self.print_cells(new_mid);
            self.after_print(row_start);
            return;
        }

        self.move_to(start);
        self.print_cells(&new[prefix..]);
        let old_width = cells_width(old);
        let new_width = cells_width(new);
        if old_width > new_width {
            if !self.puts(Capability::ClrEol, &[]) {
                let nb = old_width - new_width;
                self.out.push_str(&" ".repeat(nb));
                self.cursor_pos += nb;
            }
        }
        self.after_print(row_start);
    }

    fn clear_rows(&mut self, from: usize, to: usize) {
        let columns = self.columns;
        if self.caps.has(Capability::ClrEos) {
            self.move_to(from * columns);
            self.puts(Capability::ClrEos, &[]);
            return;
        }
        for idx in from..to {
            let row_start = idx * columns;
            self.move_to(row_start);
            if !self.puts(Capability::ClrEol, &[]) {
                let nb = cells_width(&self.old_rows[idx]);
                self.out.push_str(&" ".repeat(nb));
                self.cursor_pos += nb;
                self.after_print(row_start);
            }
        }
    }

    /// Settle the cursor after output that may have reached the right margin.
    fn after_print(&mut self, row_start: usize) {
        if self.cursor_pos != row_start + self.columns {
            return;
        }
        if self.no_wrap_at_eol {
            // The wrap is pending; a carriage return cancels it.
            self.puts(Capability::CarriageReturn, &[]);
            self.cursor_pos = row_start;
        } else if !self.auto_right_margin {
            self.cursor_pos -= 1;
        }
    }

    fn print_cells(&mut self, cells: &[Cell]) {
        let mut style = "";
        for cell in cells {
            if cell.style != style {
                if !style.is_empty() {
                    self.out.push_str(SGR_RESET);
                }
                self.out.push_str(&cell.style);
                style = &cell.style;
            }
            self.out.push_str(&cell.text);
            self.cursor_pos += cell.width;
        }
        if !style.is_empty() {
            self.out.push_str(SGR_RESET);
        }
    }

    fn move_to(&mut self, target: usize) {
        if self.cursor_pos == target {
            return;
        }
        let width = self.columns;
        let (l0, mut c0) = (self.cursor_pos / width, self.cursor_pos % width);
        let (l1, c1) = (target / width, target % width);
        if l0 > l1 {
            self.perform(Capability::CursorUp, Capability::ParmUpCursor, l0 - l1);
        } else if l0 < l1 {
            let nb = l1 - l0;
            let moved = self.full_screen && self.puts(Capability::ParmDownCursor, &[nb as i32]);
            if moved {
            } else if self.full_screen && !self.cursor_down_is_newline {
                for _ in 0..nb {
                    self.puts(Capability::CursorDown, &[]);
                }
            } else {
                // A bare newline may scroll but never returns the carriage in raw mode.
                if c0 != 0 {
                    self.puts_or(Capability::CarriageReturn, "\r");
                    c0 = 0;
                }
                for _ in 0..nb {
                    self.out.push('\n');
                }
            }
        }
        if c0 != 0 && c1 == 0 {
            self.puts_or(Capability::CarriageReturn, "\r");
        } else if c0 < c1 {
            self.perform(Capability::CursorRight, Capability::ParmRightCursor, c1 - c0);
        } else if c0 > c1 {
            self.perform(Capability::CursorLeft, Capability::ParmLeftCursor, c0 - c1);
        }
        self.cursor_pos = target;
    }

    fn delete_lines(&mut self, nb: usize) -> bool {
        self.perform(Capability::DeleteLine, Capability::ParmDeleteLine, nb)
    }

    fn insert_lines(&mut self, nb: usize) -> bool {
        self.perform(Capability::InsertLine, Capability::ParmInsertLine, nb)
    }

    fn insert_chars(&mut self, nb: usize) -> bool {
        self.perform(Capability::InsertCharacter, Capability::ParmIch, nb)
    }

    fn delete_chars(&mut self, nb: usize) -> bool {
        self.perform(Capability::DeleteCharacter, Capability::ParmDch, nb)
    }

    /// Emit `single` `nb` times or `multi` once, whichever is shorter.
    fn perform(&mut self, single: Capability, multi: Capability, nb: usize) -> bool {
        let has_single = self.caps.has(single);
        let has_multi = self.caps.has(multi);
        if has_multi && (!has_single || self.cost(single) * nb > self.cost(multi)) {
            self.puts(multi, &[nb as i32])
        } else if has_single {
            for _ in 0..nb {
                self.puts(single, &[]);
            }
            true
        } else {
            debug!(cap = single.name(), "terminal lacks capability");
            false
        }
    }

    fn cost(&self, cap: Capability) -> usize {
        self.caps
            .tput(cap, &[0])
            .map(|value| value.len())
            .unwrap_or(usize::MAX)
    }

    fn puts(&mut self, cap: Capability, params: &[i32]) -> bool {
        match self.caps.tput(cap, params) {
            Some(value) => {
                self.out.push_str(&value);
                true
            }
            None => false,
        }
    }

    fn puts_or(&mut self, cap: Capability, fallback: &str) {
        if !self.puts(cap, &[]) {
            self.out.push_str(fallback);
        }
    }
}

fn can(caps: &Capabilities, single: Capability, multi: Capability) -> bool {
    caps.has(single) || caps.has(multi)
}

/// Longest run of equal rows between `a` and `b`: `(start_a, start_b, len)`.
fn longest_common(a: &[Row], b: &[Row]) -> Option<(usize, usize, usize)> {
    let mut best = (0, 0, 0);
    for i in 0..a.len() {
        for j in 0..b.len() {
            let mut len = 0;
            while i + len < a.len() && j + len < b.len() && a[i + len] == b[j + len] {
                len += 1;
            }
            if len > best.2 {
                best = (i, j, len);
            }
        }
    }
    (best.2 > 0).then_some(best)
}

#[cfg(test)]
mod tests {
    use super::Display;
    use crate::core::capabilities::{Capabilities, Capability};
    use crate::core::output::TerminalCmd;
    use pretty_assertions::assert_eq;

    fn bytes(cmds: Vec<TerminalCmd>) -> String {
        cmds.into_iter()
            .map(|cmd| match cmd {
                TerminalCmd::Bytes(data) => data,
                other => panic!("unexpected command {other:?}"),
            })
            .collect()
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn first_update_prints_every_row() {
        let mut display = Display::new(Capabilities::xterm(), false);
        display.resize(5, 20);
        let out = bytes(display.update(&lines(&["one", "two"]), None));
        assert_eq!(out, "one\r\ntwo");
        assert_eq!(display.cursor_pos(), 23);
    }

    #[test]
    fn identical_update_writes_nothing() {
        let mut display = Display::new(Capabilities::xterm(), false);
        display.resize(5, 20);
        display.update(&lines(&["one", "two"]), None);
        assert!(display.update(&lines(&["one", "two"]), None).is_empty());
    }

    #[test]
    fn single_character_change_touches_only_that_cell() {
        let mut display = Display::new(Capabilities::xterm(), false);
        display.resize(5, 20);
        display.update(&lines(&["hello", "world"]), Some(0));
        let out = bytes(display.update(&lines(&["hello", "wOrld"]), Some(0)));
        assert_eq!(out, "\n\x1b[CO\x1b[A\r");
    }

    #[test]
    fn shrinking_row_clears_to_end_of_line() {
        let mut display = Display::new(Capabilities::xterm(), false);
        display.resize(5, 20);
        display.update(&lines(&["abcdef"]), None);
        let out = bytes(display.update(&lines(&["abX"]), None));
        assert_eq!(out, "\x08\x08\x08\x08X\x1b[K");
    }

    #[test]
    fn insert_character_shifts_the_suffix() {
        let mut display = Display::new(Capabilities::xterm(), false);
        display.resize(5, 20);
        display.update(&lines(&["abcd"]), None);
        let out = bytes(display.update(&lines(&["abXcd"]), None));
        assert_eq!(out, "\x08\x08\x1b[1@X\x1b[2C");
    }

    #[test]
    fn delete_character_uses_capability() {
        let mut display = Display::new(Capabilities::xterm(), false);
        display.resize(5, 20);
        display.update(&lines(&["abXcd"]), None);
        let out = bytes(display.update(&lines(&["abcd"]), None));
        assert_eq!(out, "\x08\x08\x08\x1b[P\x1b[2C");
    }

    #[test]
    fn degenerate_size_is_a_no_op() {
        let mut display = Display::new(Capabilities::xterm(), false);
        assert!(display.update(&lines(&["x"]), None).is_empty());
        display.resize(0, 10);
        assert!(display.update(&lines(&["x"]), Some(3)).is_empty());
    }

    #[test]
    fn trailing_rows_are_cleared() {
        let mut display = Display::new(Capabilities::xterm(), false);
        display.resize(5, 20);
        display.update(&lines(&["a", "b", "c"]), Some(0));
        let out = bytes(display.update(&lines(&["a"]), Some(0)));
        assert_eq!(out, "\n\x1b[J\x1b[A");
    }

    #[test]
    fn missing_clear_to_end_falls_back_to_spaces() {
        let mut caps = Capabilities::xterm();
        caps.remove(Capability::ClrEol);
        caps.remove(Capability::ClrEos);
        let mut display = Display::new(caps, false);
        display.resize(5, 20);
        display.update(&lines(&["abc", "de"]), Some(0));
        let out = bytes(display.update(&lines(&["a"]), Some(0)));
        assert_eq!(out, "\x1b[C  \r\n  \x1b[A\r");
    }

    #[test]
    fn full_width_rows_cancel_the_pending_wrap() {
        let mut display = Display::new(Capabilities::xterm(), false);
        display.resize(5, 4);
        let out = bytes(display.update(&lines(&["abcdef"]), None));
        assert_eq!(out, "abcd\r\nef");
        assert_eq!(display.cursor_pos(), 6);
    }

    #[test]
    fn clear_is_honoured_in_full_screen_mode() {
        let mut display = Display::new(Capabilities::xterm(), true);
        display.resize(5, 20);
        display.update(&lines(&["a"]), None);
        display.clear();
        let out = bytes(display.update(&lines(&["a"]), None));
        assert_eq!(out, "\x1b[H\x1b[2Ja");

        let mut inline = Display::new(Capabilities::xterm(), false);
        inline.resize(5, 20);
        inline.update(&lines(&["a"]), None);
        inline.clear();
        assert!(inline.update(&lines(&["a"]), None).is_empty());
    }

    #[test]
    fn styled_runs_are_reset() {
        let mut display = Display::new(Capabilities::xterm(), false);
        display.resize(5, 20);
        let out = bytes(display.update(&lines(&["\x1b[1mab\x1b[0mc"]), None));
        assert_eq!(out, "\x1b[1mab\x1b[0mc");
    }

    #[test]
    fn full_screen_inserts_lines_for_new_rows() {
        let mut display = Display::new(Capabilities::xterm(), true);
        display.resize(10, 20);
        display.update(&lines(&["h", "a", "b", "c", "f"]), None);
        let out = bytes(display.update(&lines(&["h", "x", "a", "b", "c", "f"]), None));
        assert_eq!(out, "\x1b[3A\r\x1b[Lx\x1b[4B");
    }

    #[test]
    fn full_screen_deletes_lines_for_removed_rows() {
        let mut display = Display::new(Capabilities::xterm(), true);
        display.resize(10, 20);
        display.update(&lines(&["h", "x", "y", "a", "b"]), Some(0));
        let out = bytes(display.update(&lines(&["h", "a", "b"]), Some(0)));
        assert_eq!(out, "\x1b[1B\x1b[2M\x1b[A");
    }

    #[test]
    fn resize_resplits_cached_rows() {
        let mut display = Display::new(Capabilities::xterm(), false);
        display.resize(5, 10);
        display.update(&lines(&["abcdefgh"]), Some(0));
        display.resize(5, 4);
        assert!(display.update(&lines(&["abcdefgh"]), Some(0)).is_empty());
    }
}
