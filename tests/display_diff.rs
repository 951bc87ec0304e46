use linekit::{Display, OutputGate, Terminal, VirtualTerminal};
use pretty_assertions::assert_eq;

struct Screen {
    term: VirtualTerminal,
    display: Display,
    gate: OutputGate,
}

impl Screen {
    fn new(rows: u16, columns: u16, full_screen: bool) -> Self {
        let term = VirtualTerminal::new(rows, columns);
        let mut display = Display::new(term.capabilities().clone(), full_screen);
        display.resize(rows as usize, columns as usize);
        Self {
            term,
            display,
            gate: OutputGate::new(),
        }
    }

    /// Draw `lines` and return the bytes sent for them.
    fn draw(&mut self, lines: &[&str]) -> String {
        self.draw_at(lines, None)
    }

    /// Draw `lines`, leave the cursor at linear position `target`, and return the bytes sent.
    fn draw_at(&mut self, lines: &[&str], target: Option<usize>) -> String {
        let lines: Vec<String> = lines.iter().map(|line| line.to_string()).collect();
        self.term.take_output();
        self.gate.extend(self.display.update(&lines, target));
        self.gate.flush(&mut self.term).unwrap();
        self.term.take_output()
    }
}

fn numbered_rows() -> Vec<String> {
    (0..20).map(|idx| format!("line {idx:02}")).collect()
}

#[test]
fn screen_tracks_every_frame() {
    let mut screen = Screen::new(10, 20, false);
    let frames: Vec<(Vec<&str>, Vec<&str>)> = vec![
        (vec!["alpha", "beta", "gamma"], vec!["alpha", "beta", "gamma"]),
        (vec!["alpha", "BETA", "gamma"], vec!["alpha", "BETA", "gamma"]),
        (vec!["alpha", "gamma"], vec!["alpha", "gamma"]),
        (
            vec!["alpha", "gamma", "delta", "epsilon"],
            vec!["alpha", "gamma", "delta", "epsilon"],
        ),
        (vec!["alpha", "東京 gamma"], vec!["alpha", "東京 gamma"]),
        (vec!["\x1b[1malpha\x1b[0m", "東京 gamma"], vec!["alpha", "東京 gamma"]),
        (
            vec!["0123456789012345678901234"],
            vec!["01234567890123456789", "01234"],
        ),
        (vec![], vec![]),
    ];
    for (idx, (lines, expected)) in frames.into_iter().enumerate() {
        screen.draw(&lines);
        assert_eq!(screen.term.visible_lines(), expected, "frame {idx}");
    }
}

#[test]
fn unchanged_rows_are_not_resent() {
    let mut screen = Screen::new(10, 20, false);
    screen.draw(&["alpha", "beta", "gamma"]);
    let sent = screen.draw(&["alpha", "BETA", "gamma"]);
    assert!(!sent.contains("alpha"), "sent {sent:?}");
    assert!(!sent.contains("gamma"), "sent {sent:?}");
    assert!(sent.contains("BETA"), "sent {sent:?}");
    assert_eq!(screen.draw(&["alpha", "BETA", "gamma"]), "");
}

#[test]
fn full_screen_scrolls_shifted_rows() {
    let mut screen = Screen::new(6, 20, true);
    screen.draw(&["header", "one", "two", "three", "footer"]);
    let sent = screen.draw(&["header", "two", "three", "four", "footer"]);
    assert!(!sent.contains("three"), "sent {sent:?}");
    assert_eq!(
        screen.term.visible_lines(),
        vec!["header", "two", "three", "four", "footer"]
    );
}

/// Rewrites `line 05` as `linX 05` on a 20-row frame and returns the bytes sent.
fn change_one_cell(full_screen: bool) -> (Screen, String) {
    let mut screen = Screen::new(24, 20, full_screen);
    let rows = numbered_rows();
    let frame: Vec<&str> = rows.iter().map(String::as_str).collect();
    screen.draw_at(&frame, Some(0));
    assert_eq!(screen.term.cursor(), (0, 0));

    let mut changed = frame.clone();
    changed[5] = "linX 05";
    let sent = screen.draw_at(&changed, Some(5 * 20 + 4));
    (screen, sent)
}

#[test]
fn one_changed_cell_is_the_only_text_sent_inline() {
    let (screen, sent) = change_one_cell(false);
    assert_eq!(sent, "\n\n\n\n\n\x1b[3CX");
    assert_eq!(screen.term.screen_lines()[5], "linX 05");
    assert_eq!(screen.term.screen_lines()[4], "line 04");
    assert_eq!(screen.term.screen_lines()[6], "line 06");
}

#[test]
fn one_changed_cell_is_the_only_text_sent_full_screen() {
    let (screen, sent) = change_one_cell(true);
    assert_eq!(sent, "\x1b[5B\x1b[3CX");
    assert_eq!(screen.term.visible_lines().len(), 20);
    assert_eq!(screen.term.screen_lines()[5], "linX 05");
    assert_eq!(screen.term.cursor(), (5, 4));
}
