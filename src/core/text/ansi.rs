//! Escape sequence scanning and SGR (colour/attribute) state.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeKind {
    /// `ESC [ ... final`
    Csi,
    /// `ESC ] ... BEL|ST`
    Osc,
    /// `ESC P`, `ESC _`, `ESC ^`, `ESC X` string sequences.
    String,
    /// `ESC O x`
    Ss3,
    /// Any other two-byte escape.
    Short,
}

/// An escape sequence found at some byte offset of a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Escape<'a> {
    pub kind: EscapeKind,
    pub text: &'a str,
}

impl Escape<'_> {
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether this is a Select Graphic Rendition sequence (`ESC [ ... m`).
    pub fn is_sgr(&self) -> bool {
        self.kind == EscapeKind::Csi && self.text.ends_with('m')
    }
}

/// The complete escape sequence starting at byte `pos`, if any. Unterminated sequences
/// are not recognised.
pub fn escape_at(input: &str, pos: usize) -> Option<Escape<'_>> {
    let bytes = input.as_bytes();
    if bytes.get(pos) != Some(&0x1b) {
        return None;
    }
    let intro = *bytes.get(pos + 1)?;
    let (kind, end) = match intro {
        b'[' => {
            let offset = bytes[pos + 2..]
                .iter()
                .position(|b| (0x40..=0x7e).contains(b))?;
            (EscapeKind::Csi, pos + 2 + offset + 1)
        }
        b']' => (EscapeKind::Osc, string_end(bytes, pos + 2)?),
        b'P' | b'_' | b'^' | b'X' => (EscapeKind::String, string_end(bytes, pos + 2)?),
        b'O' => {
            let last = *bytes.get(pos + 2)?;
            if !last.is_ascii() {
                return None;
            }
            (EscapeKind::Ss3, pos + 3)
        }
        0x20..=0x7e => (EscapeKind::Short, pos + 2),
        _ => return None,
    };
    Some(Escape {
        kind,
        text: &input[pos..end],
    })
}

/// End offset of a BEL- or ST-terminated string starting at `from`.
fn string_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut idx = from;
    while idx < bytes.len() {
        match bytes[idx] {
            0x07 => return Some(idx + 1),
            0x1b if bytes.get(idx + 1) == Some(&b'\\') => return Some(idx + 2),
            _ => idx += 1,
        }
    }
    None
}

/// `input` with every recognised escape sequence removed.
pub fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut idx = 0;
    while idx < input.len() {
        if let Some(escape) = escape_at(input, idx) {
            idx += escape.len();
            continue;
        }
        match input[idx..].chars().next() {
            Some(ch) => {
                out.push(ch);
                idx += ch.len_utf8();
            }
            None => break,
        }
    }
    out
}

const BOLD: u16 = 1 << 0;
const DIM: u16 = 1 << 1;
const ITALIC: u16 = 1 << 2;
const UNDERLINE: u16 = 1 << 3;
const BLINK: u16 = 1 << 4;
const INVERSE: u16 = 1 << 5;
const HIDDEN: u16 = 1 << 6;
const STRIKE: u16 = 1 << 7;

/// SGR parameter for each attribute bit, in output order.
const ATTRIBUTES: [(u16, &str); 8] = [
    (BOLD, "1"),
    (DIM, "2"),
    (ITALIC, "3"),
    (UNDERLINE, "4"),
    (BLINK, "5"),
    (INVERSE, "7"),
    (HIDDEN, "8"),
    (STRIKE, "9"),
];

/// Accumulated effect of a run of SGR sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SgrState {
    attributes: u16,
    foreground: Option<String>,
    background: Option<String>,
}

impl SgrState {
    pub fn is_default(&self) -> bool {
        self.attributes == 0 && self.foreground.is_none() && self.background.is_none()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply one escape sequence. Anything that is not SGR is ignored.
    pub fn apply(&mut self, sequence: &str) {
        let Some(params) = sequence
            .strip_prefix("\x1b[")
            .and_then(|rest| rest.strip_suffix('m'))
        else {
            return;
        };
        if params.is_empty() {
            self.reset();
            return;
        }
        let parts: Vec<&str> = params.split([';', ':']).collect();
        let mut idx = 0;
        while idx < parts.len() {
            let code: u16 = parts[idx].parse().unwrap_or(0);
            if code == 38 || code == 48 {
                let width = match parts.get(idx + 1) {
                    Some(&"5") => 3,
                    Some(&"2") => 5,
                    _ => 1,
                };
                if width > 1 && idx + width <= parts.len() {
                    let color = parts[idx..idx + width].join(";");
                    if code == 38 {
                        self.foreground = Some(color);
                    } else {
                        self.background = Some(color);
                    }
                    idx += width;
                    continue;
                }
            }
            match code {
                0 => self.reset(),
                1 => self.attributes |= BOLD,
                2 => self.attributes |= DIM,
                3 => self.attributes |= ITALIC,
                4 => self.attributes |= UNDERLINE,
                5 => self.attributes |= BLINK,
                7 => self.attributes |= INVERSE,
                8 => self.attributes |= HIDDEN,
                9 => self.attributes |= STRIKE,
                21 => self.attributes &= !BOLD,
                22 => self.attributes &= !(BOLD | DIM),
                23 => self.attributes &= !ITALIC,
                24 => self.attributes &= !UNDERLINE,
                25 => self.attributes &= !BLINK,
                27 => self.attributes &= !INVERSE,
                28 => self.attributes &= !HIDDEN,
                29 => self.attributes &= !STRIKE,
                30..=37 | 90..=97 => self.foreground = Some(code.to_string()),
                39 => self.foreground = None,
                40..=47 | 100..=107 => self.background = Some(code.to_string()),
                49 => self.background = None,
                _ => {}
            }
            idx += 1;
        }
    }

    /// Absolute sequence that recreates this state from the default; empty when default.
    pub fn to_sequence(&self) -> String {
        let mut params: Vec<&str> = ATTRIBUTES
            .iter()
            .filter(|(bit, _)| self.attributes & bit != 0)
            .map(|(_, code)| *code)
            .collect();
        params.extend(self.foreground.as_deref());
        params.extend(self.background.as_deref());
        if params.is_empty() {
            return String::new();
        }
        format!("\x1b[{}m", params.join(";"))
    }
}

#[cfg(test)]
mod tests {
    use super::{escape_at, strip_ansi, EscapeKind, SgrState};
    use pretty_assertions::assert_eq;

    #[test]
    fn recognises_sequence_kinds() {
        let csi = escape_at("\x1b[1;31mx", 0).unwrap();
        assert_eq!((csi.kind, csi.text), (EscapeKind::Csi, "\x1b[1;31m"));
        assert!(csi.is_sgr());

        let osc = escape_at("\x1b]8;;u\x07x", 0).unwrap();
        assert_eq!((osc.kind, osc.len()), (EscapeKind::Osc, 7));
        assert_eq!(escape_at("\x1bOA", 0).unwrap().kind, EscapeKind::Ss3);
        assert_eq!(escape_at("\x1b=", 0).unwrap().kind, EscapeKind::Short);
    }

    #[test]
    fn unterminated_sequences_are_not_escapes() {
        assert_eq!(escape_at("\x1b[12", 0), None);
        assert_eq!(escape_at("\x1b", 0), None);
        assert_eq!(escape_at("a\x1b[A", 0), None);
    }

    #[test]
    fn strip_removes_every_sequence() {
        assert_eq!(strip_ansi("\x1b[32m? \x1b[0m\x1b]8;;u\x07name\x1b]8;;\x07"), "? name");
    }

    #[test]
    fn sgr_state_tracks_and_rebuilds() {
        let mut state = SgrState::default();
        state.apply("\x1b[1;4;38;5;202m");
        assert_eq!(state.to_sequence(), "\x1b[1;4;38;5;202m");
        state.apply("\x1b[24;44m");
        assert_eq!(state.to_sequence(), "\x1b[1;38;5;202;44m");
        state.apply("\x1b[K");
        assert_eq!(state.to_sequence(), "\x1b[1;38;5;202;44m");
        state.apply("\x1b[m");
        assert!(state.is_default());
        assert_eq!(state.to_sequence(), "");
    }
}
