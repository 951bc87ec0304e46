//! Terminal capability names, built-in capability tables and a terminfo-style parameter
//! interpreter.

use std::collections::HashMap;
use std::env;

use once_cell::sync::Lazy;
use tracing::debug;

/// String capabilities the toolkit knows how to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    CarriageReturn,
    CursorUp,
    CursorDown,
    CursorLeft,
    CursorRight,
    ParmUpCursor,
    ParmDownCursor,
    ParmLeftCursor,
    ParmRightCursor,
    CursorAddress,
    ClrEol,
    ClrEos,
    ClearScreen,
    InsertLine,
    ParmInsertLine,
    DeleteLine,
    ParmDeleteLine,
    InsertCharacter,
    ParmIch,
    DeleteCharacter,
    ParmDch,
    KeypadXmit,
    KeypadLocal,
    CursorInvisible,
    CursorNormal,
    Bell,
    KeyUp,
    KeyDown,
    KeyLeft,
    KeyRight,
    KeyHome,
    KeyEnd,
    KeyDc,
    KeyIc,
    KeyBackspace,
    KeyNpage,
    KeyPpage,
    KeyEnter,
}

impl Capability {
    pub const ALL: [Capability; 38] = [
        Capability::CarriageReturn,
        Capability::CursorUp,
        Capability::CursorDown,
        Capability::CursorLeft,
        Capability::CursorRight,
        Capability::ParmUpCursor,
        Capability::ParmDownCursor,
        Capability::ParmLeftCursor,
        Capability::ParmRightCursor,
        Capability::CursorAddress,
        Capability::ClrEol,
        Capability::ClrEos,
        Capability::ClearScreen,
        Capability::InsertLine,
        Capability::ParmInsertLine,
        Capability::DeleteLine,
        Capability::ParmDeleteLine,
        Capability::InsertCharacter,
        Capability::ParmIch,
        Capability::DeleteCharacter,
        Capability::ParmDch,
        Capability::KeypadXmit,
        Capability::KeypadLocal,
        Capability::CursorInvisible,
        Capability::CursorNormal,
        Capability::Bell,
        Capability::KeyUp,
        Capability::KeyDown,
        Capability::KeyLeft,
        Capability::KeyRight,
        Capability::KeyHome,
        Capability::KeyEnd,
        Capability::KeyDc,
        Capability::KeyIc,
        Capability::KeyBackspace,
        Capability::KeyNpage,
        Capability::KeyPpage,
        Capability::KeyEnter,
    ];

    /// Short terminfo name.
    pub fn name(self) -> &'static str {
        match self {
            Capability::CarriageReturn => "cr",
            Capability::CursorUp => "cuu1",
            Capability::CursorDown => "cud1",
            Capability::CursorLeft => "cub1",
            Capability::CursorRight => "cuf1",
            Capability::ParmUpCursor => "cuu",
            Capability::ParmDownCursor => "cud",
            Capability::ParmLeftCursor => "cub",
            Capability::ParmRightCursor => "cuf",
            Capability::CursorAddress => "cup",
            Capability::ClrEol => "el",
            Capability::ClrEos => "ed",
            Capability::ClearScreen => "clear",
            Capability::InsertLine => "il1",
            Capability::ParmInsertLine => "il",
            Capability::DeleteLine => "dl1",
            Capability::ParmDeleteLine => "dl",
            Capability::InsertCharacter => "ich1",
            Capability::ParmIch => "ich",
            Capability::DeleteCharacter => "dch1",
            Capability::ParmDch => "dch",
            Capability::KeypadXmit => "smkx",
            Capability::KeypadLocal => "rmkx",
            Capability::CursorInvisible => "civis",
            Capability::CursorNormal => "cnorm",
            Capability::Bell => "bel",
            Capability::KeyUp => "kcuu1",
            Capability::KeyDown => "kcud1",
            Capability::KeyLeft => "kcub1",
            Capability::KeyRight => "kcuf1",
            Capability::KeyHome => "khome",
            Capability::KeyEnd => "kend",
            Capability::KeyDc => "kdch1",
            Capability::KeyIc => "kich1",
            Capability::KeyBackspace => "kbs",
            Capability::KeyNpage => "knp",
            Capability::KeyPpage => "kpp",
            Capability::KeyEnter => "kent",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|cap| cap.name() == name)
    }
}

/// Boolean capabilities that change how output wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolCapability {
    /// `am`: printing in the last column wraps to the next row.
    AutoRightMargin,
    /// `xenl`: the wrap is deferred until the next printable character.
    EatNewlineGlitch,
}

/// Capability table of one terminal type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    name: String,
    strings: HashMap<Capability, String>,
    auto_right_margin: bool,
    eat_newline_glitch: bool,
}

static XTERM: Lazy<Capabilities> = Lazy::new(|| {
    use Capability::*;
    Capabilities::from_table(
        "xterm",
        &[
            (CarriageReturn, "\r"),
            (CursorUp, "\x1b[A"),
            (CursorDown, "\n"),
            (CursorLeft, "\x08"),
            (CursorRight, "\x1b[C"),
            (ParmUpCursor, "\x1b[%p1%dA"),
            (ParmDownCursor, "\x1b[%p1%dB"),
            (ParmLeftCursor, "\x1b[%p1%dD"),
            (ParmRightCursor, "\x1b[%p1%dC"),
            (CursorAddress, "\x1b[%i%p1%d;%p2%dH"),
            (ClrEol, "\x1b[K"),
            (ClrEos, "\x1b[J"),
            (ClearScreen, "\x1b[H\x1b[2J"),
            (InsertLine, "\x1b[L"),
            (ParmInsertLine, "\x1b[%p1%dL"),
            (DeleteLine, "\x1b[M"),
            (ParmDeleteLine, "\x1b[%p1%dM"),
            (ParmIch, "\x1b[%p1%d@"),
            (DeleteCharacter, "\x1b[P"),
            (ParmDch, "\x1b[%p1%dP"),
            (KeypadXmit, "\x1b[?1h\x1b="),
            (KeypadLocal, "\x1b[?1l\x1b>"),
            (CursorInvisible, "\x1b[?25l"),
            (CursorNormal, "\x1b[?12l\x1b[?25h"),
            (Bell, "\x07"),
            (KeyUp, "\x1bOA"),
            (KeyDown, "\x1bOB"),
            (KeyLeft, "\x1bOD"),
            (KeyRight, "\x1bOC"),
            (KeyHome, "\x1bOH"),
            (KeyEnd, "\x1bOF"),
            (KeyDc, "\x1b[3~"),
            (KeyIc, "\x1b[2~"),
            (KeyBackspace, "\x7f"),
            (KeyNpage, "\x1b[6~"),
            (KeyPpage, "\x1b[5~"),
            (KeyEnter, "\x1bOM"),
        ],
        true,
        true,
    )
});

static VT100: Lazy<Capabilities> = Lazy::new(|| {
    use Capability::*;
    Capabilities::from_table(
        "vt100",
        &[
            (CarriageReturn, "\r"),
            (CursorUp, "\x1b[A$<2>"),
            (CursorDown, "\n"),
            (CursorLeft, "\x08"),
            (CursorRight, "\x1b[C$<2>"),
            (ParmUpCursor, "\x1b[%p1%dA"),
            (ParmDownCursor, "\x1b[%p1%dB"),
            (ParmLeftCursor, "\x1b[%p1%dD"),
            (ParmRightCursor, "\x1b[%p1%dC"),
            (CursorAddress, "\x1b[%i%p1%d;%p2%dH$<5>"),
            (ClrEol, "\x1b[K$<3>"),
            (ClrEos, "\x1b[J$<50>"),
            (ClearScreen, "\x1b[H\x1b[J$<50>"),
            (KeypadXmit, "\x1b[?1h\x1b="),
            (KeypadLocal, "\x1b[?1l\x1b>"),
            (Bell, "\x07"),
            (KeyUp, "\x1bOA"),
            (KeyDown, "\x1bOB"),
            (KeyLeft, "\x1bOD"),
            (KeyRight, "\x1bOC"),
            (KeyBackspace, "\x08"),
            (KeyEnter, "\x1bOM"),
        ],
        true,
        true,
    )
});

static DUMB: Lazy<Capabilities> = Lazy::new(|| {
    use Capability::*;
    Capabilities::from_table(
        "dumb",
        &[(CarriageReturn, "\r"), (CursorDown, "\n"), (Bell, "\x07")],
        true,
        false,
    )
});

impl Capabilities {
    fn from_table(
        name: &str,
        table: &[(Capability, &str)],
        auto_right_margin: bool,
        eat_newline_glitch: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            strings: table
                .iter()
                .map(|(cap, value)| (*cap, (*value).to_string()))
                .collect(),
            auto_right_margin,
            eat_newline_glitch,
        }
    }

    /// A table with no capabilities at all.
    pub fn empty(name: &str) -> Self {
        Self::from_table(name, &[], false, false)
    }

    pub fn xterm() -> Self {
        XTERM.clone()
    }

    pub fn vt100() -> Self {
        VT100.clone()
    }

    pub fn dumb() -> Self {
        DUMB.clone()
    }

    /// Built-in table for a `TERM` value. Unknown terminals get the xterm table, which
    /// modern emulators implement.
    pub fn for_term(term: &str) -> Self {
        let term = term.trim();
        if term.is_empty() || term == "dumb" {
            return Self::dumb();
        }
        if term.starts_with("vt1") || term.starts_with("vt2") {
            return Self::vt100();
        }
        let known = [
            "xterm", "screen", "tmux", "rxvt", "linux", "alacritty", "kitty", "wezterm", "foot",
            "ghostty", "st",
        ];
        if !known.iter().any(|prefix| term.starts_with(prefix)) {
            debug!(term, "unknown terminal type, using xterm capabilities");
        }
        let mut caps = Self::xterm();
        caps.name = term.to_string();
        caps
    }

    /// Table selected by the `TERM` environment variable.
    pub fn from_env() -> Self {
        Self::for_term(&env::var("TERM").unwrap_or_default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw capability string, or `None` when the terminal lacks it.
    pub fn get(&self, cap: Capability) -> Option<&str> {
        self.strings.get(&cap).map(String::as_str)
    }

    pub fn has(&self, cap: Capability) -> bool {
        self.strings.contains_key(&cap)
    }

    pub fn flag(&self, cap: BoolCapability) -> bool {
        match cap {
            BoolCapability::AutoRightMargin => self.auto_right_margin,
            BoolCapability::EatNewlineGlitch => self.eat_newline_glitch,
        }
    }

    pub fn set(&mut self, cap: Capability, value: impl Into<String>) {
        self.strings.insert(cap, value.into());
    }

    pub fn remove(&mut self, cap: Capability) -> Option<String> {
        self.strings.remove(&cap)
    }

    pub fn set_flag(&mut self, cap: BoolCapability, value: bool) {
        match cap {
            BoolCapability::AutoRightMargin => self.auto_right_margin = value,
            BoolCapability::EatNewlineGlitch => self.eat_newline_glitch = value,
        }
    }

    /// Capability expanded with `params`, padding removed.
    pub fn tput(&self, cap: Capability, params: &[i32]) -> Option<String> {
        self.get(cap).map(|value| tparm(value, params))
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::xterm()
    }
}

/// Expand a terminfo parameterised string.
///
/// Supports the stack language used by common terminal descriptions: `%p1`-`%p9`, `%d`
/// (with flags, width and precision), `%o`, `%x`, `%X`, `%c`, `%s`, `%i`, `%{n}`, `%'c'`,
/// `%l`, arithmetic and logic operators, `%P`/`%g` variables and `%? %t %e %;`
/// conditionals. `$<..>` padding is dropped.
pub fn tparm(cap: &str, params: &[i32]) -> String {
    let chars: Vec<char> = cap.chars().collect();
    let mut params: Vec<i64> = params.iter().map(|&p| i64::from(p)).collect();
    params.resize(params.len().max(9), 0);
    let mut stack: Vec<i64> = Vec::new();
    let mut vars = [0i64; 52];
    let mut out = String::with_capacity(cap.len());
    let pop = |stack: &mut Vec<i64>| stack.pop().unwrap_or(0);

    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        idx += 1;
        if ch == '$' && chars.get(idx) == Some(&'<') {
            match chars[idx..].iter().position(|&c| c == '>') {
                Some(end) => idx += end + 1,
                None => idx = chars.len(),
            }
            continue;
        }
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let Some(&op) = chars.get(idx) else {
            break;
        };
        idx += 1;
        match op {
            '%' => out.push('%'),
            'c' => {
                let value = pop(&mut stack);
                out.push(char::from_u32(value as u32).unwrap_or('\0'));
            }
            's' => {
                let value = pop(&mut stack);
                out.push_str(&value.to_string());
            }
            'd' | 'o' | 'x' | 'X' => {
                out.push_str(&format_number(pop(&mut stack), op, &Format::default()))
            }
            ':' | '#' | ' ' | '.' | '0'..='9' => {
                let (format, conv, next) = parse_format(&chars, idx - 1);
                idx = next;
                let value = pop(&mut stack);
                if conv == 's' {
                    out.push_str(&pad(value.to_string(), &format));
                } else {
                    out.push_str(&format_number(value, conv, &format));
                }
            }
            'p' => {
                let digit = chars.get(idx).and_then(|c| c.to_digit(10)).unwrap_or(1);
                idx += 1;
                let slot = (digit.max(1) - 1) as usize;
                stack.push(params.get(slot).copied().unwrap_or(0));
            }
            'P' | 'g' => {
                let name = chars.get(idx).copied().unwrap_or('a');
                idx += 1;
                let slot = match name {
                    'a'..='z' => Some(name as usize - 'a' as usize),
                    'A'..='Z' => Some(26 + name as usize - 'A' as usize),
                    _ => None,
                };
                if let Some(slot) = slot {
                    if op == 'P' {
                        vars[slot] = pop(&mut stack);
                    } else {
                        stack.push(vars[slot]);
                    }
                }
            }
            '\'' => {
                let value = chars.get(idx).copied().unwrap_or('\0');
                idx += 2;
                stack.push(value as i64);
            }
            '{' => {
                let mut value = 0i64;
                let mut negative = false;
                if chars.get(idx) == Some(&'-') {
                    negative = true;
                    idx += 1;
                }
                while let Some(digit) = chars.get(idx).and_then(|c| c.to_digit(10)) {
                    value = value * 10 + i64::from(digit);
                    idx += 1;
                }
                idx += 1;
                stack.push(if negative { -value } else { value });
            }
            'l' => {
                let value = pop(&mut stack);
                stack.push(value.to_string().len() as i64);
            }
            '+' | '-' | '*' | '/' | 'm' | '&' | '|' | '^' | '=' | '>' | '<' | 'A' | 'O' => {
                let rhs = pop(&mut stack);
                let lhs = pop(&mut stack);
                let value = match op {
                    '+' => lhs.wrapping_add(rhs),
                    '-' => lhs.wrapping_sub(rhs),
                    '*' => lhs.wrapping_mul(rhs),
                    '/' => lhs.checked_div(rhs).unwrap_or(0),
                    'm' => lhs.checked_rem(rhs).unwrap_or(0),
                    '&' => lhs & rhs,
                    '|' => lhs | rhs,
                    '^' => lhs ^ rhs,
                    '=' => i64::from(lhs == rhs),
                    '>' => i64::from(lhs > rhs),
                    '<' => i64::from(lhs < rhs),
                    'A' => i64::from(lhs != 0 && rhs != 0),
                    _ => i64::from(lhs != 0 || rhs != 0),
                };
                stack.push(value);
            }
            '!' => {
                let value = pop(&mut stack);
                stack.push(i64::from(value == 0));
            }
            '~' => {
                let value = pop(&mut stack);
                stack.push(!value);
            }
            'i' => {
                params[0] += 1;
                params[1] += 1;
            }
            '?' | ';' => {}
            't' => {
                if pop(&mut stack) == 0 {
                    idx = skip_branch(&chars, idx, true);
                }
            }
            'e' => {
                idx = skip_branch(&chars, idx, false);
            }
            _ => {}
        }
    }
    out
}

/// Index just past the `%e` (when `stop_at_else`) or `%;` that closes the current
/// conditional level.
fn skip_branch(chars: &[char], mut idx: usize, stop_at_else: bool) -> usize {
    let mut depth = 0usize;
    while idx < chars.len() {
        if chars[idx] != '%' {
            idx += 1;
            continue;
        }
        let Some(&op) = chars.get(idx + 1) else {
            return chars.len();
        };
        idx += 2;
        match op {
            '?' => depth += 1,
            ';' if depth == 0 => return idx,
            ';' => depth -= 1,
            'e' if depth == 0 && stop_at_else => return idx,
            _ => {}
        }
    }
    idx
}

#[derive(Debug, Default)]
struct Format {
    left: bool,
    sign: bool,
    space: bool,
    alternate: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
}

fn parse_format(chars: &[char], mut idx: usize) -> (Format, char, usize) {
    let mut format = Format::default();
    if chars.get(idx) == Some(&':') {
        idx += 1;
    }
    while let Some(&flag) = chars.get(idx) {
        match flag {
            '-' => format.left = true,
            '+' => format.sign = true,
            ' ' => format.space = true,
            '#' => format.alternate = true,
            '0' => format.zero = true,
            _ => break,
        }
        idx += 1;
    }
    while let Some(digit) = chars.get(idx).and_then(|c| c.to_digit(10)) {
        format.width = format.width * 10 + digit as usize;
        idx += 1;
    }
    if chars.get(idx) == Some(&'.') {
        idx += 1;
        let mut precision = 0;
        while let Some(digit) = chars.get(idx).and_then(|c| c.to_digit(10)) {
            precision = precision * 10 + digit as usize;
            idx += 1;
        }
        format.precision = Some(precision);
    }
    let conv = chars.get(idx).copied().unwrap_or('d');
    (format, conv, idx + 1)
}

fn format_number(value: i64, conv: char, format: &Format) -> String {
    let magnitude = value.unsigned_abs();
    let mut digits = match conv {
        'o' => format!("{magnitude:o}"),
        'x' => format!("{magnitude:x}"),
        'X' => format!("{magnitude:X}"),
        _ => magnitude.to_string(),
    };
    if let Some(precision) = format.precision {
        while digits.len() < precision {
            digits.insert(0, '0');
        }
    }
    let prefix = if value < 0 {
        "-"
    } else if format.sign && conv == 'd' {
        "+"
    } else if format.space && conv == 'd' {
        " "
    } else if format.alternate && conv == 'o' {
        "0"
    } else if format.alternate && conv == 'x' {
        "0x"
    } else if format.alternate && conv == 'X' {
        "0X"
    } else {
        ""
    };
    if format.zero && !format.left && format.precision.is_none() {
        while prefix.len() + digits.len() < format.width {
            digits.insert(0, '0');
        }
    }
    pad(format!("{prefix}{digits}"), format)
}

fn pad(mut text: String, format: &Format) -> String {
    let len = text.chars().count();
    if len >= format.width {
        return text;
    }
    let fill = " ".repeat(format.width - len);
    if format.left {
        text.push_str(&fill);
        text
    } else {
        fill + &text
    }
}
