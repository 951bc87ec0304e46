//! Key-sequence helpers: readable notation, control/meta chords and capability keys.
//!
//! Sequences are plain `String`s of codepoints. [`translate`] turns the usual readline
//! notation (`^X`, `\e`, `\C-x`, `\M-x`, octal/hex/unicode escapes) into the raw codepoints a
//! terminal sends, and [`display`] goes the other way for diagnostics.

use std::cmp::Ordering;

use crate::core::capabilities::{Capabilities, Capability};
use crate::error::KeyMapError;

pub const ESC: char = '\x1b';
pub const DEL: char = '\x7f';

/// The escape key.
pub fn esc() -> String {
    ESC.to_string()
}

/// The delete/backspace key most terminals send.
pub fn del() -> String {
    DEL.to_string()
}

/// Control chord for `key` (`ctrl('A')` is `\x01`, `ctrl('?')` is DEL).
pub fn ctrl(key: char) -> String {
    ctrl_char(key).to_string()
}

/// Meta chord: escape followed by the key.
pub fn alt(key: char) -> String {
    let mut out = esc();
    out.push(key);
    out
}

/// Escape-prefixed form of an arbitrary sequence.
pub fn alt_seq(seq: &str) -> String {
    let mut out = esc();
    out.push_str(seq);
    out
}

/// Key string the terminal sends for `cap`, if the terminal defines one.
pub fn key(caps: &Capabilities, cap: Capability) -> Option<String> {
    caps.get(cap).map(str::to_string)
}

fn ctrl_char(key: char) -> char {
    if key == '?' {
        return DEL;
    }
    let upper = key.to_ascii_uppercase() as u32;
    char::from_u32(upper & 0x1f).unwrap_or(key)
}

/// Expand readline-style notation into raw codepoints.
///
/// A single pair of surrounding quotes is stripped. Unknown escapes keep the escaped
/// character, and a dangling `\` or `^` at the end is dropped.
pub fn translate(input: &str) -> String {
    let mut chars: Vec<char> = input.chars().collect();
    if chars.len() > 1 {
        let first = chars[0];
        if (first == '"' || first == '\'') && chars[chars.len() - 1] == first {
            chars = chars[1..chars.len() - 1].to_vec();
        }
    }

    let mut out = String::with_capacity(chars.len());
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        idx += 1;
        match ch {
            '\\' => {
                let Some(&next) = chars.get(idx) else {
                    break;
                };
                idx += 1;
                match next {
                    'a' => out.push('\x07'),
                    'b' => out.push('\x08'),
                    'd' => out.push(DEL),
                    'e' | 'E' => out.push(ESC),
                    'f' => out.push('\x0c'),
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    'v' => out.push('\x0b'),
                    '0'..='7' => {
                        idx -= 1;
                        let value = take_digits(&chars, &mut idx, 8, 3);
                        out.push(char::from_u32(value & 0xff).unwrap_or('\0'));
                    }
                    'x' => {
                        let value = take_digits(&chars, &mut idx, 16, 2);
                        out.push(char::from_u32(value & 0xff).unwrap_or('\0'));
                    }
                    'u' => {
                        let value = take_digits(&chars, &mut idx, 16, 4);
                        out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
                    }
                    'C' => {
                        if chars.get(idx) == Some(&'-') {
                            idx += 1;
                        }
                        let Some(&target) = chars.get(idx) else {
                            break;
                        };
                        idx += 1;
                        out.push(ctrl_char(target));
                    }
                    'M' => {
                        if chars.get(idx) == Some(&'-') {
                            idx += 1;
                        }
                        out.push(ESC);
                    }
                    other => out.push(other),
                }
            }
            '^' => {
                let Some(&next) = chars.get(idx) else {
                    break;
                };
                idx += 1;
                if next == '^' {
                    out.push('^');
                } else {
                    out.push(ctrl_char(next));
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn take_digits(chars: &[char], idx: &mut usize, radix: u32, max: usize) -> u32 {
    let mut value = 0u32;
    let mut taken = 0;
    while taken < max {
        let Some(digit) = chars.get(*idx).and_then(|ch| ch.to_digit(radix)) else {
            break;
        };
        value = value * radix + digit;
        *idx += 1;
        taken += 1;
    }
    value
}

/// Quoted, printable rendering of a raw key sequence.
pub fn display(seq: &str) -> String {
    let mut out = String::from("\"");
    for ch in seq.chars() {
        let code = ch as u32;
        if code < 32 {
            out.push('^');
            out.push(char::from_u32(code + 'A' as u32 - 1).unwrap_or('?'));
        } else if ch == DEL {
            out.push_str("^?");
        } else if ch == '^' || ch == '\\' {
            out.push('\\');
            out.push(ch);
        } else if code >= 128 {
            out.push_str(&format!("\\u{code:04x}"));
        } else {
            out.push(ch);
        }
    }
    out.push('"');
    out
}

/// Expand `"a-z"` style notation (both bounds in [`translate`] notation) into every
/// sequence of the range.
pub fn range(notation: &str) -> Result<Vec<String>, KeyMapError> {
    let parts: Vec<&str> = notation.split('-').collect();
    if parts.len() != 2 {
        return Err(KeyMapError::Malformed(notation.to_string()));
    }
    expand_range(&translate(parts[0]), &translate(parts[1]))
}

/// Every sequence from `start` to `end`, which share all but their last codepoint.
pub fn expand_range(start: &str, end: &str) -> Result<Vec<String>, KeyMapError> {
    let start: Vec<char> = start.chars().collect();
    let end: Vec<char> = end.chars().collect();
    if start.is_empty() || end.is_empty() {
        return Err(KeyMapError::EmptyRange);
    }
    if start.len() != end.len() {
        return Err(KeyMapError::LengthMismatch {
            start: start.len(),
            end: end.len(),
        });
    }
    let last = start.len() - 1;
    if start[..last] != end[..last] {
        return Err(KeyMapError::PrefixMismatch);
    }
    let (first, final_char) = (start[last], end[last]);
    if first > final_char {
        return Err(KeyMapError::Misordered {
            start: first,
            end: final_char,
        });
    }

    let prefix: String = start[..last].iter().collect();
    Ok((first..=final_char)
        .map(|ch| {
            let mut seq = prefix.clone();
            seq.push(ch);
            seq
        })
        .collect())
}

/// Ordering used when listing bindings: shorter sequences first, then by the first
/// differing codepoint.
pub fn compare_key_sequences(a: &str, b: &str) -> Ordering {
    a.chars()
        .count()
        .cmp(&b.chars().count())
        .then_with(|| a.chars().cmp(b.chars()))
}
