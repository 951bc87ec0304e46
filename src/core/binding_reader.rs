//! Decoder turning a codepoint stream into bindings of a [`KeyMap`].

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, trace};

use crate::core::input::{CharSource, ReadResult};
use crate::core::keymap::{KeyMap, Match, Remaining, KEYMAP_LENGTH};
use crate::core::keys::display as key_notation;
use crate::error::ReadError;

/// Interval used by blocking reads so the source can service signals between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Reads key sequences from a [`CharSource`] and resolves them against key maps.
///
/// Pending codepoints that did not resolve yet stay buffered between calls, and pushed-back
/// codepoints (macros, unconsumed tails) are always read before live input.
pub struct BindingReader<S> {
    source: S,
    pushback: VecDeque<char>,
    op_buffer: Vec<char>,
    last_binding: String,
    poll_interval: Duration,
}

impl<S: CharSource> BindingReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            pushback: VecDeque::new(),
            op_buffer: Vec::new(),
            last_binding: String::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    /// Block until `keys` resolves a binding.
    pub fn read_binding<B: Clone>(&mut self, keys: &KeyMap<B>) -> Result<B, ReadError> {
        loop {
            if let Some(binding) = self.read_binding_with(keys, None, true)? {
                return Ok(binding);
            }
        }
    }

    /// Resolve the next binding, consulting `local` before `keys`.
    ///
    /// With `block == false` this returns `Ok(None)` once no more input is immediately
    /// available, keeping the pending codepoints for the next call.
    pub fn read_binding_with<B: Clone>(
        &mut self,
        keys: &KeyMap<B>,
        local: Option<&KeyMap<B>>,
        block: bool,
    ) -> Result<Option<B>, ReadError> {
        self.last_binding.clear();
        let mut has_read = false;
        loop {
            if !self.op_buffer.is_empty() {
                let found = lookup(keys, local, &self.op_buffer);
                match (found.binding, found.remaining) {
                    (Some(binding), Remaining::Unconsumed(unused)) => {
                        let binding = binding.clone();
                        let keep = self.op_buffer.len() - unused;
                        let tail = self.op_buffer.split_off(keep);
                        self.push_front(&tail);
                        return Ok(Some(self.commit(binding)));
                    }
                    (Some(binding), Remaining::Ambiguous) => {
                        let timeout = keys.ambiguous_timeout();
                        let extended = !timeout.is_zero()
                            && matches!(self.peek_character(timeout)?, ReadResult::Char(_));
                        if !extended {
                            let binding = binding.clone();
                            return Ok(Some(self.commit(binding)));
                        }
                        let pending = key_notation(&self.current_buffer());
                        trace!(%pending, "ambiguous prefix extended by further input");
                    }
                    (None, Remaining::Unconsumed(unused)) if unused > 0 => {
                        let first = self.op_buffer.remove(0);
                        self.last_binding = first.to_string();
                        let fallback = if first as usize >= KEYMAP_LENGTH {
                            keys.unicode()
                        } else {
                            keys.nomatch()
                        };
                        if let Some(binding) = fallback {
                            return Ok(Some(binding.clone()));
                        }
                        let codepoint = key_notation(&self.last_binding);
                        debug!(%codepoint, "discarding unbound input");
                        self.last_binding.clear();
                        continue;
                    }
                    _ => {}
                }
            }

            if !block && has_read {
                return Ok(None);
            }
            let ch = if block {
                self.read_character()?
            } else {
                match self.poll_character()? {
                    Some(ch) => ch,
                    None => return Ok(None),
                }
            };
            self.op_buffer.push(ch);
            has_read = true;
        }
    }

    fn commit<B>(&mut self, binding: B) -> B {
        self.last_binding = self.op_buffer.drain(..).collect();
        let resolved = key_notation(&self.last_binding);
        trace!(%resolved, "resolved binding");
        binding
    }

    fn push_front(&mut self, chars: &[char]) {
        for &ch in chars.iter().rev() {
            self.pushback.push_front(ch);
        }
    }

    /// Replay `keys` as if typed, ahead of anything else pending.
    pub fn run_macro(&mut self, keys: &str) {
        let chars: Vec<char> = keys.chars().collect();
        self.push_front(&chars);
    }

    /// Next codepoint, draining pushback first. Blocks in poll-interval slices.
    pub fn read_character(&mut self) -> Result<char, ReadError> {
        if let Some(ch) = self.pushback.pop_front() {
            return Ok(ch);
        }
        loop {
            match self.source.read(Some(self.poll_interval))? {
                ReadResult::Char(ch) => return Ok(ch),
                ReadResult::Timeout => continue,
                ReadResult::Eof => return Err(ReadError::EndOfInput),
            }
        }
    }

    fn poll_character(&mut self) -> Result<Option<char>, ReadError> {
        if let Some(ch) = self.pushback.pop_front() {
            return Ok(Some(ch));
        }
        match self.source.read(Some(self.poll_interval))? {
            ReadResult::Char(ch) => Ok(Some(ch)),
            ReadResult::Timeout => Ok(None),
            ReadResult::Eof => Err(ReadError::EndOfInput),
        }
    }

    /// Look at the next codepoint without consuming it.
    pub fn peek_character(&mut self, timeout: Duration) -> Result<ReadResult, ReadError> {
        if let Some(&ch) = self.pushback.front() {
            return Ok(ReadResult::Char(ch));
        }
        self.source.peek(timeout)
    }

    /// Read raw input up to `terminator`, which is consumed but not returned.
    pub fn read_string_until(&mut self, terminator: &str) -> Result<String, ReadError> {
        let mut out = String::new();
        while !out.ends_with(terminator) {
            out.push(self.read_character()?);
        }
        out.truncate(out.len() - terminator.len());
        Ok(out)
    }

    /// Codepoints read but not yet resolved.
    pub fn current_buffer(&self) -> String {
        self.op_buffer.iter().collect()
    }

    /// Drop codepoints read but not yet resolved, so a half-typed sequence cannot leak
    /// into the next read.
    pub fn clear_pending(&mut self) {
        if !self.op_buffer.is_empty() {
            let dropped = key_notation(&self.current_buffer());
            debug!(%dropped, "clearing unresolved input");
            self.op_buffer.clear();
        }
    }

    /// Raw codepoints consumed by the last resolved binding.
    pub fn last_binding(&self) -> &str {
        &self.last_binding
    }
}

fn lookup<'a, B>(keys: &'a KeyMap<B>, local: Option<&'a KeyMap<B>>, seq: &[char]) -> Match<'a, B> {
    if let Some(local) = local {
        let found = local.get_bound(seq);
        if found.binding.is_some() || found.remaining == Remaining::Ambiguous {
            return found;
        }
    }
    keys.get_bound(seq)
}

#[cfg(test)]
mod tests {
    use super::BindingReader;
    use crate::core::input::ScriptedInput;
    use crate::core::keymap::KeyMap;
    use crate::error::ReadError;
    use pretty_assertions::assert_eq;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const MS: Duration = Duration::from_millis(1);

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Forward,
        Backward,
        Ignore,
        Cancel,
        Up,
        Insert,
    }

    fn arrows() -> KeyMap<Op> {
        let mut keys = KeyMap::new();
        keys.bind("\x1b", Op::Cancel);
        keys.bind("\x1b[A", Op::Up);
        keys.set_ambiguous_timeout(MS * 150);
        keys
    }

    #[test]
    fn unmatched_key_resolves_to_nomatch_and_clears_pending() {
        let mut keys = KeyMap::new();
        keys.bind("y", Op::Forward);
        keys.bind("n", Op::Backward);
        keys.set_nomatch(Op::Ignore);

        let mut reader = BindingReader::new(ScriptedInput::new().chars("x"));
        assert_eq!(reader.read_binding(&keys).unwrap(), Op::Ignore);
        assert_eq!(reader.last_binding(), "x");
        assert_eq!(reader.current_buffer(), "");
    }

    #[test]
    fn lone_escape_commits_after_timeout() {
        let input = ScriptedInput::new().chars("\x1b").pause(MS * 400).chars("y");
        let mut reader = BindingReader::new(input);
        assert_eq!(reader.read_binding(&arrows()).unwrap(), Op::Cancel);
        assert_eq!(reader.last_binding(), "\x1b");
        assert_eq!(reader.source().elapsed(), MS * 150);
    }

    #[test]
    fn escape_followed_quickly_resolves_to_arrow() {
        let input = ScriptedInput::new().chars("\x1b").pause(MS * 20).chars("[A");
        let mut reader = BindingReader::new(input);
        assert_eq!(reader.read_binding(&arrows()).unwrap(), Op::Up);
        assert_eq!(reader.last_binding(), "\x1b[A");
    }

    #[test]
    fn escape_then_unbound_key_pushes_the_tail_back() {
        let mut keys = arrows();
        keys.bind("q", Op::Forward);
        let mut reader = BindingReader::new(ScriptedInput::new().chars("\x1bq"));
        assert_eq!(reader.read_binding(&keys).unwrap(), Op::Cancel);
        assert_eq!(reader.read_binding(&keys).unwrap(), Op::Forward);
        assert_eq!(reader.last_binding(), "q");
    }

    #[test]
    fn no_peek_for_unambiguous_keys() {
        let mut keys = KeyMap::new();
        keys.bind("e", Op::Forward);
        keys.set_ambiguous_timeout(MS * 150);
        let input = ScriptedInput::new().chars("e").pause(MS * 500).chars("e");
        let mut reader = BindingReader::new(input);
        assert_eq!(reader.read_binding(&keys).unwrap(), Op::Forward);
        assert_eq!(reader.source().elapsed(), Duration::ZERO);
    }

    #[test]
    fn unicode_fallback_consumes_one_codepoint() {
        let mut keys = KeyMap::new();
        keys.set_unicode(Op::Insert);
        keys.set_nomatch(Op::Ignore);
        let mut reader = BindingReader::new(ScriptedInput::new().chars("中é"));
        assert_eq!(reader.read_binding(&keys).unwrap(), Op::Insert);
        assert_eq!(reader.last_binding(), "中");
        assert_eq!(reader.read_binding(&keys).unwrap(), Op::Ignore);
        assert_eq!(reader.last_binding(), "é");
    }

    #[test]
    fn garbage_is_discarded_without_a_fallback() {
        let mut keys = KeyMap::new();
        keys.bind("\x1b[A", Op::Up);
        keys.bind("e", Op::Forward);
        let mut reader = BindingReader::new(ScriptedInput::new().chars("\x1b[Ze"));
        assert_eq!(reader.read_binding(&keys).unwrap(), Op::Forward);
        assert_eq!(reader.current_buffer(), "");
    }

    #[test]
    fn macro_replay_matches_live_input() {
        let keys = {
            let mut keys = arrows();
            keys.bind("e", Op::Forward);
            keys.bind("y", Op::Backward);
            keys.set_nomatch(Op::Ignore);
            keys
        };
        let typed = "e\x1b[Ayxe";

        let mut live = BindingReader::new(ScriptedInput::new().chars(typed));
        let mut expected = Vec::new();
        for _ in 0..5 {
            expected.push(live.read_binding(&keys).unwrap());
        }

        let mut replayed = BindingReader::new(ScriptedInput::new());
        replayed.run_macro(typed);
        let mut actual = Vec::new();
        for _ in 0..5 {
            actual.push(replayed.read_binding(&keys).unwrap());
        }

        assert_eq!(
            expected,
            vec![Op::Forward, Op::Up, Op::Backward, Op::Ignore, Op::Forward]
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn latest_pushback_is_replayed_first() {
        let mut keys = KeyMap::new();
        keys.set_nomatch(Op::Ignore);
        let mut reader = BindingReader::new(ScriptedInput::new().chars("z"));
        reader.run_macro("ab");
        reader.run_macro("c");
        let mut seen = String::new();
        for _ in 0..4 {
            reader.read_binding(&keys).unwrap();
            seen.push_str(reader.last_binding());
        }
        assert_eq!(seen, "cabz");
    }

    #[test]
    fn end_of_input_is_distinct() {
        let mut keys = KeyMap::new();
        keys.bind("\x1b[A", Op::Up);
        let mut reader = BindingReader::new(ScriptedInput::new().chars("\x1b["));
        assert!(matches!(
            reader.read_binding(&keys),
            Err(ReadError::EndOfInput)
        ));
        assert_eq!(reader.current_buffer(), "\x1b[");
    }

    #[test]
    fn end_of_input_during_peek_commits_the_prefix() {
        let mut reader = BindingReader::new(ScriptedInput::new().chars("\x1b"));
        assert_eq!(reader.read_binding(&arrows()).unwrap(), Op::Cancel);
        assert!(matches!(
            reader.read_binding(&arrows()),
            Err(ReadError::EndOfInput)
        ));
    }

    #[test]
    fn interrupt_propagates() {
        let mut reader = BindingReader::new(ScriptedInput::new().interrupt());
        assert!(matches!(
            reader.read_binding(&arrows()),
            Err(ReadError::Interrupted)
        ));
    }

    #[test]
    fn cleared_prefix_does_not_swallow_the_next_key() {
        let mut keys = arrows();
        keys.bind("y", Op::Forward);
        let input = ScriptedInput::new().chars("\x1b").interrupt().chars("y");
        let mut reader = BindingReader::new(input);
        assert!(matches!(
            reader.read_binding(&keys),
            Err(ReadError::Interrupted)
        ));
        assert_eq!(reader.current_buffer(), "\x1b");
        reader.clear_pending();
        assert_eq!(reader.current_buffer(), "");
        assert_eq!(reader.read_binding(&keys).unwrap(), Op::Forward);
    }

    #[derive(Clone, Default)]
    struct LogSink(Arc<Mutex<Vec<u8>>>);

    impl Write for LogSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn logs_print_key_notation() {
        let sink = LogSink::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let mut reader = BindingReader::new(ScriptedInput::new().chars("\x1b[A"));
        let op = tracing::subscriber::with_default(subscriber, || reader.read_binding(&arrows()));
        assert_eq!(op.unwrap(), Op::Up);

        let logs = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("^[[A"), "logs {logs:?}");
        assert!(!logs.contains('\x1b'), "logs {logs:?}");
    }

    #[test]
    fn local_keymap_takes_precedence() {
        let mut keys = KeyMap::new();
        keys.bind("a", Op::Forward);
        keys.bind("b", Op::Backward);
        let mut local = KeyMap::new();
        local.bind("a", Op::Insert);

        let mut reader = BindingReader::new(ScriptedInput::new().chars("ab"));
        assert_eq!(
            reader.read_binding_with(&keys, Some(&local), true).unwrap(),
            Some(Op::Insert)
        );
        assert_eq!(
            reader.read_binding_with(&keys, Some(&local), true).unwrap(),
            Some(Op::Backward)
        );
    }

    #[test]
    fn non_blocking_read_keeps_pending_prefix() {
        let keys = arrows();
        let input = ScriptedInput::new()
            .chars("\x1b[")
            .pause(MS * 500)
            .chars("A");
        let mut reader = BindingReader::new(input);
        assert_eq!(reader.read_binding_with(&keys, None, false).unwrap(), None);
        assert_eq!(reader.current_buffer(), "\x1b");
        assert_eq!(reader.read_binding_with(&keys, None, false).unwrap(), None);
        assert_eq!(reader.current_buffer(), "\x1b[");
        assert_eq!(reader.read_binding(&keys).unwrap(), Op::Up);
    }

    #[test]
    fn read_string_until_stops_at_terminator() {
        let input = ScriptedInput::new().chars("pasted text\x1b[201~rest");
        let mut reader = BindingReader::new(input);
        assert_eq!(reader.read_string_until("\x1b[201~").unwrap(), "pasted text");
        assert_eq!(reader.read_character().unwrap(), 'r');
    }
}
