//! Codepoint sources consumed by the decoder.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::ReadError;

/// Outcome of a timed read or peek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadResult {
    Char(char),
    Timeout,
    Eof,
}

/// Minimal input contract: a blocking codepoint source with timeouts.
pub trait CharSource {
    /// Next codepoint, waiting at most `timeout` (`None` waits indefinitely).
    fn read(&mut self, timeout: Option<Duration>) -> Result<ReadResult, ReadError>;

    /// Like [`CharSource::read`] but leaves the codepoint in the source.
    fn peek(&mut self, timeout: Duration) -> Result<ReadResult, ReadError>;
}

impl<S: CharSource + ?Sized> CharSource for &mut S {
    fn read(&mut self, timeout: Option<Duration>) -> Result<ReadResult, ReadError> {
        (**self).read(timeout)
    }

    fn peek(&mut self, timeout: Duration) -> Result<ReadResult, ReadError> {
        (**self).peek(timeout)
    }
}

#[derive(Debug, Clone)]
enum Step {
    Chars(VecDeque<char>),
    Pause(Duration),
    Interrupt,
}

/// Deterministic input script running on a virtual clock.
///
/// Pauses advance [`ScriptedInput::elapsed`] instead of sleeping, so timeout-sensitive
/// decoding is testable without wall-clock waits. When the script runs out the source
/// reports end of input.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    steps: VecDeque<Step>,
    elapsed: Duration,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue codepoints that arrive back to back.
    pub fn chars(mut self, text: &str) -> Self {
        self.push_chars(text);
        self
    }

    /// Queue a gap before the next codepoint arrives.
    pub fn pause(mut self, duration: Duration) -> Self {
        self.steps.push_back(Step::Pause(duration));
        self
    }

    /// Queue a user interrupt. It is reported once, by whichever read or peek meets it.
    pub fn interrupt(mut self) -> Self {
        self.steps.push_back(Step::Interrupt);
        self
    }

    pub fn push_chars(&mut self, text: &str) {
        if !text.is_empty() {
            self.steps.push_back(Step::Chars(text.chars().collect()));
        }
    }

    /// Virtual time consumed by reads so far.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn is_exhausted(&self) -> bool {
        self.steps.is_empty()
    }

    fn next(&mut self, timeout: Option<Duration>, consume: bool) -> Result<ReadResult, ReadError> {
        let mut budget = timeout;
        loop {
            let Some(step) = self.steps.front_mut() else {
                return Ok(ReadResult::Eof);
            };
            match step {
                Step::Chars(chars) => {
                    let Some(&ch) = chars.front() else {
                        self.steps.pop_front();
                        continue;
                    };
                    if consume {
                        chars.pop_front();
                        if chars.is_empty() {
                            self.steps.pop_front();
                        }
                    }
                    return Ok(ReadResult::Char(ch));
                }
                Step::Pause(left) => match budget {
                    Some(limit) if limit < *left => {
                        *left -= limit;
                        self.elapsed += limit;
                        return Ok(ReadResult::Timeout);
                    }
                    Some(limit) => {
                        let waited = *left;
                        self.elapsed += waited;
                        budget = Some(limit - waited);
                        self.steps.pop_front();
                    }
                    None => {
                        self.elapsed += *left;
                        self.steps.pop_front();
                    }
                },
                Step::Interrupt => {
                    self.steps.pop_front();
                    return Err(ReadError::Interrupted);
                }
            }
        }
    }
}

impl CharSource for ScriptedInput {
    fn read(&mut self, timeout: Option<Duration>) -> Result<ReadResult, ReadError> {
        self.next(timeout, true)
    }

    fn peek(&mut self, timeout: Duration) -> Result<ReadResult, ReadError> {
        self.next(Some(timeout), false)
    }
}

#[cfg(test)]
mod tests {
    use super::{CharSource, ReadResult, ScriptedInput};
    use crate::error::ReadError;
    use std::time::Duration;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn pauses_shorter_than_timeout_are_waited_out() {
        let mut input = ScriptedInput::new().chars("a").pause(MS * 50).chars("b");
        assert_eq!(input.read(Some(MS * 100)).unwrap(), ReadResult::Char('a'));
        assert_eq!(input.read(Some(MS * 100)).unwrap(), ReadResult::Char('b'));
        assert_eq!(input.elapsed(), MS * 50);
        assert_eq!(input.read(Some(MS * 100)).unwrap(), ReadResult::Eof);
    }

    #[test]
    fn long_pauses_time_out_and_keep_the_rest() {
        let mut input = ScriptedInput::new().pause(MS * 300).chars("x");
        assert_eq!(input.peek(MS * 100).unwrap(), ReadResult::Timeout);
        assert_eq!(input.read(Some(MS * 100)).unwrap(), ReadResult::Timeout);
        assert_eq!(input.elapsed(), MS * 200);
        assert_eq!(input.peek(MS * 150).unwrap(), ReadResult::Char('x'));
        assert_eq!(input.read(None).unwrap(), ReadResult::Char('x'));
        assert_eq!(input.elapsed(), MS * 300);
    }

    #[test]
    fn interrupt_is_reported_once() {
        let mut input = ScriptedInput::new().interrupt().chars("a");
        assert!(matches!(input.peek(MS), Err(ReadError::Interrupted)));
        assert_eq!(input.read(None).unwrap(), ReadResult::Char('a'));
    }
}
