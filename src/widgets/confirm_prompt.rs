//! Yes/no confirmation prompt.

use crate::config::UiConfig;
use crate::core::binding_reader::BindingReader;
use crate::core::input::CharSource;
use crate::core::keymap::KeyMap;
use crate::core::terminal::Terminal;
use crate::core::text::width::visible_width;
use crate::error::PromptError;
use crate::widgets::prompt_view::{bind_exit_keys, PromptView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Yes,
    No,
    Exit,
    Cancel,
    Interrupt,
}

#[derive(Debug, Clone)]
pub struct ConfirmPrompt {
    message: String,
    default: Option<bool>,
}

impl ConfirmPrompt {
    pub fn new(message: impl Into<String>, default: Option<bool>) -> Self {
        Self {
            message: message.into(),
            default,
        }
    }

    /// `(y/n)`, `(Y/n)` or `(y/N)` depending on the default answer.
    pub fn hint(default: Option<bool>, config: &UiConfig) -> &str {
        match default {
            None => &config.confirm_without_default,
            Some(true) => &config.confirm_yes_default,
            Some(false) => &config.confirm_no_default,
        }
    }

    fn key_map(config: &UiConfig) -> KeyMap<Op> {
        let mut map = KeyMap::new();
        for (key, op) in [(config.yes_key, Op::Yes), (config.no_key, Op::No)] {
            map.bind(&key.to_string(), op);
            map.bind(&key.to_uppercase().to_string(), op);
        }
        bind_exit_keys(&mut map, config, Op::Exit, Op::Cancel, Op::Interrupt);
        map
    }

    /// Enter accepts the last typed answer, or the default when nothing was typed. Without
    /// a default Enter is ignored until `y` or `n` is pressed.
    pub fn execute<T, S>(
        &self,
        terminal: &mut T,
        reader: &mut BindingReader<S>,
        header: &[String],
        config: &UiConfig,
    ) -> Result<Option<bool>, PromptError>
    where
        T: Terminal + ?Sized,
        S: CharSource,
    {
        let keys = Self::key_map(config);
        let mut view = PromptView::new(&*terminal, config, header, self.message.clone(), 0);
        let start = view.message_width();
        let mut column = start;
        let mut answer = self.default;
        let mut buffer: &str = "";
        loop {
            view.draw_buffer(terminal, buffer, false, column)?;
            match reader.read_binding(&keys)? {
                Op::Yes => {
                    answer = Some(true);
                    buffer = config.yes_answer.as_str();
                }
                Op::No => {
                    answer = Some(false);
                    buffer = config.no_answer.as_str();
                }
                Op::Exit => {
                    if let Some(answer) = answer {
                        return Ok(Some(answer));
                    }
                    continue;
                }
                Op::Cancel => return Ok(None),
                Op::Interrupt => return Err(PromptError::Interrupted),
            }
            column = start + visible_width(buffer);
        }
    }
}
