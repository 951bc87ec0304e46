//! Expandable one-key choice prompt.
//!
//! The user types the shortcut key of an item and confirms with Enter. Typing the help key
//! asks the caller to show the full list instead.

use crate::config::UiConfig;
use crate::core::binding_reader::BindingReader;
use crate::core::input::CharSource;
use crate::core::keymap::KeyMap;
use crate::core::terminal::Terminal;
use crate::error::PromptError;
use crate::widgets::items::Item;
use crate::widgets::prompt_view::{bind_exit_keys, bind_printable, PromptView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Insert,
    Exit,
    Cancel,
    Interrupt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceOutcome {
    Selected(String),
    /// The user asked for help; show the items as a list prompt.
    Expand,
}

#[derive(Debug, Clone)]
pub struct ChoicePrompt {
    message: String,
    items: Vec<Item>,
}

impl ChoicePrompt {
    pub fn new(message: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            message: message.into(),
            items,
        }
    }

    /// The `(abch) ` hint listing every shortcut, the default one upper-cased.
    pub fn key_hint(items: &[Item], config: &UiConfig) -> String {
        let mut hint = String::from("(");
        for item in items.iter().filter(|item| item.is_selectable()) {
            if let Some(key) = item.key() {
                if item.is_default() {
                    hint.extend(key.to_uppercase());
                } else {
                    hint.push(key);
                }
            }
        }
        hint.push(config.help_key);
        hint.push_str(") ");
        hint
    }

    fn key_map(config: &UiConfig) -> KeyMap<Op> {
        let mut map = KeyMap::new();
        bind_printable(&mut map, Op::Insert);
        bind_exit_keys(&mut map, config, Op::Exit, Op::Cancel, Op::Interrupt);
        map
    }

    pub fn execute<T, S>(
        &self,
        terminal: &mut T,
        reader: &mut BindingReader<S>,
        header: &[String],
        config: &UiConfig,
    ) -> Result<Option<ChoiceOutcome>, PromptError>
    where
        T: Terminal + ?Sized,
        S: CharSource,
    {
        let keys = Self::key_map(config);
        let mut view = PromptView::new(&*terminal, config, header, self.message.clone(), 0);
        let column = view.message_width();
        let mut selected = self
            .items
            .iter()
            .find(|item| item.is_selectable() && item.is_default())
            .map(|item| item.name.clone());
        let mut expand = false;
        let mut buffer = String::new();
        loop {
            view.draw_buffer(terminal, &buffer, true, column)?;
            let op = reader.read_binding(&keys)?;
            buffer.clear();
            match op {
                Op::Insert => {
                    let typed = reader.last_binding();
                    if typed.chars().eq([config.help_key]) {
                        expand = true;
                        buffer.push_str(&config.help_list_all);
                        continue;
                    }
                    expand = false;
                    selected = self
                        .items
                        .iter()
                        .find(|item| {
                            item.is_selectable()
                                && item.key().is_some_and(|key| typed.starts_with(key))
                        })
                        .map(|item| item.name.clone());
                    match &selected {
                        Some(name) => buffer.push_str(name),
                        None => buffer.push_str(&config.invalid_command),
                    }
                }
                Op::Exit if expand => return Ok(Some(ChoiceOutcome::Expand)),
                Op::Exit => {
                    if let Some(name) = &selected {
                        return Ok(Some(ChoiceOutcome::Selected(name.clone())));
                    }
                }
                Op::Cancel => return Ok(None),
                Op::Interrupt => return Err(PromptError::Interrupted),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChoiceOutcome, ChoicePrompt};
    use crate::config::UiConfig;
    use crate::core::binding_reader::BindingReader;
    use crate::core::input::ScriptedInput;
    use crate::platform::virtual_terminal::VirtualTerminal;
    use crate::widgets::items::Item;
    use pretty_assertions::assert_eq;

    fn actions() -> Vec<Item> {
        vec![
            Item::choice("overwrite", "Overwrite").with_key('o'),
            Item::choice("skip", "Skip").with_key('s').default_choice(),
            Item::choice("diff", "Show diff").with_key('d').disabled("binary"),
        ]
    }

    fn run(keys: &str) -> (Option<ChoiceOutcome>, VirtualTerminal) {
        let config = UiConfig::default();
        let mut term = VirtualTerminal::new(8, 50);
        let mut reader = BindingReader::new(ScriptedInput::new().chars(keys));
        let message = format!("? Conflict {}", ChoicePrompt::key_hint(&actions(), &config));
        let outcome = ChoicePrompt::new(message, actions())
            .execute(&mut term, &mut reader, &[], &config)
            .ok()
            .flatten();
        (outcome, term)
    }

    #[test]
    fn hint_lists_selectable_keys() {
        assert_eq!(ChoicePrompt::key_hint(&actions(), &UiConfig::default()), "(oSh) ");
    }

    #[test]
    fn enter_accepts_default() {
        assert_eq!(run("\r").0, Some(ChoiceOutcome::Selected("skip".into())));
    }

    #[test]
    fn typed_key_is_echoed_then_accepted() {
        let (outcome, _) = run("o\r");
        assert_eq!(outcome, Some(ChoiceOutcome::Selected("overwrite".into())));

        let (outcome, term) = run("o");
        assert_eq!(outcome, None);
        assert_eq!(term.visible_lines(), vec!["? Conflict (oSh)", ">> overwrite"]);
    }

    #[test]
    fn unknown_key_blocks_enter_until_valid() {
        let (outcome, _) = run("x\rd\rs\r");
        assert_eq!(outcome, Some(ChoiceOutcome::Selected("skip".into())));

        let (_, term) = run("x");
        assert_eq!(
            term.visible_lines(),
            vec!["? Conflict (oSh)", ">> Please enter a valid command"]
        );
    }

    #[test]
    fn help_key_expands() {
        assert_eq!(run("h\r").0, Some(ChoiceOutcome::Expand));
    }
}
