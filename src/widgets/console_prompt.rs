//! Interactive prompt session.
//!
//! A [`ConsolePrompt`] runs a sequence of [`PromptElement`]s on one terminal. Every answered
//! prompt is appended to a header that stays on screen above the next prompt; cancelling
//! a prompt with Escape goes back to the previous one.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::config::UiConfig;
use crate::core::binding_reader::BindingReader;
use crate::core::capabilities::Capability;
use crate::core::input::CharSource;
use crate::core::output::{OutputGate, TerminalCmd};
use crate::core::terminal::{Terminal, TerminalGuard};
use crate::error::PromptError;
use crate::render::display::Display;
use crate::widgets::checkbox_prompt::CheckboxPrompt;
use crate::widgets::choice_prompt::{ChoiceOutcome, ChoicePrompt};
use crate::widgets::confirm_prompt::ConfirmPrompt;
use crate::widgets::input_prompt::{InputAnswer, InputPrompt};
use crate::widgets::items::Item;
use crate::widgets::list_prompt::ListPrompt;
use crate::widgets::prompt_view::question_line;

#[cfg(unix)]
use crate::platform::process_terminal::{ProcessTerminal, TtyReader};

/// Page size used when an expandable choice falls back to a list.
const EXPANDED_PAGE_SIZE: usize = 10;

/// How many list rows a prompt may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    /// At most this many rows, capped by the terminal height.
    Absolute(usize),
    /// This percentage of the terminal height.
    Percentage(usize),
}

impl PageSize {
    pub fn rows(self, terminal_rows: usize) -> usize {
        match self {
            PageSize::Absolute(rows) => rows.min(terminal_rows),
            PageSize::Percentage(percent) => terminal_rows * percent / 100,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PromptElement {
    List {
        name: String,
        message: String,
        items: Vec<Item>,
        page_size: Option<PageSize>,
    },
    Checkbox {
        name: String,
        message: String,
        items: Vec<Item>,
        page_size: Option<PageSize>,
    },
    Choice {
        name: String,
        message: String,
        items: Vec<Item>,
    },
    Confirm {
        name: String,
        message: String,
        default: Option<bool>,
    },
    Input {
        name: String,
        message: String,
        default: Option<String>,
        mask: Option<char>,
    },
    Editor {
        name: String,
        message: String,
        initial: String,
    },
    /// Lines added to the header without asking anything.
    Text { name: String, lines: Vec<String> },
}

impl PromptElement {
    pub fn list(name: impl Into<String>, message: impl Into<String>, items: Vec<Item>) -> Self {
        Self::List {
            name: name.into(),
            message: message.into(),
            items,
            page_size: None,
        }
    }

    pub fn checkbox(name: impl Into<String>, message: impl Into<String>, items: Vec<Item>) -> Self {
        Self::Checkbox {
            name: name.into(),
            message: message.into(),
            items,
            page_size: None,
        }
    }

    pub fn choice(name: impl Into<String>, message: impl Into<String>, items: Vec<Item>) -> Self {
        Self::Choice {
            name: name.into(),
            message: message.into(),
            items,
        }
    }

    pub fn confirm(
        name: impl Into<String>,
        message: impl Into<String>,
        default: Option<bool>,
    ) -> Self {
        Self::Confirm {
            name: name.into(),
            message: message.into(),
            default,
        }
    }

    pub fn input(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Input {
            name: name.into(),
            message: message.into(),
            default: None,
            mask: None,
        }
    }

    pub fn editor(
        name: impl Into<String>,
        message: impl Into<String>,
        initial: impl Into<String>,
    ) -> Self {
        Self::Editor {
            name: name.into(),
            message: message.into(),
            initial: initial.into(),
        }
    }

    pub fn text(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self::Text {
            name: name.into(),
            lines,
        }
    }

    /// Limit a list or checkbox prompt to `page_size` rows. Ignored by other prompts.
    pub fn with_page_size(mut self, size: PageSize) -> Self {
        if let Self::List { page_size, .. } | Self::Checkbox { page_size, .. } = &mut self {
            *page_size = Some(size);
        }
        self
    }

    /// Default answer of an input prompt. Ignored by other prompts.
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        if let Self::Input { default, .. } = &mut self {
            *default = Some(value.into());
        }
        self
    }

    /// Mask character of an input prompt. Ignored by other prompts.
    pub fn with_mask(mut self, ch: char) -> Self {
        if let Self::Input { mask, .. } = &mut self {
            *mask = Some(ch);
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            Self::List { name, .. }
            | Self::Checkbox { name, .. }
            | Self::Choice { name, .. }
            | Self::Confirm { name, .. }
            | Self::Input { name, .. }
            | Self::Editor { name, .. }
            | Self::Text { name, .. } => name,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::List { message, .. }
            | Self::Checkbox { message, .. }
            | Self::Choice { message, .. }
            | Self::Confirm { message, .. }
            | Self::Input { message, .. }
            | Self::Editor { message, .. } => message,
            Self::Text { .. } => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResult {
    List(String),
    Checkbox(BTreeSet<String>),
    Choice(String),
    Confirm(bool),
    Input(InputAnswer),
    Editor(String),
    /// Placeholder for text elements; removed from the final results.
    NoResult,
}

impl PromptResult {
    /// Text shown after the question once the prompt is answered.
    pub fn display_result(&self, config: &UiConfig) -> String {
        match self {
            PromptResult::List(name) | PromptResult::Choice(name) => name.clone(),
            PromptResult::Checkbox(names) => {
                names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
            }
            PromptResult::Confirm(true) => config.yes_answer.clone(),
            PromptResult::Confirm(false) => config.no_answer.clone(),
            PromptResult::Input(answer) => answer.display.clone(),
            PromptResult::Editor(text) => text.lines().next().unwrap_or_default().to_string(),
            PromptResult::NoResult => String::new(),
        }
    }
}

pub type PromptResults = BTreeMap<String, PromptResult>;

/// Full-screen text editor used by editor prompts.
pub trait TextEditor {
    /// Edit `initial`. `Ok(None)` means the user abandoned the edit.
    fn edit(&mut self, message: &str, initial: &str) -> Result<Option<String>, PromptError>;
}

pub struct ConsolePrompt<T: Terminal, S: CharSource> {
    terminal: T,
    reader: BindingReader<S>,
    config: UiConfig,
    editor: Option<Box<dyn TextEditor>>,
}

#[cfg(unix)]
impl ConsolePrompt<ProcessTerminal, TtyReader> {
    /// Prompt on the process's own terminal.
    pub fn stdio(config: UiConfig) -> std::io::Result<Self> {
        let terminal = ProcessTerminal::new()?;
        let reader = terminal.reader();
        Ok(Self::new(terminal, reader, config))
    }
}

impl<T: Terminal, S: CharSource> ConsolePrompt<T, S> {
    pub fn new(terminal: T, source: S, config: UiConfig) -> Self {
        Self {
            terminal,
            reader: BindingReader::new(source),
            config,
            editor: None,
        }
    }

    pub fn with_editor(mut self, editor: impl TextEditor + 'static) -> Self {
        self.editor = Some(Box::new(editor));
        self
    }

    pub fn config(&self) -> &UiConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut UiConfig {
        &mut self.config
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut T {
        &mut self.terminal
    }

    pub fn into_parts(self) -> (T, BindingReader<S>) {
        (self.terminal, self.reader)
    }

    /// Ask every element in turn below `header`.
    ///
    /// Returns the answers by element name. An empty map means the user cancelled the first
    /// prompt with `cancellable_first_prompt` set.
    pub fn prompt(
        &mut self,
        header: Vec<String>,
        elements: &[PromptElement],
    ) -> Result<PromptResults, PromptError> {
        let mut results = PromptResults::new();
        self.session(header, |session| {
            let cancellable = session.config.cancellable_first_prompt;
            session.prompt_list(elements, &mut results, cancellable)
        })?;
        Ok(answered(results))
    }

    /// Ask lists of elements produced by `next` until it returns `None`.
    ///
    /// `next` sees every answer so far. Cancelling the first prompt of a list returns to
    /// the last prompt of the previous list.
    pub fn prompt_with<F>(
        &mut self,
        header: Vec<String>,
        mut next: F,
    ) -> Result<PromptResults, PromptError>
    where
        F: FnMut(&PromptResults) -> Option<Vec<PromptElement>>,
    {
        let mut results = PromptResults::new();
        self.session(header, |session| {
            let mut previous: Vec<(Vec<PromptElement>, PromptResults)> = Vec::new();
            let mut current = next(&results);
            let mut current_results = PromptResults::new();
            while let Some(elements) = current.take() {
                let cancellable = !previous.is_empty() || session.config.cancellable_first_prompt;
                session.prompt_list(&elements, &mut current_results, cancellable)?;
                if current_results.is_empty() {
                    let Some((elements, earlier)) = previous.pop() else {
                        break;
                    };
                    debug!(prompts = elements.len(), "returning to previous prompt list");
                    for name in earlier.keys() {
                        results.remove(name);
                    }
                    session.header.pop();
                    current = Some(elements);
                    current_results = earlier;
                } else {
                    results.extend(current_results.clone());
                    previous.push((elements, std::mem::take(&mut current_results)));
                    current = next(&results);
                }
            }
            Ok(())
        })?;
        Ok(answered(results))
    }

    fn session<R, F>(&mut self, header: Vec<String>, run: F) -> Result<R, PromptError>
    where
        F: FnOnce(&mut Session<'_, T, S>) -> Result<R, PromptError>,
    {
        let Self {
            terminal,
            reader,
            config,
            editor,
        } = self;
        let mut guard = TerminalGuard::new(terminal)?;
        let mut session = Session {
            terminal: &mut *guard,
            reader,
            config,
            editor,
            header,
            cursor_hidden: false,
        };
        session.open()?;
        let outcome = run(&mut session);
        let closed = session.close();
        let value = outcome?;
        closed?;
        Ok(value)
    }
}

fn answered(mut results: PromptResults) -> PromptResults {
    results.retain(|_, result| *result != PromptResult::NoResult);
    results
}

struct Session<'a, T: Terminal + ?Sized, S> {
    terminal: &'a mut T,
    reader: &'a mut BindingReader<S>,
    config: &'a UiConfig,
    editor: &'a mut Option<Box<dyn TextEditor>>,
    header: Vec<String>,
    cursor_hidden: bool,
}

impl<T: Terminal + ?Sized, S: CharSource> Session<'_, T, S> {
    fn open(&mut self) -> Result<(), PromptError> {
        let mut gate = OutputGate::new();
        gate.push(TerminalCmd::capability(Capability::KeypadXmit));
        gate.flush(&mut *self.terminal)?;
        Ok(())
    }

    /// Leave the answered prompts on screen and give the line below back to the caller.
    fn close(&mut self) -> Result<(), PromptError> {
        self.reader.clear_pending();
        let size = self.terminal.size();
        let rows = size.rows as usize;
        let keep = rows.saturating_sub(1);
        let shown = &self.header[self.header.len().saturating_sub(keep)..];
        let mut display = Display::new(self.terminal.capabilities().clone(), true);
        display.resize(rows, size.columns as usize);
        display.clear();
        let mut gate = OutputGate::new();
        if self.cursor_hidden {
            gate.push(TerminalCmd::ShowCursor);
            self.cursor_hidden = false;
        }
        gate.extend(display.update(shown, None));
        gate.push(TerminalCmd::capability(Capability::KeypadLocal));
        gate.push(TerminalCmd::BytesStatic("\r\n"));
        gate.flush(&mut *self.terminal)?;
        Ok(())
    }

    /// Run `elements` starting after the answers already in `results`.
    ///
    /// Escape on a prompt returns to the one before it. Escape on the first prompt clears
    /// `results` when `cancellable`, otherwise the prompt is asked again.
    fn prompt_list(
        &mut self,
        elements: &[PromptElement],
        results: &mut PromptResults,
        cancellable: bool,
    ) -> Result<(), PromptError> {
        if !self.terminal.is_raw() {
            return Err(PromptError::NotOpen);
        }
        let mut idx = results.len().saturating_sub(1);
        let mut backward = false;
        while idx < elements.len() {
            let element = &elements[idx];
            if backward {
                self.drop_header_of(element);
                backward = false;
            }
            let answered_before = results.contains_key(element.name());
            match self.ask(element, answered_before)? {
                Some(result) => {
                    self.record(element, &result);
                    results.insert(element.name().to_string(), result);
                    idx += 1;
                }
                None if idx > 0 => {
                    idx -= 1;
                    backward = true;
                }
                None if cancellable => {
                    debug!("first prompt cancelled");
                    results.clear();
                    return Ok(());
                }
                None => {
                    results.remove(element.name());
                }
            }
        }
        Ok(())
    }

    fn record(&mut self, element: &PromptElement, result: &PromptResult) {
        match element {
            PromptElement::Text { lines, .. } => self.header.extend(lines.iter().cloned()),
            _ => {
                let answer = result.display_result(self.config);
                self.header
                    .push(question_line(self.config, element.message(), Some(&answer)));
            }
        }
    }

    fn drop_header_of(&mut self, element: &PromptElement) {
        let count = match element {
            PromptElement::Text { lines, .. } => lines.len(),
            _ => 1,
        };
        let keep = self.header.len().saturating_sub(count);
        self.header.truncate(keep);
    }

    /// Hide or show the cursor. Writes nothing when it is already in that state.
    fn set_cursor_hidden(&mut self, hidden: bool) -> Result<(), PromptError> {
        if self.cursor_hidden == hidden {
            return Ok(());
        }
        let mut gate = OutputGate::new();
        gate.push(if hidden {
            TerminalCmd::HideCursor
        } else {
            TerminalCmd::ShowCursor
        });
        gate.flush(&mut *self.terminal)?;
        self.cursor_hidden = hidden;
        Ok(())
    }

    fn page_size(&self, page_size: Option<PageSize>) -> usize {
        match page_size {
            Some(size) => size.rows(self.terminal.rows() as usize),
            None => self.config.page_size,
        }
    }

    /// Ask one element. `Ok(None)` means it was cancelled.
    fn ask(
        &mut self,
        element: &PromptElement,
        answered_before: bool,
    ) -> Result<Option<PromptResult>, PromptError> {
        let config = self.config;
        let selection = matches!(
            element,
            PromptElement::List { .. }
                | PromptElement::Checkbox { .. }
                | PromptElement::Choice { .. }
        );
        if !matches!(element, PromptElement::Text { .. }) {
            self.set_cursor_hidden(selection)?;
        }
        match element {
            PromptElement::List {
                message,
                items,
                page_size,
                ..
            } => {
                let line = question_line(config, message, None);
                let prompt = ListPrompt::new(line, items.clone())
                    .with_page_size(self.page_size(*page_size));
                Ok(prompt
                    .execute(&mut *self.terminal, &mut *self.reader, &self.header, config)?
                    .map(PromptResult::List))
            }
            PromptElement::Checkbox {
                message,
                items,
                page_size,
                ..
            } => {
                let line = question_line(config, message, None);
                let prompt = CheckboxPrompt::new(line, items.clone())
                    .with_page_size(self.page_size(*page_size));
                Ok(prompt
                    .execute(&mut *self.terminal, &mut *self.reader, &self.header, config)?
                    .map(PromptResult::Checkbox))
            }
            PromptElement::Choice { message, items, .. } => {
                let line = format!(
                    "{}{}",
                    question_line(config, message, None),
                    ChoicePrompt::key_hint(items, config)
                );
                let prompt = ChoicePrompt::new(line, items.clone());
                let outcome =
                    prompt.execute(&mut *self.terminal, &mut *self.reader, &self.header, config)?;
                match outcome {
                    Some(ChoiceOutcome::Selected(name)) => Ok(Some(PromptResult::Choice(name))),
                    Some(ChoiceOutcome::Expand) => {
                        let line = question_line(config, message, None);
                        let list =
                            ListPrompt::new(line, items.clone()).with_page_size(EXPANDED_PAGE_SIZE);
                        Ok(list
                            .execute(&mut *self.terminal, &mut *self.reader, &self.header, config)?
                            .map(PromptResult::Choice))
                    }
                    None => Ok(None),
                }
            }
            PromptElement::Confirm { message, default, .. } => {
                let line = format!(
                    "{}{} ",
                    question_line(config, message, None),
                    ConfirmPrompt::hint(*default, config)
                );
                Ok(ConfirmPrompt::new(line, *default)
                    .execute(&mut *self.terminal, &mut *self.reader, &self.header, config)?
                    .map(PromptResult::Confirm))
            }
            PromptElement::Input {
                message,
                default,
                mask,
                ..
            } => {
                let mut line = question_line(config, message, None);
                if let Some(default) = default {
                    line.push_str(&format!("({default}) "));
                }
                let mut prompt = InputPrompt::new(line);
                if let Some(default) = default {
                    prompt = prompt.with_default(default.clone());
                }
                if let Some(mask) = mask {
                    prompt = prompt.with_mask(*mask);
                }
                Ok(prompt
                    .execute(&mut *self.terminal, &mut *self.reader, &self.header, config)?
                    .map(PromptResult::Input))
            }
            PromptElement::Editor { message, initial, .. } => {
                let Some(editor) = self.editor.as_mut() else {
                    return Err(PromptError::NoEditor);
                };
                Ok(editor.edit(message, initial)?.map(PromptResult::Editor))
            }
            PromptElement::Text { .. } if answered_before => Ok(None),
            PromptElement::Text { .. } => Ok(Some(PromptResult::NoResult)),
        }
    }
}
