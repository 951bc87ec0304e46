//! Console prompts built on the key map and the display engine.

pub mod checkbox_prompt;
pub mod choice_prompt;
pub mod confirm_prompt;
pub mod console_prompt;
pub mod input_prompt;
pub mod items;
pub mod list_prompt;
pub mod list_range;
pub mod prompt_view;

pub use checkbox_prompt::CheckboxPrompt;
pub use choice_prompt::{ChoiceOutcome, ChoicePrompt};
pub use confirm_prompt::ConfirmPrompt;
pub use console_prompt::{
    ConsolePrompt, PageSize, PromptElement, PromptResult, PromptResults, TextEditor,
};
pub use input_prompt::{InputAnswer, InputPrompt};
pub use items::{Item, ItemKind};
pub use list_prompt::ListPrompt;
pub use list_range::ListRange;
