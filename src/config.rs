//! Environment and widget configuration.

use std::env;
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::core::keymap::DEFAULT_AMBIGUOUS_TIMEOUT;

const DEFAULT_LOG_FILE: &str = "linekit.log";

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub debug: bool,
    pub debug_redraw: bool,
    pub write_log: Option<String>,
    pub log_file: String,
    pub esc_timeout_ms: Option<u64>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            debug: env_flag("LINEKIT_DEBUG"),
            debug_redraw: env_flag("LINEKIT_DEBUG_REDRAW"),
            write_log: env_string_opt("LINEKIT_WRITE_LOG"),
            log_file: env_string_opt("LINEKIT_LOG_FILE")
                .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
            esc_timeout_ms: env_string_opt("LINEKIT_ESC_TIMEOUT")
                .and_then(|value| value.trim().parse().ok()),
        }
    }
}

/// Process-wide configuration, read from the environment on first use.
pub fn env_config() -> &'static EnvConfig {
    static CONFIG: OnceCell<EnvConfig> = OnceCell::new();
    CONFIG.get_or_init(EnvConfig::from_env)
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

/// Glyphs, timings and messages used by the prompt widgets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiConfig {
    pub indicator: String,
    pub checked_box: String,
    pub unchecked_box: String,
    pub unavailable: String,
    pub ambiguous_timeout: Duration,
    /// Rows reserved for lists; 0 fits the list to the terminal height.
    pub page_size: usize,
    /// Whether cancelling the first prompt ends the session instead of repeating it.
    pub cancellable_first_prompt: bool,
    pub message_prefix: String,
    pub yes_key: char,
    pub no_key: char,
    pub yes_answer: String,
    pub no_answer: String,
    pub confirm_without_default: String,
    pub confirm_yes_default: String,
    pub confirm_no_default: String,
    pub help_key: char,
    pub help_list_all: String,
    pub invalid_command: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        let (indicator, checked_box, unchecked_box, unavailable) = default_glyphs();
        Self {
            indicator: indicator.to_string(),
            checked_box: checked_box.to_string(),
            unchecked_box: unchecked_box.to_string(),
            unavailable: unavailable.to_string(),
            ambiguous_timeout: DEFAULT_AMBIGUOUS_TIMEOUT,
            page_size: 0,
            cancellable_first_prompt: false,
            message_prefix: "? ".to_string(),
            yes_key: 'y',
            no_key: 'n',
            yes_answer: "yes".to_string(),
            no_answer: "no".to_string(),
            confirm_without_default: "(y/n)".to_string(),
            confirm_yes_default: "(Y/n)".to_string(),
            confirm_no_default: "(y/N)".to_string(),
            help_key: 'h',
            help_list_all: "List all options".to_string(),
            invalid_command: "Please enter a valid command".to_string(),
        }
    }
}

impl UiConfig {
    /// Defaults adjusted by the environment (`LINEKIT_ESC_TIMEOUT`).
    pub fn from_env(env: &EnvConfig) -> Self {
        let mut config = Self::default();
        if let Some(ms) = env.esc_timeout_ms {
            config.ambiguous_timeout = Duration::from_millis(ms);
        }
        config
    }

    pub fn with_glyphs(
        mut self,
        indicator: &str,
        checked_box: &str,
        unchecked_box: &str,
        unavailable: &str,
    ) -> Self {
        self.indicator = indicator.to_string();
        self.checked_box = checked_box.to_string();
        self.unchecked_box = unchecked_box.to_string();
        self.unavailable = unavailable.to_string();
        self
    }
}

#[cfg(windows)]
fn default_glyphs() -> (&'static str, &'static str, &'static str, &'static str) {
    (">", "x ", " ", "- ")
}

#[cfg(not(windows))]
fn default_glyphs() -> (&'static str, &'static str, &'static str, &'static str) {
    ("\u{276f}", "\u{25c9} ", "\u{25ef} ", "\u{229d} ")
}
