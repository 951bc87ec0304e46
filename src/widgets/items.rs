//! Items shown by list, checkbox and choice prompts.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    /// A selectable entry, optionally with a one-key shortcut.
    Choice { key: Option<char>, default: bool },
    Checkbox { checked: bool },
    Separator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub name: String,
    pub text: String,
    pub kind: ItemKind,
    /// Reason shown next to a disabled item.
    pub disabled: Option<String>,
}

impl Item {
    pub fn choice(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            kind: ItemKind::Choice {
                key: None,
                default: false,
            },
            disabled: None,
        }
    }

    pub fn checkbox(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            kind: ItemKind::Checkbox { checked: false },
            disabled: None,
        }
    }

    pub fn separator(text: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            text: text.into(),
            kind: ItemKind::Separator,
            disabled: None,
        }
    }

    pub fn with_key(mut self, shortcut: char) -> Self {
        if let ItemKind::Choice { key, .. } = &mut self.kind {
            *key = Some(shortcut);
        }
        self
    }

    pub fn default_choice(mut self) -> Self {
        if let ItemKind::Choice { default, .. } = &mut self.kind {
            *default = true;
        }
        self
    }

    pub fn checked(mut self, value: bool) -> Self {
        if let ItemKind::Checkbox { checked } = &mut self.kind {
            *checked = value;
        }
        self
    }

    pub fn disabled(mut self, reason: impl Into<String>) -> Self {
        self.disabled = Some(reason.into());
        self
    }

    pub fn key(&self) -> Option<char> {
        match self.kind {
            ItemKind::Choice { key, .. } => key,
            _ => None,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self.kind, ItemKind::Choice { default: true, .. })
    }

    pub fn is_checked(&self) -> bool {
        matches!(self.kind, ItemKind::Checkbox { checked: true })
    }

    pub fn is_separator(&self) -> bool {
        self.kind == ItemKind::Separator
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.is_some()
    }

    /// Whether navigation may stop on this item.
    pub fn is_selectable(&self) -> bool {
        !self.is_separator() && !self.is_disabled()
    }
}

/// Next selectable index after `current`, wrapping to the top. `None` if nothing is
/// selectable.
pub fn next_selectable(items: &[Item], current: Option<usize>) -> Option<usize> {
    let start = current.map_or(0, |idx| idx + 1);
    (start..items.len())
        .chain(0..start.min(items.len()))
        .find(|&idx| items[idx].is_selectable())
}

/// Previous selectable index before `current`, wrapping to the bottom.
pub fn prev_selectable(items: &[Item], current: usize) -> Option<usize> {
    (0..current.min(items.len()))
        .rev()
        .chain((current.min(items.len())..items.len()).rev())
        .find(|&idx| items[idx].is_selectable())
}
