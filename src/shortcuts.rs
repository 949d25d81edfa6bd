//! Undo/redo keyboard shortcuts.

/// A key press as reported by the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: char,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyInput {
    pub fn new(key: char) -> Self {
        Self {
            key,
            ctrl: false,
            meta: false,
            shift: false,
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// Where keyboard focus currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// A text field or text area; native text undo wins.
    TextInput,
    Elsewhere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Undo,
    Redo,
}

impl Shortcut {
    /// Ctrl/Cmd+Z undoes, Ctrl/Cmd+Shift+Z and Ctrl/Cmd+Y redo.
    pub fn from_key(input: KeyInput) -> Option<Self> {
        if !(input.ctrl || input.meta) {
            return None;
        }
        match (input.key.to_ascii_lowercase(), input.shift) {
            ('z', false) => Some(Shortcut::Undo),
            ('z', true) | ('y', false) => Some(Shortcut::Redo),
            _ => None,
        }
    }

    /// Resolves a key press, ignoring it while focus is in a text input.
    pub fn resolve(input: KeyInput, focus: Focus) -> Option<Self> {
        match focus {
            Focus::TextInput => None,
            Focus::Elsewhere => Self::from_key(input),
        }
    }
}
