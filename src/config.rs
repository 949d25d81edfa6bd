//! Editor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_HISTORY_LIMIT;

/// Default autosave debounce: idle time after the last keystroke.
pub const DEFAULT_AUTOSAVE_MS: u64 = 1200;

/// Tunables for a scene editor session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Idle milliseconds before a dirty draft is autosaved
    pub autosave_delay_ms: u64,
    /// Maximum undo depth per scene
    pub history_limit: usize,
    /// Remote scene store base URL
    pub base_url: Option<String>,
    /// Bearer token for the remote store
    pub token: Option<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            autosave_delay_ms: DEFAULT_AUTOSAVE_MS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            base_url: None,
            token: None,
        }
    }
}

impl EditorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `HEYOSCENE_BASE_URL`, `HEYOSCENE_TOKEN` and `HEYOSCENE_AUTOSAVE_MS`
    /// on top of the defaults. Unparseable numbers keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("HEYOSCENE_BASE_URL").filter(|s| !s.is_empty()) {
            config.base_url = Some(url);
        }
        if let Some(token) = lookup("HEYOSCENE_TOKEN").filter(|s| !s.is_empty()) {
            config.token = Some(token);
        }
        if let Some(ms) = lookup("HEYOSCENE_AUTOSAVE_MS").and_then(|s| s.trim().parse().ok()) {
            config.autosave_delay_ms = ms;
        }
        config
    }

    /// Builder: Set autosave delay.
    pub fn with_autosave_delay(mut self, delay: Duration) -> Self {
        self.autosave_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Builder: Set history limit.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }
}
