//! Client-only per-scene settings: voice assignments, the character the user
//! plays, and rehearsal timing preferences.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{load_json, store_json, SessionStorage};

/// Voice assigned to each character for speech synthesis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceMap {
    pub character_1_voice: Option<String>,
    pub character_2_voice: Option<String>,
}

impl VoiceMap {
    pub fn new(character_1: impl Into<String>, character_2: impl Into<String>) -> Self {
        Self {
            character_1_voice: Some(character_1.into()),
            character_2_voice: Some(character_2.into()),
        }
    }
}

/// Timing preferences for the rehearsal flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RehearsalSettings {
    /// Silence between two lines read by the partner voice
    pub pause_between_lines_ms: u64,
    /// Countdown before the user's turn
    pub countdown_secs: u32,
    /// Start listening automatically when the user's turn begins
    pub auto_listen: bool,
    /// Speech synthesis rate multiplier
    pub playback_rate: f32,
}

impl Default for RehearsalSettings {
    fn default() -> Self {
        Self {
            pause_between_lines_ms: 800,
            countdown_secs: 3,
            auto_listen: true,
            playback_rate: 1.0,
        }
    }
}

/// Per-scene settings persisted in session storage.
#[derive(Clone)]
pub struct ClientSettingsStore {
    storage: Arc<dyn SessionStorage>,
}

impl ClientSettingsStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    fn voices_key(scene_id: i64) -> String {
        format!("scene-voices:{}", scene_id)
    }

    fn selected_key(scene_id: i64) -> String {
        format!("scene-selected-character:{}", scene_id)
    }

    fn rehearsal_key(scene_id: i64) -> String {
        format!("scene-rehearsal:{}", scene_id)
    }

    pub fn load_voices(&self, scene_id: i64) -> VoiceMap {
        load_json(self.storage.as_ref(), &Self::voices_key(scene_id)).unwrap_or_default()
    }

    pub fn save_voices(&self, scene_id: i64, voices: &VoiceMap) -> bool {
        store_json(self.storage.as_ref(), &Self::voices_key(scene_id), voices)
    }

    pub fn load_selected_character(&self, scene_id: i64) -> Option<String> {
        load_json::<Option<String>>(self.storage.as_ref(), &Self::selected_key(scene_id)).flatten()
    }

    pub fn save_selected_character(&self, scene_id: i64, character: Option<&str>) -> bool {
        store_json(self.storage.as_ref(), &Self::selected_key(scene_id), &character)
    }

    pub fn load_rehearsal(&self, scene_id: i64) -> RehearsalSettings {
        load_json(self.storage.as_ref(), &Self::rehearsal_key(scene_id)).unwrap_or_default()
    }

    pub fn save_rehearsal(&self, scene_id: i64, settings: &RehearsalSettings) -> bool {
        store_json(self.storage.as_ref(), &Self::rehearsal_key(scene_id), settings)
    }
}
