//! Scene view state: the scene document plus client-only selections.
//!
//! Shared by every editor component behind one lock. The lock is never held
//! across an await; writers apply locally first and then talk to the store.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::SceneResult;
use crate::scene::{Line, LineValues, Scene, SceneDocument};
use crate::storage::VoiceMap;

pub type SharedView = Arc<Mutex<SceneView>>;

pub struct SceneView {
    document: SceneDocument,
    voices: VoiceMap,
    selected_character: Option<String>,
    next_provisional_id: i64,
}

impl SceneView {
    pub fn new(scene: Scene) -> SceneResult<Self> {
        Ok(Self {
            document: SceneDocument::new(scene)?,
            voices: VoiceMap::default(),
            selected_character: None,
            next_provisional_id: -1,
        })
    }

    /// Wraps the view for sharing.
    pub fn shared(self) -> SharedView {
        Arc::new(Mutex::new(self))
    }

    pub fn document(&mut self) -> &mut SceneDocument {
        &mut self.document
    }

    pub fn scene(&mut self) -> SceneResult<Scene> {
        self.document.get_state()
    }

    pub fn line(&mut self, id: i64) -> SceneResult<Option<Line>> {
        self.document.line(id)
    }

    pub fn line_ids(&mut self) -> SceneResult<Vec<i64>> {
        self.document.line_ids()
    }

    pub fn set_line_values(&mut self, id: i64, values: &LineValues) -> SceneResult<()> {
        self.document.set_line_values(id, values)
    }

    pub fn voices(&self) -> &VoiceMap {
        &self.voices
    }

    pub fn set_voices(&mut self, voices: VoiceMap) -> VoiceMap {
        std::mem::replace(&mut self.voices, voices)
    }

    pub fn selected_character(&self) -> Option<&str> {
        self.selected_character.as_deref()
    }

    pub fn set_selected_character(&mut self, character: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.selected_character, character)
    }

    /// Hands out a negative placeholder ID for a line the store has not
    /// created yet. Remote IDs are always positive.
    pub fn provisional_line_id(&mut self) -> i64 {
        let id = self.next_provisional_id;
        self.next_provisional_id -= 1;
        id
    }
}
