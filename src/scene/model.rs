//! Data models for a two-character dialogue scene.
//!
//! These structs mirror the records served by the remote scene store and use
//! autosurgeon derives so the editor can keep them in an Automerge document.

use autosurgeon::{Hydrate, Reconcile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{SceneError, SceneResult};

// =============================================================================
// TEXT HELPERS
// =============================================================================

/// Trims and collapses every run of whitespace into a single space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Counts whitespace-separated words.
pub fn word_count(text: &str) -> i32 {
    text.split_whitespace().count() as i32
}

// =============================================================================
// SCENE
// =============================================================================

/// Root document structure for a dialogue scene.
#[derive(Debug, Clone, Default, Reconcile, Hydrate, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Scene {
    /// Remote identifier
    pub id: i64,
    pub title: Option<String>,
    pub play_title: Option<String>,
    pub play_author: Option<String>,
    pub description: Option<String>,
    /// Every line speaks as one of these two names
    pub character_1_name: String,
    pub character_2_name: String,
    pub setting: Option<String>,
    pub context_before: Option<String>,
    pub context_after: Option<String>,

    /// Lines sorted by `line_order`
    pub lines: Vec<Line>,

    /// Derived stats (read-only on the server)
    pub line_count: i32,
    pub rehearsal_count: i32,
    pub has_original_snapshot: bool,
}

impl Scene {
    /// Creates a new empty scene with the given ID and character names.
    pub fn new(id: i64, character_1: impl Into<String>, character_2: impl Into<String>) -> Self {
        Self {
            id,
            character_1_name: character_1.into(),
            character_2_name: character_2.into(),
            ..Default::default()
        }
    }

    /// Builder: Set title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Builder: Append a line at the end.
    pub fn with_line(mut self, line: Line) -> Self {
        self.lines.push(line);
        self.renumber();
        self
    }

    /// Reads a scalar field.
    pub fn field(&self, field: SceneField) -> Option<String> {
        match field {
            SceneField::Title => self.title.clone(),
            SceneField::PlayTitle => self.play_title.clone(),
            SceneField::PlayAuthor => self.play_author.clone(),
            SceneField::Description => self.description.clone(),
            SceneField::Character1Name => Some(self.character_1_name.clone()),
            SceneField::Character2Name => Some(self.character_2_name.clone()),
            SceneField::Setting => self.setting.clone(),
            SceneField::ContextBefore => self.context_before.clone(),
            SceneField::ContextAfter => self.context_after.clone(),
        }
    }

    /// Writes a scalar field without touching lines.
    pub fn set_field_value(&mut self, field: SceneField, value: Option<String>) {
        match field {
            SceneField::Title => self.title = value,
            SceneField::PlayTitle => self.play_title = value,
            SceneField::PlayAuthor => self.play_author = value,
            SceneField::Description => self.description = value,
            SceneField::Character1Name => self.character_1_name = value.unwrap_or_default(),
            SceneField::Character2Name => self.character_2_name = value.unwrap_or_default(),
            SceneField::Setting => self.setting = value,
            SceneField::ContextBefore => self.context_before = value,
            SceneField::ContextAfter => self.context_after = value,
        }
    }

    /// Writes a field and, for character names, moves every line spoken as
    /// `previous` over to the new name. Returns the number of lines renamed.
    pub fn apply_field(
        &mut self,
        field: SceneField,
        value: Option<String>,
        previous: Option<&str>,
    ) -> usize {
        let renamed = match (field.is_character_name(), previous, value.as_deref()) {
            (true, Some(from), Some(to)) if from != to => self.rename_character(from, to),
            _ => 0,
        };
        self.set_field_value(field, value);
        renamed
    }

    /// Checks that `value` can become the name stored in `field`.
    pub fn validate_character_name(&self, field: SceneField, value: &str) -> SceneResult<()> {
        let other = match field {
            SceneField::Character1Name => &self.character_2_name,
            SceneField::Character2Name => &self.character_1_name,
            _ => return Ok(()),
        };
        let value = value.trim();
        if value.is_empty() {
            return Err(SceneError::invalid_character("character name cannot be empty"));
        }
        if value == other {
            return Err(SceneError::invalid_character(format!(
                "both characters cannot be named '{}'",
                value
            )));
        }
        Ok(())
    }

    /// True when `name` is one of the two characters.
    pub fn has_character(&self, name: &str) -> bool {
        name == self.character_1_name || name == self.character_2_name
    }

    /// Renames every line spoken by `from`.
    pub fn rename_character(&mut self, from: &str, to: &str) -> usize {
        let mut renamed = 0;
        for line in self.lines.iter_mut().filter(|l| l.character_name == from) {
            line.character_name = to.to_string();
            renamed += 1;
        }
        renamed
    }

    /// Gets a line by ID.
    pub fn line(&self, id: i64) -> Option<&Line> {
        self.lines.iter().find(|l| l.id == id)
    }

    /// Gets a mutable line by ID.
    pub fn line_mut(&mut self, id: i64) -> Option<&mut Line> {
        self.lines.iter_mut().find(|l| l.id == id)
    }

    /// Returns line IDs in display order.
    pub fn line_ids(&self) -> Vec<i64> {
        self.lines.iter().map(|l| l.id).collect()
    }

    /// Returns the ID of the line shown right before `id`, if any.
    pub fn predecessor_of(&self, id: i64) -> Option<i64> {
        let index = self.lines.iter().position(|l| l.id == id)?;
        index.checked_sub(1).map(|i| self.lines[i].id)
    }

    /// Sorts lines by `line_order` (stable, so ties keep insertion order)
    /// and rewrites the orders as a dense sequence.
    pub fn sort_lines(&mut self) {
        self.lines.sort_by_key(|l| l.line_order);
        self.renumber();
    }

    /// Rewrites `line_order` from the current vector position and refreshes stats.
    pub fn renumber(&mut self) {
        for (index, line) in self.lines.iter_mut().enumerate() {
            line.line_order = index as i32;
        }
        self.line_count = self.lines.len() as i32;
    }

    /// Reorders lines to follow `order`. Lines missing from `order` keep their
    /// relative position after the listed ones; unknown IDs are ignored.
    pub fn apply_order(&mut self, order: &[i64]) {
        let mut remaining = std::mem::take(&mut self.lines);
        let mut ordered = Vec::with_capacity(remaining.len());
        for id in order {
            if let Some(pos) = remaining.iter().position(|l| l.id == *id) {
                ordered.push(remaining.remove(pos));
            }
        }
        ordered.extend(remaining);
        self.lines = ordered;
        self.renumber();
    }

    /// Inserts a line right after `after` (or first when `None` or unknown).
    pub fn insert_line_after(&mut self, after: Option<i64>, line: Line) {
        let index = after
            .and_then(|id| self.lines.iter().position(|l| l.id == id))
            .map(|i| i + 1)
            .unwrap_or(0);
        self.lines.insert(index, line);
        self.renumber();
    }

    /// Removes a line, returning it together with the ID of its predecessor.
    pub fn remove_line(&mut self, id: i64) -> Option<(Line, Option<i64>)> {
        let index = self.lines.iter().position(|l| l.id == id)?;
        let after = index.checked_sub(1).map(|i| self.lines[i].id);
        let line = self.lines.remove(index);
        self.renumber();
        Some((line, after))
    }

    /// Swaps a line's identifier after the store assigned a new one.
    pub fn reassign_line_id(&mut self, old: i64, new: i64) -> bool {
        match self.line_mut(old) {
            Some(line) => {
                line.id = new;
                true
            }
            None => false,
        }
    }

    /// Scalar fields that differ from `other`, with this scene's values.
    pub fn field_changes(&self, other: &Scene) -> ScenePatch {
        let mut patch = ScenePatch::new();
        for field in SceneField::ALL {
            let value = self.field(field);
            if value != other.field(field) {
                patch.set(field, value);
            }
        }
        patch
    }
}

// =============================================================================
// SCENE FIELDS
// =============================================================================

/// Mutable scalar fields of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneField {
    Title,
    PlayTitle,
    PlayAuthor,
    Description,
    #[serde(rename = "character_1_name")]
    Character1Name,
    #[serde(rename = "character_2_name")]
    Character2Name,
    Setting,
    ContextBefore,
    ContextAfter,
}

impl SceneField {
    /// Every mutable field, in form order.
    pub const ALL: [SceneField; 9] = [
        SceneField::Title,
        SceneField::PlayTitle,
        SceneField::PlayAuthor,
        SceneField::Description,
        SceneField::Character1Name,
        SceneField::Character2Name,
        SceneField::Setting,
        SceneField::ContextBefore,
        SceneField::ContextAfter,
    ];

    /// Document / wire key.
    pub fn key(self) -> &'static str {
        match self {
            SceneField::Title => "title",
            SceneField::PlayTitle => "play_title",
            SceneField::PlayAuthor => "play_author",
            SceneField::Description => "description",
            SceneField::Character1Name => "character_1_name",
            SceneField::Character2Name => "character_2_name",
            SceneField::Setting => "setting",
            SceneField::ContextBefore => "context_before",
            SceneField::ContextAfter => "context_after",
        }
    }

    /// Parses a wire key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    pub fn is_character_name(self) -> bool {
        matches!(self, SceneField::Character1Name | SceneField::Character2Name)
    }
}

/// Body of a scene metadata patch: one or more fields with their new values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenePatch {
    fields: BTreeMap<SceneField, Option<String>>,
}

impl ScenePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch touching a single field.
    pub fn single(field: SceneField, value: Option<String>) -> Self {
        let mut patch = Self::new();
        patch.set(field, value);
        patch
    }

    pub fn set(&mut self, field: SceneField, value: Option<String>) {
        self.fields.insert(field, value);
    }

    pub fn get(&self, field: SceneField) -> Option<&Option<String>> {
        self.fields.get(&field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SceneField, &Option<String>)> {
        self.fields.iter().map(|(f, v)| (*f, v))
    }
}

// =============================================================================
// LINE
// =============================================================================

/// A single line of dialogue.
#[derive(Debug, Clone, Default, Reconcile, Hydrate, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Line {
    /// Remote identifier, immutable once created
    pub id: i64,
    pub line_order: i32,
    pub character_name: String,
    pub text: String,
    pub stage_direction: Option<String>,
    /// Derived from `text`
    pub word_count: i32,
}

impl Line {
    /// Creates a new Line with the given ID, speaker and text.
    pub fn new(id: i64, character_name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id,
            word_count: word_count(&normalize_whitespace(&text)),
            character_name: character_name.into(),
            text,
            ..Default::default()
        }
    }

    /// Builder: Set stage direction.
    pub fn with_stage_direction(mut self, direction: impl Into<String>) -> Self {
        self.stage_direction = Some(direction.into());
        self
    }

    /// The editable values of this line.
    pub fn values(&self) -> LineValues {
        LineValues {
            character_name: self.character_name.clone(),
            text: self.text.clone(),
            stage_direction: self.stage_direction.clone(),
        }
    }

    /// Overwrites the editable values and recomputes `word_count`.
    pub fn set_values(&mut self, values: &LineValues) {
        self.character_name = values.character_name.clone();
        self.text = values.text.clone();
        self.stage_direction = values.stage_direction.clone();
        self.word_count = values.word_count();
    }
}

/// The user-editable part of a line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineValues {
    pub character_name: String,
    pub text: String,
    pub stage_direction: Option<String>,
}

impl LineValues {
    pub fn new(character_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            character_name: character_name.into(),
            text: text.into(),
            stage_direction: None,
        }
    }

    /// Builder: Set stage direction.
    pub fn with_stage_direction(mut self, direction: impl Into<String>) -> Self {
        self.stage_direction = Some(direction.into());
        self
    }

    /// Whitespace-normalized copy; an empty stage direction becomes `None`.
    pub fn normalized(&self) -> Self {
        let stage_direction = self
            .stage_direction
            .as_deref()
            .map(normalize_whitespace)
            .filter(|s| !s.is_empty());
        Self {
            character_name: self.character_name.trim().to_string(),
            text: normalize_whitespace(&self.text),
            stage_direction,
        }
    }

    /// Word count of the normalized text.
    pub fn word_count(&self) -> i32 {
        word_count(&self.text)
    }
}

/// Body of a line creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLine {
    pub character_name: String,
    pub text: String,
    pub stage_direction: Option<String>,
    pub insert_after_line_id: Option<i64>,
}

impl NewLine {
    pub fn new(values: &LineValues, insert_after_line_id: Option<i64>) -> Self {
        Self {
            character_name: values.character_name.clone(),
            text: values.text.clone(),
            stage_direction: values.stage_direction.clone(),
            insert_after_line_id,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
