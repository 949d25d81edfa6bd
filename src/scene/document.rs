//! SceneDocument: the in-memory scene aggregate every editor component reads.
//!
//! Wraps an Automerge document and provides:
//! - High-level operations via autosurgeon (hydrate/reconcile) for structural updates
//! - Targeted O(1) puts for scalar field and line value edits

use automerge::{transaction::Transactable, AutoCommit, ObjId, ReadDoc, ScalarValue, Value, ROOT};
use autosurgeon::{hydrate, reconcile};

use super::model::{Line, LineValues, Scene, SceneField};
use crate::error::{SceneError, SceneResult};

/// Automerge-backed scene state.
///
/// # Caching Strategy
///
/// - `cached_state`: hydrated Scene, patched in place by targeted writes
/// - `cached_lines_obj`: ObjId of the "lines" list, dropped after structural updates
pub struct SceneDocument {
    doc: AutoCommit,
    cached_state: Option<Scene>,
    cached_lines_obj: Option<ObjId>,
}

impl SceneDocument {
    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Creates a document holding `scene`, with lines sorted by `line_order`.
    pub fn new(scene: Scene) -> SceneResult<Self> {
        let mut scene = scene;
        scene.sort_lines();
        let mut doc = AutoCommit::new();
        reconcile(&mut doc, &scene)?;
        Ok(Self {
            doc,
            cached_state: Some(scene),
            cached_lines_obj: None,
        })
    }

    /// Creates a SceneDocument from saved binary data.
    pub fn from_bytes(bytes: &[u8]) -> SceneResult<Self> {
        let doc = AutoCommit::load(bytes)?;
        Ok(Self {
            doc,
            cached_state: None,
            cached_lines_obj: None,
        })
    }

    /// Saves the document to binary format.
    pub fn save(&mut self) -> Vec<u8> {
        self.doc.save()
    }

    // =========================================================================
    // HIGH-LEVEL OPERATIONS (via Hydrate/Reconcile)
    // =========================================================================

    /// Hydrates the entire scene.
    pub fn get_state(&mut self) -> SceneResult<Scene> {
        if let Some(ref cached) = self.cached_state {
            return Ok(cached.clone());
        }
        let state: Scene = hydrate(&self.doc)?;
        self.cached_state = Some(state.clone());
        Ok(state)
    }

    /// Applies a function to mutate the scene, then reconciles back to the document.
    pub fn update_state<F, R>(&mut self, f: F) -> SceneResult<R>
    where
        F: FnOnce(&mut Scene) -> R,
    {
        let mut state = self.get_state()?;
        let result = f(&mut state);
        reconcile(&mut self.doc, &state)?;
        self.cached_state = Some(state);
        self.cached_lines_obj = None;
        Ok(result)
    }

    /// Replaces the whole scene, returning the previous one.
    pub fn replace(&mut self, scene: Scene) -> SceneResult<Scene> {
        let mut scene = scene;
        scene.sort_lines();
        self.update_state(|state| std::mem::replace(state, scene))
    }

    /// Gets a line by ID.
    pub fn line(&mut self, id: i64) -> SceneResult<Option<Line>> {
        let state = self.get_state()?;
        Ok(state.line(id).cloned())
    }

    /// Returns the line IDs in display order.
    pub fn line_ids(&mut self) -> SceneResult<Vec<i64>> {
        Ok(self.get_state()?.line_ids())
    }

    /// Sets a scene field. Character-name changes move every line spoken as
    /// `previous` to the new name in the same reconcile.
    pub fn apply_field(
        &mut self,
        field: SceneField,
        value: Option<String>,
        previous: Option<&str>,
    ) -> SceneResult<usize> {
        if field.is_character_name() {
            return self.update_state(|state| state.apply_field(field, value, previous));
        }
        self.set_field_direct(field, value)?;
        Ok(0)
    }

    /// Reorders lines to follow `order` and rewrites every `line_order`.
    pub fn apply_order(&mut self, order: &[i64]) -> SceneResult<()> {
        self.update_state(|state| state.apply_order(order))
    }

    /// Inserts a line after `after` (first when `None`).
    pub fn insert_line_after(&mut self, after: Option<i64>, line: Line) -> SceneResult<()> {
        self.update_state(|state| state.insert_line_after(after, line))
    }

    /// Removes a line, returning it with the ID of its predecessor.
    pub fn remove_line(&mut self, id: i64) -> SceneResult<Option<(Line, Option<i64>)>> {
        self.update_state(|state| state.remove_line(id))
    }

    /// Puts a previously captured line back in place of the current copy.
    pub fn restore_line(&mut self, line: &Line) -> SceneResult<()> {
        self.set_line_values(line.id, &line.values())
    }

    /// Swaps a line's ID after the store assigned a new one.
    pub fn reassign_line_id(&mut self, old: i64, new: i64) -> SceneResult<bool> {
        if old == new {
            return Ok(false);
        }
        let state = self.get_state()?;
        let Some(index) = state.lines.iter().position(|l| l.id == old) else {
            return Ok(false);
        };
        let line_obj = self.get_line_obj(index)?;
        self.doc.put(&line_obj, "id", ScalarValue::Int(new))?;
        let mut state = state;
        state.lines[index].id = new;
        self.cached_state = Some(state);
        Ok(true)
    }

    // =========================================================================
    // TARGETED UPDATES (Direct put, O(1))
    // =========================================================================

    /// Sets a single scalar field on the root, bypassing full reconcile.
    fn set_field_direct(&mut self, field: SceneField, value: Option<String>) -> SceneResult<()> {
        let mut state = self.get_state()?;
        self.cached_state = None;
        self.doc.put(&ROOT, field.key(), optional_str(value.as_deref()))?;
        state.set_field_value(field, value);
        self.cached_state = Some(state);
        Ok(())
    }

    /// Overwrites a line's editable values and recomputes its word count.
    pub fn set_line_values(&mut self, id: i64, values: &LineValues) -> SceneResult<()> {
        let mut state = self.get_state()?;
        let index = state
            .lines
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| SceneError::line_not_found(id))?;
        self.cached_state = None;

        let line_obj = self.get_line_obj(index)?;
        self.doc.put(
            &line_obj,
            "character_name",
            ScalarValue::Str(values.character_name.as_str().into()),
        )?;
        self.doc
            .put(&line_obj, "text", ScalarValue::Str(values.text.as_str().into()))?;
        self.doc.put(
            &line_obj,
            "stage_direction",
            optional_str(values.stage_direction.as_deref()),
        )?;
        self.doc.put(
            &line_obj,
            "word_count",
            ScalarValue::Int(values.word_count() as i64),
        )?;

        state.lines[index].set_values(values);
        self.cached_state = Some(state);
        Ok(())
    }

    // =========================================================================
    // INTERNAL HELPERS - WITH TOPOLOGY CACHING
    // =========================================================================

    /// Gets the cached "lines" list ObjId, or discovers it.
    fn get_lines_obj(&mut self) -> SceneResult<ObjId> {
        if let Some(ref obj) = self.cached_lines_obj {
            return Ok(obj.clone());
        }
        let obj = self.get_obj_at(&ROOT, "lines")?;
        self.cached_lines_obj = Some(obj.clone());
        Ok(obj)
    }

    /// Gets the ObjId of the line map at `index`.
    fn get_line_obj(&mut self, index: usize) -> SceneResult<ObjId> {
        let lines = self.get_lines_obj()?;
        match self.doc.get(&lines, index) {
            Ok(Some((Value::Object(_), obj_id))) => Ok(obj_id),
            Ok(Some(_)) => Err(SceneError::schema_violation(format!(
                "lines[{}] is not an object",
                index
            ))),
            Ok(None) => Err(SceneError::field_not_found(format!("lines[{}]", index))),
            Err(e) => Err(SceneError::Automerge(e)),
        }
    }

    /// Gets an object ID at a map key.
    fn get_obj_at(&self, parent: &ObjId, key: &str) -> SceneResult<ObjId> {
        match self.doc.get(parent, key) {
            Ok(Some((Value::Object(_), obj_id))) => Ok(obj_id),
            Ok(Some(_)) => Err(SceneError::schema_violation(format!(
                "'{}' is not an object",
                key
            ))),
            Ok(None) => Err(SceneError::field_not_found(key)),
            Err(e) => Err(SceneError::Automerge(e)),
        }
    }
}

/// Nullable string as a scalar; `None` is stored as an explicit null so
/// hydration reads it back as `None`.
fn optional_str(value: Option<&str>) -> ScalarValue {
    match value {
        Some(v) => ScalarValue::Str(v.into()),
        None => ScalarValue::Null,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SceneDocument {
        let scene = Scene::new(3, "SAM", "ALEX")
            .with_title("Kitchen")
            .with_line(Line::new(7, "SAM", "Hi"))
            .with_line(Line::new(8, "ALEX", "Hello").with_stage_direction("waves"));
        SceneDocument::new(scene).unwrap()
    }

    /// Forces a fresh hydrate so targeted puts are checked against the document.
    fn rehydrate(doc: &mut SceneDocument) -> Scene {
        let bytes = doc.save();
        SceneDocument::from_bytes(&bytes).unwrap().get_state().unwrap()
    }

    #[test]
    fn test_new_document_round_trips() {
        let mut doc = sample();
        let state = rehydrate(&mut doc);
        assert_eq!(state.line_ids(), vec![7, 8]);
        assert_eq!(state.title.as_deref(), Some("Kitchen"));
        assert_eq!(state, doc.get_state().unwrap());
    }

    #[test]
    fn test_targeted_field_update() {
        let mut doc = sample();
        doc.apply_field(SceneField::Setting, Some("Night".into()), None)
            .unwrap();
        doc.apply_field(SceneField::Title, None, Some("Kitchen")).unwrap();

        let state = rehydrate(&mut doc);
        assert_eq!(state.setting.as_deref(), Some("Night"));
        assert_eq!(state.title, None);
        assert_eq!(doc.get_state().unwrap(), state);
    }

    #[test]
    fn test_character_rename_cascades() {
        let mut doc = sample();
        let renamed = doc
            .apply_field(SceneField::Character1Name, Some("SAMUEL".into()), Some("SAM"))
            .unwrap();
        assert_eq!(renamed, 1);

        let state = rehydrate(&mut doc);
        assert_eq!(state.character_1_name, "SAMUEL");
        assert_eq!(state.line(7).unwrap().character_name, "SAMUEL");
        assert_eq!(state.line(8).unwrap().character_name, "ALEX");
    }

    #[test]
    fn test_set_line_values() {
        let mut doc = sample();
        let values = LineValues::new("ALEX", "Hi   there  friend");
        doc.set_line_values(7, &values).unwrap();

        let state = rehydrate(&mut doc);
        let line = state.line(7).unwrap();
        assert_eq!(line.character_name, "ALEX");
        assert_eq!(line.text, "Hi   there  friend");
        assert_eq!(line.word_count, 3);
        assert_eq!(line.stage_direction, None);
        assert_eq!(doc.get_state().unwrap(), state);

        assert!(matches!(
            doc.set_line_values(99, &values),
            Err(SceneError::LineNotFound(99))
        ));
    }

    #[test]
    fn test_structural_updates() {
        let mut doc = sample();
        doc.insert_line_after(Some(7), Line::new(9, "SAM", "Between"))
            .unwrap();
        assert_eq!(doc.line_ids().unwrap(), vec![7, 9, 8]);

        doc.apply_order(&[8, 7, 9]).unwrap();
        let removed = doc.remove_line(7).unwrap().unwrap();
        assert_eq!(removed.1, Some(8));

        assert!(doc.reassign_line_id(9, 90).unwrap());
        assert!(!doc.reassign_line_id(404, 1).unwrap());

        let state = rehydrate(&mut doc);
        assert_eq!(state.line_ids(), vec![8, 90]);
        assert_eq!(state.line_count, 2);
        assert_eq!(state.line(90).unwrap().line_order, 1);
    }

    #[test]
    fn test_replace_returns_previous() {
        let mut doc = sample();
        let next = Scene::new(3, "A", "B").with_line(Line::new(1, "A", "Only"));
        let previous = doc.replace(next.clone()).unwrap();
        assert_eq!(previous.line_ids(), vec![7, 8]);
        assert_eq!(rehydrate(&mut doc), next);
    }
}
