//! Scene editor session.
//!
//! [`SceneEditor`] wires the view, draft buffer, autosave, history and flush
//! paths together for one open scene. Every user action goes through here:
//! it updates the view optimistically, talks to the store, and records a
//! history entry once the store confirms.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::autosave::AutosaveScheduler;
use crate::config::EditorConfig;
use crate::draft::{DraftBuffer, DraftEntry, SharedDrafts};
use crate::error::{SceneError, SceneResult};
use crate::flush::{ExitReason, FlushCoordinator};
use crate::history::{ApplyOutcome, HistoryEngine, HistoryEntry, HistoryHandle, HistoryStore};
use crate::notice::NoticeBoard;
use crate::reorder::ReorderSession;
use crate::scene::{Line, LineValues, NewLine, Scene, SceneField, ScenePatch};
use crate::shortcuts::{Focus, KeyInput, Shortcut};
use crate::storage::{ClientSettingsStore, RehearsalSettings, SessionStorage, VoiceMap};
use crate::store::SceneStore;
use crate::sync::OptimisticWrite;
use crate::view::{SceneView, SharedView};

/// Result of committing the active draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// No line was being edited.
    NoEdit,
    /// The line matches what it was when editing began; nothing recorded.
    Unchanged,
    /// The store accepted the new values and a history entry was recorded.
    Committed,
}

pub struct SceneEditor {
    scene_id: i64,
    store: Arc<dyn SceneStore>,
    view: SharedView,
    drafts: SharedDrafts,
    engine: HistoryEngine,
    autosave: Arc<AutosaveScheduler>,
    flusher: FlushCoordinator,
    reorder: Mutex<ReorderSession>,
    settings: ClientSettingsStore,
    notices: NoticeBoard,
}

impl SceneEditor {
    /// Fetches the scene and opens an editing session on it.
    pub async fn open(
        store: Arc<dyn SceneStore>,
        scene_id: i64,
        storage: Arc<dyn SessionStorage>,
        config: &EditorConfig,
    ) -> SceneResult<Self> {
        let scene = store.fetch_scene(scene_id).await?;
        Self::with_scene(store, scene, storage, config)
    }

    /// Opens a session on an already fetched scene. Voices, the selected
    /// character and history are restored from `storage`.
    pub fn with_scene(
        store: Arc<dyn SceneStore>,
        mut scene: Scene,
        storage: Arc<dyn SessionStorage>,
        config: &EditorConfig,
    ) -> SceneResult<Self> {
        let scene_id = scene.id;
        scene.sort_lines();
        let settings = ClientSettingsStore::new(storage.clone());
        let history = HistoryStore::new(storage)
            .with_limit(config.history_limit)
            .open(scene_id);

        let mut view = SceneView::new(scene)?;
        let original = view.scene()?;
        view.set_voices(settings.load_voices(scene_id));
        view.set_selected_character(settings.load_selected_character(scene_id));
        let view = view.shared();

        let drafts = DraftBuffer::shared();
        let notices = NoticeBoard::new();
        let engine = HistoryEngine::new(
            store.clone(),
            view.clone(),
            Arc::new(history),
            settings.clone(),
            notices.clone(),
            original,
        );
        let autosave = Arc::new(AutosaveScheduler::new(
            scene_id,
            store.clone(),
            view.clone(),
            drafts.clone(),
            notices.clone(),
            config.autosave_delay(),
        ));
        let flusher = FlushCoordinator::new(
            scene_id,
            store.clone(),
            view.clone(),
            drafts.clone(),
            autosave.clone(),
        );

        info!(
            scene_id,
            undo = engine.history().undo_len(),
            redo = engine.history().redo_len(),
            "scene editor opened"
        );

        Ok(Self {
            scene_id,
            store,
            view,
            drafts,
            engine,
            autosave,
            flusher,
            reorder: Mutex::new(ReorderSession::new()),
            settings,
            notices,
        })
    }

    // =========================================================================
    // STATE
    // =========================================================================

    pub fn scene_id(&self) -> i64 {
        self.scene_id
    }

    pub fn scene(&self) -> SceneResult<Scene> {
        self.view.lock().scene()
    }

    pub fn line(&self, line_id: i64) -> SceneResult<Option<Line>> {
        self.view.lock().line(line_id)
    }

    pub fn voices(&self) -> VoiceMap {
        self.view.lock().voices().clone()
    }

    pub fn selected_character(&self) -> Option<String> {
        self.view.lock().selected_character().map(str::to_string)
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn history(&self) -> &HistoryHandle {
        self.engine.history()
    }

    pub fn engine(&self) -> &HistoryEngine {
        &self.engine
    }

    pub fn can_undo(&self) -> bool {
        self.history().undo_len() > 0
    }

    pub fn can_redo(&self) -> bool {
        self.history().redo_len() > 0
    }

    /// The open draft, if any.
    pub fn active_edit(&self) -> Option<DraftEntry> {
        self.drafts.lock().active().cloned()
    }

    pub fn is_autosave_pending(&self) -> bool {
        self.autosave.is_armed()
    }

    // =========================================================================
    // LINE EDITING
    // =========================================================================

    /// Opens a draft on `line_id`. A draft already open on another line is
    /// committed first; if that commit fails it stays open and the error is
    /// returned.
    pub async fn start_edit(&self, line_id: i64) -> SceneResult<()> {
        let active = self.drafts.lock().active_line_id();
        if active == Some(line_id) {
            return Ok(());
        }
        if active.is_some() {
            self.commit_if_dirty().await?;
        }
        let line = self
            .view
            .lock()
            .line(line_id)?
            .ok_or_else(|| SceneError::line_not_found(line_id))?;
        self.drafts.lock().open(line_id, line.values());
        debug!(scene_id = self.scene_id, line_id, "editing line");
        Ok(())
    }

    /// Records a keystroke in the open draft. Returns whether an autosave is
    /// now scheduled.
    pub fn update_draft(&self, values: LineValues) -> SceneResult<bool> {
        self.autosave.on_input(values)
    }

    /// Drops the open draft without committing it.
    pub fn cancel_edit(&self) -> Option<DraftEntry> {
        self.autosave.cancel();
        self.drafts.lock().take()
    }

    /// Normalizes and saves the open draft. A history entry is recorded only
    /// when the normalized values differ from those at edit start. A speaker
    /// outside the scene is rejected and the draft stays open.
    pub async fn commit_if_dirty(&self) -> SceneResult<CommitOutcome> {
        let entry = self.drafts.lock().active().cloned();
        let Some(entry) = entry else {
            return Ok(CommitOutcome::NoEdit);
        };
        self.autosave.cancel();

        let line_id = entry.line_id;
        let next = entry.draft.normalized();
        let changed = next != entry.committed;
        if !entry.needs_commit() {
            self.drafts.lock().close(line_id);
            return Ok(CommitOutcome::Unchanged);
        }

        let scene = self.view.lock().scene()?;
        if !scene.has_character(&next.character_name) {
            return Err(SceneError::invalid_character(format!(
                "'{}' is not in this scene",
                next.character_name
            )));
        }
        let before = scene
            .line(line_id)
            .cloned()
            .ok_or_else(|| SceneError::line_not_found(line_id))?;
        let mut write = OptimisticWrite::begin("line", before);
        self.view.lock().set_line_values(line_id, &next)?;

        let result = self.store.patch_line(self.scene_id, line_id, &next).await;
        write.settle(&result, |line| {
            let restored = self.view.lock().document().restore_line(&line);
            if let Err(e) = restored {
                warn!(line_id, error = %e, "could not restore line");
            }
        });

        match result {
            Ok(()) => {
                self.drafts.lock().settle_commit(line_id, &entry.draft, &next);
                if !changed {
                    return Ok(CommitOutcome::Unchanged);
                }
                self.engine.push(HistoryEntry::Line {
                    line_id,
                    old: entry.committed,
                    cur: next,
                });
                Ok(CommitOutcome::Committed)
            }
            Err(err) => {
                warn!(scene_id = self.scene_id, line_id, error = %err, "line commit failed");
                self.notices.error(format!("Could not save line: {}", err));
                Err(err)
            }
        }
    }

    // =========================================================================
    // SCENE FIELDS
    // =========================================================================

    /// Saves one scene field. Renaming a character also renames every line
    /// that character speaks. Returns false when the value did not change.
    pub async fn save_field(&self, field: SceneField, value: Option<String>) -> SceneResult<bool> {
        let value = value
            .map(|v| v.trim().to_string())
            .filter(|v| field.is_character_name() || !v.is_empty());
        let scene = self.view.lock().scene()?;
        if field.is_character_name() {
            scene.validate_character_name(field, value.as_deref().unwrap_or(""))?;
        }
        let old = scene.field(field);
        if old == value {
            return Ok(false);
        }

        let mut write = OptimisticWrite::begin("scene_field", old.clone());
        let renamed = self
            .view
            .lock()
            .document()
            .apply_field(field, value.clone(), old.as_deref())?;
        let rename = match (field.is_character_name(), &old, &value) {
            (true, Some(from), Some(to)) => Some((from.clone(), to.clone())),
            _ => None,
        };
        if let Some((from, to)) = &rename {
            self.drafts.lock().rename_character(from, to);
        }

        let patch = ScenePatch::single(field, value.clone());
        let result = self.store.patch_scene(self.scene_id, &patch).await;
        write.settle(&result, |previous| {
            let reverted = self
                .view
                .lock()
                .document()
                .apply_field(field, previous, value.as_deref());
            if let Err(e) = reverted {
                warn!(field = field.key(), error = %e, "could not revert field");
            }
            if let Some((from, to)) = &rename {
                self.drafts.lock().rename_character(to, from);
            }
        });

        match result {
            Ok(()) => {
                debug!(scene_id = self.scene_id, field = field.key(), renamed, "field saved");
                self.engine.push(HistoryEntry::SceneField {
                    field,
                    old,
                    cur: value,
                });
                Ok(true)
            }
            Err(err) => {
                warn!(scene_id = self.scene_id, field = field.key(), error = %err, "field save failed");
                self.notices.error(format!("Could not save {}: {}", field.key(), err));
                Err(err)
            }
        }
    }

    /// Renames the character currently called `from`.
    pub async fn rename_character(&self, from: &str, to: &str) -> SceneResult<bool> {
        let scene = self.view.lock().scene()?;
        let field = if scene.character_1_name == from {
            SceneField::Character1Name
        } else if scene.character_2_name == from {
            SceneField::Character2Name
        } else {
            return Err(SceneError::invalid_character(format!(
                "no character named '{}'",
                from
            )));
        };
        self.save_field(field, Some(to.to_string())).await
    }

    // =========================================================================
    // LINES
    // =========================================================================

    /// Creates a line after `insert_after` (first when `None`) and returns
    /// the ID the store assigned.
    pub async fn add_line(
        &self,
        insert_after: Option<i64>,
        values: LineValues,
    ) -> SceneResult<i64> {
        let values = values.normalized();
        let scene = self.view.lock().scene()?;
        if !scene.has_character(&values.character_name) {
            return Err(SceneError::invalid_character(format!(
                "'{}' is not in this scene",
                values.character_name
            )));
        }
        if let Some(after) = insert_after {
            scene.line(after).ok_or_else(|| SceneError::line_not_found(after))?;
        }

        let request = NewLine::new(&values, insert_after);
        let line_id = match self.store.create_line(self.scene_id, &request).await {
            Ok(id) => id,
            Err(err) => {
                warn!(scene_id = self.scene_id, error = %err, "line create failed");
                self.notices.error(format!("Could not add line: {}", err));
                return Err(err);
            }
        };

        let mut line = Line {
            id: line_id,
            ..Default::default()
        };
        line.set_values(&values);
        self.view.lock().document().insert_line_after(insert_after, line)?;
        self.engine.push(HistoryEntry::AddLine {
            line_id,
            line: values,
            insert_after_id: insert_after,
        });
        Ok(line_id)
    }

    /// Removes a line. An open draft on it is discarded.
    pub async fn delete_line(&self, line_id: i64) -> SceneResult<()> {
        if self.drafts.lock().active_line_id() == Some(line_id) {
            self.cancel_edit();
        }
        let removed = self
            .view
            .lock()
            .document()
            .remove_line(line_id)?
            .ok_or_else(|| SceneError::line_not_found(line_id))?;

        let mut write = OptimisticWrite::begin("delete_line", removed.clone());
        let result = self.store.delete_line(self.scene_id, line_id).await;
        write.settle(&result, |(line, after)| {
            let restored = self.view.lock().document().insert_line_after(after, line);
            if let Err(e) = restored {
                warn!(line_id, error = %e, "could not restore deleted line");
            }
        });

        match result {
            Ok(()) => {
                let (line, insert_after_id) = removed;
                self.engine.push(HistoryEntry::DeleteLine {
                    line,
                    insert_after_id,
                });
                Ok(())
            }
            Err(err) => {
                warn!(scene_id = self.scene_id, line_id, error = %err, "line delete failed");
                self.notices.error(format!("Could not delete line: {}", err));
                Err(err)
            }
        }
    }

    // =========================================================================
    // REORDER
    // =========================================================================

    pub fn begin_drag(&self) -> SceneResult<()> {
        let confirmed = self.view.lock().line_ids()?;
        self.reorder.lock().start(confirmed);
        Ok(())
    }

    /// Moves a line within the in-progress drag.
    pub fn drag_move(&self, from: usize, to: usize) -> bool {
        self.reorder.lock().move_item(from, to)
    }

    pub fn drag_over(&self, line_id: i64, over_id: i64) -> bool {
        self.reorder.lock().move_over(line_id, over_id)
    }

    pub fn cancel_drag(&self) {
        self.reorder.lock().cancel();
    }

    /// Line order to display: the drag order while dragging.
    pub fn display_order(&self) -> SceneResult<Vec<i64>> {
        let confirmed = self.view.lock().line_ids()?;
        Ok(self.reorder.lock().display_order(confirmed))
    }

    /// Ends the drag and saves the resulting order. Returns false when the
    /// order did not change (no store call is made).
    pub async fn end_drag(&self) -> SceneResult<bool> {
        let order = self.reorder.lock().finish();
        match order {
            Some(order) => self.reorder_lines(order).await,
            None => Ok(false),
        }
    }

    /// Saves a new line order.
    pub async fn reorder_lines(&self, order: Vec<i64>) -> SceneResult<bool> {
        let old_order = self.view.lock().line_ids()?;
        if order == old_order {
            debug!(scene_id = self.scene_id, "reorder: order unchanged");
            return Ok(false);
        }
        let mut sorted = order.clone();
        sorted.sort_unstable();
        let mut expected = old_order.clone();
        expected.sort_unstable();
        if sorted != expected {
            return Err(SceneError::schema_violation(
                "reorder must list every line exactly once",
            ));
        }

        let mut write = OptimisticWrite::begin("reorder", old_order.clone());
        self.view.lock().document().apply_order(&order)?;
        let result = self.store.reorder_lines(self.scene_id, &order).await;
        write.settle(&result, |previous| {
            let restored = self.view.lock().document().apply_order(&previous);
            if let Err(e) = restored {
                warn!(error = %e, "could not restore line order");
            }
        });

        match result {
            Ok(()) => {
                self.engine.push(HistoryEntry::Reorder {
                    old_order,
                    cur_order: order,
                });
                Ok(true)
            }
            Err(err) => {
                warn!(scene_id = self.scene_id, error = %err, "reorder failed");
                self.notices.error(format!("Could not reorder lines: {}", err));
                Err(err)
            }
        }
    }

    // =========================================================================
    // CLIENT-ONLY SETTINGS
    // =========================================================================

    /// Changes the voice assignment. Client-only; recorded in history.
    pub fn set_voices(&self, voices: VoiceMap) -> bool {
        let old = self.view.lock().set_voices(voices.clone());
        if old == voices {
            return false;
        }
        self.settings.save_voices(self.scene_id, &voices);
        self.engine.push(HistoryEntry::Voice { old, cur: voices });
        true
    }

    /// Picks the character the user rehearses. Client-only; recorded in history.
    pub fn set_selected_character(&self, character: Option<String>) -> SceneResult<bool> {
        if let Some(name) = character.as_deref() {
            if !self.view.lock().scene()?.has_character(name) {
                return Err(SceneError::invalid_character(format!(
                    "'{}' is not in this scene",
                    name
                )));
            }
        }
        let old = self.view.lock().set_selected_character(character.clone());
        if old == character {
            return Ok(false);
        }
        self.settings
            .save_selected_character(self.scene_id, character.as_deref());
        self.engine.push(HistoryEntry::SelectedCharacter {
            old,
            cur: character,
        });
        Ok(true)
    }

    pub fn rehearsal_settings(&self) -> RehearsalSettings {
        self.settings.load_rehearsal(self.scene_id)
    }

    pub fn save_rehearsal_settings(&self, settings: &RehearsalSettings) -> bool {
        self.settings.save_rehearsal(self.scene_id, settings)
    }

    // =========================================================================
    // HISTORY
    // =========================================================================

    /// Commits and closes any open draft, then undoes the latest entry.
    pub async fn undo(&self) -> SceneResult<ApplyOutcome> {
        self.close_draft().await?;
        self.engine.undo().await
    }

    pub async fn redo(&self) -> SceneResult<ApplyOutcome> {
        self.close_draft().await?;
        self.engine.redo().await
    }

    /// History replays only against saved line values, so no draft may stay
    /// open across one.
    async fn close_draft(&self) -> SceneResult<()> {
        self.commit_if_dirty().await?;
        if let Some(entry) = self.cancel_edit() {
            debug!(line_id = entry.line_id, "draft closed before history apply");
        }
        Ok(())
    }

    /// Runs undo/redo for a keyboard shortcut. Returns `None` when the key is
    /// not a history shortcut or focus is in a text input.
    pub async fn handle_shortcut(
        &self,
        input: KeyInput,
        focus: Focus,
    ) -> SceneResult<Option<ApplyOutcome>> {
        match Shortcut::resolve(input, focus) {
            Some(Shortcut::Undo) => self.undo().await.map(Some),
            Some(Shortcut::Redo) => self.redo().await.map(Some),
            None => Ok(None),
        }
    }

    /// Commits any open draft, then restores the scene's original content.
    /// Undoable. Returns [`ApplyOutcome::Nothing`] when the scene already
    /// matches its original.
    pub async fn reset_to_original(&self) -> SceneResult<ApplyOutcome> {
        self.close_draft().await?;
        self.engine.reset_to_original().await
    }

    // =========================================================================
    // EXIT
    // =========================================================================

    /// Sends any unsaved draft without waiting.
    pub fn flush(&self, reason: ExitReason) -> bool {
        self.flusher.flush(reason)
    }

    pub fn before_unload(&self) -> bool {
        self.flush(ExitReason::BeforeUnload)
    }

    pub fn navigate_back(&self) -> bool {
        self.flush(ExitReason::Navigation)
    }
}

impl Drop for SceneEditor {
    fn drop(&mut self) {
        self.flusher.flush(ExitReason::Teardown);
    }
}
