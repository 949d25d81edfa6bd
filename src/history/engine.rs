//! History engine: replays entries against the view and the remote store.
//!
//! Every apply mutates the shared view first and only then awaits the store.
//! Remote failures never roll the stacks back; the engine re-fetches the
//! canonical scene and posts a notice instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::entry::{Direction, HistoryEntry};
use super::stack::HistoryHandle;
use crate::error::SceneResult;
use crate::notice::NoticeBoard;
use crate::scene::{Line, LineValues, NewLine, Scene, ScenePatch};
use crate::storage::ClientSettingsStore;
use crate::store::SceneStore;
use crate::view::SharedView;

/// What an undo/redo/apply ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Applied locally and confirmed remotely (or client-only).
    Applied,
    /// The stack was empty, or a reset found nothing to change.
    Nothing,
    /// Another apply was in flight; nothing happened.
    Busy,
    /// Applied locally, the store rejected it, canonical state re-fetched.
    Resynced,
    /// The entry's line no longer exists remotely; entry removed, state re-fetched.
    Dropped,
    /// A reset replay where some remote writes failed.
    Partial { failed: usize },
}

/// Single-flight guard over the engine's `applying` flag.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct HistoryEngine {
    scene_id: i64,
    store: Arc<dyn SceneStore>,
    view: SharedView,
    history: Arc<HistoryHandle>,
    settings: ClientSettingsStore,
    notices: NoticeBoard,
    /// Scene as it was when the session opened; replayed when the server
    /// keeps no original of its own.
    original: Mutex<Scene>,
    applying: AtomicBool,
}

impl HistoryEngine {
    pub fn new(
        store: Arc<dyn SceneStore>,
        view: SharedView,
        history: Arc<HistoryHandle>,
        settings: ClientSettingsStore,
        notices: NoticeBoard,
        original: Scene,
    ) -> Self {
        Self {
            scene_id: history.scene_id(),
            store,
            view,
            history,
            settings,
            notices,
            original: Mutex::new(original),
            applying: AtomicBool::new(false),
        }
    }

    pub fn history(&self) -> &HistoryHandle {
        &self.history
    }

    /// True while an undo/redo/reset is awaiting the store.
    pub fn is_applying(&self) -> bool {
        self.applying.load(Ordering::Acquire)
    }

    /// Records a change the caller already applied to the view.
    pub fn push(&self, entry: HistoryEntry) -> Uuid {
        self.history.push(entry)
    }

    pub async fn undo(&self) -> SceneResult<ApplyOutcome> {
        self.step(Direction::Old).await
    }

    pub async fn redo(&self) -> SceneResult<ApplyOutcome> {
        self.step(Direction::Cur).await
    }

    async fn step(&self, direction: Direction) -> SceneResult<ApplyOutcome> {
        let Some(_guard) = FlightGuard::acquire(&self.applying) else {
            debug!(scene_id = self.scene_id, ?direction, "history apply already in flight");
            return Ok(ApplyOutcome::Busy);
        };
        let record = match direction {
            Direction::Old => self.history.take_undo(),
            Direction::Cur => self.history.take_redo(),
        };
        let Some(record) = record else {
            return Ok(ApplyOutcome::Nothing);
        };
        debug!(
            scene_id = self.scene_id,
            kind = record.entry.kind(),
            ?direction,
            "applying history entry"
        );
        self.apply(record.key, record.entry, direction).await
    }

    /// Applies one side of `entry`. `key` addresses the record in the stacks
    /// so new line IDs can be written back into it.
    pub async fn apply(
        &self,
        key: Uuid,
        entry: HistoryEntry,
        direction: Direction,
    ) -> SceneResult<ApplyOutcome> {
        let droppable = entry.targets_line();
        match entry {
            HistoryEntry::SceneField { field, old, cur } => {
                let (target, other) = direction.pick(old, cur);
                self.view
                    .lock()
                    .document()
                    .apply_field(field, target.clone(), other.as_deref())?;
                let patch = ScenePatch::single(field, target);
                let result = self.store.patch_scene(self.scene_id, &patch).await;
                self.settle(key, droppable, result).await
            }
            HistoryEntry::Line { line_id, old, cur } => {
                let (target, _) = direction.pick(old, cur);
                let local = self.view.lock().set_line_values(line_id, &target);
                if let Err(err) = local {
                    if !err.is_not_found() {
                        return Err(err);
                    }
                    return self.settle(key, droppable, Err(err)).await;
                }
                let result = self.store.patch_line(self.scene_id, line_id, &target).await;
                self.settle(key, droppable, result).await
            }
            HistoryEntry::Reorder {
                old_order,
                cur_order,
            } => {
                let (target, _) = direction.pick(old_order, cur_order);
                self.view.lock().document().apply_order(&target)?;
                let result = self.store.reorder_lines(self.scene_id, &target).await;
                self.settle(key, droppable, result).await
            }
            HistoryEntry::Reset {
                old_scene,
                cur_scene,
            } => {
                let (target, _) = direction.pick(old_scene, cur_scene);
                let failed = self.reset_to(*target).await?;
                Ok(partial(failed))
            }
            HistoryEntry::AddLine {
                line_id,
                line,
                insert_after_id,
            } => match direction {
                Direction::Old => self.delete_line(key, line_id).await,
                Direction::Cur => self.recreate_line(key, line_id, line, insert_after_id).await,
            },
            HistoryEntry::DeleteLine {
                line,
                insert_after_id,
            } => match direction {
                Direction::Old => {
                    self.recreate_line(key, line.id, line.values(), insert_after_id)
                        .await
                }
                Direction::Cur => self.delete_line(key, line.id).await,
            },
            HistoryEntry::Voice { old, cur } => {
                let (target, _) = direction.pick(old, cur);
                self.settings.save_voices(self.scene_id, &target);
                self.view.lock().set_voices(target);
                Ok(ApplyOutcome::Applied)
            }
            HistoryEntry::SelectedCharacter { old, cur } => {
                let (target, _) = direction.pick(old, cur);
                self.settings
                    .save_selected_character(self.scene_id, target.as_deref());
                self.view.lock().set_selected_character(target);
                Ok(ApplyOutcome::Applied)
            }
        }
    }

    // =========================================================================
    // LINE IDENTITY
    // =========================================================================

    async fn delete_line(&self, key: Uuid, line_id: i64) -> SceneResult<ApplyOutcome> {
        if self.view.lock().document().remove_line(line_id)?.is_none() {
            debug!(line_id, "line already gone locally");
        }
        let result = self.store.delete_line(self.scene_id, line_id).await;
        self.settle(key, true, result).await
    }

    /// Re-creates a line under a provisional ID, then swaps in the ID the
    /// store assigned and rewrites every history reference to `old_id`.
    async fn recreate_line(
        &self,
        key: Uuid,
        old_id: i64,
        values: LineValues,
        insert_after: Option<i64>,
    ) -> SceneResult<ApplyOutcome> {
        let provisional = {
            let mut view = self.view.lock();
            let id = view.provisional_line_id();
            let mut line = Line {
                id,
                ..Default::default()
            };
            line.set_values(&values);
            view.document().insert_line_after(insert_after, line)?;
            id
        };

        let request = NewLine::new(&values, insert_after);
        match self.store.create_line(self.scene_id, &request).await {
            Ok(new_id) => {
                self.view
                    .lock()
                    .document()
                    .reassign_line_id(provisional, new_id)?;
                self.adopt_line_id(old_id, new_id);
                Ok(ApplyOutcome::Applied)
            }
            Err(err) => {
                self.view.lock().document().remove_line(provisional)?;
                self.settle(key, true, Err(err)).await
            }
        }
    }

    /// Points history and the session original at a line's new remote ID.
    pub fn adopt_line_id(&self, old_id: i64, new_id: i64) {
        let remapped = self.history.remap_line_id(old_id, new_id);
        self.original.lock().reassign_line_id(old_id, new_id);
        info!(
            scene_id = self.scene_id,
            old_id, new_id, remapped, "line re-created under new id"
        );
    }

    // =========================================================================
    // RESET
    // =========================================================================

    /// Restores the scene's original content: the server's snapshot when it
    /// has one, otherwise the scene as it was when this session opened.
    pub async fn reset_to_original(&self) -> SceneResult<ApplyOutcome> {
        let Some(_guard) = FlightGuard::acquire(&self.applying) else {
            return Ok(ApplyOutcome::Busy);
        };
        let before = self.view.lock().scene()?;

        let failed = match self.store.reset_to_original(self.scene_id).await {
            Ok(Some(scene)) => {
                self.view.lock().document().replace(scene)?;
                0
            }
            Ok(None) => {
                let original = self.original.lock().clone();
                self.reset_to(original).await?
            }
            Err(err) => {
                warn!(scene_id = self.scene_id, error = %err, "reset to original failed");
                self.notices.error(format!("Could not reset scene: {}", err));
                return Err(err);
            }
        };

        let after = self.view.lock().scene()?;
        if after == before {
            debug!(scene_id = self.scene_id, "reset: scene already matches its original");
            self.notices.info("Scene already matches its original");
            return Ok(ApplyOutcome::Nothing);
        }
        self.push(HistoryEntry::Reset {
            old_scene: Box::new(before),
            cur_scene: Box::new(after),
        });
        self.notices.info("Scene reset to original");
        Ok(partial(failed))
    }

    /// Replaces the view with `target`, then replays field and line
    /// differences to the store one call at a time. Not atomic: failures are
    /// logged and counted, and the remaining writes still go out.
    async fn reset_to(&self, target: Scene) -> SceneResult<usize> {
        let before = self.view.lock().document().replace(target.clone())?;
        let mut failed = 0;

        let patch = target.field_changes(&before);
        if !patch.is_empty() {
            if let Err(e) = self.store.patch_scene(self.scene_id, &patch).await {
                warn!(scene_id = self.scene_id, error = %e, "reset: field patch failed");
                failed += 1;
            }
        }

        for line in before.lines.iter().filter(|l| target.line(l.id).is_none()) {
            if let Err(e) = self.store.delete_line(self.scene_id, line.id).await {
                if !e.is_not_found() {
                    warn!(line_id = line.id, error = %e, "reset: delete failed");
                    failed += 1;
                }
            }
        }

        let mut created = false;
        let mut previous: Option<i64> = None;
        for line in &target.lines {
            let values = line.values();
            let id = match before.line(line.id) {
                Some(existing) => {
                    if existing.values() != values {
                        if let Err(e) = self.store.patch_line(self.scene_id, line.id, &values).await
                        {
                            warn!(line_id = line.id, error = %e, "reset: line patch failed");
                            failed += 1;
                        }
                    }
                    line.id
                }
                None => {
                    let request = NewLine::new(&values, previous);
                    match self.store.create_line(self.scene_id, &request).await {
                        Ok(new_id) => {
                            self.view
                                .lock()
                                .document()
                                .reassign_line_id(line.id, new_id)?;
                            self.adopt_line_id(line.id, new_id);
                            created = true;
                            new_id
                        }
                        Err(e) => {
                            warn!(line_id = line.id, error = %e, "reset: create failed");
                            failed += 1;
                            line.id
                        }
                    }
                }
            };
            previous = Some(id);
        }

        let order = self.view.lock().line_ids()?;
        let surviving: Vec<i64> = before
            .line_ids()
            .into_iter()
            .filter(|id| order.contains(id))
            .collect();
        if created || surviving != order {
            if let Err(e) = self.store.reorder_lines(self.scene_id, &order).await {
                warn!(scene_id = self.scene_id, error = %e, "reset: reorder failed");
                failed += 1;
            }
        }

        if failed > 0 {
            self.notices
                .error(format!("Reset partly failed: {} change(s) not saved", failed));
        }
        Ok(failed)
    }

    // =========================================================================
    // FAILURE HANDLING
    // =========================================================================

    /// Maps a remote result to an outcome. On failure: drop the entry if its
    /// line is gone (`droppable`), notify, and re-fetch canonical state.
    async fn settle(
        &self,
        key: Uuid,
        droppable: bool,
        result: SceneResult<()>,
    ) -> SceneResult<ApplyOutcome> {
        let Err(err) = result else {
            return Ok(ApplyOutcome::Applied);
        };
        let dropped = droppable && err.is_not_found();
        if dropped {
            if let Some(entry) = self.history.remove(key) {
                warn!(kind = entry.kind(), "dropping history entry whose line is gone");
            }
        }
        warn!(scene_id = self.scene_id, error = %err, "remote replay failed");
        self.notices.error(format!("Could not sync change: {}", err));
        self.resync().await;
        Ok(if dropped {
            ApplyOutcome::Dropped
        } else {
            ApplyOutcome::Resynced
        })
    }

    /// Replaces the view with the store's canonical scene.
    pub async fn resync(&self) -> bool {
        match self.store.fetch_scene(self.scene_id).await {
            Ok(scene) => {
                let replaced = self.view.lock().document().replace(scene);
                match replaced {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(scene_id = self.scene_id, error = %e, "could not apply canonical scene");
                        false
                    }
                }
            }
            Err(e) => {
                warn!(scene_id = self.scene_id, error = %e, "could not re-fetch scene");
                self.notices.error("Could not reload the scene");
                false
            }
        }
    }
}

fn partial(failed: usize) -> ApplyOutcome {
    if failed == 0 {
        ApplyOutcome::Applied
    } else {
        ApplyOutcome::Partial { failed }
    }
}
