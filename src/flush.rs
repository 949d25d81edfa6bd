//! Last-chance delivery of the active draft when the editor goes away.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::autosave::AutosaveScheduler;
use crate::draft::SharedDrafts;
use crate::store::SceneStore;
use crate::view::SharedView;

/// Why the editor is flushing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The editor is being dropped.
    Teardown,
    /// The page or process is about to unload.
    BeforeUnload,
    /// Explicit back navigation.
    Navigation,
}

pub struct FlushCoordinator {
    scene_id: i64,
    store: Arc<dyn SceneStore>,
    view: SharedView,
    drafts: SharedDrafts,
    autosave: Arc<AutosaveScheduler>,
}

impl FlushCoordinator {
    pub fn new(
        scene_id: i64,
        store: Arc<dyn SceneStore>,
        view: SharedView,
        drafts: SharedDrafts,
        autosave: Arc<AutosaveScheduler>,
    ) -> Self {
        Self {
            scene_id,
            store,
            view,
            drafts,
            autosave,
        }
    }

    /// Sends the draft with a keepalive request if it holds anything the
    /// store has not seen. Never waits and never records history. The
    /// autosave marker moves before sending, so a second flush for the same
    /// values is a no-op. A draft naming a speaker outside the scene is not
    /// sent. Returns whether a request went out.
    pub fn flush(&self, reason: ExitReason) -> bool {
        self.autosave.cancel();

        let pending = self
            .drafts
            .lock()
            .active()
            .filter(|entry| entry.is_unsaved())
            .map(|entry| (entry.line_id, entry.draft.clone()));
        let Some((line_id, values)) = pending else {
            debug!(scene_id = self.scene_id, ?reason, "flush: nothing unsaved");
            return false;
        };
        let known = self
            .view
            .lock()
            .scene()
            .map(|scene| scene.has_character(&values.character_name))
            .unwrap_or(false);
        if !known {
            warn!(line_id, speaker = %values.character_name, "flush: speaker not in scene");
            return false;
        }
        self.drafts.lock().mark_autosaved(line_id, &values);

        if let Err(e) = self.view.lock().set_line_values(line_id, &values) {
            debug!(line_id, error = %e, "flush: line not in view");
        }
        info!(scene_id = self.scene_id, line_id, ?reason, "flushing unsaved draft");
        self.store.send_line_keepalive(self.scene_id, line_id, values);
        true
    }
}
