//! Debounced autosave of the line being edited.
//!
//! Each keystroke that leaves the draft different from the last autosaved
//! values re-arms a single timer. When the timer fires, the write runs as its
//! own task, so cancelling or re-arming the timer never drops a write that
//! is already on the wire. Autosaves never touch history.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::draft::SharedDrafts;
use crate::error::SceneResult;
use crate::notice::NoticeBoard;
use crate::scene::LineValues;
use crate::store::SceneStore;
use crate::view::SharedView;

/// Everything a fired timer needs, cloned into the spawned tasks.
#[derive(Clone)]
struct AutosaveTask {
    scene_id: i64,
    store: Arc<dyn SceneStore>,
    view: SharedView,
    drafts: SharedDrafts,
    notices: NoticeBoard,
}

impl AutosaveTask {
    /// Called when the debounce delay elapses for `line_id`.
    fn fire(&self, line_id: i64) {
        let values = {
            let drafts = self.drafts.lock();
            match drafts.active() {
                Some(entry) if entry.line_id == line_id && entry.is_unsaved() => {
                    entry.draft.clone()
                }
                _ => {
                    debug!(line_id, "autosave skipped, nothing unsaved");
                    return;
                }
            }
        };
        if !self.speaker_known(&values) {
            warn!(
                line_id,
                speaker = %values.character_name,
                "autosave skipped, speaker not in scene"
            );
            self.notices.error(format!(
                "Not saved: '{}' is not in this scene",
                values.character_name
            ));
            return;
        }
        let task = self.clone();
        tokio::spawn(async move { task.write(line_id, values).await });
    }

    fn speaker_known(&self, values: &LineValues) -> bool {
        match self.view.lock().scene() {
            Ok(scene) => scene.has_character(&values.character_name),
            Err(e) => {
                warn!(error = %e, "could not read scene");
                false
            }
        }
    }

    async fn write(&self, line_id: i64, values: LineValues) {
        match self.store.patch_line(self.scene_id, line_id, &values).await {
            Ok(()) => {
                self.drafts.lock().mark_autosaved(line_id, &values);
                let applied = self.view.lock().set_line_values(line_id, &values);
                if let Err(e) = applied {
                    warn!(line_id, error = %e, "autosaved line missing from view");
                }
                debug!(scene_id = self.scene_id, line_id, "line autosaved");
            }
            Err(e) => {
                warn!(scene_id = self.scene_id, line_id, error = %e, "autosave failed");
                self.notices.error(format!("Autosave failed: {}", e));
            }
        }
    }
}

pub struct AutosaveScheduler {
    task: AutosaveTask,
    delay: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl AutosaveScheduler {
    pub fn new(
        scene_id: i64,
        store: Arc<dyn SceneStore>,
        view: SharedView,
        drafts: SharedDrafts,
        notices: NoticeBoard,
        delay: Duration,
    ) -> Self {
        Self {
            task: AutosaveTask {
                scene_id,
                store,
                view,
                drafts,
                notices,
            },
            delay,
            timer: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Records a keystroke on the active draft. Re-arms the timer when the
    /// draft differs from the autosave marker and cancels it when it does not.
    /// Returns whether a save is now scheduled.
    pub fn on_input(&self, values: LineValues) -> SceneResult<bool> {
        let (line_id, unsaved) = {
            let mut drafts = self.task.drafts.lock();
            let unsaved = drafts.update(values)?;
            (drafts.active_line_id(), unsaved)
        };
        match line_id {
            Some(line_id) if unsaved => Ok(self.arm(line_id)),
            _ => {
                self.cancel();
                Ok(false)
            }
        }
    }

    fn arm(&self, line_id: i64) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            warn!(line_id, "no runtime, autosave not scheduled");
            return false;
        };
        let task = self.task.clone();
        let delay = self.delay;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task.fire(line_id);
        });
        if let Some(previous) = self.timer.lock().replace(handle) {
            previous.abort();
        }
        true
    }

    /// Stops a pending timer. Writes already started keep going.
    pub fn cancel(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }
    }

    /// A timer is waiting to fire.
    pub fn is_armed(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
