//! In-memory scene store that records every call.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use heyoscene::{
    EditorConfig, Line, LineValues, MemoryStorage, NewLine, Scene, SceneEditor, SceneError,
    SceneResult, ScenePatch, SceneStore,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Fetch,
    PatchScene(ScenePatch),
    PatchLine(i64, LineValues),
    CreateLine(NewLine),
    DeleteLine(i64),
    Reorder(Vec<i64>),
    Reset,
    Keepalive(i64, LineValues),
}

impl Call {
    pub fn is_fetch(&self) -> bool {
        matches!(self, Call::Fetch)
    }
}

/// Behaves like the remote service: keeps its own copy of the scene, assigns
/// fresh line IDs, answers 404 for unknown lines and cascades character
/// renames to lines.
pub struct RecordingStore {
    scene: Mutex<Scene>,
    original: Mutex<Option<Scene>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<&'static str, u16>>,
    latency: Mutex<Option<Duration>>,
    next_id: AtomicI64,
}

impl RecordingStore {
    pub fn new(scene: Scene) -> Arc<Self> {
        let next = scene.lines.iter().map(|l| l.id).max().unwrap_or(0) + 100;
        Arc::new(Self {
            scene: Mutex::new(scene),
            original: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            latency: Mutex::new(None),
            next_id: AtomicI64::new(next),
        })
    }

    /// Gives the store a server-side original for reset-to-original.
    pub fn with_original(self: Arc<Self>, scene: Scene) -> Arc<Self> {
        *self.original.lock() = Some(scene);
        self
    }

    /// Makes every call to `op` fail with `status` until cleared.
    pub fn fail(&self, op: &'static str, status: u16) {
        self.failures.lock().insert(op, status);
    }

    /// Delays every async call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Calls other than scene fetches.
    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| !c.is_fetch()).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn server_scene(&self) -> Scene {
        self.scene.lock().clone()
    }

    /// Changes the server copy behind the editor's back.
    pub fn mutate_server(&self, f: impl FnOnce(&mut Scene)) {
        f(&mut self.scene.lock());
    }

    async fn respond(&self, op: &'static str, call: Call) -> SceneResult<()> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.record(op, call)
    }

    fn record(&self, op: &'static str, call: Call) -> SceneResult<()> {
        self.calls.lock().push(call);
        match self.failures.lock().get(op) {
            Some(status) => Err(SceneError::api(*status, format!("{} rejected", op))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SceneStore for RecordingStore {
    async fn fetch_scene(&self, _scene_id: i64) -> SceneResult<Scene> {
        self.respond("fetch", Call::Fetch).await?;
        Ok(self.server_scene())
    }

    async fn patch_scene(&self, _scene_id: i64, patch: &ScenePatch) -> SceneResult<()> {
        self.respond("patch_scene", Call::PatchScene(patch.clone())).await?;
        let mut scene = self.scene.lock();
        for (field, value) in patch.iter() {
            let previous = scene.field(field);
            scene.apply_field(field, value.clone(), previous.as_deref());
        }
        Ok(())
    }

    async fn patch_line(
        &self,
        _scene_id: i64,
        line_id: i64,
        values: &LineValues,
    ) -> SceneResult<()> {
        self.respond("patch_line", Call::PatchLine(line_id, values.clone())).await?;
        let mut scene = self.scene.lock();
        let line = scene
            .line_mut(line_id)
            .ok_or_else(|| SceneError::api(404, "line not found"))?;
        line.set_values(values);
        Ok(())
    }

    async fn create_line(&self, _scene_id: i64, line: &NewLine) -> SceneResult<i64> {
        self.respond("create_line", Call::CreateLine(line.clone())).await?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut created = Line::new(id, line.character_name.clone(), line.text.clone());
        created.stage_direction = line.stage_direction.clone();
        self.scene
            .lock()
            .insert_line_after(line.insert_after_line_id, created);
        Ok(id)
    }

    async fn delete_line(&self, _scene_id: i64, line_id: i64) -> SceneResult<()> {
        self.respond("delete_line", Call::DeleteLine(line_id)).await?;
        self.scene
            .lock()
            .remove_line(line_id)
            .map(|_| ())
            .ok_or_else(|| SceneError::api(404, "line not found"))
    }

    async fn reorder_lines(&self, _scene_id: i64, line_ids: &[i64]) -> SceneResult<()> {
        self.respond("reorder", Call::Reorder(line_ids.to_vec())).await?;
        self.scene.lock().apply_order(line_ids);
        Ok(())
    }

    async fn reset_to_original(&self, _scene_id: i64) -> SceneResult<Option<Scene>> {
        self.respond("reset", Call::Reset).await?;
        let original = self.original.lock().clone();
        if let Some(scene) = &original {
            *self.scene.lock() = scene.clone();
        }
        Ok(original)
    }

    fn send_line_keepalive(&self, _scene_id: i64, line_id: i64, values: LineValues) {
        self.calls.lock().push(Call::Keepalive(line_id, values.clone()));
        if let Some(line) = self.scene.lock().line_mut(line_id) {
            line.set_values(&values);
        }
    }
}

/// Scene 1 with SAM and ALEX alternating over `count` lines, IDs 1..=count.
pub fn sample_scene(count: i64) -> Scene {
    let mut scene = Scene::new(1, "SAM", "ALEX").with_title("Kitchen");
    for id in 1..=count {
        let speaker = if id % 2 == 1 { "SAM" } else { "ALEX" };
        scene = scene.with_line(Line::new(id, speaker, format!("Line {}", id)));
    }
    scene
}

pub fn config() -> EditorConfig {
    EditorConfig::new()
}

/// Opens an editor on `scene` with fresh session storage.
pub fn open_editor(scene: Scene) -> (Arc<RecordingStore>, SceneEditor) {
    let store = RecordingStore::new(scene.clone());
    let editor = open_with(store.clone(), scene, Arc::new(MemoryStorage::new()));
    (store, editor)
}

pub fn open_with(
    store: Arc<RecordingStore>,
    scene: Scene,
    storage: Arc<MemoryStorage>,
) -> SceneEditor {
    SceneEditor::with_scene(store, scene, storage, &config()).unwrap()
}

pub fn texts(scene: &Scene) -> Vec<String> {
    scene.lines.iter().map(|l| l.text.clone()).collect()
}
