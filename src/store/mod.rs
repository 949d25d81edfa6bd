//! Remote scene store interface.
//!
//! The REST service holding scenes and lines is an external collaborator;
//! the engine only talks to it through [`SceneStore`].

#[cfg(feature = "http")]
pub mod http;

use async_trait::async_trait;

use crate::error::SceneResult;
use crate::scene::{LineValues, NewLine, Scene, ScenePatch};

#[cfg(feature = "http")]
pub use http::HttpSceneStore;

/// Operations the editor issues against the remote scene store.
#[async_trait]
pub trait SceneStore: Send + Sync {
    /// GET /scenes/{id}
    async fn fetch_scene(&self, scene_id: i64) -> SceneResult<Scene>;

    /// PATCH /scenes/{id}
    async fn patch_scene(&self, scene_id: i64, patch: &ScenePatch) -> SceneResult<()>;

    /// PATCH /scenes/{id}/lines/{lineId}
    async fn patch_line(&self, scene_id: i64, line_id: i64, values: &LineValues)
        -> SceneResult<()>;

    /// POST /scenes/{id}/lines - returns the new line ID.
    async fn create_line(&self, scene_id: i64, line: &NewLine) -> SceneResult<i64>;

    /// DELETE /scenes/{id}/lines/{lineId}
    async fn delete_line(&self, scene_id: i64, line_id: i64) -> SceneResult<()>;

    /// PATCH /scenes/{id}/lines/reorder
    async fn reorder_lines(&self, scene_id: i64, line_ids: &[i64]) -> SceneResult<()>;

    /// POST /scenes/{id}/reset-to-original - `None` when the server keeps no original.
    async fn reset_to_original(&self, scene_id: i64) -> SceneResult<Option<Scene>>;

    /// Line patch that must outlive the caller (page unload). Fire and forget:
    /// returns immediately and never reports the outcome.
    fn send_line_keepalive(&self, scene_id: i64, line_id: i64, values: LineValues);
}
