//! HTTP client for the remote scene store.

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::SceneStore;
use crate::error::{SceneError, SceneResult};
use crate::scene::{LineValues, NewLine, Scene, ScenePatch};

/// Create line response
#[derive(Debug, Deserialize)]
struct CreatedLine {
    id: i64,
}

/// Reorder request body
#[derive(Debug, Serialize)]
struct ReorderBody<'a> {
    line_ids: &'a [i64],
}

/// API client for scene operations
#[derive(Clone)]
pub struct HttpSceneStore {
    client: Client,
    base_url: String,
}

impl HttpSceneStore {
    /// Create a new client with the given base URL and optional auth token
    pub fn new(base_url: &str, token: Option<&str>) -> SceneResult<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| SceneError::transport(format!("invalid auth token: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn scene_url(&self, scene_id: i64) -> String {
        format!("{}/scenes/{}", self.base_url, scene_id)
    }

    fn line_url(&self, scene_id: i64, line_id: i64) -> String {
        format!("{}/scenes/{}/lines/{}", self.base_url, scene_id, line_id)
    }

    /// Turns a non-success response into `SceneError::Api`.
    async fn check(resp: Response) -> SceneResult<Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let message = resp.text().await.unwrap_or_default();
        Err(SceneError::api(status, message))
    }
}

#[async_trait]
impl SceneStore for HttpSceneStore {
    /// GET /scenes/{id}
    async fn fetch_scene(&self, scene_id: i64) -> SceneResult<Scene> {
        let resp = self.client.get(self.scene_url(scene_id)).send().await?;
        let mut scene: Scene = Self::check(resp).await?.json().await?;
        scene.sort_lines();
        Ok(scene)
    }

    /// PATCH /scenes/{id}
    async fn patch_scene(&self, scene_id: i64, patch: &ScenePatch) -> SceneResult<()> {
        let resp = self
            .client
            .patch(self.scene_url(scene_id))
            .json(patch)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// PATCH /scenes/{id}/lines/{lineId}
    async fn patch_line(
        &self,
        scene_id: i64,
        line_id: i64,
        values: &LineValues,
    ) -> SceneResult<()> {
        let resp = self
            .client
            .patch(self.line_url(scene_id, line_id))
            .json(values)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// POST /scenes/{id}/lines
    async fn create_line(&self, scene_id: i64, line: &NewLine) -> SceneResult<i64> {
        let url = format!("{}/lines", self.scene_url(scene_id));
        let resp = self.client.post(url).json(line).send().await?;
        let created: CreatedLine = Self::check(resp).await?.json().await?;
        Ok(created.id)
    }

    /// DELETE /scenes/{id}/lines/{lineId}
    async fn delete_line(&self, scene_id: i64, line_id: i64) -> SceneResult<()> {
        let resp = self
            .client
            .delete(self.line_url(scene_id, line_id))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// PATCH /scenes/{id}/lines/reorder
    async fn reorder_lines(&self, scene_id: i64, line_ids: &[i64]) -> SceneResult<()> {
        let url = format!("{}/lines/reorder", self.scene_url(scene_id));
        let resp = self
            .client
            .patch(url)
            .json(&ReorderBody { line_ids })
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// POST /scenes/{id}/reset-to-original
    async fn reset_to_original(&self, scene_id: i64) -> SceneResult<Option<Scene>> {
        let url = format!("{}/reset-to-original", self.scene_url(scene_id));
        let resp = self.client.post(url).send().await?;
        if matches!(resp.status(), StatusCode::NOT_FOUND | StatusCode::CONFLICT) {
            debug!(scene_id, "no server-side original snapshot");
            return Ok(None);
        }
        let mut scene: Scene = Self::check(resp).await?.json().await?;
        scene.sort_lines();
        Ok(Some(scene))
    }

    fn send_line_keepalive(&self, scene_id: i64, line_id: i64, values: LineValues) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(scene_id, line_id, "no runtime to deliver keepalive patch");
            return;
        };
        let request = self.client.patch(self.line_url(scene_id, line_id)).json(&values);
        runtime.spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(scene_id, line_id, "keepalive patch delivered")
                }
                Ok(resp) => warn!(scene_id, line_id, status = %resp.status(), "keepalive patch rejected"),
                Err(e) => warn!(scene_id, line_id, error = %e, "keepalive patch failed"),
            }
        });
    }
}
