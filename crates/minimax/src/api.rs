//! REST client for the MiniMax video-generation endpoints.
//!
//! Wraps task creation, status query, file retrieval and the artifact
//! download using [`reqwest`], and implements [`RemoteJobClient`] on top.

use std::path::Path;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use framecast_core::remote::{RemoteError, RemoteJobClient, RemoteStatus};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use crate::error::MiniMaxError;
use crate::responses::{decode_create, decode_query, decode_retrieve};

/// Default MiniMax API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.minimaxi.chat/v1";

/// Default image-to-video model.
pub const DEFAULT_MODEL: &str = "I2V-01-Director";

/// HTTP client for the MiniMax API.
pub struct MiniMaxApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MiniMaxApi {
    /// Create a client for `base_url` (e.g. [`DEFAULT_BASE_URL`]).
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_key, base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a video generation task from a first-frame image.
    ///
    /// Sends `POST /video_generation` with the base64-encoded image and
    /// returns the remote `task_id`.
    pub async fn create_video_task(
        &self,
        image: &Path,
        prompt: &str,
        model: &str,
    ) -> Result<String, MiniMaxError> {
        let bytes = tokio::fs::read(image).await?;
        let body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "first_frame_image": BASE64.encode(bytes),
        });

        let response = self
            .client
            .post(format!("{}/video_generation", self.base_url))
            .header(AUTHORIZATION, self.bearer())
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let task_id = decode_create(&Self::text(response).await?)?;
        tracing::debug!(task_id = %task_id, image = %image.display(), model, "MiniMax task created");
        Ok(task_id)
    }

    /// Query the status of a generation task.
    ///
    /// Sends `GET /query/video_generation?task_id=..`.
    pub async fn query_task_status(&self, task_id: &str) -> Result<RemoteStatus, MiniMaxError> {
        let response = self
            .client
            .get(format!("{}/query/video_generation", self.base_url))
            .query(&[("task_id", task_id)])
            .header(AUTHORIZATION, self.bearer())
            .send()
            .await?;

        decode_query(&Self::text(response).await?)
    }

    /// Look up the download URL of a generated file.
    ///
    /// Sends `GET /files/retrieve?file_id=..`.
    pub async fn retrieve_file(&self, file_id: &str) -> Result<String, MiniMaxError> {
        let response = self
            .client
            .get(format!("{}/files/retrieve", self.base_url))
            .query(&[("file_id", file_id)])
            .header(AUTHORIZATION, self.bearer())
            .send()
            .await?;

        decode_retrieve(&Self::text(response).await?)
    }

    /// Download `url` to `destination`, creating parent directories.
    ///
    /// The download URL is pre-signed, so no auth header is sent.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64, MiniMaxError> {
        let response = Self::ensure_success(self.client.get(url).send().await?).await?;
        let bytes = response.bytes().await?;

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, &bytes).await?;

        tracing::debug!(
            destination = %destination.display(),
            bytes = bytes.len(),
            "Video downloaded",
        );
        Ok(bytes.len() as u64)
    }

    // ---- private helpers ----

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`MiniMaxError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, MiniMaxError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(MiniMaxError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Read the body of a successful response as text.
    async fn text(response: reqwest::Response) -> Result<String, MiniMaxError> {
        Ok(Self::ensure_success(response).await?.text().await?)
    }
}

#[async_trait]
impl RemoteJobClient for MiniMaxApi {
    async fn submit(&self, image: &Path, prompt: &str, model: &str) -> Result<String, RemoteError> {
        Ok(self.create_video_task(image, prompt, model).await?)
    }

    async fn poll(&self, remote_job_id: &str) -> Result<RemoteStatus, RemoteError> {
        Ok(self.query_task_status(remote_job_id).await?)
    }

    async fn resolve(&self, artifact_ref: &str) -> Result<String, RemoteError> {
        Ok(self.retrieve_file(artifact_ref).await?)
    }

    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, RemoteError> {
        Ok(self.download(url, destination).await?)
    }
}
