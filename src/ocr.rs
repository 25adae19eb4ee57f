//! Client for the OCR / recomposition service
//!
//! The service extracts text segments from an image, accepts translated
//! segments back, and renders a translated image. It is a separate HTTP
//! service; this module only speaks its three endpoints.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PapagoError, PapagoResult};

/// Status the service reports once a rendering task is ready
pub const STATUS_SUCCESSFUL: &str = "successful";

/// One text region found in the image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Source text
    pub s: String,
    /// Translated text, filled in before posting back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What `/manual-translate` returns and `/post-translation-result` expects back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrPayload {
    pub trans_result: Vec<Segment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OcrPayload {
    pub fn source_texts(&self) -> Vec<&str> {
        self.trans_result.iter().map(|seg| seg.s.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostResult {
    pub status: String,
    #[serde(default)]
    pub task_id: Option<String>,
}

impl PostResult {
    /// The task id, when the service accepted the translation
    pub fn ready_task(&self) -> Option<&str> {
        if self.status == STATUS_SUCCESSFUL {
            self.task_id.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrClient {
    http: reqwest::Client,
    base_url: String,
}

impl OcrClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Service URL for an account: `https://mts-{name}.loca.lt`, where
    /// `name` is the local part of a gmail address or the whole identifier.
    pub fn for_account(account: &str) -> PapagoResult<Self> {
        let account = account.trim();
        let name = account.split_once('@').map_or(account, |(local, _)| local);
        if name.is_empty() {
            return Err(PapagoError::Config(format!(
                "cannot derive an OCR service name from '{}'",
                account
            )));
        }
        Ok(Self::new(&format!("https://mts-{}.loca.lt", name)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        endpoint: &str,
        response: reqwest::Response,
    ) -> PapagoResult<T> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PapagoError::Ocr(format!(
                "{} returned {}: {}",
                endpoint, status, body
            )));
        }
        serde_json::from_str(&body)
            .map_err(|e| PapagoError::Ocr(format!("{} returned unexpected JSON ({}): {}", endpoint, e, body)))
    }

    /// Upload an image and get its text segments
    pub async fn manual_translate(&self, image: &Path) -> PapagoResult<OcrPayload> {
        let bytes = tokio::fs::read(image).await?;
        let file_name = image
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        debug!("Uploading {} ({} bytes) for OCR", image.display(), bytes.len());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(format!("{}/manual-translate", self.base_url))
            .multipart(form)
            .send()
            .await?;
        Self::read_json("/manual-translate", response).await
    }

    /// Hand the translated segments back for rendering
    pub async fn post_translation_result(&self, payload: &OcrPayload) -> PapagoResult<PostResult> {
        let response = self
            .http
            .post(format!("{}/post-translation-result", self.base_url))
            .json(payload)
            .send()
            .await?;
        Self::read_json("/post-translation-result", response).await
    }

    /// Download the rendered image
    pub async fn fetch_result(&self, task_id: &str) -> PapagoResult<Vec<u8>> {
        let response = self
            .http
            .get(format!("{}/result/{}", self.base_url, task_id))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PapagoError::Ocr(format!(
                "/result/{} returned {}",
                task_id, status
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
