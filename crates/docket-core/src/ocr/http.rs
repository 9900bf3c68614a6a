//! Generic HTTP OCR engine.
//!
//! Talks to any vision endpoint accepting `{"image": "<base64>"}` and
//! returning `{"lines": [{"text", "bbox", "confidence"}]}`. Covers
//! self-hosted recognition servers without binding to a vendor SDK.

use super::OcrLine;
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP OCR backend.
pub struct HttpOcr {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpOcr {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn ocr_error(&self, message: impl Into<String>) -> PipelineError {
        PipelineError::Ocr {
            engine: "http".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct OcrRequest {
    image: String,
}

#[derive(Deserialize)]
struct OcrResponse {
    lines: Vec<WireLine>,
}

#[derive(Deserialize)]
struct WireLine {
    text: String,
    #[serde(default)]
    bbox: [i32; 4],
    #[serde(default)]
    confidence: f32,
}

#[async_trait]
impl super::OcrEngine for HttpOcr {
    fn name(&self) -> &str {
        "http"
    }

    async fn is_available(&self) -> bool {
        self.client
            .head(&self.endpoint)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok()
    }

    async fn recognize(&self, image: &[u8]) -> PipelineResult<Vec<OcrLine>> {
        let body = OcrRequest {
            image: base64::engine::general_purpose::STANDARD.encode(image),
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .timeout(Duration::from_secs(60));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| self.ocr_error(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(self.ocr_error(format!("HTTP {status}: {text}")));
        }

        let ocr_resp: OcrResponse = resp
            .json()
            .await
            .map_err(|e| self.ocr_error(format!("unparseable response: {e}")))?;

        Ok(ocr_resp
            .lines
            .into_iter()
            .filter(|l| !l.text.trim().is_empty())
            .map(|l| OcrLine {
                text: l.text.trim().to_string(),
                bbox: l.bbox,
                confidence: l.confidence,
            })
            .collect())
    }
}
