//! OCR engine abstraction.
//!
//! Engines produce positioned text lines; the reading-order pass turns
//! those into a single top-to-bottom, left-to-right string for the LLM
//! stages. Backends are interchangeable: a local tesseract subprocess, a
//! generic HTTP vision endpoint, or the built-in mock used by demos and
//! tests.

pub(crate) mod http;
pub(crate) mod mock;
pub(crate) mod reading_order;
pub(crate) mod tesseract;

pub use mock::MockOcr;

use crate::config::OcrConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::llm::provider::resolve_env_var;
use async_trait::async_trait;

/// A recognized text line with its bounding box and confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    /// Recognized text
    pub text: String,
    /// [xmin, ymin, xmax, ymax] in image pixels
    pub bbox: [i32; 4],
    /// Confidence on a 0-100 scale
    pub confidence: f32,
}

/// Trait that all OCR backends implement.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Engine name for logging (e.g., "tesseract", "http", "mock").
    fn name(&self) -> &str;

    /// Check whether the backend is installed/reachable.
    async fn is_available(&self) -> bool;

    /// Recognize positioned text lines in the image.
    async fn recognize(&self, image: &[u8]) -> PipelineResult<Vec<OcrLine>>;
}

/// Run OCR and convert the recognized lines to reading order.
///
/// An image with no detected text yields an empty string, not an error.
pub async fn extract_text(engine: &dyn OcrEngine, image: &[u8]) -> PipelineResult<String> {
    let lines = engine.recognize(image).await?;
    tracing::debug!("{} produced {} line(s)", engine.name(), lines.len());
    Ok(reading_order::lines_to_text(lines))
}

/// Factory that creates the configured OCR engine.
pub struct OcrEngineFactory;

impl OcrEngineFactory {
    pub fn create(config: &OcrConfig) -> PipelineResult<Box<dyn OcrEngine>> {
        match config.engine.as_str() {
            "tesseract" => Ok(Box::new(tesseract::TesseractOcr::new(&config.tesseract))),
            "http" => {
                let api_key = resolve_env_var(&config.http.api_key);
                Ok(Box::new(http::HttpOcr::new(&config.http.endpoint, api_key)))
            }
            "mock" => Ok(Box::new(MockOcr)),
            other => Err(PipelineError::Ocr {
                engine: other.to_string(),
                message: "unknown OCR engine".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OcrConfig;

    #[test]
    fn factory_creates_configured_engine() {
        let mut config = OcrConfig::default();
        config.engine = "mock".to_string();
        let engine = OcrEngineFactory::create(&config).unwrap();
        assert_eq!(engine.name(), "mock");
    }

    #[test]
    fn factory_rejects_unknown_engine() {
        let mut config = OcrConfig::default();
        config.engine = "clairvoyance".to_string();
        let err = OcrEngineFactory::create(&config).err().unwrap();
        assert!(err.to_string().contains("unknown OCR engine"));
    }

    #[tokio::test]
    async fn extract_text_orders_mock_lines() {
        let text = extract_text(&MockOcr, &[0u8; 4]).await.unwrap();
        assert!(text.contains("INVOICE"));
        // Header comes before the totals further down the page
        let header = text.find("INVOICE").unwrap();
        let total = text.find("Total Amount").unwrap();
        assert!(header < total);
    }
}
