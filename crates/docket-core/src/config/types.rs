//! Sub-configuration structs with workshop-friendly defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// OCR engine selection and per-engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Which engine to use: "tesseract", "http", or "mock"
    pub engine: String,

    /// Tesseract subprocess settings
    pub tesseract: TesseractConfig,

    /// Generic HTTP vision endpoint settings
    pub http: HttpOcrConfig,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: "tesseract".to_string(),
            tesseract: TesseractConfig::default(),
            http: HttpOcrConfig::default(),
        }
    }
}

/// Tesseract settings. The binary is invoked per document; nothing is
/// kept resident.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Path to the tesseract binary
    pub binary: String,

    /// Recognition language passed as `-l`
    pub lang: String,

    /// Words below this confidence (0-100) are dropped
    pub min_confidence: f32,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            lang: "eng".to_string(),
            min_confidence: 30.0,
        }
    }
}

/// Generic HTTP OCR endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpOcrConfig {
    /// Endpoint accepting `{"image": "<base64>"}` and returning
    /// `{"lines": [{"text", "bbox", "confidence"}]}`
    pub endpoint: String,

    /// Bearer token (supports ${ENV_VAR} syntax); empty for none
    pub api_key: String,
}

impl Default for HttpOcrConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8868/ocr".to_string(),
            api_key: String::new(),
        }
    }
}

/// A named LLM endpoint tuple: provider kind, base URL, credentials,
/// model name, and sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Wire protocol: "openai" (chat completions, any compatible server)
    /// or "anthropic" (Messages API)
    pub provider: String,

    /// API base URL (no trailing path)
    pub base_url: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model name sent in the request
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://dashscope-intl.aliyuncs.com/compatible-mode/v1".to_string(),
            api_key: "${DASHSCOPE_API_KEY}".to_string(),
            model: "qwen2.5-7b-instruct".to_string(),
            temperature: 0.2,
            max_tokens: 1000,
            timeout_secs: 60,
        }
    }
}

impl ModelConfig {
    fn named(model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..Self::default()
        }
    }
}

/// Reviewer operating mode: reason over text only, or attach the document
/// image as well. A configuration choice, not a runtime decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewerMode {
    Text,
    Multimodal,
}

/// Stage → model-name wiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesConfig {
    /// Model used for document classification
    pub classifier: String,

    /// Model used for field extraction (vision-capable recommended)
    pub extractor: String,

    /// Model used for extraction review
    pub reviewer: String,

    /// Model driving the agentic orchestrator (must be "openai" provider)
    pub agent: String,

    /// Whether the reviewer sees the image
    pub reviewer_mode: ReviewerMode,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            classifier: "qwen-text".to_string(),
            extractor: "qwen-vl".to_string(),
            reviewer: "qwen-vl".to_string(),
            agent: "qwen-text".to_string(),
            reviewer_mode: ReviewerMode::Multimodal,
        }
    }
}

/// Default model table: a text model for classification and agent
/// planning, a vision-language model for extraction and review.
pub(crate) fn default_models() -> BTreeMap<String, ModelConfig> {
    let mut models = BTreeMap::new();
    models.insert(
        "qwen-text".to_string(),
        ModelConfig::named("qwen2.5-7b-instruct"),
    );
    models.insert(
        "qwen-vl".to_string(),
        ModelConfig::named("qwen2.5-vl-7b-instruct"),
    );
    models
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print the session result JSON
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
