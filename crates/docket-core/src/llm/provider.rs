//! LLM provider trait and request/response types.
//!
//! Defines the interface every LLM backend implements, plus the factory
//! that creates the right provider for a pipeline stage from config.

use crate::config::{Config, ModelConfig};
use crate::error::PipelineError;
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

/// Base64-encoded image ready to send to an LLM API.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
}

impl ImageInput {
    /// Create an `ImageInput` from raw bytes and format string.
    ///
    /// The format is the image format identifier (e.g., "jpeg", "png", "webp").
    pub fn from_bytes(bytes: &[u8], format: &str) -> Self {
        let media_type = match format {
            "jpeg" | "jpg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            other => {
                tracing::warn!("Unknown image format '{other}', defaulting to image/jpeg");
                "image/jpeg"
            }
        };

        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: media_type.to_string(),
        }
    }

    /// Create an `ImageInput` from a document's bytes and sniffed format.
    pub fn from_document(document: &crate::types::Document) -> Self {
        Self::from_bytes(&document.bytes, &document.format)
    }

    /// Return a data URL suitable for OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// A single-turn completion request: a prompt, an optional image, and
/// sampling parameters taken from the stage's model config.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Text prompt for the model
    pub prompt: String,
    /// Document image, attached for multimodal stages
    pub image: Option<ImageInput>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl ChatRequest {
    /// Build a request with the sampling parameters from a model config.
    pub fn new(prompt: impl Into<String>, image: Option<ImageInput>, model: &ModelConfig) -> Self {
        Self {
            prompt: prompt.into(),
            image,
            max_tokens: model.max_tokens,
            temperature: model.temperature,
        }
    }
}

/// The response from an LLM completion call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated text
    pub text: String,
    /// Model identifier used
    pub model: String,
    /// Number of tokens used (input + output), if reported
    pub tokens_used: Option<u32>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all LLM providers implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (stages hold `Box<dyn LlmProvider>` for dynamic dispatch).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging (e.g., "openai", "anthropic").
    fn name(&self) -> &str;

    /// Check whether the provider is configured and reachable.
    async fn is_available(&self) -> bool;

    /// Generate a completion for the given request.
    async fn complete(&self, request: &ChatRequest) -> Result<LlmResponse, PipelineError>;

    /// Per-request timeout for this provider.
    fn timeout(&self) -> Duration;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok()
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Factory that creates the provider wired to a pipeline stage.
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create the provider for a named stage ("classifier", "extractor",
    /// "reviewer") from config.
    pub fn for_stage(config: &Config, stage: &str) -> Result<Box<dyn LlmProvider>, PipelineError> {
        let model = config.model_for_stage(stage).map_err(|e| PipelineError::Llm {
            message: e.to_string(),
            status_code: None,
        })?;
        Self::create(model)
    }

    /// Create a provider from a model config tuple.
    pub fn create(model: &ModelConfig) -> Result<Box<dyn LlmProvider>, PipelineError> {
        match model.provider.as_str() {
            "openai" => {
                let api_key =
                    resolve_env_var(&model.api_key).ok_or_else(|| PipelineError::Llm {
                        message: format!(
                            "API key for model {} not set (is {} exported?)",
                            model.model, model.api_key
                        ),
                        status_code: None,
                    })?;
                Ok(Box::new(super::openai::OpenAiProvider::new(
                    &model.base_url,
                    &api_key,
                    &model.model,
                    model.timeout_secs,
                )))
            }
            "anthropic" => {
                let api_key =
                    resolve_env_var(&model.api_key).ok_or_else(|| PipelineError::Llm {
                        message: "Anthropic API key not set. Set ANTHROPIC_API_KEY env var."
                            .to_string(),
                        status_code: None,
                    })?;
                Ok(Box::new(super::anthropic::AnthropicProvider::new(
                    &model.base_url,
                    &api_key,
                    &model.model,
                    model.timeout_secs,
                )))
            }
            other => Err(PipelineError::Llm {
                message: format!("Unknown LLM provider: {other}"),
                status_code: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_input_from_bytes_jpeg() {
        let input = ImageInput::from_bytes(&[0xFF, 0xD8, 0xFF], "jpeg");
        assert_eq!(input.media_type, "image/jpeg");
        assert!(!input.data.is_empty());
    }

    #[test]
    fn test_image_input_from_bytes_png() {
        let input = ImageInput::from_bytes(&[0x89, 0x50, 0x4E, 0x47], "png");
        assert_eq!(input.media_type, "image/png");
    }

    #[test]
    fn test_image_input_data_url() {
        let input = ImageInput::from_bytes(&[1, 2, 3], "jpeg");
        let url = input.data_url();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_chat_request_takes_sampling_from_model() {
        let model = ModelConfig {
            temperature: 0.7,
            max_tokens: 256,
            ..ModelConfig::default()
        };
        let request = ChatRequest::new("classify this", None, &model);
        assert_eq!(request.max_tokens, 256);
        assert!((request.temperature - 0.7).abs() < f32::EPSILON);
        assert!(request.image.is_none());
    }

    #[test]
    fn test_resolve_env_var() {
        // Non-env-var strings pass through
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        // Empty returns None
        assert_eq!(resolve_env_var(""), None);
        // Unset env var returns None
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let model = ModelConfig {
            provider: "smoke-signals".to_string(),
            api_key: "key".to_string(),
            ..ModelConfig::default()
        };
        let err = LlmProviderFactory::create(&model).err().unwrap();
        assert!(err.to_string().contains("Unknown LLM provider"));
    }
}
