//! Error types for the Docket document pipeline.
//!
//! Errors are organized by stage so failures carry actionable context
//! (engine names, HTTP status codes, which stage produced unparseable
//! output) all the way up to the CLI.

use thiserror::Error;

/// Top-level error type for Docket operations.
#[derive(Error, Debug)]
pub enum DocketError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// OCR backend unreachable or the image was unreadable
    #[error("OCR error ({engine}): {message}")]
    Ocr { engine: String, message: String },

    /// LLM call failed (network, auth, or HTTP-level error)
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        status_code: Option<u16>,
    },

    /// LLM response was not in the expected structured form
    #[error("Parse error in {stage} stage: {message}")]
    Parse { stage: String, message: String },

    /// Session operation attempted out of order
    #[error("Cannot {action} while session is in state {state}")]
    State { state: String, action: String },

    /// Caller provided unusable input (e.g. empty field list)
    #[error("Invalid input: {0}")]
    Input(String),
}

/// Convenience type alias for Docket results.
pub type Result<T> = std::result::Result<T, DocketError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
