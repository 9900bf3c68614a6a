//! Docket Core - Embeddable document AI pipeline library.
//!
//! Docket chains OCR, an LLM classifier, an LLM field extractor, and an
//! LLM reviewer over an uploaded document image, producing a single JSON
//! result with the document type, extracted values, and per-field review
//! verdicts.
//!
//! # Architecture
//!
//! ```text
//! Image → OCR → Classify → (confirm fields) → Extract → Review → JSON
//! ```
//!
//! Every capability is a swappable provider: OCR engines and LLM
//! providers live behind traits, and each pipeline stage is wired to a
//! named model tuple in config. The session state machine owns the
//! ordering; an agentic variant hands the extract/review ordering to an
//! LLM with two tools.
//!
//! # Usage
//!
//! ```rust,ignore
//! use docket_core::{Config, Classifier, Document, DocumentSession, Extractor, Reviewer};
//!
//! #[tokio::main]
//! async fn main() -> docket_core::Result<()> {
//!     let config = Config::load()?;
//!     let engine = docket_core::OcrEngineFactory::create(&config.ocr)?;
//!
//!     let document = Document::new("invoice.png", std::fs::read("invoice.png")?);
//!     let mut session = DocumentSession::new(document);
//!
//!     session.run_ocr(engine.as_ref()).await?;
//!     let suggested = session.classify(&Classifier::from_config(&config)?).await?;
//!     session.confirm_fields(suggested.fields.clone())?;
//!     session.extract(&Extractor::from_config(&config)?).await?;
//!     session.review(&Reviewer::from_config(&config)?).await?;
//!     let result = session.finalize()?;
//!     println!("{}", docket_core::output::to_json(&result, true)?);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod ocr;
pub mod output;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use agent::{AgentOptions, AgentOutcome, DocumentAgent};
pub use config::{Config, ReviewerMode};
pub use error::{ConfigError, DocketError, PipelineError, PipelineResult, Result};
pub use llm::{ImageInput, LlmProvider, LlmProviderFactory};
pub use ocr::{MockOcr, OcrEngine, OcrEngineFactory};
pub use output::SessionWriter;
pub use pipeline::{Classifier, DocumentSession, Extractor, Reviewer, SessionState};
pub use types::{
    Document, DocumentType, ExtractionRecord, FieldReview, ReviewRecord, ReviewStatus,
    SessionResult,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
