//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

const KNOWN_ENGINES: &[&str] = &["tesseract", "http", "mock"];
const KNOWN_PROVIDERS: &[&str] = &["openai", "anthropic"];

impl Config {
    /// Validate configuration values are within acceptable ranges and the
    /// stage wiring is satisfiable.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !KNOWN_ENGINES.contains(&self.ocr.engine.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "ocr.engine must be one of {KNOWN_ENGINES:?}, got \"{}\"",
                self.ocr.engine
            )));
        }
        if !(0.0..=100.0).contains(&self.ocr.tesseract.min_confidence) {
            return Err(ConfigError::ValidationError(
                "ocr.tesseract.min_confidence must be between 0 and 100".into(),
            ));
        }

        for (name, model) in &self.models {
            if !KNOWN_PROVIDERS.contains(&model.provider.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "models.{name}.provider must be one of {KNOWN_PROVIDERS:?}, got \"{}\"",
                    model.provider
                )));
            }
            if model.base_url.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "models.{name}.base_url must not be empty"
                )));
            }
            if model.model.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "models.{name}.model must not be empty"
                )));
            }
            if !(0.0..=2.0).contains(&model.temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "models.{name}.temperature must be between 0.0 and 2.0"
                )));
            }
            if model.max_tokens == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "models.{name}.max_tokens must be > 0"
                )));
            }
            if model.timeout_secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "models.{name}.timeout_secs must be > 0"
                )));
            }
        }

        // Every wired stage must resolve to a model table entry
        for stage in ["classifier", "extractor", "reviewer", "agent"] {
            self.model_for_stage(stage)?;
        }

        Ok(())
    }
}
