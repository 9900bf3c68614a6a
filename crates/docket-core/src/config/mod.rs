//! Configuration management for Docket.
//!
//! Configuration is loaded from the platform config directory (e.g.
//! `~/.config/docket/config.toml` on Linux) with sensible defaults when
//! the file is absent. Stage wiring maps each pipeline stage to a named
//! `[models.<name>]` endpoint tuple.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Root configuration structure for Docket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OCR engine selection and settings
    pub ocr: OcrConfig,

    /// Named LLM endpoint tuples
    pub models: BTreeMap<String, ModelConfig>,

    /// Stage → model wiring
    pub stages: StagesConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ocr: OcrConfig::default(),
            models: default_models(),
            stages: StagesConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.docket.docket/config.toml
    /// - Linux: ~/.config/docket/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\docket\config\config.toml
    ///
    /// Falls back to ~/.docket/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "docket", "docket")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                let expanded = shellexpand::tilde(&home);
                PathBuf::from(expanded.into_owned())
                    .join(".docket")
                    .join("config.toml")
            })
    }

    /// Look up the model tuple wired to a stage name ("classifier",
    /// "extractor", "reviewer", "agent").
    pub fn model_for_stage(&self, stage: &str) -> Result<&ModelConfig, ConfigError> {
        let name = match stage {
            "classifier" => &self.stages.classifier,
            "extractor" => &self.stages.extractor,
            "reviewer" => &self.stages.reviewer,
            "agent" => &self.stages.agent,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown stage: {other}"
                )))
            }
        };
        self.models.get(name).ok_or_else(|| {
            ConfigError::ValidationError(format!("stage {stage} references unknown model {name}"))
        })
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
