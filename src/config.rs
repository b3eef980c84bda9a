use crate::constants::{DEFAULT_CANDIDATE_LIMIT, DEFAULT_TRACK_FETCH_LIMIT};
use crate::error::{ImporterError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ImporterConfig {
    /// Maximum number of candidates surfaced for a partial song match.
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
    /// Upper bound when listing the tracks of a release during import.
    #[serde(default = "default_track_fetch_limit")]
    pub track_fetch_limit: usize,
    /// Directory for rotated log files.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_candidate_limit() -> usize {
    DEFAULT_CANDIDATE_LIMIT
}

fn default_track_fetch_limit() -> usize {
    DEFAULT_TRACK_FETCH_LIMIT
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            candidate_limit: default_candidate_limit(),
            track_fetch_limit: default_track_fetch_limit(),
            log_dir: default_log_dir(),
        }
    }
}

impl ImporterConfig {
    /// Load configuration from `config.toml`, falling back to defaults when
    /// the file does not exist. A present-but-invalid file is an error.
    pub fn load_or_default() -> Result<Self> {
        let config_path = "config.toml";
        if !Path::new(config_path).exists() {
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            ImporterError::Config(format!("Failed to read config file '{}': {}", config_path, e))
        })?;

        let config: ImporterConfig = toml::from_str(&config_content)?;
        Ok(config)
    }
}
