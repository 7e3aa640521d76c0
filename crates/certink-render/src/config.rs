//! Export settings.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors loading an [`ExportConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Settings for frame export and batch generation. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Output pixels per canvas pixel.
    pub pixel_ratio: f64,
    /// Name suggested to the archive sink.
    pub archive_name: String,
    /// Prefix of the name used when a row has no usable name.
    pub fallback_prefix: String,
    pub file_extension: String,
    /// Extra wait after each settle, in milliseconds.
    pub settle_delay_ms: u64,
    /// Undo depth for interactive canvases; unbounded when absent.
    pub history_limit: Option<usize>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            pixel_ratio: 2.0,
            archive_name: "certificates.zip".to_string(),
            fallback_prefix: "Certificate".to_string(),
            file_extension: "png".to_string(),
            settle_delay_ms: 0,
            history_limit: None,
        }
    }
}

impl ExportConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "pixel_ratio must be positive, got {}",
                self.pixel_ratio
            )));
        }
        if self.file_extension.is_empty() || self.file_extension.contains(['.', '/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "file_extension {:?} is not a bare extension",
                self.file_extension
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExportConfig::default();
        assert!((config.pixel_ratio - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.archive_name, "certificates.zip");
        assert_eq!(config.fallback_prefix, "Certificate");
        assert_eq!(config.file_extension, "png");
        assert_eq!(config.settle_delay_ms, 0);
        assert!(config.history_limit.is_none());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ExportConfig::from_json(r#"{"pixel_ratio": 1.0, "history_limit": 100}"#).unwrap();
        assert!((config.pixel_ratio - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.history_limit, Some(100));
        assert_eq!(config.archive_name, "certificates.zip");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            ExportConfig::from_json(r#"{"pixel_ratio": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ExportConfig::from_json(r#"{"file_extension": ".png"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(ExportConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(&path, r#"{"archive_name": "awards.zip"}"#).unwrap();
        assert_eq!(ExportConfig::load(&path).unwrap().archive_name, "awards.zip");
        assert!(matches!(
            ExportConfig::load(&dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
