//! Configuration file for a view.

use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::option::{OptionPolicy, Options};

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Error types for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Error validating configuration.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_yaml::Error),
}

/// View configuration.
///
/// ```yaml
/// root: ./templates
/// policy: strict
/// options:
///   cacheDir: ./.cache/views
///   refresh: true
///   contentType: html
/// ```
///
/// Option names are not checked here; the view rejects unknown ones when it
/// is built.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ViewConfig {
    /// Template root directory.
    #[validate(length(min = 1))]
    pub root: String,

    /// How unknown option names are handled.
    #[serde(default)]
    pub policy: OptionPolicy,

    /// Engine options, applied in document order.
    #[serde(default)]
    pub options: Options,
}

impl ViewConfig {
    /// Create a configuration for `root` with no options.
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            policy: OptionPolicy::default(),
            options: Options::new(),
        }
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    #[tracing::instrument(skip(path))]
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;

        tracing::debug!("Loaded view configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or validated.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;

        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        Ok(config)
    }

    /// Save configuration to a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    #[tracing::instrument(skip(self, path))]
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;

        tracing::debug!("Saved view configuration to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ViewConfig::from_yaml("root: ./templates").unwrap();
        assert_eq!(config.root, "./templates");
        assert_eq!(config.policy, OptionPolicy::Strict);
        assert!(config.options.is_empty());
    }

    #[test]
    fn test_config_keeps_option_order() {
        let yaml = r#"
root: views
policy: lenient
options:
  refresh: true
  contentType: html
  cacheDir: /tmp/views
"#;
        let config = ViewConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.policy, OptionPolicy::Lenient);
        let keys: Vec<&str> = config.options.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["refresh", "contentType", "cacheDir"]);
        assert_eq!(config.options["refresh"], serde_json::json!(true));
    }

    #[test]
    fn test_config_empty_root_fails_validation() {
        let err = ViewConfig::from_yaml("root: ''").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_config_missing_root_fails() {
        let err = ViewConfig::from_yaml("policy: strict").unwrap_err();
        assert!(matches!(err, ConfigError::Serde(_)));
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("view.yml");

        let mut config = ViewConfig::new("templates");
        config
            .options
            .insert("contentType".to_string(), serde_json::json!("text"));
        config.save_to_file(&path).unwrap();

        let loaded = ViewConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.root, "templates");
        assert_eq!(loaded.options["contentType"], serde_json::json!("text"));
    }
}
