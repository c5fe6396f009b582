//! Error types for Vista views.

use thiserror::Error;

use crate::config::ConfigError;
use crate::option::ViewOption;

/// Result type alias for view construction.
pub type Result<T> = std::result::Result<T, ViewError>;

/// Errors raised by the view adapter itself.
///
/// Rendering failures are not represented here: they come straight from the
/// engine as [`minijinja::Error`].
#[derive(Debug, Error)]
pub enum ViewError {
    /// An option name outside the whitelist was given.
    #[error("Invalid option \"{0}\" given.")]
    InvalidConfiguration(String),

    /// A whitelisted option was given a value of the wrong type.
    #[error("Invalid value for option \"{option}\": expected {expected}")]
    InvalidOptionValue {
        /// The option that received the bad value.
        option: ViewOption,
        /// Human readable description of the accepted type.
        expected: &'static str,
    },

    /// Error loading a view configuration file.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ViewError {
    /// Create an unknown option error.
    #[must_use]
    pub fn invalid_configuration(name: impl Into<String>) -> Self {
        Self::InvalidConfiguration(name.into())
    }

    /// Create a wrong value type error.
    #[must_use]
    pub const fn invalid_value(option: ViewOption, expected: &'static str) -> Self {
        Self::InvalidOptionValue { option, expected }
    }
}
