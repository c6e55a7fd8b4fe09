//! Error types for configuration data shared across crates.

use thiserror::Error;

/// Result type alias using ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Validation errors for declarative configuration (extents, variables, palettes).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid extent: {0}")]
    InvalidExtent(String),

    #[error("Invalid variable '{name}': {message}")]
    InvalidVariable { name: String, message: String },

    #[error("Duplicate variable: {0}")]
    DuplicateVariable(String),

    #[error("Invalid color '{0}', expected #RRGGBB or #RRGGBBAA")]
    InvalidColor(String),
}

impl ConfigError {
    pub fn variable(name: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidVariable {
            name: name.into(),
            message: message.into(),
        }
    }
}
