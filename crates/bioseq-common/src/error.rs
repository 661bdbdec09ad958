//! Error types for bioseq

use thiserror::Error;

/// Result type alias for bioseq operations
pub type Result<T> = std::result::Result<T, BioseqError>;

/// Main error type shared by bioseq crates
#[derive(Error, Debug)]
pub enum BioseqError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value for {name}: '{value}' ({reason})")]
    InvalidSetting {
        name: String,
        value: String,
        reason: String,
    },
}

impl BioseqError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid setting error for a named variable or flag
    pub fn invalid_setting(
        name: impl Into<String>,
        value: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidSetting {
            name: name.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
