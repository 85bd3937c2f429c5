//! Error types for the Intercom integration.

use thiserror::Error;

/// Errors that can occur while syncing members or tracking events.
#[derive(Debug, Error)]
pub enum IntercomError {
    /// Required configuration is missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Event tracking needs an email or a user id
    #[error("Can't track event when no user logged in")]
    MissingIdentity,

    /// A settings map does not have the expected shape
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Intercom answered with a non-success status
    #[error("Intercom returned {status}: {body}")]
    Api { status: u16, body: String },

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML config parse error
    #[error("Config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, IntercomError>;

impl IntercomError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error came back from the remote API or its transport.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Api { .. })
    }
}
