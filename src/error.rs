//! Error types for ddns-sync.

use thiserror::Error;

/// Result type alias for ddns-sync.
pub type Result<T> = std::result::Result<T, DdnsError>;

/// DDNS error types.
#[derive(Error, Debug)]
pub enum DdnsError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// Provider API returned a non-success response.
    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    /// The provider has no zone for the configured domain.
    #[error("Zone not found for domain {0}")]
    ZoneNotFound(String),

    /// IP detection error.
    #[error("IP detection failed: {0}")]
    IpDetection(String),

    /// DNS resolution of the published name failed.
    #[error("DNS lookup failed: {0}")]
    Dns(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DdnsError {
    pub(crate) fn provider(provider: &str, message: impl Into<String>) -> Self {
        DdnsError::Provider {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for DdnsError {
    fn from(e: reqwest::Error) -> Self {
        DdnsError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for DdnsError {
    fn from(e: serde_json::Error) -> Self {
        DdnsError::Serialization(e.to_string())
    }
}
