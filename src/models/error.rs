//! Error types for the translator

use thiserror::Error;

/// Translator errors
#[derive(Debug, Error)]
pub enum TranslatorError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Not valid ip address {address}, we need an absolute address, not a local one (as 127.0.0.1 or localhost)")]
    LocalAddress { address: String },

    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("Connection to {endpoint} failed: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    #[error("No listen port available in range {start}-{end}")]
    PortExhaustion { start: u16, end: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Hub not found: {id}")]
    NotFound { id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Service registry error: {0}")]
    Directory(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TranslatorError {
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        TranslatorError::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn local_address(address: impl Into<String>) -> Self {
        TranslatorError::LocalAddress {
            address: address.into(),
        }
    }

    pub fn connect_failed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        TranslatorError::ConnectFailed {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        TranslatorError::NotFound { id: id.into() }
    }

    /// True for failures caused by the caller's input rather than the network
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            TranslatorError::InvalidAddress { .. }
                | TranslatorError::LocalAddress { .. }
                | TranslatorError::UnsupportedProtocol(_)
                | TranslatorError::Validation(_)
        )
    }
}

// Convert from standard library errors
impl From<std::io::Error> for TranslatorError {
    fn from(err: std::io::Error) -> Self {
        TranslatorError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for TranslatorError {
    fn from(err: serde_json::Error) -> Self {
        TranslatorError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for TranslatorError {
    fn from(err: config::ConfigError) -> Self {
        TranslatorError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for TranslatorError {
    fn from(err: reqwest::Error) -> Self {
        TranslatorError::Network(err.to_string())
    }
}

/// Result type for translator operations
pub type TranslatorResult<T> = Result<T, TranslatorError>;
