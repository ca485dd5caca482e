//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Unified error type for core-logic operations.
///
/// This enum wraps all specific error types and provides a unified
/// error interface for the application layer.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(ConfigError),

    #[error(transparent)]
    Network(NetworkError),

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e)
    }
}

impl From<NetworkError> for CoreError {
    fn from(e: NetworkError) -> Self {
        CoreError::Network(e)
    }
}

/// Configuration and credential-file errors. All of these are fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },

    #[error("No entries found in {path}")]
    EmptyList { path: String },

    #[error("Token count ({tokens}) does not match proxy count ({proxies})")]
    CountMismatch { tokens: usize, proxies: usize },
}

/// Network and remote API errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Request timeout after {timeout_ms}ms to {endpoint}")]
    Timeout { timeout_ms: u64, endpoint: String },

    #[error("Rate limited by {endpoint}: retry after {retry_after}s")]
    RateLimited { endpoint: String, retry_after: u64 },

    #[error("Connection refused to {endpoint}: {reason}")]
    ConnectionRefused { endpoint: String, reason: String },

    #[error("HTTP error {status_code} from {endpoint}")]
    HttpError { status_code: u16, endpoint: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Invalid proxy '{proxy}': {reason}")]
    InvalidProxy { proxy: String, reason: String },

    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
}

impl NetworkError {
    /// Short form used in operator-facing messages: the status code when
    /// there is one, the full message otherwise.
    pub fn short(&self) -> String {
        match self {
            NetworkError::HttpError { status_code, .. } => status_code.to_string(),
            other => other.to_string(),
        }
    }
}
