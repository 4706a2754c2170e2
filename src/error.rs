//! Error types for the Turnstile service.

use thiserror::Error;

/// Main error type for Turnstile operations.
///
/// Admission decisions never fail; every variant here is raised while loading
/// configuration or running the transport, and is fatal at start-up.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Invalid rules or settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed JSON rules file
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed YAML rules file
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Layered service settings could not be assembled
    #[error("Settings error: {0}")]
    Settings(#[from] ::config::ConfigError),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
