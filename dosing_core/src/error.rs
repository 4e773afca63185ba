//! Error types for the dosing_core library.

use std::io;

use crate::reconstitution::ReconstitutionError;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dosing_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Host-side validation of a regimen or inventory record failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// A tracked compound or record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Reconstitution calculator rejected its inputs
    #[error("Reconstitution error: {0}")]
    Reconstitution(#[from] ReconstitutionError),
}
