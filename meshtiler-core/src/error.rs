//! Error types for the meshtiler pipeline

use thiserror::Error;

/// Main error type for meshtiler operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Transform error: {0}")]
    Transform(String),

    #[error("Tiling error: {0}")]
    Tiling(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for meshtiler operations
pub type Result<T> = std::result::Result<T, Error>;
