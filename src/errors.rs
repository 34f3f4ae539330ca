use thiserror::Error;
use std::io;
use std::path::PathBuf;

/// Custom error types for LeafAreaR
#[derive(Error, Debug)]
pub enum LeafAreaError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No region found: {0}")]
    NoRegionFound(String),

    #[error("Processing failure: {0}")]
    ProcessingFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV output error: {0}")]
    CsvOutput(#[from] csv::Error),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input path: {0}")]
    InvalidPath(PathBuf),
}

/// Type alias for Result with our custom error type
pub type Result<T> = std::result::Result<T, LeafAreaError>;
