// src/error.rs
use crate::capture::CaptureError;
use crate::validation::ValidationError;
use cartel_pdf_composer::ComposerError;
use thiserror::Error;

/// Errors raised while turning a batch of posters into one PDF.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("PDF composition failed: {0}")]
    Compose(#[from] ComposerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
