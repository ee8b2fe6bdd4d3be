//! Error types for needle editing.

use thiserror::Error;

/// Result type alias using the needle error
pub type Result<T> = std::result::Result<T, NeedleError>;

#[derive(Error, Debug)]
pub enum NeedleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to load needle, code {0}")]
    Status(u16),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Unable to save needle: {}", .0.join(" "))]
    Validation(Vec<String>),

    #[error("Load superseded by a newer request")]
    Superseded,
}

impl NeedleError {
    /// Text drawn on the canvas when a load attempt fails.
    pub fn canvas_message(&self) -> String {
        match self {
            NeedleError::Status(code) => format!("Failed to load Needle, Code {}", code),
            other => format!("Failed to load: {}", other),
        }
    }
}
