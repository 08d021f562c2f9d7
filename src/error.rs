//! Error types for the drawing-to-edit pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during an edit cycle or while configuring a session
#[derive(Error, Debug)]
pub enum Error {
    /// Rasterizing a capture target failed (region missing, backend threw)
    #[error("Capture failed: {0}")]
    Capture(String),

    /// Encoding a captured raster failed
    #[error("Image encoding failed: {0}")]
    Encode(String),

    /// The edit request never completed
    #[error("Network error: {0}")]
    Network(String),

    /// The edit service answered with a non-success status
    #[error("Edit service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The edit service answered with unusable markup
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Filesystem error (preferences, config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the failure happened before the request was sent
    pub fn is_capture(&self) -> bool {
        matches!(self, Error::Capture(_) | Error::Encode(_))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Encode(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}
