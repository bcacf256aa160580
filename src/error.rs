use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while searching an image for the marker line.
///
/// A missing marker is not an error: it is reported through
/// [`Candidate::found`](crate::models::Candidate::found).
#[derive(Debug, Error)]
pub enum LabelError {
    /// The image handed to preprocessing or a backend has no pixels
    #[error("input image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    /// A recognition backend failed on one attempt
    #[error("recognition backend '{backend}' failed")]
    Backend {
        backend: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "OCR models not found. Expected locations:\n  - {}\n  - {}",
        detection.display(),
        recognition.display()
    )]
    ModelsNotFound {
        detection: PathBuf,
        recognition: PathBuf,
    },

    #[error("overlay font could not be loaded: {0}")]
    Font(String),

    #[error("debug directory is not empty: {}", .0.display())]
    DebugDirNotEmpty(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("configuration could not be serialized: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
}

pub type Result<T, E = LabelError> = std::result::Result<T, E>;
