use thiserror::Error;

/// Everything that can go wrong in the segmentation engine.
///
/// Configuration problems are detected before any expensive work starts;
/// data and I/O problems abort the whole operation. Nothing here is
/// transient, so no variant is ever retried.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("insufficient training data: {0}")]
    InsufficientData(String),

    #[error("model serialization error: {0}")]
    Serialization(String),

    #[error("dimension mismatch: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;
