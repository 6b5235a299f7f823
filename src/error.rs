//! Error types for encoding, decoding and clip I/O

use thiserror::Error;

/// Errors that can occur while loading, encoding, decoding or saving clips
#[derive(Error, Debug)]
pub enum CodecError {
    /// Encode was asked to process a channel with no samples
    #[error("Empty input: cannot encode a zero-length channel")]
    EmptyInput,

    /// An atom descriptor that cannot be rendered
    #[error("Invalid atom parameters: {0}")]
    InvalidAtomParameters(String),

    /// Rejected configuration (never clamped)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input or output container the I/O layer cannot handle
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Resampling error: {0}")]
    Resample(String),
}

impl From<rubato::ResamplerConstructionError> for CodecError {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        CodecError::Resample(e.to_string())
    }
}

impl From<rubato::ResampleError> for CodecError {
    fn from(e: rubato::ResampleError) -> Self {
        CodecError::Resample(e.to_string())
    }
}

impl From<hound::Error> for CodecError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => CodecError::Io(io),
            other => CodecError::UnsupportedFormat(other.to_string()),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, CodecError>;
