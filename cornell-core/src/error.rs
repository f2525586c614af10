use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a note store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Note not found: {0}")]
    NotFound(String),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize notes: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Note store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Image bytes that could not be decoded.
#[derive(Error, Debug)]
#[error("Failed to decode image: {0}")]
pub struct DecodeError(#[from] pub image::ImageError);

/// A single embedded image left at its original encoding during export.
#[derive(Error, Debug)]
#[error("Image compression skipped: {reason}")]
pub struct CompressionSkipped {
    pub reason: String,
}

/// Annotation surface misuse or encoding failure.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Annotation surface is mid-stroke")]
    Stroking,

    #[error("Failed to encode annotation: {0}")]
    Encode(#[from] image::ImageError),
}

/// Unrecoverable export failure. The whole export is aborted.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Rendering surface of {width}x{height} pixels is too large")]
    SurfaceTooLarge { width: u64, height: u64 },

    #[error("Failed to encode page image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Failed to assemble document: {0}")]
    Assemble(String),
}
