//! Error types for the artifact pipeline.

use std::io;

use thiserror::Error;

use crate::artifact::repository::RepositoryError;

/// Failure anywhere in decode → validate → write → record.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Payload is not valid base64.
    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Decoded bytes are not an image in the supported format.
    #[error("payload is not a valid jpeg image: {0}")]
    ImageFormat(#[source] image::ImageError),

    /// Opening or writing the file failed.
    #[error("failed to store artifact: {0}")]
    Storage(#[source] io::Error),

    /// The file was written but the repository refused the record.
    #[error("failed to record artifact: {0}")]
    Repository(#[from] RepositoryError),
}

impl IngestError {
    /// Classify an encoder error: I/O trouble is a storage failure, anything
    /// else means the image itself could not be encoded.
    pub(crate) fn from_encode(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(io) => Self::Storage(io),
            other => Self::ImageFormat(other),
        }
    }

    /// True for errors caused by the request payload or storage, as opposed
    /// to the metadata repository.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Repository(_))
    }
}

/// Failure reading a stored image back.
#[derive(Debug, Error)]
pub enum ImageAccessError {
    #[error("invalid image source: {0:?}")]
    InvalidSource(String),

    #[error("image not found: {0}")]
    NotFound(String),

    #[error("failed to read image: {0}")]
    Storage(#[source] io::Error),
}
