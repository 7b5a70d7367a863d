use common::error::{DatabaseError, ServiceError};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("upload exceeds {limit} bytes")]
    TooBig { limit: usize },

    #[error("upload is not a supported image: {0}")]
    NotImage(String),

    #[error("image is {width}x{height}, both sides must be at least {min}")]
    BadDimensions { width: u32, height: u32, min: u32 },

    #[error("storage failed: {0}")]
    StorageFailed(String),

    #[error("upload interrupted: {0}")]
    Interrupted(String),

    #[error("media not found")]
    NotFound,

    #[error("invalid media uri: {0}")]
    InvalidUri(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<MediaError> for ServiceError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::TooBig { .. }
            | MediaError::NotImage(_)
            | MediaError::BadDimensions { .. }
            | MediaError::Interrupted(_)
            | MediaError::InvalidUri(_) => ServiceError::BadRequest(err.to_string()),
            MediaError::NotFound => ServiceError::NotFound(err.to_string()),
            MediaError::StorageFailed(cause) => {
                error!("Media storage failed: {}", cause);
                ServiceError::Internal(cause)
            }
            MediaError::Database(e) => e.into(),
        }
    }
}
