//! Release service error types.

use attrel_core::ConfigError;
use attrel_filter::FilterError;
use attrel_transcoding::TranscodingError;
use thiserror::Error;

/// Errors raised by the release service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// A generation failed to build or validate. The running generation is
    /// left in place.
    #[error("Release configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Filtering aborted. Nothing may be released.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Encoding or decoding failed as a whole.
    #[error(transparent)]
    Transcoding(#[from] TranscodingError),
}

/// Result alias for release service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
