//! Transcoding error types.

use attrel_core::ConfigError;
use thiserror::Error;

/// A single value could not be encoded.
///
/// Scoped to one attribute value: callers skip the value and continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// The transcoder does not support the value's type.
    #[error("Cannot encode {kind} value of attribute '{attribute_id}'")]
    UnsupportedValue { attribute_id: String, kind: String },

    /// A rule property the transcoder needs is malformed.
    #[error("Invalid transcoding property '{name}': {message}")]
    InvalidProperty { name: String, message: String },

    /// A required rule property is missing.
    #[error(transparent)]
    Property(#[from] ConfigError),
}

impl EncodingError {
    /// Create a new `UnsupportedValue` error.
    #[must_use]
    pub fn unsupported_value(attribute_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnsupportedValue {
            attribute_id: attribute_id.into(),
            kind: kind.into(),
        }
    }

    /// Create a new `InvalidProperty` error.
    #[must_use]
    pub fn invalid_property(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidProperty {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// A wire object could not be decoded.
///
/// An object the transcoder does not understand is not an error; decoders
/// return `Ok(None)` for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodingError {
    /// The wire object is recognized but its content is malformed.
    #[error("Malformed '{name}' object: {message}")]
    Malformed { name: String, message: String },

    /// A rule property the transcoder needs is malformed.
    #[error("Invalid transcoding property '{name}': {message}")]
    InvalidProperty { name: String, message: String },

    /// A required rule property is missing.
    #[error(transparent)]
    Property(#[from] ConfigError),

    /// Strict decoding found no rule that understood the object.
    #[error("No decoder produced a value for wire object '{name}'")]
    Unmatched { name: String },
}

impl DecodingError {
    /// Create a new `Malformed` error.
    #[must_use]
    pub fn malformed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a new `InvalidProperty` error.
    #[must_use]
    pub fn invalid_property(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidProperty {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Errors that make a transcoding call unusable as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscodingError {
    #[error("Transcoding configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Decoding(#[from] DecodingError),

    /// A rule's transcoder does not produce the requested wire type.
    #[error("Rule for '{attribute_id}' does not transcode {wire_type}")]
    WireTypeMismatch {
        attribute_id: String,
        wire_type: &'static str,
    },
}

/// Result alias for transcoding operations.
pub type TranscodingResult<T> = Result<T, TranscodingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EncodingError::unsupported_value("mail", "binary");
        assert_eq!(err.to_string(), "Cannot encode binary value of attribute 'mail'");

        let err: EncodingError = ConfigError::missing("transcoding property 'name'").into();
        assert!(err.to_string().contains("name"));

        let err = TranscodingError::from(DecodingError::Unmatched {
            name: "email".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "No decoder produced a value for wire object 'email'"
        );
    }
}
