//! Filtering error types.

use attrel_core::ConfigError;
use thiserror::Error;

/// Errors that abort filtering for the current request.
///
/// Callers must treat any of these as "release nothing".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The engine or one of its components is not usable.
    #[error("Filter configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A value-level predicate could not be evaluated.
    #[error("Matcher '{matcher_id}' failed on attribute '{attribute_id}': {message}")]
    Predicate {
        matcher_id: String,
        attribute_id: String,
        message: String,
    },
}

impl FilterError {
    /// Create a new `Predicate` error.
    #[must_use]
    pub fn predicate(
        matcher_id: impl Into<String>,
        attribute_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Predicate {
            matcher_id: matcher_id.into(),
            attribute_id: attribute_id.into(),
            message: message.into(),
        }
    }
}

/// Failure raised by a custom predicate implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PredicateError {
    pub message: String,
}

impl PredicateError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result alias for filtering operations.
pub type FilterResult<T> = Result<T, FilterError>;
