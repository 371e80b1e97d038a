//! Configuration error types shared by every attribute release component.
//!
//! Configuration errors are raised on the build/reload path only. Request-time
//! evaluation never produces one.

use thiserror::Error;

/// Errors raised while building, initializing, or validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// A composite (AND/OR) was built without children.
    #[error("Composite '{component}' requires at least one child")]
    EmptyComposition { component: String },

    /// A component was modified after it was initialized.
    #[error("Component '{component}' is initialized and can no longer be modified")]
    Immutable { component: String },

    /// A component was used before it was initialized.
    #[error("Component '{component}' has not been initialized")]
    NotInitialized { component: String },

    /// A component was used after it was destroyed.
    #[error("Component '{component}' has been destroyed")]
    Destroyed { component: String },

    /// A regular expression failed to compile.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A wire type was referenced without a registered type descriptor.
    #[error("No type information registered for wire type {0}")]
    UnregisteredType(String),

    /// Two components were configured with the same identifier.
    #[error("Duplicate identifier: {0}")]
    DuplicateId(String),

    /// One or more policies failed validation.
    #[error("Invalid policies: {}", .policy_ids.join(", "))]
    InvalidPolicies {
        /// Identifiers of every policy that failed validation.
        policy_ids: Vec<String>,
        /// The individual failures, in policy order.
        causes: Vec<ConfigError>,
    },
}

impl ConfigError {
    /// Create a new `InvalidValue` error.
    #[must_use]
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }

    /// Create a new `Missing` error.
    #[must_use]
    pub fn missing(name: impl Into<String>) -> Self {
        Self::Missing(name.into())
    }

    /// Create a new `EmptyComposition` error.
    #[must_use]
    pub fn empty_composition(component: impl Into<String>) -> Self {
        Self::EmptyComposition {
            component: component.into(),
        }
    }

    /// Create a new `Immutable` error.
    #[must_use]
    pub fn immutable(component: impl Into<String>) -> Self {
        Self::Immutable {
            component: component.into(),
        }
    }

    /// Create a new `InvalidPattern` error from a regex failure.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.to_string(),
        }
    }
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid_value("bad");
        assert_eq!(err.to_string(), "Invalid configuration value: bad");

        let err = ConfigError::missing("id");
        assert_eq!(err.to_string(), "Missing required configuration: id");

        let err = ConfigError::empty_composition("and-1");
        assert!(err.to_string().contains("and-1"));
    }

    #[test]
    fn test_invalid_policies_lists_every_id() {
        let err = ConfigError::InvalidPolicies {
            policy_ids: vec!["p1".to_string(), "p3".to_string()],
            causes: vec![
                ConfigError::missing("x"),
                ConfigError::empty_composition("y"),
            ],
        };
        assert_eq!(err.to_string(), "Invalid policies: p1, p3");
    }
}
