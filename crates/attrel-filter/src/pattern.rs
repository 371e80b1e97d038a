//! String and regular-expression comparisons used by built-in rules and matchers.

use std::hash::{Hash, Hasher};

use attrel_core::ConfigError;
use regex::Regex;

/// Literal string comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StringMatch {
    value: String,
    case_sensitive: bool,
}

impl StringMatch {
    /// Case-sensitive comparison against `value`.
    #[must_use]
    pub fn exact(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            case_sensitive: true,
        }
    }

    /// Case-insensitive comparison against `value`.
    #[must_use]
    pub fn ignore_case(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            case_sensitive: false,
        }
    }

    #[must_use]
    pub fn new(value: impl Into<String>, case_sensitive: bool) -> Self {
        Self {
            value: value.into(),
            case_sensitive,
        }
    }

    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        if self.case_sensitive {
            self.value == candidate
        } else {
            self.value.to_lowercase() == candidate.to_lowercase()
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// A compiled regular expression that compares by its source text.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile the pattern.
    ///
    /// The expression is not anchored; use `^...$` to require a full match.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` if the expression does not compile.
    pub fn new(source: impl Into<String>) -> Result<Self, ConfigError> {
        let source = source.into();
        let regex = Regex::new(&source).map_err(|e| ConfigError::invalid_pattern(&source, e))?;
        Ok(Self { source, regex })
    }

    #[must_use]
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl Hash for Pattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}
