//! Built-in per-value conditions.

use attrel_core::AttributeValue;

use crate::pattern::{Pattern, StringMatch};

/// A condition tested against each value of an attribute.
///
/// Conditions over the string form apply to string-like values (string,
/// scoped, localized). Other value types never match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueCondition {
    /// Every value.
    Any,
    /// The string form (the value part for scoped values) equals a string.
    Value(StringMatch),
    /// The scope of a scoped value equals a string.
    Scope(StringMatch),
    /// The string form matches a pattern.
    ValueRegex(Pattern),
    /// The scope of a scoped value matches a pattern.
    ScopeRegex(Pattern),
    /// Structural equality with a given value.
    Exact(AttributeValue),
}

impl ValueCondition {
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Value(_) => "value",
            Self::Scope(_) => "scope",
            Self::ValueRegex(_) => "value-regex",
            Self::ScopeRegex(_) => "scope-regex",
            Self::Exact(_) => "exact",
        }
    }

    #[must_use]
    pub fn test(&self, value: &AttributeValue) -> bool {
        match self {
            Self::Any => true,
            Self::Value(m) => value.display_value().is_some_and(|v| m.matches(v)),
            Self::Scope(m) => value.scope().is_some_and(|s| m.matches(s)),
            Self::ValueRegex(p) => value.display_value().is_some_and(|v| p.is_match(v)),
            Self::ScopeRegex(p) => value.scope().is_some_and(|s| p.is_match(s)),
            Self::Exact(expected) => expected == value,
        }
    }
}
