//! Protocol-neutral attribute model.
//!
//! An [`Attribute`] is an identifier plus an ordered set of typed
//! [`AttributeValue`]s. Values are immutable; duplicate values collapse by
//! equality while preserving first-insertion order.
//!
//! ```
//! use attrel_core::{Attribute, AttributeValue};
//!
//! let mail = Attribute::new("mail")
//!     .unwrap()
//!     .with_values([
//!         AttributeValue::string("a@example.org"),
//!         AttributeValue::string("a@example.org"),
//!     ]);
//!
//! assert_eq!(mail.values().len(), 1);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// =============================================================================
// Attribute Value
// =============================================================================

/// Kind of an empty attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmptyKind {
    /// The source produced a null value.
    Null,
    /// The source produced a zero-length string.
    ZeroLength,
}

/// A single typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AttributeValue {
    /// A plain string.
    String {
        /// The string value.
        value: String,
    },
    /// A string qualified by a security domain, rendered as `value@scope`.
    Scoped {
        /// The unscoped value.
        value: String,
        /// The scope (usually a DNS domain).
        scope: String,
    },
    /// A string tagged with a language.
    Localized {
        /// The string value.
        value: String,
        /// BCP 47 language tag.
        locale: String,
    },
    /// Raw bytes.
    Binary {
        /// The byte content.
        data: Vec<u8>,
    },
    /// An explicitly empty value.
    Empty {
        /// What kind of empty value the source produced.
        kind: EmptyKind,
    },
    /// A value of a kind this model does not interpret.
    Opaque {
        /// Free-form kind label supplied by the producer.
        kind: String,
        /// Serialized content.
        data: String,
    },
}

impl AttributeValue {
    /// Create a plain string value.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::String {
            value: value.into(),
        }
    }

    /// Create a scoped string value.
    #[must_use]
    pub fn scoped(value: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::Scoped {
            value: value.into(),
            scope: scope.into(),
        }
    }

    /// Create a localized string value.
    #[must_use]
    pub fn localized(value: impl Into<String>, locale: impl Into<String>) -> Self {
        Self::Localized {
            value: value.into(),
            locale: locale.into(),
        }
    }

    /// Create a binary value.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::Binary { data: data.into() }
    }

    /// Create an empty value.
    #[must_use]
    pub fn empty(kind: EmptyKind) -> Self {
        Self::Empty { kind }
    }

    /// The string used when matching this value against string rules.
    ///
    /// Scoped values yield the unscoped part. Binary, empty and opaque
    /// values have no string form.
    #[must_use]
    pub fn display_value(&self) -> Option<&str> {
        match self {
            Self::String { value } | Self::Scoped { value, .. } | Self::Localized { value, .. } => {
                Some(value)
            }
            Self::Binary { .. } | Self::Empty { .. } | Self::Opaque { .. } => None,
        }
    }

    /// The scope of a scoped value.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        match self {
            Self::Scoped { scope, .. } => Some(scope),
            _ => None,
        }
    }

    /// Short name of the value's variant for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::String { .. } => "string",
            Self::Scoped { .. } => "scoped",
            Self::Localized { .. } => "localized",
            Self::Binary { .. } => "binary",
            Self::Empty { .. } => "empty",
            Self::Opaque { .. } => "opaque",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String { value } => f.write_str(value),
            Self::Scoped { value, scope } => write!(f, "{value}@{scope}"),
            Self::Localized { value, locale } => write!(f, "{value} [{locale}]"),
            Self::Binary { data } => write!(f, "<{} bytes>", data.len()),
            Self::Empty { kind: EmptyKind::Null } => f.write_str("<null>"),
            Self::Empty {
                kind: EmptyKind::ZeroLength,
            } => f.write_str("<empty>"),
            Self::Opaque { kind, .. } => write!(f, "<{kind}>"),
        }
    }
}

// =============================================================================
// Attribute
// =============================================================================

/// A named, protocol-neutral collection of values describing a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    id: String,

    /// Human-readable names keyed by language tag.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    display_names: BTreeMap<String, String>,

    /// Human-readable descriptions keyed by language tag.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    display_descriptions: BTreeMap<String, String>,

    #[serde(default)]
    values: IndexSet<AttributeValue>,
}

impl Attribute {
    /// Create an attribute with no values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `id` is empty or whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, ConfigError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ConfigError::missing("attribute id"));
        }
        Ok(Self {
            id,
            display_names: BTreeMap::new(),
            display_descriptions: BTreeMap::new(),
            values: IndexSet::new(),
        })
    }

    /// Add values, collapsing duplicates.
    #[must_use]
    pub fn with_values(mut self, values: impl IntoIterator<Item = AttributeValue>) -> Self {
        self.values.extend(values);
        self
    }

    /// Add a display name for a language.
    #[must_use]
    pub fn with_display_name(mut self, locale: impl Into<String>, name: impl Into<String>) -> Self {
        self.display_names.insert(locale.into(), name.into());
        self
    }

    /// Add a display description for a language.
    #[must_use]
    pub fn with_display_description(
        mut self,
        locale: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.display_descriptions
            .insert(locale.into(), description.into());
        self
    }

    /// Append a single value. Returns `false` if it was already present.
    pub fn push_value(&mut self, value: AttributeValue) -> bool {
        self.values.insert(value)
    }

    /// The attribute identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The values in insertion order.
    #[must_use]
    pub fn values(&self) -> &IndexSet<AttributeValue> {
        &self.values
    }

    /// Display names keyed by language tag.
    #[must_use]
    pub fn display_names(&self) -> &BTreeMap<String, String> {
        &self.display_names
    }

    /// Display descriptions keyed by language tag.
    #[must_use]
    pub fn display_descriptions(&self) -> &BTreeMap<String, String> {
        &self.display_descriptions
    }

    /// Returns `true` if the attribute has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Clone this attribute keeping only the values present in `retained`.
    ///
    /// The original ordering is preserved and values not carried by this
    /// attribute are ignored, so the result is always a subset.
    #[must_use]
    pub fn with_retained(&self, retained: &IndexSet<AttributeValue>) -> Self {
        Self {
            id: self.id.clone(),
            display_names: self.display_names.clone(),
            display_descriptions: self.display_descriptions.clone(),
            values: self
                .values
                .iter()
                .filter(|v| retained.contains(*v))
                .cloned()
                .collect(),
        }
    }
}
