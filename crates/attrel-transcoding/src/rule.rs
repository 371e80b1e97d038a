//! Transcoding rules.
//!
//! A [`TranscodingRule`] is an immutable property bag binding an internal
//! attribute id to a transcoder for one wire type, plus whatever
//! protocol-specific properties that transcoder consumes.
//!
//! # Well-known properties
//!
//! | Name | Meaning |
//! |------|---------|
//! | `id` | internal attribute id (required) |
//! | `name` | wire name / canonical name |
//! | `namespace` | wire namespace or name format |
//! | `friendlyName` | human-readable wire name |
//! | `encodeType` | value encoding flag |
//! | `scopeDelimiter` | delimiter for scoped values |
//!
//! The activation condition is held in a typed slot rather than the bag.

use std::any::{Any, TypeId, type_name};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use attrel_core::{ConfigError, RequestFacts};
use serde::{Deserialize, Serialize};

use crate::transcoder::AttributeTranscoder;

/// Well-known property names.
pub mod names {
    pub const ATTRIBUTE_ID: &str = "id";
    pub const NAME: &str = "name";
    pub const NAMESPACE: &str = "namespace";
    pub const FRIENDLY_NAME: &str = "friendlyName";
    pub const ENCODE_TYPE: &str = "encodeType";
    pub const SCOPE_DELIMITER: &str = "scopeDelimiter";
    pub const ACTIVATION_CONDITION: &str = "activationCondition";
}

// =============================================================================
// Properties
// =============================================================================

/// A rule property value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    String(String),
    List(Vec<String>),
}

impl PropertyValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Booleans, or the strings `"true"` / `"false"`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Self::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Property bag of a transcoding rule.
pub type Properties = BTreeMap<String, PropertyValue>;

// =============================================================================
// Activation Condition
// =============================================================================

type ConditionFn = dyn Fn(&RequestFacts) -> bool + Send + Sync;

/// Named predicate gating whether a rule applies to a request.
///
/// Conditions compare by id.
#[derive(Clone)]
pub struct ActivationCondition {
    id: String,
    test: Arc<ConditionFn>,
}

impl ActivationCondition {
    pub fn new(
        id: impl Into<String>,
        test: impl Fn(&RequestFacts) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            test: Arc::new(test),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn test(&self, facts: &RequestFacts) -> bool {
        (self.test)(facts)
    }
}

impl fmt::Debug for ActivationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActivationCondition").field(&self.id).finish()
    }
}

impl PartialEq for ActivationCondition {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ActivationCondition {}

impl Hash for ActivationCondition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// =============================================================================
// Transcoder Reference
// =============================================================================

/// Type-erased view of an `Arc<dyn AttributeTranscoder<T>>`.
trait ErasedTranscoder: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn eq_erased(&self, other: &dyn ErasedTranscoder) -> bool;
    fn hash_erased(&self, state: &mut dyn Hasher);
    fn encoded_name(&self, rule: &TranscodingRule) -> Option<String>;
    fn fmt_erased(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

struct Typed<T: 'static>(Arc<dyn AttributeTranscoder<T>>);

impl<T: 'static> ErasedTranscoder for Typed<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_erased(&self, other: &dyn ErasedTranscoder) -> bool {
        other
            .as_any()
            .downcast_ref::<Typed<T>>()
            .is_some_and(|other| self.0.dyn_eq((*other.0).as_any()))
    }

    fn hash_erased(&self, state: &mut dyn Hasher) {
        self.0.dyn_hash(state);
    }

    fn encoded_name(&self, rule: &TranscodingRule) -> Option<String> {
        self.0.encoded_name(rule)
    }

    fn fmt_erased(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Handle to a transcoder for some wire type.
#[derive(Clone)]
pub struct TranscoderRef {
    wire_type: TypeId,
    wire_type_name: &'static str,
    inner: Arc<dyn ErasedTranscoder>,
}

impl TranscoderRef {
    #[must_use]
    pub fn new<T: 'static>(transcoder: Arc<dyn AttributeTranscoder<T>>) -> Self {
        Self {
            wire_type: TypeId::of::<T>(),
            wire_type_name: type_name::<T>(),
            inner: Arc::new(Typed(transcoder)),
        }
    }

    #[must_use]
    pub fn wire_type(&self) -> TypeId {
        self.wire_type
    }

    #[must_use]
    pub fn wire_type_name(&self) -> &'static str {
        self.wire_type_name
    }

    /// Recover the typed transcoder, if it produces `T`.
    #[must_use]
    pub fn transcoder<T: 'static>(&self) -> Option<Arc<dyn AttributeTranscoder<T>>> {
        self.inner
            .as_any()
            .downcast_ref::<Typed<T>>()
            .map(|typed| Arc::clone(&typed.0))
    }

    fn encoded_name(&self, rule: &TranscodingRule) -> Option<String> {
        self.inner.encoded_name(rule)
    }
}

impl fmt::Debug for TranscoderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt_erased(f)
    }
}

impl PartialEq for TranscoderRef {
    fn eq(&self, other: &Self) -> bool {
        self.wire_type == other.wire_type && self.inner.eq_erased(&*other.inner)
    }
}

impl Eq for TranscoderRef {}

impl Hash for TranscoderRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.wire_type.hash(state);
        self.inner.hash_erased(state);
    }
}

// =============================================================================
// Transcoding Rule
// =============================================================================

/// Immutable mapping from an attribute to a transcoder and its properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranscodingRule {
    properties: Properties,
    transcoder: TranscoderRef,
    activation_condition: Option<ActivationCondition>,
}

impl TranscodingRule {
    /// Rule for `attribute_id` using a typed transcoder.
    #[must_use]
    pub fn new<T: 'static>(
        attribute_id: impl Into<String>,
        transcoder: Arc<dyn AttributeTranscoder<T>>,
    ) -> Self {
        let attribute_id: String = attribute_id.into();
        Self::from_properties(TranscoderRef::new(transcoder), Properties::new())
            .with_property(names::ATTRIBUTE_ID, attribute_id)
    }

    #[must_use]
    pub fn from_properties(transcoder: TranscoderRef, properties: Properties) -> Self {
        Self {
            properties,
            transcoder,
            activation_condition: None,
        }
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_activation_condition(mut self, condition: ActivationCondition) -> Self {
        self.activation_condition = Some(condition);
        self
    }

    /// Internal attribute id, if set and non-empty.
    #[must_use]
    pub fn attribute_id(&self) -> Option<&str> {
        self.string(names::ATTRIBUTE_ID)
            .filter(|id| !id.trim().is_empty())
    }

    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        self.property(name).and_then(PropertyValue::as_str)
    }

    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.property(name).and_then(PropertyValue::as_bool)
    }

    /// A string property that must be present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` naming the property.
    pub fn require_string(&self, name: &str) -> Result<&str, ConfigError> {
        self.string(name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::missing(format!("transcoding property '{name}'")))
    }

    #[must_use]
    pub fn transcoder_ref(&self) -> &TranscoderRef {
        &self.transcoder
    }

    /// The typed transcoder, if this rule targets `T`.
    #[must_use]
    pub fn transcoder<T: 'static>(&self) -> Option<Arc<dyn AttributeTranscoder<T>>> {
        self.transcoder.transcoder::<T>()
    }

    #[must_use]
    pub fn activation_condition(&self) -> Option<&ActivationCondition> {
        self.activation_condition.as_ref()
    }

    /// Canonical name this rule is indexed under for decoding.
    #[must_use]
    pub fn encoded_name(&self) -> Option<String> {
        self.transcoder
            .encoded_name(self)
            .filter(|name| !name.is_empty())
    }
}
