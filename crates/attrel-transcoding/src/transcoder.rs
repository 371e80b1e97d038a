//! The transcoder contract.
//!
//! An [`AttributeTranscoder<T>`] converts one attribute value to and from one
//! wire object of type `T`. Transcoders run concurrently on the request path:
//! they must not hold per-call mutable state, and they must be `Eq + Hash`
//! so repeated configuration deduplicates.
//!
//! ```ignore
//! #[derive(Debug, PartialEq, Eq, Hash)]
//! struct UpperCaseClaim;
//!
//! impl AttributeTranscoder<Claim> for UpperCaseClaim {
//!     fn can_encode_value(&self, _attribute: &Attribute, value: &AttributeValue) -> bool {
//!         matches!(value, AttributeValue::String { .. })
//!     }
//!     // ...
//! }
//! ```

use std::fmt;

use attrel_core::{Attribute, AttributeValue, DynKey, RequestFacts};

use crate::error::{DecodingError, EncodingError};
use crate::rule::TranscodingRule;

/// Stateless codec between attribute values and wire objects of type `T`.
pub trait AttributeTranscoder<T>: DynKey + fmt::Debug {
    /// Whether the rule applies to this request.
    ///
    /// Defaults to the rule's activation condition, or `true` if it has none.
    fn activation_condition(&self, facts: &RequestFacts, rule: &TranscodingRule) -> bool {
        rule.activation_condition()
            .is_none_or(|condition| condition.test(facts))
    }

    /// Whether `value` is of a type this transcoder can encode.
    fn can_encode_value(&self, attribute: &Attribute, value: &AttributeValue) -> bool;

    /// Encode one value into a wire object.
    ///
    /// # Errors
    ///
    /// Returns an `EncodingError` if the value type is unsupported or a
    /// required rule property is missing or malformed.
    fn encode(
        &self,
        facts: &RequestFacts,
        attribute: &Attribute,
        rule: &TranscodingRule,
        value: &AttributeValue,
    ) -> Result<T, EncodingError>;

    /// Decode a wire object into a value.
    ///
    /// Returns `Ok(None)` for an object the transcoder does not understand.
    ///
    /// # Errors
    ///
    /// Returns a `DecodingError` if the object is recognized but malformed.
    fn decode(
        &self,
        facts: &RequestFacts,
        object: &T,
        rule: &TranscodingRule,
    ) -> Result<Option<AttributeValue>, DecodingError>;

    /// Canonical name of the wire objects this rule produces and consumes.
    ///
    /// Must agree with the wire type's naming function. Rules without one
    /// are used for encoding only.
    fn encoded_name(&self, rule: &TranscodingRule) -> Option<String>;
}
