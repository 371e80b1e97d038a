//! Reference transcoders for JSON claims.
//!
//! A [`Claim`] is a named JSON value, the shape token-based protocols use for
//! released attributes. Each transcoder reads the claim name from the rule's
//! `name` property, which is also the canonical name used for decode lookup.
//!
//! | Transcoder | Encodes | Claim value |
//! |------------|---------|-------------|
//! | [`StringClaimTranscoder`] | string, scoped, localized | JSON string |
//! | [`ScopedClaimTranscoder`] | scoped | `"value<delimiter>scope"` |
//! | [`BinaryClaimTranscoder`] | binary | base64 string (`encodeType`: `base64` or `base64url`) |

use attrel_core::{Attribute, AttributeValue, RequestFacts};
use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DecodingError, EncodingError};
use crate::rule::{TranscodingRule, names};
use crate::transcoder::AttributeTranscoder;
use crate::type_info::TypeInfo;

const DEFAULT_SCOPE_DELIMITER: &str = "@";

/// A named JSON claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub name: String,
    pub value: Value,
}

impl Claim {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Registration for the claim wire type. The canonical name is the claim name.
#[must_use]
pub fn type_info() -> TypeInfo {
    TypeInfo::new::<Claim>(|claim| Some(claim.name.clone()))
}

fn claim_name(rule: &TranscodingRule) -> Result<&str, EncodingError> {
    Ok(rule.require_string(names::NAME)?)
}

fn scope_delimiter(rule: &TranscodingRule) -> &str {
    rule.string(names::SCOPE_DELIMITER)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_SCOPE_DELIMITER)
}

/// The claim's string value, or `None` if the claim is not a string.
fn string_value(claim: &Claim) -> Option<&str> {
    claim.value.as_str()
}

// =============================================================================
// String Claims
// =============================================================================

/// Plain string claims.
///
/// Scoped and localized values are flattened to a string, which loses the
/// scope or locale structure on the way back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StringClaimTranscoder;

impl AttributeTranscoder<Claim> for StringClaimTranscoder {
    fn can_encode_value(&self, _attribute: &Attribute, value: &AttributeValue) -> bool {
        matches!(
            value,
            AttributeValue::String { .. }
                | AttributeValue::Scoped { .. }
                | AttributeValue::Localized { .. }
        )
    }

    fn encode(
        &self,
        _facts: &RequestFacts,
        attribute: &Attribute,
        rule: &TranscodingRule,
        value: &AttributeValue,
    ) -> Result<Claim, EncodingError> {
        let name = claim_name(rule)?;
        let encoded = match value {
            AttributeValue::String { value } => value.clone(),
            AttributeValue::Scoped { value, scope } => {
                tracing::warn!(
                    attribute_id = %attribute.id(),
                    claim = %name,
                    "Scoped value encoded as a plain string, scope structure is lost"
                );
                format!("{value}{}{scope}", scope_delimiter(rule))
            }
            AttributeValue::Localized { value, locale } => {
                tracing::warn!(
                    attribute_id = %attribute.id(),
                    claim = %name,
                    locale = %locale,
                    "Localized value encoded as a plain string, locale is lost"
                );
                value.clone()
            }
            other => {
                return Err(EncodingError::unsupported_value(
                    attribute.id(),
                    other.kind_name(),
                ));
            }
        };
        Ok(Claim::new(name, encoded))
    }

    fn decode(
        &self,
        _facts: &RequestFacts,
        object: &Claim,
        _rule: &TranscodingRule,
    ) -> Result<Option<AttributeValue>, DecodingError> {
        Ok(string_value(object).map(AttributeValue::string))
    }

    fn encoded_name(&self, rule: &TranscodingRule) -> Option<String> {
        rule.string(names::NAME).map(str::to_string)
    }
}

// =============================================================================
// Scoped Claims
// =============================================================================

/// Scoped string claims, `value@scope` by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ScopedClaimTranscoder;

impl AttributeTranscoder<Claim> for ScopedClaimTranscoder {
    fn can_encode_value(&self, _attribute: &Attribute, value: &AttributeValue) -> bool {
        matches!(value, AttributeValue::Scoped { .. })
    }

    fn encode(
        &self,
        _facts: &RequestFacts,
        attribute: &Attribute,
        rule: &TranscodingRule,
        value: &AttributeValue,
    ) -> Result<Claim, EncodingError> {
        let name = claim_name(rule)?;
        match value {
            AttributeValue::Scoped { value, scope } => Ok(Claim::new(
                name,
                format!("{value}{}{scope}", scope_delimiter(rule)),
            )),
            other => Err(EncodingError::unsupported_value(
                attribute.id(),
                other.kind_name(),
            )),
        }
    }

    fn decode(
        &self,
        _facts: &RequestFacts,
        object: &Claim,
        rule: &TranscodingRule,
    ) -> Result<Option<AttributeValue>, DecodingError> {
        let Some(raw) = string_value(object) else {
            return Ok(None);
        };
        let delimiter = scope_delimiter(rule);

        match raw.rsplit_once(delimiter) {
            Some((value, scope)) if !value.is_empty() && !scope.is_empty() => {
                Ok(Some(AttributeValue::scoped(value, scope)))
            }
            _ => {
                tracing::debug!(
                    claim = %object.name,
                    delimiter = %delimiter,
                    "Claim value is not scoped, ignoring"
                );
                Ok(None)
            }
        }
    }

    fn encoded_name(&self, rule: &TranscodingRule) -> Option<String> {
        rule.string(names::NAME).map(str::to_string)
    }
}

// =============================================================================
// Binary Claims
// =============================================================================

/// Binary claims carried as base64 text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BinaryClaimTranscoder;

#[derive(Debug, Clone, Copy)]
enum Alphabet {
    Standard,
    UrlSafe,
}

impl Alphabet {
    fn from_rule(rule: &TranscodingRule) -> Result<Self, String> {
        match rule.string(names::ENCODE_TYPE) {
            None | Some("base64") => Ok(Self::Standard),
            Some("base64url") => Ok(Self::UrlSafe),
            Some(other) => Err(format!("unsupported binary encoding '{other}'")),
        }
    }

    fn encode(self, data: &[u8]) -> String {
        match self {
            Self::Standard => STANDARD.encode(data),
            Self::UrlSafe => URL_SAFE_NO_PAD.encode(data),
        }
    }

    fn decode(self, text: &str) -> Result<Vec<u8>, base64::DecodeError> {
        match self {
            Self::Standard => STANDARD.decode(text),
            Self::UrlSafe => URL_SAFE_NO_PAD.decode(text),
        }
    }
}

impl AttributeTranscoder<Claim> for BinaryClaimTranscoder {
    fn can_encode_value(&self, _attribute: &Attribute, value: &AttributeValue) -> bool {
        matches!(value, AttributeValue::Binary { .. })
    }

    fn encode(
        &self,
        _facts: &RequestFacts,
        attribute: &Attribute,
        rule: &TranscodingRule,
        value: &AttributeValue,
    ) -> Result<Claim, EncodingError> {
        let name = claim_name(rule)?;
        let alphabet = Alphabet::from_rule(rule)
            .map_err(|message| EncodingError::invalid_property(names::ENCODE_TYPE, message))?;

        match value {
            AttributeValue::Binary { data } => Ok(Claim::new(name, alphabet.encode(data))),
            other => Err(EncodingError::unsupported_value(
                attribute.id(),
                other.kind_name(),
            )),
        }
    }

    fn decode(
        &self,
        _facts: &RequestFacts,
        object: &Claim,
        rule: &TranscodingRule,
    ) -> Result<Option<AttributeValue>, DecodingError> {
        let Some(text) = string_value(object) else {
            return Ok(None);
        };
        let alphabet = Alphabet::from_rule(rule)
            .map_err(|message| DecodingError::invalid_property(names::ENCODE_TYPE, message))?;

        alphabet
            .decode(text)
            .map(|data| Some(AttributeValue::binary(data)))
            .map_err(|e| DecodingError::malformed(&object.name, e.to_string()))
    }

    fn encoded_name(&self, rule: &TranscodingRule) -> Option<String> {
        rule.string(names::NAME).map(str::to_string)
    }
}
