//! Encode and decode through the registry.
//!
//! The registry only returns candidate rules. These helpers apply them:
//!
//! - [`encode_first`] - the first active rule that encodes at least one value wins
//! - [`encode_all`] - every active rule contributes
//! - [`decode`] - every decoder rule for the object contributes, merged per attribute
//!
//! Failures scoped to one value (an unsupported type, a malformed object)
//! are logged and skipped. Only errors that make the call itself unusable
//! are returned.

use std::any::{Any, type_name};
use std::sync::Arc;

use attrel_core::{Attribute, RequestFacts};
use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::error::{DecodingError, TranscodingError, TranscodingResult};
use crate::registry::AttributeTranscoderRegistry;
use crate::rule::TranscodingRule;
use crate::transcoder::AttributeTranscoder;

fn typed<T: Any>(
    rule: &TranscodingRule,
    attribute_id: &str,
) -> TranscodingResult<Arc<dyn AttributeTranscoder<T>>> {
    rule.transcoder::<T>()
        .ok_or_else(|| TranscodingError::WireTypeMismatch {
            attribute_id: attribute_id.to_string(),
            wire_type: type_name::<T>(),
        })
}

fn encode_values<T: Any>(
    transcoder: &dyn AttributeTranscoder<T>,
    rule: &TranscodingRule,
    facts: &RequestFacts,
    attribute: &Attribute,
) -> Vec<T> {
    let mut encoded = Vec::with_capacity(attribute.values().len());

    for value in attribute.values() {
        if !transcoder.can_encode_value(attribute, value) {
            tracing::debug!(
                attribute_id = %attribute.id(),
                kind = %value.kind_name(),
                "Transcoder does not support value type, skipping"
            );
            continue;
        }
        match transcoder.encode(facts, attribute, rule, value) {
            Ok(object) => encoded.push(object),
            Err(e) => {
                tracing::warn!(
                    attribute_id = %attribute.id(),
                    error = %e,
                    "Failed to encode attribute value"
                );
            }
        }
    }

    encoded
}

/// Encode with the first active rule that produces at least one object.
///
/// # Errors
///
/// Returns `TranscodingError::WireTypeMismatch` if a registered rule does not
/// produce `T`.
pub fn encode_first<T: Any>(
    registry: &AttributeTranscoderRegistry,
    facts: &RequestFacts,
    attribute: &Attribute,
) -> TranscodingResult<Vec<T>> {
    for rule in registry.get_encoders::<T>(attribute) {
        let transcoder = typed::<T>(rule, attribute.id())?;
        if !transcoder.activation_condition(facts, rule) {
            tracing::debug!(attribute_id = %attribute.id(), "Transcoding rule inactive");
            continue;
        }

        let encoded = encode_values(transcoder.as_ref(), rule, facts, attribute);
        if !encoded.is_empty() {
            return Ok(encoded);
        }
    }

    tracing::debug!(attribute_id = %attribute.id(), "No transcoding rule encoded the attribute");
    Ok(Vec::new())
}

/// Encode with every active rule, in registration order.
///
/// # Errors
///
/// Returns `TranscodingError::WireTypeMismatch` if a registered rule does not
/// produce `T`.
pub fn encode_all<T: Any>(
    registry: &AttributeTranscoderRegistry,
    facts: &RequestFacts,
    attribute: &Attribute,
) -> TranscodingResult<Vec<T>> {
    let mut encoded = Vec::new();

    for rule in registry.get_encoders::<T>(attribute) {
        let transcoder = typed::<T>(rule, attribute.id())?;
        if !transcoder.activation_condition(facts, rule) {
            tracing::debug!(attribute_id = %attribute.id(), "Transcoding rule inactive");
            continue;
        }
        encoded.extend(encode_values(transcoder.as_ref(), rule, facts, attribute));
    }

    Ok(encoded)
}

/// Decode a wire object with every matching rule.
///
/// Values decoded for the same attribute id are merged and deduplicated.
/// With `strict`, an object no rule could decode is an error; otherwise it
/// is logged and yields nothing.
///
/// # Errors
///
/// Returns `DecodingError::Unmatched` (strict only) and
/// `TranscodingError::WireTypeMismatch` for a misregistered rule.
pub fn decode<T: Any>(
    registry: &AttributeTranscoderRegistry,
    facts: &RequestFacts,
    object: &T,
    strict: bool,
) -> TranscodingResult<Vec<Attribute>> {
    let mut decoded: IndexMap<String, Attribute> = IndexMap::new();

    for rule in registry.get_decoders(object) {
        let Some(attribute_id) = rule.attribute_id() else {
            continue;
        };
        let transcoder = typed::<T>(rule, attribute_id)?;
        if !transcoder.activation_condition(facts, rule) {
            continue;
        }

        let value = match transcoder.decode(facts, object, rule) {
            Ok(Some(value)) => value,
            Ok(None) => {
                tracing::debug!(attribute_id = %attribute_id, "Decoder did not recognize object");
                continue;
            }
            Err(e) => {
                tracing::warn!(attribute_id = %attribute_id, error = %e, "Failed to decode wire object");
                continue;
            }
        };

        let attribute = match decoded.entry(attribute_id.to_string()) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => slot.insert(Attribute::new(attribute_id)?),
        };
        attribute.push_value(value);
    }

    if decoded.is_empty() {
        let name = registry.canonical_name(object).unwrap_or_default();
        if strict {
            return Err(DecodingError::Unmatched { name }.into());
        }
        tracing::warn!(name = %name, "No transcoding rule decoded wire object");
    }

    Ok(decoded.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{self, BinaryClaimTranscoder, Claim, ScopedClaimTranscoder, StringClaimTranscoder};
    use crate::rule::{ActivationCondition, names};
    use attrel_core::AttributeValue;

    fn registry() -> AttributeTranscoderRegistry {
        AttributeTranscoderRegistry::builder()
            .register_type(claims::type_info())
            .with_rule(
                TranscodingRule::new::<Claim>("affiliation", Arc::new(ScopedClaimTranscoder))
                    .with_property(names::NAME, "affiliation"),
            )
            .with_rule(
                TranscodingRule::new::<Claim>("affiliation", Arc::new(StringClaimTranscoder))
                    .with_property(names::NAME, "affiliation_flat"),
            )
            .with_rule(
                TranscodingRule::new::<Claim>("mail", Arc::new(StringClaimTranscoder))
                    .with_property(names::NAME, "email")
                    .with_activation_condition(ActivationCondition::new("sp-only", |facts| {
                        facts.requester() == Some("https://sp.example.org")
                    })),
            )
            .with_rule(
                TranscodingRule::new::<Claim>("mailAlias", Arc::new(StringClaimTranscoder))
                    .with_property(names::NAME, "email"),
            )
            .with_rule(
                TranscodingRule::new::<Claim>("cert", Arc::new(BinaryClaimTranscoder))
                    .with_property(names::NAME, "cert"),
            )
            .build()
            .unwrap()
    }

    fn sp() -> RequestFacts {
        RequestFacts::builder().requester("https://sp.example.org").build()
    }

    fn affiliation() -> Attribute {
        Attribute::new("affiliation").unwrap().with_values([
            AttributeValue::scoped("staff", "example.org"),
            AttributeValue::string("unscoped"),
        ])
    }

    #[test]
    fn test_encode_first_uses_first_productive_rule() {
        let claims = encode_first::<Claim>(&registry(), &sp(), &affiliation()).unwrap();
        // The scoped transcoder skips the plain string value.
        assert_eq!(claims, [Claim::new("affiliation", "staff@example.org")]);
    }

    #[test]
    fn test_encode_all_aggregates_rules() {
        let claims = encode_all::<Claim>(&registry(), &sp(), &affiliation()).unwrap();
        assert_eq!(
            claims,
            [
                Claim::new("affiliation", "staff@example.org"),
                Claim::new("affiliation_flat", "staff@example.org"),
                Claim::new("affiliation_flat", "unscoped"),
            ]
        );
    }

    #[test]
    fn test_activation_condition_gates_rule() {
        let mail = Attribute::new("mail")
            .unwrap()
            .with_values([AttributeValue::string("a@example.org")]);

        assert_eq!(encode_all::<Claim>(&registry(), &sp(), &mail).unwrap().len(), 1);

        let other = RequestFacts::builder().requester("https://other.example.net").build();
        assert!(encode_all::<Claim>(&registry(), &other, &mail).unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_values_are_skipped() {
        let cert = Attribute::new("cert").unwrap().with_values([
            AttributeValue::string("not binary"),
            AttributeValue::binary(vec![1, 2, 3]),
        ]);
        let claims = encode_all::<Claim>(&registry(), &sp(), &cert).unwrap();
        assert_eq!(claims, [Claim::new("cert", "AQID")]);
    }

    #[test]
    fn test_decode_merges_matching_rules() {
        let claim = Claim::new("email", "a@example.org");

        let attributes = decode(&registry(), &sp(), &claim, false).unwrap();
        let ids: Vec<_> = attributes.iter().map(Attribute::id).collect();
        assert_eq!(ids, ["mail", "mailAlias"]);

        // The gated rule does not apply to other requesters.
        let other = RequestFacts::builder().requester("https://other.example.net").build();
        let attributes = decode(&registry(), &other, &claim, false).unwrap();
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].id(), "mailAlias");
    }

    #[test]
    fn test_round_trip_through_registry() {
        let registry = registry();
        let cert = Attribute::new("cert")
            .unwrap()
            .with_values([AttributeValue::binary(vec![0, 255, 7])]);

        let claims = encode_first::<Claim>(&registry, &sp(), &cert).unwrap();
        let decoded = decode(&registry, &sp(), &claims[0], true).unwrap();
        assert_eq!(decoded, [cert]);
    }

    #[test]
    fn test_unmatched_decode_is_lenient_by_default() {
        let claim = Claim::new("unknown", "x");
        assert!(decode(&registry(), &sp(), &claim, false).unwrap().is_empty());

        let err = decode(&registry(), &sp(), &claim, true).unwrap_err();
        assert_eq!(
            err,
            TranscodingError::Decoding(DecodingError::Unmatched {
                name: "unknown".to_string()
            })
        );
    }

    #[test]
    fn test_unrecognized_object_counts_as_unmatched() {
        // Registered name, but the scoped decoder does not understand the value.
        let claim = Claim::new("affiliation", "no scope here");
        assert!(decode(&registry(), &sp(), &claim, false).unwrap().is_empty());
        assert!(decode(&registry(), &sp(), &claim, true).is_err());
    }

    #[test]
    fn test_unregistered_wire_type() {
        assert!(encode_all::<String>(&registry(), &sp(), &affiliation()).unwrap().is_empty());
        assert!(decode(&registry(), &sp(), &"email".to_string(), false).unwrap().is_empty());
    }
}
