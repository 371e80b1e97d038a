//! The attribute transcoder registry.
//!
//! One rule set is indexed twice:
//!
//! ```text
//! encoders: attribute id ──▶ wire type ──▶ [rule, rule, ...]
//! decoders: canonical name ──▶ wire type ──▶ [rule, rule, ...]
//! ```
//!
//! Both maps are built once by [`RegistryBuilder::build`] and never change;
//! lookups are plain reads and may run concurrently without locking. Reload
//! builds a new registry and swaps it in as a whole.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use attrel_core::{Attribute, ConfigError};
use indexmap::IndexSet;

use crate::rule::TranscodingRule;
use crate::type_info::TypeInfo;

type RuleIndex = HashMap<String, HashMap<TypeId, Vec<Arc<TranscodingRule>>>>;

/// Immutable, dual-indexed set of transcoding rules.
#[derive(Debug, Default)]
pub struct AttributeTranscoderRegistry {
    type_infos: HashMap<TypeId, TypeInfo>,
    encoders: RuleIndex,
    decoders: RuleIndex,
    rule_count: usize,
}

impl AttributeTranscoderRegistry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Rules for encoding `attribute` into wire type `T`, in registration order.
    ///
    /// Returns an empty slice if `T` is not registered.
    #[must_use]
    pub fn get_encoders<T: Any>(&self, attribute: &Attribute) -> &[Arc<TranscodingRule>] {
        self.get_encoders_for(attribute, TypeId::of::<T>(), type_name::<T>())
    }

    /// Untyped form of [`get_encoders`](Self::get_encoders).
    #[must_use]
    pub fn get_encoders_for(
        &self,
        attribute: &Attribute,
        wire_type: TypeId,
        wire_type_name: &str,
    ) -> &[Arc<TranscodingRule>] {
        if !self.type_infos.contains_key(&wire_type) {
            tracing::warn!(
                attribute_id = %attribute.id(),
                wire_type = %wire_type_name,
                "No type information registered for wire type"
            );
            return &[];
        }

        lookup(&self.encoders, attribute.id(), wire_type)
    }

    /// Rules for decoding `object`, in registration order.
    ///
    /// Returns an empty slice if the object's type is not registered or the
    /// object has no canonical name.
    #[must_use]
    pub fn get_decoders<T: Any>(&self, object: &T) -> &[Arc<TranscodingRule>] {
        self.get_decoders_dyn(object)
    }

    /// Untyped form of [`get_decoders`](Self::get_decoders).
    #[must_use]
    pub fn get_decoders_dyn(&self, object: &dyn Any) -> &[Arc<TranscodingRule>] {
        let wire_type = (*object).type_id();
        let Some(info) = self.type_infos.get(&wire_type) else {
            tracing::warn!("No type information registered for inbound wire object");
            return &[];
        };

        let Some(name) = info.canonical_name(object) else {
            tracing::warn!(
                wire_type = %info.wire_type_name(),
                "Wire object has no canonical name"
            );
            return &[];
        };

        lookup(&self.decoders, &name, wire_type)
    }

    /// Canonical name of a wire object, if its type is registered.
    #[must_use]
    pub fn canonical_name(&self, object: &dyn Any) -> Option<String> {
        self.type_infos
            .get(&(*object).type_id())
            .and_then(|info| info.canonical_name(object))
    }

    #[must_use]
    pub fn is_registered<T: Any>(&self) -> bool {
        self.type_infos.contains_key(&TypeId::of::<T>())
    }

    /// Number of distinct rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rule_count == 0
    }
}

fn lookup<'a>(index: &'a RuleIndex, key: &str, wire_type: TypeId) -> &'a [Arc<TranscodingRule>] {
    index
        .get(key)
        .and_then(|by_type| by_type.get(&wire_type))
        .map(Vec::as_slice)
        .unwrap_or_default()
}

// =============================================================================
// Builder
// =============================================================================

/// Collects type registrations and rules for one registry generation.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    type_infos: HashMap<TypeId, TypeInfo>,
    rules: Vec<TranscodingRule>,
}

impl RegistryBuilder {
    /// Register a wire type. Registering the same type again replaces it.
    #[must_use]
    pub fn register_type(mut self, info: TypeInfo) -> Self {
        self.type_infos.insert(info.wire_type(), info);
        self
    }

    #[must_use]
    pub fn with_rule(mut self, rule: TranscodingRule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = TranscodingRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Validate the rules and build both indexes.
    ///
    /// Identical rules are kept once, at the position of their first
    /// occurrence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` for a rule without an attribute id and
    /// `ConfigError::UnregisteredType` for a rule whose wire type has no
    /// registered [`TypeInfo`].
    pub fn build(self) -> Result<AttributeTranscoderRegistry, ConfigError> {
        let mut unique: IndexSet<TranscodingRule> = IndexSet::with_capacity(self.rules.len());

        for rule in self.rules {
            if rule.attribute_id().is_none() {
                return Err(ConfigError::missing(format!(
                    "attribute id on transcoding rule {:?}",
                    rule.properties()
                )));
            }
            let transcoder = rule.transcoder_ref();
            if !self.type_infos.contains_key(&transcoder.wire_type()) {
                return Err(ConfigError::UnregisteredType(
                    transcoder.wire_type_name().to_string(),
                ));
            }
            if !unique.insert(rule) {
                tracing::debug!("Dropping duplicate transcoding rule");
            }
        }

        let mut encoders = RuleIndex::new();
        let mut decoders = RuleIndex::new();

        for rule in unique.iter().cloned().map(Arc::new) {
            let wire_type = rule.transcoder_ref().wire_type();
            // Checked above.
            let attribute_id = rule.attribute_id().unwrap_or_default().to_string();

            match rule.encoded_name() {
                Some(name) => {
                    decoders
                        .entry(name)
                        .or_default()
                        .entry(wire_type)
                        .or_default()
                        .push(Arc::clone(&rule));
                }
                None => {
                    tracing::debug!(
                        attribute_id = %attribute_id,
                        wire_type = %rule.transcoder_ref().wire_type_name(),
                        "Transcoding rule has no canonical name, indexed for encoding only"
                    );
                }
            }

            encoders
                .entry(attribute_id)
                .or_default()
                .entry(wire_type)
                .or_default()
                .push(rule);
        }

        tracing::info!(
            rules = unique.len(),
            wire_types = self.type_infos.len(),
            "Attribute transcoder registry built"
        );

        Ok(AttributeTranscoderRegistry {
            type_infos: self.type_infos,
            encoders,
            decoders,
            rule_count: unique.len(),
        })
    }
}
