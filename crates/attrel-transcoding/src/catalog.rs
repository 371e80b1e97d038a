//! Named transcoders and conditions for declarative rule sets.
//!
//! Rule definitions are plain property bags naming a transcoder:
//!
//! ```json
//! { "transcoder": "scoped-claim", "id": "affiliation", "name": "affiliation" }
//! ```
//!
//! The catalog resolves those names to transcoder instances. An
//! `activationCondition` property is resolved against the catalog's named
//! conditions and removed from the bag.

use std::collections::HashMap;
use std::sync::Arc;

use attrel_core::ConfigError;
use serde::{Deserialize, Serialize};

use crate::claims::{BinaryClaimTranscoder, ScopedClaimTranscoder, StringClaimTranscoder};
use crate::rule::{ActivationCondition, Properties, TranscoderRef, TranscodingRule, names};
use crate::transcoder::AttributeTranscoder;

/// Declarative form of a [`TranscodingRule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodingRuleDefinition {
    /// Name under which the transcoder is registered in the catalog.
    pub transcoder: String,
    #[serde(flatten)]
    pub properties: Properties,
}

/// Transcoders and activation conditions addressable by name.
#[derive(Debug, Default, Clone)]
pub struct TranscoderCatalog {
    transcoders: HashMap<String, TranscoderRef>,
    conditions: HashMap<String, ActivationCondition>,
}

impl TranscoderCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the bundled claim transcoders registered as
    /// `string-claim`, `scoped-claim` and `binary-claim`.
    #[must_use]
    pub fn with_claims() -> Self {
        Self::new()
            .register("string-claim", Arc::new(StringClaimTranscoder))
            .register("scoped-claim", Arc::new(ScopedClaimTranscoder))
            .register("binary-claim", Arc::new(BinaryClaimTranscoder))
    }

    /// Register a transcoder. A later registration under the same name wins.
    #[must_use]
    pub fn register<T: 'static>(
        mut self,
        name: impl Into<String>,
        transcoder: Arc<dyn AttributeTranscoder<T>>,
    ) -> Self {
        self.transcoders
            .insert(name.into(), TranscoderRef::new(transcoder));
        self
    }

    /// Register an activation condition under its id.
    #[must_use]
    pub fn register_condition(mut self, condition: ActivationCondition) -> Self {
        self.conditions
            .insert(condition.id().to_string(), condition);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TranscoderRef> {
        self.transcoders.get(name)
    }

    #[must_use]
    pub fn condition(&self, id: &str) -> Option<&ActivationCondition> {
        self.conditions.get(id)
    }

    /// Resolve one definition.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an unknown transcoder name or a
    /// non-string condition reference, and `ConfigError::Missing` for an
    /// unknown condition id.
    pub fn build_rule(
        &self,
        definition: &TranscodingRuleDefinition,
    ) -> Result<TranscodingRule, ConfigError> {
        let transcoder = self.get(&definition.transcoder).ok_or_else(|| {
            ConfigError::invalid_value(format!(
                "unknown transcoder '{}'",
                definition.transcoder
            ))
        })?;

        let mut properties = definition.properties.clone();
        let condition = match properties.remove(names::ACTIVATION_CONDITION) {
            None => None,
            Some(reference) => {
                let id = reference.as_str().ok_or_else(|| {
                    ConfigError::invalid_value(format!(
                        "'{}' must name a registered condition",
                        names::ACTIVATION_CONDITION
                    ))
                })?;
                let condition = self
                    .condition(id)
                    .ok_or_else(|| ConfigError::missing(format!("activation condition '{id}'")))?;
                Some(condition.clone())
            }
        };

        let rule = TranscodingRule::from_properties(transcoder.clone(), properties);
        Ok(match condition {
            Some(condition) => rule.with_activation_condition(condition),
            None => rule,
        })
    }

    /// Resolve every definition, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// See [`build_rule`](Self::build_rule).
    pub fn build_rules(
        &self,
        definitions: &[TranscodingRuleDefinition],
    ) -> Result<Vec<TranscodingRule>, ConfigError> {
        definitions.iter().map(|d| self.build_rule(d)).collect()
    }
}
