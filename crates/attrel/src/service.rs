//! Hot-reloadable release service.
//!
//! A [`Generation`] pairs one filtering engine with one transcoder registry.
//! The service holds the current generation behind an `ArcSwap`:
//!
//! ```text
//! request ──snapshot()──▶ Arc<Generation> ──filter──▶ encode_all ──▶ [T]
//!                              ▲
//! reload ──build + validate────┘ (single store, readers never block)
//! ```
//!
//! A request keeps the generation it loaded for its whole lifetime, so it
//! never mixes an old engine with a new registry. A reload that fails to
//! build or validate leaves the running generation in place.

use std::any::Any;
use std::sync::Arc;

use arc_swap::ArcSwap;
use attrel_core::{Attribute, Component, RequestFacts};
use attrel_filter::{AttributeFilteringEngine, DefinitionBuilder, FilterContext, PolicyDefinition};
use attrel_transcoding::{
    AttributeTranscoderRegistry, TranscoderCatalog, TranscodingRuleDefinition, TypeInfo,
    decode, encode_all,
};
use serde::{Deserialize, Serialize};

use crate::config::ReleaseConfig;
use crate::error::ServiceResult;

// =============================================================================
// Generation
// =============================================================================

/// One installed engine and registry.
#[derive(Debug)]
pub struct Generation {
    version: u64,
    engine: Arc<AttributeFilteringEngine>,
    registry: Arc<AttributeTranscoderRegistry>,
}

impl Generation {
    /// Monotonic install counter, starting at 1.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn engine(&self) -> &AttributeFilteringEngine {
        &self.engine
    }

    #[must_use]
    pub fn registry(&self) -> &AttributeTranscoderRegistry {
        &self.registry
    }

    /// Filter the context's attributes and encode the survivors as `T`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Filter` if filtering aborts, in which case
    /// nothing may be released, and `ServiceError::Transcoding` if a rule is
    /// registered for the wrong wire type.
    pub fn release<T: Any>(&self, ctx: &mut FilterContext) -> ServiceResult<Vec<T>> {
        let released = self.engine.filter(ctx)?;

        let mut encoded = Vec::new();
        for attribute in released.values() {
            let objects = encode_all::<T>(&self.registry, ctx.facts(), attribute)?;
            if objects.is_empty() {
                tracing::debug!(
                    generation = self.version,
                    attribute_id = %attribute.id(),
                    "Released attribute has no encoding for wire type"
                );
            }
            encoded.extend(objects);
        }

        Ok(encoded)
    }

    /// Decode an inbound wire object into attributes.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Transcoding` on a strict-mode miss or a
    /// misregistered rule.
    pub fn decode<T: Any>(
        &self,
        facts: &RequestFacts,
        object: &T,
        strict: bool,
    ) -> ServiceResult<Vec<Attribute>> {
        Ok(decode(&self.registry, facts, object, strict)?)
    }
}

// =============================================================================
// Definitions
// =============================================================================

fn default_engine_id() -> String {
    "release".to_string()
}

/// Declarative description of a whole generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseDefinitions {
    #[serde(default = "default_engine_id")]
    pub engine_id: String,
    #[serde(default)]
    pub policies: Vec<PolicyDefinition>,
    #[serde(default)]
    pub transcoding: Vec<TranscodingRuleDefinition>,
}

// =============================================================================
// Service
// =============================================================================

/// Atomically reloadable attribute release.
#[derive(Debug)]
pub struct ReleaseService {
    current: ArcSwap<Generation>,
    config: ReleaseConfig,
}

impl ReleaseService {
    /// Create a service running `engine` and `registry` as generation 1.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Configuration` if the configuration or the
    /// engine fails validation.
    pub fn new(
        config: ReleaseConfig,
        engine: AttributeFilteringEngine,
        registry: AttributeTranscoderRegistry,
    ) -> ServiceResult<Self> {
        config.validate()?;
        engine.validate()?;

        tracing::info!(
            generation = 1,
            policies = engine.policies().len(),
            transcoding_rules = registry.rule_count(),
            "Release service started"
        );

        Ok(Self {
            current: ArcSwap::from_pointee(Generation {
                version: 1,
                engine: Arc::new(engine),
                registry: Arc::new(registry),
            }),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ReleaseConfig {
        &self.config
    }

    /// The current generation. Lock-free.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Generation> {
        self.current.load_full()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    /// Swap in a new generation.
    ///
    /// Returns the new generation's version.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Configuration` if the engine fails validation.
    /// The running generation is kept.
    pub fn install(
        &self,
        engine: AttributeFilteringEngine,
        registry: AttributeTranscoderRegistry,
    ) -> ServiceResult<u64> {
        if let Err(e) = engine.validate() {
            tracing::error!(
                engine_id = %engine.id(),
                error = %e,
                "Rejected release generation, keeping current"
            );
            return Err(e.into());
        }

        let policies = engine.policies().len();
        let transcoding_rules = registry.rule_count();
        let engine = Arc::new(engine);
        let registry = Arc::new(registry);

        let previous = self.current.rcu(|current| Generation {
            version: current.version + 1,
            engine: Arc::clone(&engine),
            registry: Arc::clone(&registry),
        });
        let version = previous.version + 1;

        tracing::info!(
            generation = version,
            policies,
            transcoding_rules,
            "Installed release generation"
        );
        Ok(version)
    }

    /// Build a generation from definitions and install it.
    ///
    /// `types` registers the wire types the transcoding rules target.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Configuration` for any descriptor, policy or
    /// registry error. The running generation is kept.
    pub fn load(
        &self,
        definitions: &ReleaseDefinitions,
        catalog: &TranscoderCatalog,
        types: impl IntoIterator<Item = TypeInfo>,
    ) -> ServiceResult<u64> {
        let generation = build_generation(&self.config, definitions, catalog, types);
        let (engine, registry) = generation.inspect_err(|e| {
            tracing::error!(error = %e, "Failed to build release generation, keeping current");
        })?;
        self.install(engine, registry)
    }

    /// Filter and encode against the current generation.
    ///
    /// # Errors
    ///
    /// See [`Generation::release`].
    pub fn release<T: Any>(&self, ctx: &mut FilterContext) -> ServiceResult<Vec<T>> {
        self.snapshot().release(ctx)
    }

    /// Decode against the current generation, honoring
    /// `transcoding.strict_decode`.
    ///
    /// # Errors
    ///
    /// See [`Generation::decode`].
    pub fn decode<T: Any>(&self, facts: &RequestFacts, object: &T) -> ServiceResult<Vec<Attribute>> {
        self.snapshot()
            .decode(facts, object, self.config.transcoding.strict_decode)
    }
}

fn definition_builder(config: &ReleaseConfig) -> DefinitionBuilder {
    #[cfg(feature = "rhai")]
    {
        DefinitionBuilder::from_config(&config.filter)
    }
    #[cfg(not(feature = "rhai"))]
    {
        let _ = config;
        DefinitionBuilder::new()
    }
}

/// Build an initialized engine and a registry from definitions.
///
/// # Errors
///
/// Returns the first `ConfigError` from the policy or transcoding definitions.
pub fn build_generation(
    config: &ReleaseConfig,
    definitions: &ReleaseDefinitions,
    catalog: &TranscoderCatalog,
    types: impl IntoIterator<Item = TypeInfo>,
) -> ServiceResult<(AttributeFilteringEngine, AttributeTranscoderRegistry)> {
    let engine = definition_builder(config).engine(&definitions.engine_id, &definitions.policies)?;
    let rules = catalog.build_rules(&definitions.transcoding)?;

    let registry = types
        .into_iter()
        .fold(AttributeTranscoderRegistry::builder(), |builder, info| {
            builder.register_type(info)
        })
        .with_rules(rules)
        .build()?;

    Ok((engine, registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use attrel_core::{AttributeValue, ConfigError};
    use attrel_filter::{AttributeFilterPolicy, AttributeRule, Matcher, PolicyRule};
    use attrel_transcoding::{Claim, StringClaimTranscoder, TranscodingRule, claims, names};

    fn engine(permit: &str) -> AttributeFilteringEngine {
        let mut engine = AttributeFilteringEngine::new(
            "test",
            vec![AttributeFilterPolicy::new("p1", PolicyRule::any())
                .with_rule(AttributeRule::permit(permit, Matcher::any()))],
        );
        engine.initialize().unwrap();
        engine
    }

    fn registry() -> AttributeTranscoderRegistry {
        AttributeTranscoderRegistry::builder()
            .register_type(claims::type_info())
            .with_rule(
                TranscodingRule::new::<Claim>("mail", Arc::new(StringClaimTranscoder))
                    .with_property(names::NAME, "email"),
            )
            .with_rule(
                TranscodingRule::new::<Claim>("cn", Arc::new(StringClaimTranscoder))
                    .with_property(names::NAME, "name"),
            )
            .build()
            .unwrap()
    }

    fn ctx() -> FilterContext {
        FilterContext::new(
            RequestFacts::builder().requester("https://sp.example.org").build(),
            [
                Attribute::new("mail")
                    .unwrap()
                    .with_values([AttributeValue::string("a@example.org")]),
                Attribute::new("cn")
                    .unwrap()
                    .with_values([AttributeValue::string("Alice")]),
            ],
        )
    }

    #[test]
    fn test_release_filters_then_encodes() {
        let service = ReleaseService::new(ReleaseConfig::default(), engine("mail"), registry()).unwrap();
        let claims = service.release::<Claim>(&mut ctx()).unwrap();
        assert_eq!(claims, [Claim::new("email", "a@example.org")]);
        assert_eq!(service.version(), 1);
    }

    #[test]
    fn test_install_swaps_generation() {
        let service = ReleaseService::new(ReleaseConfig::default(), engine("mail"), registry()).unwrap();
        let before = service.snapshot();

        assert_eq!(service.install(engine("cn"), registry()).unwrap(), 2);

        let claims = service.release::<Claim>(&mut ctx()).unwrap();
        assert_eq!(claims, [Claim::new("name", "Alice")]);

        // A snapshot taken earlier keeps its generation.
        assert_eq!(before.version(), 1);
        let claims = before.release::<Claim>(&mut ctx()).unwrap();
        assert_eq!(claims, [Claim::new("email", "a@example.org")]);
    }

    #[test]
    fn test_install_rejects_uninitialized_engine() {
        let service = ReleaseService::new(ReleaseConfig::default(), engine("mail"), registry()).unwrap();
        let uninitialized = AttributeFilteringEngine::new("broken", Vec::new());

        let err = service.install(uninitialized, registry()).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Configuration(ConfigError::NotInitialized { .. })
        ));
        assert_eq!(service.version(), 1);
    }

    #[test]
    fn test_decode_honors_strict_mode() {
        let mut config = ReleaseConfig::default();
        let facts = RequestFacts::builder().build();
        let unknown = Claim::new("unknown", "x");

        let lenient = ReleaseService::new(config.clone(), engine("mail"), registry()).unwrap();
        assert!(lenient.decode(&facts, &unknown).unwrap().is_empty());

        config.transcoding.strict_decode = true;
        let strict = ReleaseService::new(config, engine("mail"), registry()).unwrap();
        assert!(matches!(
            strict.decode(&facts, &unknown),
            Err(ServiceError::Transcoding(_))
        ));

        let decoded = strict.decode(&facts, &Claim::new("email", "a@example.org")).unwrap();
        assert_eq!(decoded[0].id(), "mail");
    }

    #[test]
    fn test_build_generation_from_definitions() {
        let definitions: ReleaseDefinitions = serde_json::from_value(serde_json::json!({
            "policies": [{
                "id": "p1",
                "activation": {"type": "requester", "value": "https://sp.example.org"},
                "rules": [{"attributeId": "mail", "matcher": {"type": "any"}}]
            }],
            "transcoding": [
                {"transcoder": "string-claim", "id": "mail", "name": "email"}
            ]
        }))
        .unwrap();

        let (engine, registry) = build_generation(
            &ReleaseConfig::default(),
            &definitions,
            &TranscoderCatalog::with_claims(),
            [claims::type_info()],
        )
        .unwrap();
        assert_eq!(engine.id(), "release");
        assert_eq!(registry.rule_count(), 1);
    }
}
