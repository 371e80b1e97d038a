//! Attribute filtering engine.
//!
//! The engine holds an ordered, immutable set of policies. It is built and
//! initialized on the configuration path, then shared read-only by every
//! request.
//!
//! # Algorithm
//!
//! ```text
//! for policy in policies:
//!     activation = policy.activation.evaluate(ctx)
//!     if activation != TRUE: skip policy entirely
//!     for rule in policy.rules:
//!         values = rule.matcher.matches(attribute, ctx)   // error aborts
//!         permit → permitted[attr] ∪= values
//!         deny   → denied[attr]    ∪= values
//!
//! for attr in prefiltered (in order):
//!     final = permitted[attr] − denied[attr]
//!     final empty → omit attr
//!     otherwise   → clone attr keeping only final values
//! ```

use std::collections::HashSet;

use attrel_core::{Attribute, AttributeValue, Component, ComponentState, ConfigError};
use indexmap::{IndexMap, IndexSet};

use crate::context::{FilterContext, PolicyOutcome};
use crate::error::FilterResult;
use crate::policy::{AttributeFilterPolicy, RuleEffect};

/// Filtered attributes keyed by id, in prefiltered order.
pub type FilteredAttributes = IndexMap<String, Attribute>;

/// Evaluates filter policies against per-request contexts.
#[derive(Debug, Clone)]
pub struct AttributeFilteringEngine {
    id: String,
    policies: Vec<AttributeFilterPolicy>,
    state: ComponentState,
}

impl AttributeFilteringEngine {
    #[must_use]
    pub fn new(id: impl Into<String>, policies: Vec<AttributeFilterPolicy>) -> Self {
        Self {
            id: id.into(),
            policies,
            state: ComponentState::default(),
        }
    }

    /// Append a policy.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Immutable` once the engine is initialized.
    pub fn add_policy(&mut self, policy: AttributeFilterPolicy) -> Result<(), ConfigError> {
        self.state.ensure_mutable(&self.id)?;
        self.policies.push(policy);
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn policies(&self) -> &[AttributeFilterPolicy] {
        &self.policies
    }

    /// Filter the prefiltered attributes in `ctx`.
    ///
    /// Per-policy outcomes are recorded in the context. The context's
    /// accumulators are cleared first, so a context may be filtered again.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::Configuration` if the engine is not initialized
    /// and `FilterError::Predicate` if a matcher fails. Either way the caller
    /// must release nothing.
    pub fn filter(&self, ctx: &mut FilterContext) -> FilterResult<FilteredAttributes> {
        self.state.ensure_usable(&self.id)?;
        ctx.reset();

        for policy in &self.policies {
            let activation = policy.activation().evaluate(ctx);
            ctx.record_outcome(PolicyOutcome {
                policy_id: policy.id().to_string(),
                activation,
            });

            if !activation.is_true() {
                tracing::debug!(
                    policy_id = %policy.id(),
                    activation = %activation,
                    "Policy not applicable, skipping"
                );
                continue;
            }
            tracing::debug!(policy_id = %policy.id(), "Policy is active");

            for rule in policy.rules() {
                let selected = rule.apply(ctx).inspect_err(|e| {
                    tracing::error!(
                        policy_id = %policy.id(),
                        attribute_id = %rule.attribute_id(),
                        error = %e,
                        "Attribute rule failed, aborting filtering"
                    );
                })?;
                let Some(values) = selected else {
                    continue;
                };

                tracing::trace!(
                    policy_id = %policy.id(),
                    attribute_id = %rule.attribute_id(),
                    effect = ?rule.effect(),
                    selected = values.len(),
                    "Attribute rule applied"
                );
                match rule.effect() {
                    RuleEffect::Permit => ctx.add_permitted(rule.attribute_id(), values),
                    RuleEffect::Deny => ctx.add_denied(rule.attribute_id(), values),
                }
            }
        }

        let released = Self::collect(ctx);
        tracing::debug!(
            engine_id = %self.id,
            prefiltered = ctx.prefiltered().len(),
            released = released.len(),
            "Filtering complete"
        );
        Ok(released)
    }

    /// Filter, releasing nothing if filtering fails.
    pub fn filter_or_release_nothing(&self, ctx: &mut FilterContext) -> FilteredAttributes {
        match self.filter(ctx) {
            Ok(released) => released,
            Err(e) => {
                tracing::error!(
                    engine_id = %self.id,
                    error = %e,
                    "Filtering failed, releasing no attributes"
                );
                IndexMap::new()
            }
        }
    }

    fn collect(ctx: &FilterContext) -> FilteredAttributes {
        let mut released = IndexMap::new();

        for (attribute_id, attribute) in ctx.prefiltered() {
            let Some(permitted) = ctx.permitted(attribute_id) else {
                continue;
            };
            let retained: IndexSet<AttributeValue> = match ctx.denied(attribute_id) {
                Some(denied) => permitted.difference(denied).cloned().collect(),
                None => permitted.clone(),
            };

            let filtered = attribute.with_retained(&retained);
            if filtered.is_empty() {
                tracing::debug!(
                    attribute_id = %attribute_id,
                    "No values remain after filtering, omitting attribute"
                );
                continue;
            }

            tracing::debug!(
                attribute_id = %attribute_id,
                released = filtered.values().len(),
                of = attribute.values().len(),
                "Attribute released"
            );
            released.insert(attribute_id.clone(), filtered);
        }

        released
    }

    fn invalid_policies(
        &self,
        check: impl Fn(&AttributeFilterPolicy) -> Result<(), ConfigError>,
    ) -> Option<ConfigError> {
        let (policy_ids, causes): (Vec<_>, Vec<_>) = self
            .policies
            .iter()
            .filter_map(|p| check(p).err().map(|e| (p.id().to_string(), e)))
            .unzip();

        if policy_ids.is_empty() {
            None
        } else {
            Some(ConfigError::InvalidPolicies { policy_ids, causes })
        }
    }
}

impl Component for AttributeFilteringEngine {
    fn component_id(&self) -> &str {
        &self.id
    }

    /// Initialize every policy.
    ///
    /// Failures are collected into one `ConfigError::InvalidPolicies`
    /// naming every policy that could not be initialized.
    fn initialize(&mut self) -> Result<(), ConfigError> {
        if self.state.is_initialized() {
            return Ok(());
        }

        let mut seen = HashSet::new();
        for policy in &self.policies {
            if !seen.insert(policy.id()) {
                return Err(ConfigError::DuplicateId(format!(
                    "policy '{}' in engine '{}'",
                    policy.id(),
                    self.id
                )));
            }
        }

        let mut policy_ids = Vec::new();
        let mut causes = Vec::new();
        for policy in &mut self.policies {
            if let Err(e) = policy.initialize() {
                tracing::error!(policy_id = %policy.id(), error = %e, "Policy failed to initialize");
                policy_ids.push(policy.id().to_string());
                causes.push(e);
            }
        }
        if !policy_ids.is_empty() {
            return Err(ConfigError::InvalidPolicies { policy_ids, causes });
        }

        self.state.initialize(&self.id)?;
        tracing::info!(
            engine_id = %self.id,
            policies = self.policies.len(),
            "Attribute filtering engine initialized"
        );
        Ok(())
    }

    fn destroy(&mut self) {
        self.policies.iter_mut().for_each(Component::destroy);
        self.state.destroy();
    }

    /// Validate every policy, then the engine itself.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(err) = self.invalid_policies(|p| p.validate()) {
            return Err(err);
        }
        self.state.ensure_usable(&self.id)
    }

    fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FilterError, PredicateError};
    use crate::matcher::{Matcher, ValueCondition, ValuePredicate};
    use crate::pattern::{Pattern, StringMatch};
    use crate::policy::AttributeRule;
    use crate::rule::{Condition, PolicyRule};
    use crate::tristate::Tristate;
    use attrel_core::RequestFacts;
    use std::sync::Arc;

    fn mail() -> Attribute {
        Attribute::new("mail").unwrap().with_values([
            AttributeValue::string("a@example.org"),
            AttributeValue::string("b@example.net"),
        ])
    }

    fn affiliation() -> Attribute {
        Attribute::new("eduPersonScopedAffiliation").unwrap().with_values([
            AttributeValue::scoped("staff", "example.org"),
            AttributeValue::scoped("member", "example.org"),
            AttributeValue::scoped("student", "other.edu"),
        ])
    }

    fn facts() -> RequestFacts {
        RequestFacts::builder()
            .principal("jdoe")
            .requester("https://sp.example.org")
            .build()
    }

    fn ctx() -> FilterContext {
        FilterContext::new(facts(), [mail(), affiliation()])
    }

    fn org() -> Matcher {
        Matcher::value(ValueCondition::ValueRegex(Pattern::new(r"\.org$").unwrap()))
    }

    fn engine(policies: Vec<AttributeFilterPolicy>) -> AttributeFilteringEngine {
        let mut engine = AttributeFilteringEngine::new("engine", policies);
        engine.initialize().unwrap();
        engine
    }

    fn values(attribute: &Attribute) -> Vec<String> {
        attribute.values().iter().map(ToString::to_string).collect()
    }

    #[derive(Debug, PartialEq, Eq, Hash)]
    struct Unavailable;

    impl ValuePredicate for Unavailable {
        fn test(
            &self,
            _attribute: &Attribute,
            _value: &AttributeValue,
            _ctx: &FilterContext,
        ) -> Result<bool, PredicateError> {
            Err(PredicateError::new("backend unavailable"))
        }
    }

    #[test]
    fn test_mail_org_only() {
        let engine = engine(vec![
            AttributeFilterPolicy::new("mail-policy", PolicyRule::any())
                .with_rule(AttributeRule::permit("mail", org())),
        ]);

        let mut ctx = ctx();
        let released = engine.filter(&mut ctx).unwrap();

        assert_eq!(released.len(), 1);
        assert_eq!(values(&released["mail"]), ["a@example.org"]);
        // The prefiltered attribute is untouched.
        assert_eq!(ctx.attribute("mail").unwrap().values().len(), 2);
    }

    #[test]
    fn test_matcher_permitting_nothing_omits_attribute() {
        let engine = engine(vec![
            AttributeFilterPolicy::new("p", PolicyRule::any()).with_rule(AttributeRule::permit(
                "mail",
                Matcher::value(ValueCondition::Value(StringMatch::exact("nobody@example.org"))),
            )),
        ]);

        let released = engine.filter(&mut ctx()).unwrap();
        assert!(!released.contains_key("mail"));
        assert!(released.is_empty());
    }

    #[test]
    fn test_inactive_policies_are_skipped() {
        for activation in [Tristate::False, Tristate::Fail] {
            let engine = engine(vec![
                AttributeFilterPolicy::new("inactive", PolicyRule::fixed(activation))
                    .with_rule(AttributeRule::permit("mail", Matcher::any()))
                    // Would abort filtering if it were ever evaluated.
                    .with_rule(
                        AttributeRule::permit("mail", Matcher::predicate(Arc::new(Unavailable)))
                            .with_id("mail-broken"),
                    ),
            ]);

            let mut ctx = ctx();
            let released = engine.filter(&mut ctx).unwrap();
            assert!(released.is_empty(), "{activation}");

            let skipped: Vec<_> = ctx.skipped_policies().collect();
            assert_eq!(skipped, [("inactive", activation)]);
            assert_eq!(ctx.activated_policies().count(), 0);
        }
    }

    #[test]
    fn test_permits_accumulate_across_policies() {
        let engine = engine(vec![
            AttributeFilterPolicy::new("org", PolicyRule::any())
                .with_rule(AttributeRule::permit("mail", org())),
            AttributeFilterPolicy::new("net", PolicyRule::any()).with_rule(AttributeRule::permit(
                "mail",
                Matcher::value(ValueCondition::ValueRegex(Pattern::new(r"\.net$").unwrap())),
            )),
        ]);

        let mut ctx = ctx();
        let released = engine.filter(&mut ctx).unwrap();
        assert_eq!(values(&released["mail"]), ["a@example.org", "b@example.net"]);
        assert_eq!(ctx.activated_policies().collect::<Vec<_>>(), ["org", "net"]);
    }

    #[test]
    fn test_deny_vetoes_across_policies() {
        let engine = engine(vec![
            AttributeFilterPolicy::new("release-all", PolicyRule::any())
                .with_rule(AttributeRule::permit("eduPersonScopedAffiliation", Matcher::any())),
            AttributeFilterPolicy::new(
                "no-foreign-scopes",
                PolicyRule::condition(Condition::Requester(StringMatch::exact(
                    "https://sp.example.org",
                ))),
            )
            .with_rule(AttributeRule::deny(
                "eduPersonScopedAffiliation",
                Matcher::not(Matcher::value(ValueCondition::Scope(StringMatch::exact(
                    "example.org",
                )))),
            )),
        ]);

        let released = engine.filter(&mut ctx()).unwrap();
        assert_eq!(
            values(&released["eduPersonScopedAffiliation"]),
            ["staff@example.org", "member@example.org"]
        );
    }

    #[test]
    fn test_deny_everything_omits_attribute() {
        let engine = engine(vec![
            AttributeFilterPolicy::new("p", PolicyRule::any())
                .with_rule(AttributeRule::permit("mail", Matcher::any()))
                .with_rule(AttributeRule::deny("mail", Matcher::any()).with_id("mail-deny")),
        ]);
        assert!(engine.filter(&mut ctx()).unwrap().is_empty());
    }

    #[test]
    fn test_undecided_deny_withholds_attribute() {
        // No responder fact, so the deny rule's matcher cannot decide.
        let engine = engine(vec![
            AttributeFilterPolicy::new("p", PolicyRule::any())
                .with_rule(AttributeRule::permit("mail", Matcher::any()))
                .with_rule(AttributeRule::permit("eduPersonScopedAffiliation", Matcher::any()))
                .with_rule(AttributeRule::deny(
                    "mail",
                    Matcher::from_rule(PolicyRule::condition(Condition::Responder(
                        StringMatch::exact("https://idp.example.org"),
                    ))),
                )),
        ]);

        let released = engine.filter(&mut ctx()).unwrap();
        assert!(!released.contains_key("mail"));
        assert_eq!(released.keys().collect::<Vec<_>>(), ["eduPersonScopedAffiliation"]);
    }

    #[test]
    fn test_not_over_undecided_rule_releases_nothing() {
        // Inverting a FAIL must not turn it into a release.
        let undecided = PolicyRule::condition(Condition::Responder(StringMatch::exact(
            "https://idp.example.org",
        )));
        let engine = engine(vec![
            AttributeFilterPolicy::new(
                "p",
                PolicyRule::not(PolicyRule::from_matcher("mail", Matcher::from_rule(undecided))),
            )
            .with_rule(AttributeRule::permit("mail", Matcher::any())),
        ]);

        let mut ctx = ctx();
        assert!(engine.filter(&mut ctx).unwrap().is_empty());
        assert_eq!(ctx.skipped_policies().collect::<Vec<_>>(), [("p", Tristate::Fail)]);
    }

    #[test]
    fn test_matcher_error_aborts_filtering() {
        let engine = engine(vec![
            AttributeFilterPolicy::new("ok", PolicyRule::any())
                .with_rule(AttributeRule::permit("mail", Matcher::any())),
            AttributeFilterPolicy::new("broken", PolicyRule::any()).with_rule(
                AttributeRule::permit(
                    "eduPersonScopedAffiliation",
                    Matcher::predicate(Arc::new(Unavailable)),
                ),
            ),
        ]);

        let err = engine.filter(&mut ctx()).unwrap_err();
        assert!(matches!(err, FilterError::Predicate { .. }));
        assert!(engine.filter_or_release_nothing(&mut ctx()).is_empty());
    }

    #[test]
    fn test_uninitialized_engine_is_a_configuration_error() {
        let engine = AttributeFilteringEngine::new("engine", vec![]);
        let err = engine.filter(&mut ctx()).unwrap_err();
        assert!(matches!(
            err,
            FilterError::Configuration(ConfigError::NotInitialized { .. })
        ));
    }

    #[test]
    fn test_initialize_collects_every_invalid_policy() {
        let mut engine = AttributeFilteringEngine::new(
            "engine",
            vec![
                AttributeFilterPolicy::new("p1", PolicyRule::and(vec![])),
                AttributeFilterPolicy::new("p2", PolicyRule::any()),
                AttributeFilterPolicy::new("p3", PolicyRule::or(vec![])),
            ],
        );

        let err = engine.initialize().unwrap_err();
        match &err {
            ConfigError::InvalidPolicies { policy_ids, causes } => {
                assert_eq!(policy_ids, &["p1", "p3"]);
                assert_eq!(causes.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.to_string(), "Invalid policies: p1, p3");
        assert!(!engine.is_initialized());
    }

    #[test]
    fn test_validate_reports_all_policies() {
        let engine = AttributeFilteringEngine::new(
            "engine",
            vec![
                AttributeFilterPolicy::new("p1", PolicyRule::any()),
                AttributeFilterPolicy::new("p2", PolicyRule::any()),
            ],
        );
        assert!(matches!(
            engine.validate(),
            Err(ConfigError::InvalidPolicies { policy_ids, .. }) if policy_ids.len() == 2
        ));

        let mut engine = engine;
        engine.initialize().unwrap();
        assert!(engine.validate().is_ok());

        engine.destroy();
        assert!(engine.validate().is_err());
    }

    #[test]
    fn test_duplicate_policy_ids_rejected() {
        let mut engine = AttributeFilteringEngine::new(
            "engine",
            vec![
                AttributeFilterPolicy::new("p", PolicyRule::any()),
                AttributeFilterPolicy::new("p", PolicyRule::any()),
            ],
        );
        assert!(matches!(
            engine.initialize(),
            Err(ConfigError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_output_is_always_a_subset() {
        let matchers = [
            Matcher::any(),
            org(),
            Matcher::not(org()),
            Matcher::or(vec![org(), Matcher::any()]),
            Matcher::from_rule(PolicyRule::fixed(Tristate::Fail)),
            Matcher::not(Matcher::from_rule(PolicyRule::fixed(Tristate::Fail))),
        ];

        for matcher in matchers {
            let engine = engine(vec![
                AttributeFilterPolicy::new("p", PolicyRule::any())
                    .with_rule(AttributeRule::permit("mail", matcher.clone()))
                    .with_rule(
                        AttributeRule::permit("eduPersonScopedAffiliation", matcher)
                            .with_id("affiliation"),
                    ),
            ]);

            let mut ctx = ctx();
            let released = engine.filter(&mut ctx).unwrap();
            for (id, attribute) in &released {
                let original = ctx.attribute(id).unwrap();
                assert!(!attribute.is_empty());
                assert!(attribute.values().is_subset(original.values()));
            }
        }
    }

    #[test]
    fn test_concurrent_filtering_matches_sequential() {
        let engine = engine(vec![
            AttributeFilterPolicy::new(
                "sp-only",
                PolicyRule::condition(Condition::Requester(StringMatch::exact(
                    "https://sp.example.org",
                ))),
            )
            .with_rule(AttributeRule::permit("mail", org())),
            AttributeFilterPolicy::new("everyone", PolicyRule::any()).with_rule(
                AttributeRule::permit(
                    "eduPersonScopedAffiliation",
                    Matcher::value(ValueCondition::Scope(StringMatch::exact("example.org"))),
                ),
            ),
        ]);

        let contexts: Vec<FilterContext> = (0..16)
            .map(|i| {
                let requester = if i % 2 == 0 {
                    "https://sp.example.org".to_string()
                } else {
                    format!("https://sp{i}.example.net")
                };
                FilterContext::new(
                    RequestFacts::builder().requester(requester).build(),
                    [mail(), affiliation()],
                )
            })
            .collect();

        let sequential: Vec<FilteredAttributes> = contexts
            .iter()
            .cloned()
            .map(|mut ctx| engine.filter(&mut ctx).unwrap())
            .collect();

        let concurrent: Vec<FilteredAttributes> = std::thread::scope(|scope| {
            let handles: Vec<_> = contexts
                .iter()
                .cloned()
                .map(|mut ctx| {
                    let engine = &engine;
                    scope.spawn(move || engine.filter(&mut ctx).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(sequential, concurrent);
        assert_eq!(sequential[0].len(), 2);
        assert_eq!(sequential[1].len(), 1);
    }
}
