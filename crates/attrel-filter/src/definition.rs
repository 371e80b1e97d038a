//! Serializable policy descriptors.
//!
//! Descriptors are the already-parsed, in-memory form of filter
//! configuration. Callers deserialize them from whatever syntax they own and
//! hand them to a [`DefinitionBuilder`], which produces runtime rules,
//! matchers, policies and engines on the build/reload path.
//!
//! # Example (JSON)
//!
//! ```json
//! {
//!   "id": "release-mail-to-sp",
//!   "activation": { "type": "requester", "value": "https://sp.example.org" },
//!   "rules": [
//!     {
//!       "attributeId": "mail",
//!       "matcher": { "type": "valueRegex", "regex": "\\.org$" }
//!     },
//!     {
//!       "id": "no-students",
//!       "attributeId": "eduPersonScopedAffiliation",
//!       "effect": "deny",
//!       "matcher": { "type": "value", "value": "student", "caseSensitive": false }
//!     }
//!   ]
//! }
//! ```

use std::sync::Arc;

use attrel_core::{AttributeValue, Component, ConfigError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "rhai")]
use crate::config::FilterConfig;
use crate::engine::AttributeFilteringEngine;
use crate::matcher::{Matcher, ValueCondition};
use crate::pattern::{Pattern, StringMatch};
use crate::policy::{AttributeFilterPolicy, AttributeRule, RuleEffect};
use crate::rule::{Condition, PolicyRule};
use crate::script::{ExpressionEvaluator, Script};
use crate::tristate::Tristate;

fn case_sensitive_default() -> bool {
    true
}

// =============================================================================
// Descriptors
// =============================================================================

/// Descriptor of a policy requirement rule.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RuleDefinition {
    Any,
    Static {
        result: Tristate,
    },
    Requester {
        value: String,
        #[serde(default = "case_sensitive_default")]
        case_sensitive: bool,
    },
    RequesterRegex {
        regex: String,
    },
    Responder {
        value: String,
        #[serde(default = "case_sensitive_default")]
        case_sensitive: bool,
    },
    Principal {
        value: String,
        #[serde(default = "case_sensitive_default")]
        case_sensitive: bool,
    },
    PrincipalRegex {
        regex: String,
    },
    ProxiedRequester {
        value: String,
        #[serde(default = "case_sensitive_default")]
        case_sensitive: bool,
    },
    AuthenticationMethod {
        value: String,
        #[serde(default = "case_sensitive_default")]
        case_sensitive: bool,
    },
    And {
        rules: Vec<RuleDefinition>,
    },
    Or {
        rules: Vec<RuleDefinition>,
    },
    Not {
        rule: Box<RuleDefinition>,
    },
    Script {
        expression: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        custom: Option<Value>,
    },
    AttributeMatches {
        attribute_id: String,
        matcher: Box<MatcherDefinition>,
    },
}

/// Descriptor of a value matcher.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MatcherDefinition {
    Any,
    Value {
        value: String,
        #[serde(default = "case_sensitive_default")]
        case_sensitive: bool,
    },
    Scope {
        value: String,
        #[serde(default = "case_sensitive_default")]
        case_sensitive: bool,
    },
    ValueRegex {
        regex: String,
    },
    ScopeRegex {
        regex: String,
    },
    Exact {
        value: AttributeValue,
    },
    FromRule {
        rule: RuleDefinition,
    },
    Script {
        expression: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        custom: Option<Value>,
    },
    And {
        matchers: Vec<MatcherDefinition>,
    },
    Or {
        matchers: Vec<MatcherDefinition>,
    },
    Not {
        matcher: Box<MatcherDefinition>,
    },
}

/// Descriptor of an attribute rule.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeRuleDefinition {
    /// Defaults to `<policy>/rules[<index>]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub attribute_id: String,
    #[serde(default)]
    pub effect: RuleEffect,
    pub matcher: MatcherDefinition,
}

/// Descriptor of an attribute filter policy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDefinition {
    pub id: String,
    pub activation: RuleDefinition,
    #[serde(default)]
    pub rules: Vec<AttributeRuleDefinition>,
}

// =============================================================================
// Builder
// =============================================================================

/// Builds runtime filter components from descriptors.
#[derive(Debug, Clone, Default)]
pub struct DefinitionBuilder {
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
}

impl DefinitionBuilder {
    /// Builder without scripting. Script descriptors are rejected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder whose scripts run on the Rhai evaluator, if enabled.
    #[cfg(feature = "rhai")]
    #[must_use]
    pub fn from_config(config: &FilterConfig) -> Self {
        if config.script.enabled {
            Self::new().with_evaluator(Arc::new(crate::script::rhai::RhaiEvaluator::new(
                &config.script,
            )))
        } else {
            Self::new()
        }
    }

    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Build an initialized engine.
    ///
    /// # Errors
    ///
    /// Returns the first descriptor error, or the engine's initialization
    /// error (`ConfigError::InvalidPolicies` when policies fail to initialize).
    pub fn engine(
        &self,
        id: impl Into<String>,
        definitions: &[PolicyDefinition],
    ) -> Result<AttributeFilteringEngine, ConfigError> {
        let policies = definitions
            .iter()
            .map(|d| self.policy(d))
            .collect::<Result<Vec<_>, _>>()?;

        let mut engine = AttributeFilteringEngine::new(id, policies);
        engine.initialize()?;
        Ok(engine)
    }

    /// Build an uninitialized policy.
    pub fn policy(&self, definition: &PolicyDefinition) -> Result<AttributeFilterPolicy, ConfigError> {
        let activation = self
            .rule(&definition.activation)?
            .with_id(format!("{}/activation", definition.id));

        let rules = definition
            .rules
            .iter()
            .map(|r| self.attribute_rule(r))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AttributeFilterPolicy::new(&definition.id, activation).with_rules(rules))
    }

    fn attribute_rule(
        &self,
        definition: &AttributeRuleDefinition,
    ) -> Result<AttributeRule, ConfigError> {
        let matcher = self.matcher(&definition.matcher)?;
        let rule = AttributeRule::new(&definition.attribute_id, matcher, definition.effect);
        Ok(match &definition.id {
            Some(id) => rule.with_id(id),
            None => rule,
        })
    }

    /// Build an uninitialized rule.
    pub fn rule(&self, definition: &RuleDefinition) -> Result<PolicyRule, ConfigError> {
        let rule = match definition {
            RuleDefinition::Any => PolicyRule::any(),
            RuleDefinition::Static { result } => PolicyRule::fixed(*result),
            RuleDefinition::Requester {
                value,
                case_sensitive,
            } => PolicyRule::condition(Condition::Requester(StringMatch::new(
                value,
                *case_sensitive,
            ))),
            RuleDefinition::RequesterRegex { regex } => {
                PolicyRule::condition(Condition::RequesterRegex(Pattern::new(regex)?))
            }
            RuleDefinition::Responder {
                value,
                case_sensitive,
            } => PolicyRule::condition(Condition::Responder(StringMatch::new(
                value,
                *case_sensitive,
            ))),
            RuleDefinition::Principal {
                value,
                case_sensitive,
            } => PolicyRule::condition(Condition::Principal(StringMatch::new(
                value,
                *case_sensitive,
            ))),
            RuleDefinition::PrincipalRegex { regex } => {
                PolicyRule::condition(Condition::PrincipalRegex(Pattern::new(regex)?))
            }
            RuleDefinition::ProxiedRequester {
                value,
                case_sensitive,
            } => PolicyRule::condition(Condition::ProxiedRequester(StringMatch::new(
                value,
                *case_sensitive,
            ))),
            RuleDefinition::AuthenticationMethod {
                value,
                case_sensitive,
            } => PolicyRule::condition(Condition::AuthenticationMethod(StringMatch::new(
                value,
                *case_sensitive,
            ))),
            RuleDefinition::And { rules } => PolicyRule::and(self.rules(rules)?),
            RuleDefinition::Or { rules } => PolicyRule::or(self.rules(rules)?),
            RuleDefinition::Not { rule } => PolicyRule::not(self.rule(rule)?),
            RuleDefinition::Script { expression, custom } => {
                PolicyRule::scripted(self.script(expression, custom.as_ref())?)
            }
            RuleDefinition::AttributeMatches {
                attribute_id,
                matcher,
            } => PolicyRule::from_matcher(attribute_id, self.matcher(matcher)?),
        };
        Ok(rule)
    }

    fn rules(&self, definitions: &[RuleDefinition]) -> Result<Vec<PolicyRule>, ConfigError> {
        definitions.iter().map(|d| self.rule(d)).collect()
    }

    /// Build an uninitialized matcher.
    pub fn matcher(&self, definition: &MatcherDefinition) -> Result<Matcher, ConfigError> {
        let matcher = match definition {
            MatcherDefinition::Any => Matcher::any(),
            MatcherDefinition::Value {
                value,
                case_sensitive,
            } => Matcher::value(ValueCondition::Value(StringMatch::new(value, *case_sensitive))),
            MatcherDefinition::Scope {
                value,
                case_sensitive,
            } => Matcher::value(ValueCondition::Scope(StringMatch::new(value, *case_sensitive))),
            MatcherDefinition::ValueRegex { regex } => {
                Matcher::value(ValueCondition::ValueRegex(Pattern::new(regex)?))
            }
            MatcherDefinition::ScopeRegex { regex } => {
                Matcher::value(ValueCondition::ScopeRegex(Pattern::new(regex)?))
            }
            MatcherDefinition::Exact { value } => {
                Matcher::value(ValueCondition::Exact(value.clone()))
            }
            MatcherDefinition::FromRule { rule } => Matcher::from_rule(self.rule(rule)?),
            MatcherDefinition::Script { expression, custom } => {
                Matcher::scripted(self.script(expression, custom.as_ref())?)
            }
            MatcherDefinition::And { matchers } => Matcher::and(self.matchers(matchers)?),
            MatcherDefinition::Or { matchers } => Matcher::or(self.matchers(matchers)?),
            MatcherDefinition::Not { matcher } => Matcher::not(self.matcher(matcher)?),
        };
        Ok(matcher)
    }

    fn matchers(&self, definitions: &[MatcherDefinition]) -> Result<Vec<Matcher>, ConfigError> {
        definitions.iter().map(|d| self.matcher(d)).collect()
    }

    fn script(&self, expression: &str, custom: Option<&Value>) -> Result<Script, ConfigError> {
        let evaluator = self
            .evaluator
            .clone()
            .ok_or_else(|| ConfigError::missing("expression evaluator for scripted component"))?;

        let script = Script::new(expression, evaluator);
        Ok(match custom {
            Some(custom) => script.with_custom(custom.clone()),
            None => script,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FilterContext;
    use crate::script::testing::evaluator;
    use attrel_core::{Attribute, RequestFacts};
    use serde_json::json;

    fn policy(value: Value) -> PolicyDefinition {
        serde_json::from_value(value).unwrap()
    }

    fn ctx() -> FilterContext {
        FilterContext::new(
            RequestFacts::builder()
                .principal("jdoe")
                .requester("https://sp.example.org")
                .build(),
            [
                Attribute::new("mail").unwrap().with_values([
                    AttributeValue::string("a@example.org"),
                    AttributeValue::string("b@example.net"),
                ]),
                Attribute::new("eduPersonScopedAffiliation").unwrap().with_values([
                    AttributeValue::scoped("staff", "example.org"),
                    AttributeValue::scoped("student", "example.org"),
                ]),
            ],
        )
    }

    #[test]
    fn test_build_engine_from_json() {
        let definition = policy(json!({
            "id": "release-mail-to-sp",
            "activation": { "type": "requester", "value": "https://sp.example.org" },
            "rules": [
                {
                    "attributeId": "mail",
                    "matcher": { "type": "valueRegex", "regex": "\\.org$" }
                },
                {
                    "attributeId": "eduPersonScopedAffiliation",
                    "matcher": { "type": "scope", "value": "EXAMPLE.ORG", "caseSensitive": false }
                },
                {
                    "id": "no-students",
                    "attributeId": "eduPersonScopedAffiliation",
                    "effect": "deny",
                    "matcher": { "type": "value", "value": "student" }
                }
            ]
        }));

        let engine = DefinitionBuilder::new()
            .engine("engine", &[definition])
            .unwrap();
        let released = engine.filter(&mut ctx()).unwrap();

        assert_eq!(released["mail"].values().len(), 1);
        assert_eq!(
            released["eduPersonScopedAffiliation"].values().first(),
            Some(&AttributeValue::scoped("staff", "example.org"))
        );
        assert_eq!(released["eduPersonScopedAffiliation"].values().len(), 1);
    }

    #[test]
    fn test_permit_and_deny_without_ids() {
        let definition = policy(json!({
            "id": "mail-unless-org",
            "activation": { "type": "any" },
            "rules": [
                { "attributeId": "mail", "matcher": { "type": "any" } },
                {
                    "attributeId": "mail",
                    "effect": "deny",
                    "matcher": { "type": "valueRegex", "regex": "\\.org$" }
                }
            ]
        }));

        let engine = DefinitionBuilder::new()
            .engine("engine", &[definition])
            .unwrap();
        let released = engine.filter(&mut ctx()).unwrap();
        assert_eq!(
            released["mail"].values().first(),
            Some(&AttributeValue::string("b@example.net"))
        );
        assert_eq!(released["mail"].values().len(), 1);
    }

    #[test]
    fn test_nested_rules() {
        let definition: RuleDefinition = serde_json::from_value(json!({
            "type": "and",
            "rules": [
                { "type": "principalRegex", "regex": "^j" },
                { "type": "not", "rule": { "type": "static", "result": "fail" } },
                {
                    "type": "attributeMatches",
                    "attributeId": "mail",
                    "matcher": { "type": "exact", "value": { "type": "string", "value": "a@example.org" } }
                }
            ]
        }))
        .unwrap();

        let mut rule = DefinitionBuilder::new().rule(&definition).unwrap();
        rule.initialize().unwrap();
        assert_eq!(rule.evaluate(&ctx()), Tristate::Fail);
    }

    #[test]
    fn test_case_sensitive_defaults_to_true() {
        let definition: MatcherDefinition =
            serde_json::from_value(json!({ "type": "value", "value": "x" })).unwrap();
        assert_eq!(
            definition,
            MatcherDefinition::Value {
                value: "x".to_string(),
                case_sensitive: true
            }
        );
    }

    #[test]
    fn test_script_requires_evaluator() {
        let definition = RuleDefinition::Script {
            expression: "true".to_string(),
            custom: None,
        };
        assert!(matches!(
            DefinitionBuilder::new().rule(&definition),
            Err(ConfigError::Missing(_))
        ));

        let mut rule = DefinitionBuilder::new()
            .with_evaluator(evaluator())
            .rule(&definition)
            .unwrap();
        rule.initialize().unwrap();
        assert_eq!(rule.evaluate(&ctx()), Tristate::True);
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let definition = MatcherDefinition::ValueRegex {
            regex: "([unclosed".to_string(),
        };
        assert!(matches!(
            DefinitionBuilder::new().matcher(&definition),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_empty_composite_fails_engine_build() {
        let definition = policy(json!({
            "id": "broken",
            "activation": { "type": "or", "rules": [] }
        }));
        let err = DefinitionBuilder::new()
            .engine("engine", &[definition])
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidPolicies { ref policy_ids, .. } if policy_ids == &["broken"]
        ));
    }

    #[cfg(feature = "rhai")]
    #[test]
    fn test_rhai_scripts_from_config() {
        let builder = DefinitionBuilder::from_config(&FilterConfig::default());
        let definition = policy(json!({
            "id": "scripted",
            "activation": { "type": "script", "expression": "principal == \"jdoe\"" },
            "rules": [{
                "attributeId": "mail",
                "matcher": { "type": "script", "expression": "value.ends_with(\".net\")" }
            }]
        }));

        let engine = builder.engine("engine", &[definition]).unwrap();
        let released = engine.filter(&mut ctx()).unwrap();
        assert_eq!(
            released["mail"].values().first(),
            Some(&AttributeValue::string("b@example.net"))
        );
    }
}
