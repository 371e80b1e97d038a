//! Attribute filter policies.
//!
//! A policy binds an activation rule to an ordered list of attribute rules.
//! Each attribute rule names an attribute and a matcher, and either permits
//! or denies the values the matcher selects.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use attrel_core::{AttributeValue, Component, ComponentState, ConfigError};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::context::FilterContext;
use crate::error::FilterError;
use crate::matcher::{Matcher, Selection};
use crate::rule::PolicyRule;

// =============================================================================
// Attribute Rule
// =============================================================================

/// Whether an attribute rule contributes to the permitted or denied set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleEffect {
    #[default]
    Permit,
    Deny,
}

/// Binding of an attribute to a matcher.
///
/// A rule built without [`with_id`](Self::with_id) is named
/// `<policy>/rules[<index>]` when its policy is initialized, and reports its
/// attribute id until then. Equality ignores the rule identifier.
#[derive(Debug, Clone)]
pub struct AttributeRule {
    id: Option<String>,
    attribute_id: String,
    matcher: Matcher,
    effect: RuleEffect,
}

impl AttributeRule {
    #[must_use]
    pub fn permit(attribute_id: impl Into<String>, matcher: Matcher) -> Self {
        Self::new(attribute_id, matcher, RuleEffect::Permit)
    }

    #[must_use]
    pub fn deny(attribute_id: impl Into<String>, matcher: Matcher) -> Self {
        Self::new(attribute_id, matcher, RuleEffect::Deny)
    }

    #[must_use]
    pub fn new(attribute_id: impl Into<String>, matcher: Matcher, effect: RuleEffect) -> Self {
        Self {
            id: None,
            attribute_id: attribute_id.into(),
            matcher,
            effect,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.attribute_id)
    }

    #[must_use]
    pub fn attribute_id(&self) -> &str {
        &self.attribute_id
    }

    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    #[must_use]
    pub fn effect(&self) -> RuleEffect {
        self.effect
    }

    /// Run the matcher against the named attribute.
    ///
    /// An attribute absent from the context selects nothing. A matcher that
    /// cannot decide selects nothing for a permit rule and every value for a
    /// deny rule.
    pub fn apply(
        &self,
        ctx: &FilterContext,
    ) -> Result<Option<IndexSet<AttributeValue>>, FilterError> {
        let Some(attribute) = ctx.attribute(&self.attribute_id) else {
            return Ok(None);
        };

        let selected = match self.matcher.select(attribute, ctx)? {
            Selection::Values(values) => values,
            Selection::Failed => match self.effect {
                RuleEffect::Permit => IndexSet::new(),
                RuleEffect::Deny => {
                    tracing::warn!(
                        rule_id = %self.id(),
                        attribute_id = %self.attribute_id,
                        "Deny rule could not decide, denying every value"
                    );
                    attribute.values().clone()
                }
            },
        };
        Ok(Some(selected))
    }
}

impl PartialEq for AttributeRule {
    fn eq(&self, other: &Self) -> bool {
        self.attribute_id == other.attribute_id
            && self.effect == other.effect
            && self.matcher == other.matcher
    }
}

impl Eq for AttributeRule {}

impl Hash for AttributeRule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.attribute_id.hash(state);
        self.effect.hash(state);
        self.matcher.hash(state);
    }
}

impl Component for AttributeRule {
    fn component_id(&self) -> &str {
        self.id()
    }

    fn initialize(&mut self) -> Result<(), ConfigError> {
        if self.attribute_id.trim().is_empty() {
            return Err(ConfigError::missing(format!(
                "attribute rule '{}' has no attribute id",
                self.id()
            )));
        }
        self.matcher.initialize()
    }

    fn destroy(&mut self) {
        self.matcher.destroy();
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.matcher.validate()
    }

    fn is_initialized(&self) -> bool {
        self.matcher.is_initialized()
    }
}

// =============================================================================
// Attribute Filter Policy
// =============================================================================

/// An activation rule plus the attribute rules it gates.
#[derive(Debug, Clone)]
pub struct AttributeFilterPolicy {
    id: String,
    activation: PolicyRule,
    rules: Vec<AttributeRule>,
    state: ComponentState,
}

impl AttributeFilterPolicy {
    #[must_use]
    pub fn new(id: impl Into<String>, activation: PolicyRule) -> Self {
        Self {
            id: id.into(),
            activation,
            rules: Vec::new(),
            state: ComponentState::default(),
        }
    }

    #[must_use]
    pub fn with_rule(mut self, rule: AttributeRule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = AttributeRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Append an attribute rule.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Immutable` once the policy is initialized.
    pub fn add_rule(&mut self, rule: AttributeRule) -> Result<(), ConfigError> {
        self.state.ensure_mutable(&self.id)?;
        self.rules.push(rule);
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn activation(&self) -> &PolicyRule {
        &self.activation
    }

    #[must_use]
    pub fn rules(&self) -> &[AttributeRule] {
        &self.rules
    }
}

impl Component for AttributeFilterPolicy {
    fn component_id(&self) -> &str {
        &self.id
    }

    fn initialize(&mut self) -> Result<(), ConfigError> {
        if self.state.is_initialized() {
            return Ok(());
        }
        if self.id.trim().is_empty() {
            return Err(ConfigError::missing("policy id"));
        }

        for (index, rule) in self.rules.iter_mut().enumerate() {
            if rule.id.is_none() {
                rule.id = Some(format!("{}/rules[{index}]", self.id));
            }
        }

        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id()) {
                return Err(ConfigError::DuplicateId(format!(
                    "attribute rule '{}' in policy '{}'",
                    rule.id(),
                    self.id
                )));
            }
        }

        self.activation.initialize()?;
        for rule in &mut self.rules {
            rule.initialize()?;
        }

        self.state.initialize(&self.id)
    }

    fn destroy(&mut self) {
        self.activation.destroy();
        self.rules.iter_mut().for_each(Component::destroy);
        self.state.destroy();
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.state.ensure_usable(&self.id)?;
        self.activation.validate()?;
        self.rules.iter().try_for_each(Component::validate)
    }

    fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }
}
