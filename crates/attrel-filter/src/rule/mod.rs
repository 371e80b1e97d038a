//! Policy requirement rules.
//!
//! A [`PolicyRule`] evaluates a [`FilterContext`] to a [`Tristate`]. Rules
//! compose with AND/OR/NOT into immutable trees that are built and
//! initialized on the configuration path and then evaluated concurrently.
//!
//! # Composition
//!
//! | Operator | Children in order                                          |
//! |----------|------------------------------------------------------------|
//! | AND      | first `Fail` → `Fail`, first `False` → `False`, else `True`  |
//! | OR       | first `Fail` → `Fail`, first `True` → `True`, else `False`   |
//! | NOT      | `Fail` → `Fail`, `True` → `False`, `False` → `True`          |
//!
//! Evaluation never returns an error: every internal failure becomes `Fail`.
//!
//! ```ignore
//! use attrel_filter::rule::{Condition, PolicyRule};
//! use attrel_filter::pattern::StringMatch;
//!
//! let mut rule = PolicyRule::and(vec![
//!     PolicyRule::condition(Condition::Requester(StringMatch::exact("https://sp.example.org"))),
//!     PolicyRule::not(PolicyRule::condition(Condition::Principal(StringMatch::exact("guest")))),
//! ])
//! .with_id("sp-and-not-guest");
//! rule.initialize()?;
//!
//! let decision = rule.evaluate(&ctx);
//! ```

pub mod condition;

pub use condition::Condition;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::Arc;

use attrel_core::{Component, ComponentState, ConfigError, DynKey};

use crate::context::FilterContext;
use crate::error::PredicateError;
use crate::matcher::{Matcher, Selection};
use crate::script::Script;
use crate::tristate::Tristate;

// =============================================================================
// Custom Predicates
// =============================================================================

/// A custom predicate over the whole request context.
///
/// Implementations must be `Eq + Hash` so repeated configuration
/// deduplicates. Returning an error yields `Fail`.
pub trait ContextPredicate: DynKey + fmt::Debug {
    fn test(&self, ctx: &FilterContext) -> Result<bool, PredicateError>;
}

// =============================================================================
// Rule Tree
// =============================================================================

/// Node of a rule tree.
#[derive(Debug, Clone)]
pub enum RuleNode {
    /// A fixed result. `Static(True)` is the classic "ANY" rule.
    Static(Tristate),
    /// A built-in condition over request facts.
    Condition(Condition),
    /// A custom predicate.
    Predicate(Arc<dyn ContextPredicate>),
    And(Vec<PolicyRule>),
    Or(Vec<PolicyRule>),
    Not(Box<PolicyRule>),
    /// A script evaluated by the injected expression evaluator.
    Scripted(Script),
    /// `True` if the matcher retains at least one value of the attribute.
    FromMatcher {
        attribute_id: String,
        matcher: Box<Matcher>,
    },
}

impl RuleNode {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Static(_) => "static",
            Self::Condition(c) => c.kind_name(),
            Self::Predicate(_) => "predicate",
            Self::And(_) => "and",
            Self::Or(_) => "or",
            Self::Not(_) => "not",
            Self::Scripted(_) => "script",
            Self::FromMatcher { .. } => "attribute-matches",
        }
    }
}

impl PartialEq for RuleNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Static(a), Self::Static(b)) => a == b,
            (Self::Condition(a), Self::Condition(b)) => a == b,
            (Self::Predicate(a), Self::Predicate(b)) => a.dyn_eq((**b).as_any()),
            (Self::And(a), Self::And(b)) | (Self::Or(a), Self::Or(b)) => a == b,
            (Self::Not(a), Self::Not(b)) => a == b,
            (Self::Scripted(a), Self::Scripted(b)) => a == b,
            (
                Self::FromMatcher {
                    attribute_id: a_id,
                    matcher: a,
                },
                Self::FromMatcher {
                    attribute_id: b_id,
                    matcher: b,
                },
            ) => a_id == b_id && a == b,
            _ => false,
        }
    }
}

impl Eq for RuleNode {}

impl Hash for RuleNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Self::Static(t) => t.hash(state),
            Self::Condition(c) => c.hash(state),
            Self::Predicate(p) => p.dyn_hash(state),
            Self::And(children) | Self::Or(children) => children.hash(state),
            Self::Not(child) => child.hash(state),
            Self::Scripted(script) => script.hash(state),
            Self::FromMatcher {
                attribute_id,
                matcher,
            } => {
                attribute_id.hash(state);
                matcher.hash(state);
            }
        }
    }
}

/// A policy requirement rule.
///
/// Equality and hashing consider only the rule's logic, not its identifier
/// or lifecycle state.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    id: String,
    node: RuleNode,
    state: ComponentState,
}

impl PolicyRule {
    /// Wrap a node. The identifier defaults to the node kind.
    #[must_use]
    pub fn new(node: RuleNode) -> Self {
        Self {
            id: node.kind_name().to_string(),
            node,
            state: ComponentState::default(),
        }
    }

    /// Rule that always evaluates to `True`.
    #[must_use]
    pub fn any() -> Self {
        Self::new(RuleNode::Static(Tristate::True)).with_id("any")
    }

    #[must_use]
    pub fn fixed(result: Tristate) -> Self {
        Self::new(RuleNode::Static(result))
    }

    #[must_use]
    pub fn condition(condition: Condition) -> Self {
        Self::new(RuleNode::Condition(condition))
    }

    #[must_use]
    pub fn predicate(predicate: Arc<dyn ContextPredicate>) -> Self {
        Self::new(RuleNode::Predicate(predicate))
    }

    /// Conjunction. Must have at least one child by the time it is initialized.
    #[must_use]
    pub fn and(children: Vec<PolicyRule>) -> Self {
        Self::new(RuleNode::And(children))
    }

    /// Disjunction. Must have at least one child by the time it is initialized.
    #[must_use]
    pub fn or(children: Vec<PolicyRule>) -> Self {
        Self::new(RuleNode::Or(children))
    }

    #[must_use]
    pub fn not(child: PolicyRule) -> Self {
        Self::new(RuleNode::Not(Box::new(child)))
    }

    #[must_use]
    pub fn scripted(script: Script) -> Self {
        Self::new(RuleNode::Scripted(script))
    }

    #[must_use]
    pub fn from_matcher(attribute_id: impl Into<String>, matcher: Matcher) -> Self {
        Self::new(RuleNode::FromMatcher {
            attribute_id: attribute_id.into(),
            matcher: Box::new(matcher),
        })
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn node(&self) -> &RuleNode {
        &self.node
    }

    /// Append a child to an AND/OR rule.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Immutable` once the rule is initialized and
    /// `ConfigError::InvalidValue` if the rule is not a composite.
    pub fn add_child(&mut self, child: PolicyRule) -> Result<(), ConfigError> {
        self.state.ensure_mutable(&self.id)?;
        match &mut self.node {
            RuleNode::And(children) | RuleNode::Or(children) => {
                children.push(child);
                Ok(())
            }
            other => Err(ConfigError::invalid_value(format!(
                "rule '{}' of kind '{}' does not accept children",
                self.id,
                other.kind_name()
            ))),
        }
    }

    /// Evaluate the rule. Never fails; problems are reported as `Fail`.
    pub fn evaluate(&self, ctx: &FilterContext) -> Tristate {
        if let Err(e) = self.state.ensure_usable(&self.id) {
            tracing::warn!(rule_id = %self.id, error = %e, "Rule is not usable");
            return Tristate::Fail;
        }

        let result = match &self.node {
            RuleNode::Static(result) => *result,
            RuleNode::Condition(condition) => condition.evaluate(ctx.facts()),
            RuleNode::Predicate(predicate) => match predicate.test(ctx) {
                Ok(result) => Tristate::from(result),
                Err(e) => {
                    tracing::warn!(rule_id = %self.id, error = %e, "Rule predicate failed");
                    Tristate::Fail
                }
            },
            RuleNode::And(children) => evaluate_and(children, ctx),
            RuleNode::Or(children) => evaluate_or(children, ctx),
            RuleNode::Not(child) => !child.evaluate(ctx),
            RuleNode::Scripted(script) => script.evaluate_rule(&self.id, ctx),
            RuleNode::FromMatcher {
                attribute_id,
                matcher,
            } => {
                let Some(attribute) = ctx.attribute(attribute_id) else {
                    return Tristate::False;
                };
                match matcher.select(attribute, ctx) {
                    Ok(Selection::Values(values)) => Tristate::from(!values.is_empty()),
                    Ok(Selection::Failed) => {
                        tracing::warn!(
                            rule_id = %self.id,
                            attribute_id = %attribute_id,
                            "Rule matcher could not decide"
                        );
                        Tristate::Fail
                    }
                    Err(e) => {
                        tracing::warn!(rule_id = %self.id, error = %e, "Rule matcher failed");
                        Tristate::Fail
                    }
                }
            }
        };

        tracing::trace!(rule_id = %self.id, result = %result, "Rule evaluated");
        result
    }
}

fn evaluate_and(children: &[PolicyRule], ctx: &FilterContext) -> Tristate {
    for child in children {
        match child.evaluate(ctx) {
            Tristate::Fail => return Tristate::Fail,
            Tristate::False => return Tristate::False,
            Tristate::True => {}
        }
    }
    Tristate::True
}

fn evaluate_or(children: &[PolicyRule], ctx: &FilterContext) -> Tristate {
    for child in children {
        match child.evaluate(ctx) {
            Tristate::Fail => return Tristate::Fail,
            Tristate::True => return Tristate::True,
            Tristate::False => {}
        }
    }
    Tristate::False
}

impl Component for PolicyRule {
    fn component_id(&self) -> &str {
        &self.id
    }

    fn initialize(&mut self) -> Result<(), ConfigError> {
        if self.state.is_initialized() {
            return Ok(());
        }

        match &mut self.node {
            RuleNode::And(children) | RuleNode::Or(children) => {
                if children.is_empty() {
                    return Err(ConfigError::empty_composition(&self.id));
                }
                for child in children.iter_mut() {
                    child.initialize()?;
                }
            }
            RuleNode::Not(child) => child.initialize()?,
            RuleNode::Scripted(script) => script.check(&self.id)?,
            RuleNode::FromMatcher { matcher, .. } => matcher.initialize()?,
            RuleNode::Static(_) | RuleNode::Condition(_) | RuleNode::Predicate(_) => {}
        }

        self.state.initialize(&self.id)
    }

    fn destroy(&mut self) {
        match &mut self.node {
            RuleNode::And(children) | RuleNode::Or(children) => {
                children.iter_mut().for_each(Component::destroy);
            }
            RuleNode::Not(child) => child.destroy(),
            RuleNode::FromMatcher { matcher, .. } => matcher.destroy(),
            RuleNode::Static(_)
            | RuleNode::Condition(_)
            | RuleNode::Predicate(_)
            | RuleNode::Scripted(_) => {}
        }
        self.state.destroy();
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.state.ensure_usable(&self.id)?;
        match &self.node {
            RuleNode::And(children) | RuleNode::Or(children) => {
                children.iter().try_for_each(Component::validate)
            }
            RuleNode::Not(child) => child.validate(),
            RuleNode::FromMatcher { matcher, .. } => matcher.validate(),
            RuleNode::Static(_)
            | RuleNode::Condition(_)
            | RuleNode::Predicate(_)
            | RuleNode::Scripted(_) => Ok(()),
        }
    }

    fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }
}

impl PartialEq for PolicyRule {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl Eq for PolicyRule {}

impl Hash for PolicyRule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.hash(state);
    }
}
