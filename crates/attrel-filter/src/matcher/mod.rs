//! Value matchers.
//!
//! A [`Matcher`] selects the subset of an attribute's values that an
//! attribute rule permits or denies. Matchers compose with AND
//! (intersection), OR (union) and NOT (complement against the input
//! values).
//!
//! Failure is sticky: a matcher that cannot decide (a wrapped policy rule
//! evaluating to `Fail`) selects nothing, and the failure survives NOT so
//! that it can never be inverted into "every value". A predicate that
//! errors aborts the whole call with a [`FilterError`].

mod value;

pub use value::ValueCondition;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::Arc;

use attrel_core::{Attribute, AttributeValue, Component, ComponentState, ConfigError, DynKey};
use indexmap::IndexSet;

use crate::context::FilterContext;
use crate::error::{FilterError, PredicateError};
use crate::rule::PolicyRule;
use crate::script::Script;
use crate::tristate::Tristate;

// =============================================================================
// Custom Predicates
// =============================================================================

/// A custom per-value predicate.
///
/// Returning an error aborts the matcher call.
pub trait ValuePredicate: DynKey + fmt::Debug {
    fn test(
        &self,
        attribute: &Attribute,
        value: &AttributeValue,
        ctx: &FilterContext,
    ) -> Result<bool, PredicateError>;
}

// =============================================================================
// Matcher Tree
// =============================================================================

/// Node of a matcher tree.
#[derive(Debug, Clone)]
pub enum MatcherNode {
    /// All values if the rule is `True`, none if `False`, failed if `Fail`.
    FromRule(PolicyRule),
    /// Values satisfying a built-in condition.
    Value(ValueCondition),
    /// Values satisfying a custom predicate.
    Predicate(Arc<dyn ValuePredicate>),
    /// Values for which the script returns `true`.
    Scripted(Script),
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
    Not(Box<Matcher>),
}

impl MatcherNode {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::FromRule(_) => "from-rule",
            Self::Value(c) => c.kind_name(),
            Self::Predicate(_) => "predicate",
            Self::Scripted(_) => "script",
            Self::And(_) => "and",
            Self::Or(_) => "or",
            Self::Not(_) => "not",
        }
    }
}

impl PartialEq for MatcherNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::FromRule(a), Self::FromRule(b)) => a == b,
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Predicate(a), Self::Predicate(b)) => a.dyn_eq((**b).as_any()),
            (Self::Scripted(a), Self::Scripted(b)) => a == b,
            (Self::And(a), Self::And(b)) | (Self::Or(a), Self::Or(b)) => a == b,
            (Self::Not(a), Self::Not(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for MatcherNode {}

impl Hash for MatcherNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Self::FromRule(rule) => rule.hash(state),
            Self::Value(cond) => cond.hash(state),
            Self::Predicate(p) => p.dyn_hash(state),
            Self::Scripted(script) => script.hash(state),
            Self::And(children) | Self::Or(children) => children.hash(state),
            Self::Not(child) => child.hash(state),
        }
    }
}

/// Outcome of a matcher before failure is collapsed to "no values".
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selection {
    Values(IndexSet<AttributeValue>),
    Failed,
}

/// An attribute value matcher.
///
/// Equality and hashing consider only the matcher's logic.
#[derive(Debug, Clone)]
pub struct Matcher {
    id: String,
    node: MatcherNode,
    state: ComponentState,
}

impl Matcher {
    #[must_use]
    pub fn new(node: MatcherNode) -> Self {
        Self {
            id: node.kind_name().to_string(),
            node,
            state: ComponentState::default(),
        }
    }

    /// Matcher selecting every value.
    #[must_use]
    pub fn any() -> Self {
        Self::value(ValueCondition::Any)
    }

    #[must_use]
    pub fn value(condition: ValueCondition) -> Self {
        Self::new(MatcherNode::Value(condition))
    }

    #[must_use]
    pub fn from_rule(rule: PolicyRule) -> Self {
        Self::new(MatcherNode::FromRule(rule))
    }

    #[must_use]
    pub fn predicate(predicate: Arc<dyn ValuePredicate>) -> Self {
        Self::new(MatcherNode::Predicate(predicate))
    }

    #[must_use]
    pub fn scripted(script: Script) -> Self {
        Self::new(MatcherNode::Scripted(script))
    }

    #[must_use]
    pub fn and(children: Vec<Matcher>) -> Self {
        Self::new(MatcherNode::And(children))
    }

    #[must_use]
    pub fn or(children: Vec<Matcher>) -> Self {
        Self::new(MatcherNode::Or(children))
    }

    #[must_use]
    pub fn not(child: Matcher) -> Self {
        Self::new(MatcherNode::Not(Box::new(child)))
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
    pub fn node(&self) -> &MatcherNode {
        &self.node
    }

    /// Append a child to an AND/OR matcher.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Immutable` once initialized and
    /// `ConfigError::InvalidValue` if the matcher is not a composite.
    pub fn add_child(&mut self, child: Matcher) -> Result<(), ConfigError> {
        self.state.ensure_mutable(&self.id)?;
        match &mut self.node {
            MatcherNode::And(children) | MatcherNode::Or(children) => {
                children.push(child);
                Ok(())
            }
            other => Err(ConfigError::invalid_value(format!(
                "matcher '{}' of kind '{}' does not accept children",
                self.id,
                other.kind_name()
            ))),
        }
    }

    /// Select the matching subset of `attribute`'s values, in input order.
    ///
    /// A matcher that cannot decide selects nothing.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::Predicate` if a value predicate fails and
    /// `FilterError::Configuration` if the matcher is not initialized.
    pub fn matches(
        &self,
        attribute: &Attribute,
        ctx: &FilterContext,
    ) -> Result<IndexSet<AttributeValue>, FilterError> {
        Ok(match self.select(attribute, ctx)? {
            Selection::Values(values) => values,
            Selection::Failed => IndexSet::new(),
        })
    }

    /// Like [`matches`](Self::matches), but keeps a failed selection
    /// distinct from an empty one.
    pub(crate) fn select(
        &self,
        attribute: &Attribute,
        ctx: &FilterContext,
    ) -> Result<Selection, FilterError> {
        self.state.ensure_usable(&self.id)?;

        let selection = match &self.node {
            MatcherNode::FromRule(rule) => match rule.evaluate(ctx) {
                Tristate::True => Selection::Values(attribute.values().clone()),
                Tristate::False => Selection::Values(IndexSet::new()),
                Tristate::Fail => {
                    tracing::debug!(
                        matcher_id = %self.id,
                        attribute_id = %attribute.id(),
                        "Matcher rule failed, selecting no values"
                    );
                    Selection::Failed
                }
            },
            MatcherNode::Value(condition) => Selection::Values(
                attribute
                    .values()
                    .iter()
                    .filter(|v| condition.test(v))
                    .cloned()
                    .collect(),
            ),
            MatcherNode::Predicate(predicate) => {
                let mut selected = IndexSet::new();
                for value in attribute.values() {
                    let keep = predicate.test(attribute, value, ctx).map_err(|e| {
                        FilterError::predicate(&self.id, attribute.id(), e.message)
                    })?;
                    if keep {
                        selected.insert(value.clone());
                    }
                }
                Selection::Values(selected)
            }
            MatcherNode::Scripted(script) => {
                let mut selected = IndexSet::new();
                for value in attribute.values() {
                    if script.test_value(&self.id, attribute, value, ctx)? {
                        selected.insert(value.clone());
                    }
                }
                Selection::Values(selected)
            }
            MatcherNode::And(children) => {
                let mut acc: Option<IndexSet<AttributeValue>> = None;
                for child in children {
                    let Selection::Values(values) = child.select(attribute, ctx)? else {
                        return Ok(Selection::Failed);
                    };
                    acc = Some(match acc {
                        None => values,
                        Some(prev) => prev.intersection(&values).cloned().collect(),
                    });
                }
                Selection::Values(acc.unwrap_or_default())
            }
            MatcherNode::Or(children) => {
                let mut union = IndexSet::new();
                for child in children {
                    let Selection::Values(values) = child.select(attribute, ctx)? else {
                        return Ok(Selection::Failed);
                    };
                    union.extend(values);
                }
                // Keep input order regardless of which child matched first.
                Selection::Values(
                    attribute
                        .values()
                        .iter()
                        .filter(|v| union.contains(*v))
                        .cloned()
                        .collect(),
                )
            }
            MatcherNode::Not(child) => match child.select(attribute, ctx)? {
                Selection::Failed => Selection::Failed,
                Selection::Values(excluded) => Selection::Values(
                    attribute
                        .values()
                        .iter()
                        .filter(|v| !excluded.contains(*v))
                        .cloned()
                        .collect(),
                ),
            },
        };

        Ok(selection)
    }
}

impl Component for Matcher {
    fn component_id(&self) -> &str {
        &self.id
    }

    fn initialize(&mut self) -> Result<(), ConfigError> {
        if self.state.is_initialized() {
            return Ok(());
        }

        match &mut self.node {
            MatcherNode::And(children) | MatcherNode::Or(children) => {
                if children.is_empty() {
                    return Err(ConfigError::empty_composition(&self.id));
                }
                for child in children.iter_mut() {
                    child.initialize()?;
                }
            }
            MatcherNode::Not(child) => child.initialize()?,
            MatcherNode::FromRule(rule) => rule.initialize()?,
            MatcherNode::Scripted(script) => script.check(&self.id)?,
            MatcherNode::Value(_) | MatcherNode::Predicate(_) => {}
        }

        self.state.initialize(&self.id)
    }

    fn destroy(&mut self) {
        match &mut self.node {
            MatcherNode::And(children) | MatcherNode::Or(children) => {
                children.iter_mut().for_each(Component::destroy);
            }
            MatcherNode::Not(child) => child.destroy(),
            MatcherNode::FromRule(rule) => rule.destroy(),
            MatcherNode::Value(_) | MatcherNode::Predicate(_) | MatcherNode::Scripted(_) => {}
        }
        self.state.destroy();
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.state.ensure_usable(&self.id)?;
        match &self.node {
            MatcherNode::And(children) | MatcherNode::Or(children) => {
                children.iter().try_for_each(Component::validate)
            }
            MatcherNode::Not(child) => child.validate(),
            MatcherNode::FromRule(rule) => rule.validate(),
            MatcherNode::Value(_) | MatcherNode::Predicate(_) | MatcherNode::Scripted(_) => Ok(()),
        }
    }

    fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl Eq for Matcher {}

impl Hash for Matcher {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.hash(state);
    }
}
