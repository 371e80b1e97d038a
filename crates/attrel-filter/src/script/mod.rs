//! Scripted rules and matchers.
//!
//! Scripts are evaluated by an injected [`ExpressionEvaluator`]. The filter
//! core never depends on a particular scripting runtime; the Rhai-backed
//! [`RhaiEvaluator`](rhai::RhaiEvaluator) is one implementation, available
//! with the `rhai` feature.
//!
//! # Bindings
//!
//! Every evaluation receives:
//!
//! - `principal`, `requester`, `responder` - strings, or unit when absent
//! - `facts` - the full request facts as a map
//! - `custom` - the custom object configured on the rule or matcher, or unit
//!
//! Value matchers additionally receive `attribute_id`, `value` (the string
//! form, or unit) and `scope` (or unit).
//!
//! A rule script must produce a boolean. Anything else is an evaluation
//! failure: `Fail` for rules, an aborting error for matchers.

#[cfg(feature = "rhai")]
pub mod rhai;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use attrel_core::{Attribute, AttributeValue, ConfigError, RequestFacts};
use serde_json::Value;
use thiserror::Error;

use crate::context::FilterContext;
use crate::error::FilterError;
use crate::tristate::Tristate;

// =============================================================================
// Evaluator Capability
// =============================================================================

/// Errors produced by an expression evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// The expression does not compile.
    #[error("Script compilation failed: {0}")]
    Compile(String),

    /// The expression failed while running.
    #[error("Script execution failed: {0}")]
    Execution(String),

    /// Scripting is disabled by configuration.
    #[error("Scripting is disabled")]
    Disabled,
}

/// Variables made available to a script.
#[derive(Debug, Clone, Copy)]
pub struct ScriptBindings<'a> {
    pub facts: &'a RequestFacts,
    pub custom: Option<&'a Value>,
    pub attribute: Option<&'a Attribute>,
    pub value: Option<&'a AttributeValue>,
}

/// Stateless expression evaluation.
///
/// Implementations run inline on the request path: they must be
/// deterministic and must not block or perform I/O.
pub trait ExpressionEvaluator: Send + Sync + fmt::Debug {
    /// Check that an expression compiles. Called once at initialization.
    fn check(&self, expression: &str) -> Result<(), ScriptError>;

    /// Evaluate an expression against the given bindings.
    fn evaluate(&self, expression: &str, bindings: &ScriptBindings<'_>)
    -> Result<Value, ScriptError>;
}

// =============================================================================
// Script
// =============================================================================

/// An expression bound to an evaluator and an optional custom object.
#[derive(Clone)]
pub struct Script {
    expression: String,
    evaluator: Arc<dyn ExpressionEvaluator>,
    custom: Option<Value>,
}

impl Script {
    #[must_use]
    pub fn new(expression: impl Into<String>, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self {
            expression: expression.into(),
            evaluator,
            custom: None,
        }
    }

    /// Attach a custom object exposed to the script as `custom`.
    #[must_use]
    pub fn with_custom(mut self, custom: Value) -> Self {
        self.custom = Some(custom);
        self
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub(crate) fn check(&self, component: &str) -> Result<(), ConfigError> {
        self.evaluator.check(&self.expression).map_err(|e| {
            ConfigError::invalid_value(format!("script in '{component}': {e}"))
        })
    }

    /// Evaluate as a policy requirement rule. Never fails; errors become `Fail`.
    pub(crate) fn evaluate_rule(&self, rule_id: &str, ctx: &FilterContext) -> Tristate {
        let bindings = ScriptBindings {
            facts: ctx.facts(),
            custom: self.custom.as_ref(),
            attribute: None,
            value: None,
        };

        match self.evaluator.evaluate(&self.expression, &bindings) {
            Ok(Value::Bool(result)) => Tristate::from(result),
            Ok(other) => {
                tracing::warn!(
                    rule_id = %rule_id,
                    result = %other,
                    "Scripted rule returned a non-boolean result"
                );
                Tristate::Fail
            }
            Err(e) => {
                tracing::warn!(rule_id = %rule_id, error = %e, "Scripted rule failed");
                Tristate::Fail
            }
        }
    }

    /// Evaluate as a per-value predicate. Any failure aborts the matcher.
    pub(crate) fn test_value(
        &self,
        matcher_id: &str,
        attribute: &Attribute,
        value: &AttributeValue,
        ctx: &FilterContext,
    ) -> Result<bool, FilterError> {
        let bindings = ScriptBindings {
            facts: ctx.facts(),
            custom: self.custom.as_ref(),
            attribute: Some(attribute),
            value: Some(value),
        };

        match self.evaluator.evaluate(&self.expression, &bindings) {
            Ok(Value::Bool(result)) => Ok(result),
            Ok(other) => Err(FilterError::predicate(
                matcher_id,
                attribute.id(),
                format!("script returned non-boolean result {other}"),
            )),
            Err(e) => Err(FilterError::predicate(
                matcher_id,
                attribute.id(),
                e.to_string(),
            )),
        }
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("expression", &self.expression)
            .field("custom", &self.custom)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Script {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
            && self.custom == other.custom
            && Arc::ptr_eq(&self.evaluator, &other.evaluator)
    }
}

impl Eq for Script {}

impl Hash for Script {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.expression.hash(state);
    }
}
