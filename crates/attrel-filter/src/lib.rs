//! # attrel-filter
//!
//! Attribute release filtering for a federated identity provider.
//!
//! Given a principal's resolved attributes and the facts of the current
//! request, the filtering engine decides which attribute values may be
//! disclosed to the requesting party.
//!
//! ## Modules
//!
//! - [`tristate`] - TRUE/FALSE/FAIL results
//! - [`rule`] - policy requirement rules and their composition
//! - [`matcher`] - value matchers and set composition
//! - [`policy`] - attribute filter policies and attribute rules
//! - [`engine`] - the filtering engine
//! - [`context`] - per-request filtering state
//! - [`script`] - injected expression evaluation (Rhai with the `rhai` feature)
//! - [`definition`] - serializable descriptors and the builder
//! - [`config`] - engine configuration
//!
//! ## Fail-closed
//!
//! Rule evaluation never raises: internal failures become `FAIL`, and a
//! policy whose activation is not `TRUE` contributes nothing. A matcher
//! failure aborts the whole request with a [`FilterError`], which callers
//! must treat as "release nothing".

pub mod config;
pub mod context;
pub mod definition;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod pattern;
pub mod policy;
pub mod rule;
pub mod script;
pub mod tristate;

pub use config::{FilterConfig, ScriptConfig};
pub use context::{FilterContext, PolicyOutcome};
pub use definition::{
    AttributeRuleDefinition, DefinitionBuilder, MatcherDefinition, PolicyDefinition,
    RuleDefinition,
};
pub use engine::{AttributeFilteringEngine, FilteredAttributes};
pub use error::{FilterError, FilterResult, PredicateError};
pub use matcher::{Matcher, MatcherNode, ValueCondition, ValuePredicate};
pub use pattern::{Pattern, StringMatch};
pub use policy::{AttributeFilterPolicy, AttributeRule, RuleEffect};
pub use rule::{Condition, ContextPredicate, PolicyRule, RuleNode};
pub use script::{ExpressionEvaluator, Script, ScriptBindings, ScriptError};
pub use tristate::Tristate;
