//! Transcoding activation conditions backed by policy rules.

use std::sync::Arc;

use attrel_core::{Component, ConfigError, RequestFacts};
use attrel_filter::{FilterContext, PolicyRule};
use attrel_transcoding::ActivationCondition;

/// Gate a transcoding rule on a policy requirement rule.
///
/// The rule is evaluated against the request facts alone, so conditions
/// that need attribute values (`FromMatcher`) evaluate as if the attribute
/// were absent. Only `TRUE` activates; `FALSE` and `FAIL` do not.
///
/// # Errors
///
/// Returns the rule's initialization error.
pub fn activation_from_rule(
    id: impl Into<String>,
    mut rule: PolicyRule,
) -> Result<ActivationCondition, ConfigError> {
    rule.initialize()?;
    let rule = Arc::new(rule);

    Ok(ActivationCondition::new(id, move |facts: &RequestFacts| {
        let ctx = FilterContext::new(facts.clone(), std::iter::empty());
        rule.evaluate(&ctx).is_true()
    }))
}
