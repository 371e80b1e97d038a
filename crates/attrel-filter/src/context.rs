//! Per-request filtering context.
//!
//! A [`FilterContext`] is created for every request, passed to
//! [`AttributeFilteringEngine::filter`](crate::engine::AttributeFilteringEngine::filter),
//! and discarded afterwards. Nothing in it is shared between requests.
//!
//! ```ignore
//! use attrel_filter::FilterContext;
//!
//! let mut ctx = FilterContext::new(facts, resolved_attributes);
//! let released = engine.filter(&mut ctx)?;
//! ```

use std::collections::HashMap;

use attrel_core::{Attribute, AttributeValue, RequestFacts};
use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};

use crate::tristate::Tristate;

/// Outcome of a single policy during a filter run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyOutcome {
    /// Policy identifier.
    pub policy_id: String,

    /// Result of the policy's activation rule.
    pub activation: Tristate,
}

impl PolicyOutcome {
    /// Whether the policy's attribute rules were applied.
    #[must_use]
    pub fn applied(&self) -> bool {
        self.activation.is_true()
    }
}

/// Request-scoped state for one filter run.
#[derive(Debug, Clone)]
pub struct FilterContext {
    facts: RequestFacts,
    prefiltered: IndexMap<String, Attribute>,
    permitted: HashMap<String, IndexSet<AttributeValue>>,
    denied: HashMap<String, IndexSet<AttributeValue>>,
    outcomes: Vec<PolicyOutcome>,
}

impl FilterContext {
    /// Create a context over the unfiltered attributes from resolution.
    ///
    /// Attributes with the same identifier are merged, keeping the first
    /// occurrence's position.
    #[must_use]
    pub fn new(facts: RequestFacts, attributes: impl IntoIterator<Item = Attribute>) -> Self {
        let mut prefiltered: IndexMap<String, Attribute> = IndexMap::new();
        for attribute in attributes {
            match prefiltered.entry(attribute.id().to_string()) {
                Entry::Occupied(mut existing) => {
                    for value in attribute.values() {
                        existing.get_mut().push_value(value.clone());
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(attribute);
                }
            }
        }

        Self {
            facts,
            prefiltered,
            permitted: HashMap::new(),
            denied: HashMap::new(),
            outcomes: Vec::new(),
        }
    }

    #[must_use]
    pub fn facts(&self) -> &RequestFacts {
        &self.facts
    }

    /// The unfiltered attributes, in resolution order.
    #[must_use]
    pub fn prefiltered(&self) -> &IndexMap<String, Attribute> {
        &self.prefiltered
    }

    #[must_use]
    pub fn attribute(&self, id: &str) -> Option<&Attribute> {
        self.prefiltered.get(id)
    }

    /// Values permitted so far for an attribute.
    #[must_use]
    pub fn permitted(&self, attribute_id: &str) -> Option<&IndexSet<AttributeValue>> {
        self.permitted.get(attribute_id)
    }

    /// Values denied so far for an attribute.
    #[must_use]
    pub fn denied(&self, attribute_id: &str) -> Option<&IndexSet<AttributeValue>> {
        self.denied.get(attribute_id)
    }

    /// Per-policy outcomes of the last filter run, in policy order.
    #[must_use]
    pub fn outcomes(&self) -> &[PolicyOutcome] {
        &self.outcomes
    }

    /// Identifiers of policies whose attribute rules were applied.
    pub fn activated_policies(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.applied())
            .map(|o| o.policy_id.as_str())
    }

    /// Policies skipped during the last run, with their activation result.
    pub fn skipped_policies(&self) -> impl Iterator<Item = (&str, Tristate)> {
        self.outcomes
            .iter()
            .filter(|o| !o.applied())
            .map(|o| (o.policy_id.as_str(), o.activation))
    }

    pub(crate) fn add_permitted(
        &mut self,
        attribute_id: &str,
        values: impl IntoIterator<Item = AttributeValue>,
    ) {
        self.permitted
            .entry(attribute_id.to_string())
            .or_default()
            .extend(values);
    }

    pub(crate) fn add_denied(
        &mut self,
        attribute_id: &str,
        values: impl IntoIterator<Item = AttributeValue>,
    ) {
        self.denied
            .entry(attribute_id.to_string())
            .or_default()
            .extend(values);
    }

    pub(crate) fn record_outcome(&mut self, outcome: PolicyOutcome) {
        self.outcomes.push(outcome);
    }

    /// Drop state from a previous run so the context can be filtered again.
    pub(crate) fn reset(&mut self) {
        self.permitted.clear();
        self.denied.clear();
        self.outcomes.clear();
    }
}
