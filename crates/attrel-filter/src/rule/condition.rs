//! Built-in conditions over ambient request facts.

use attrel_core::RequestFacts;

use crate::pattern::{Pattern, StringMatch};
use crate::tristate::Tristate;

/// A condition evaluated against [`RequestFacts`].
///
/// A condition that needs a fact the request does not carry evaluates to
/// `Fail`, never `False`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    /// Requesting party identifier equals a string.
    Requester(StringMatch),
    /// Requesting party identifier matches a pattern.
    RequesterRegex(Pattern),
    /// Responder identifier equals a string.
    Responder(StringMatch),
    /// Principal name equals a string.
    Principal(StringMatch),
    /// Principal name matches a pattern.
    PrincipalRegex(Pattern),
    /// Any proxied requester equals a string.
    ProxiedRequester(StringMatch),
    /// Any satisfied authentication method equals a string.
    AuthenticationMethod(StringMatch),
}

impl Condition {
    /// Short name for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Requester(_) => "requester",
            Self::RequesterRegex(_) => "requester-regex",
            Self::Responder(_) => "responder",
            Self::Principal(_) => "principal",
            Self::PrincipalRegex(_) => "principal-regex",
            Self::ProxiedRequester(_) => "proxied-requester",
            Self::AuthenticationMethod(_) => "authentication-method",
        }
    }

    pub fn evaluate(&self, facts: &RequestFacts) -> Tristate {
        match self {
            Self::Requester(m) => single(facts.requester(), |v| m.matches(v)),
            Self::RequesterRegex(p) => single(facts.requester(), |v| p.is_match(v)),
            Self::Responder(m) => single(facts.responder(), |v| m.matches(v)),
            Self::Principal(m) => single(facts.principal(), |v| m.matches(v)),
            Self::PrincipalRegex(p) => single(facts.principal(), |v| p.is_match(v)),
            // Proxying is optional, an absent list just means no match.
            Self::ProxiedRequester(m) => {
                Tristate::from(facts.proxied_requesters().iter().any(|v| m.matches(v)))
            }
            Self::AuthenticationMethod(m) => {
                if facts.authentication_methods().is_empty() {
                    tracing::debug!("No authentication methods in request facts");
                    return Tristate::Fail;
                }
                Tristate::from(facts.authentication_methods().iter().any(|v| m.matches(v)))
            }
        }
    }
}

fn single(fact: Option<&str>, test: impl Fn(&str) -> bool) -> Tristate {
    match fact {
        Some(value) => Tristate::from(test(value)),
        None => Tristate::Fail,
    }
}
