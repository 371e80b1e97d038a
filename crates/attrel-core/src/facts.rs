//! Ambient request facts consulted by rules, matchers and transcoders.
//!
//! Facts are supplied by the upstream flow for every request and never
//! change while that request is being processed.
//!
//! ```
//! use attrel_core::RequestFacts;
//!
//! let facts = RequestFacts::builder()
//!     .principal("jdoe")
//!     .requester("https://sp.example.org/shibboleth")
//!     .authentication_method("urn:oasis:names:tc:SAML:2.0:ac:classes:Password")
//!     .build();
//!
//! assert_eq!(facts.principal(), Some("jdoe"));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Facts about the request on whose behalf attributes are being released.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFacts {
    /// Name of the subject whose attributes are being released.
    #[serde(skip_serializing_if = "Option::is_none")]
    principal: Option<String>,

    /// Identifier of the party receiving the attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    requester: Option<String>,

    /// Identifier of the party issuing the attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    responder: Option<String>,

    /// Requesters on whose behalf a proxying requester is acting.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    proxied_requesters: Vec<String>,

    /// Authentication methods satisfied in the current session.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    authentication_methods: Vec<String>,

    /// Additional session facts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    session: BTreeMap<String, String>,

    /// Instant at which the request started.
    #[serde(with = "time::serde::rfc3339")]
    request_time: OffsetDateTime,
}

impl RequestFacts {
    /// Start building request facts.
    #[must_use]
    pub fn builder() -> RequestFactsBuilder {
        RequestFactsBuilder::default()
    }

    #[must_use]
    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    #[must_use]
    pub fn requester(&self) -> Option<&str> {
        self.requester.as_deref()
    }

    #[must_use]
    pub fn responder(&self) -> Option<&str> {
        self.responder.as_deref()
    }

    #[must_use]
    pub fn proxied_requesters(&self) -> &[String] {
        &self.proxied_requesters
    }

    #[must_use]
    pub fn authentication_methods(&self) -> &[String] {
        &self.authentication_methods
    }

    /// Look up a session fact by name.
    #[must_use]
    pub fn session_fact(&self, name: &str) -> Option<&str> {
        self.session.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn session(&self) -> &BTreeMap<String, String> {
        &self.session
    }

    #[must_use]
    pub fn request_time(&self) -> OffsetDateTime {
        self.request_time
    }
}

impl Default for RequestFacts {
    fn default() -> Self {
        RequestFactsBuilder::default().build()
    }
}

/// Builder for [`RequestFacts`].
#[derive(Debug, Default)]
pub struct RequestFactsBuilder {
    principal: Option<String>,
    requester: Option<String>,
    responder: Option<String>,
    proxied_requesters: Vec<String>,
    authentication_methods: Vec<String>,
    session: BTreeMap<String, String>,
    request_time: Option<OffsetDateTime>,
}

impl RequestFactsBuilder {
    #[must_use]
    pub fn principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    #[must_use]
    pub fn requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    #[must_use]
    pub fn responder(mut self, responder: impl Into<String>) -> Self {
        self.responder = Some(responder.into());
        self
    }

    #[must_use]
    pub fn proxied_requester(mut self, requester: impl Into<String>) -> Self {
        self.proxied_requesters.push(requester.into());
        self
    }

    #[must_use]
    pub fn authentication_method(mut self, method: impl Into<String>) -> Self {
        self.authentication_methods.push(method.into());
        self
    }

    #[must_use]
    pub fn session_fact(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.session.insert(name.into(), value.into());
        self
    }

    /// Override the request time (defaults to now).
    #[must_use]
    pub fn request_time(mut self, at: OffsetDateTime) -> Self {
        self.request_time = Some(at);
        self
    }

    #[must_use]
    pub fn build(self) -> RequestFacts {
        RequestFacts {
            principal: self.principal,
            requester: self.requester,
            responder: self.responder,
            proxied_requesters: self.proxied_requesters,
            authentication_methods: self.authentication_methods,
            session: self.session,
            request_time: self.request_time.unwrap_or_else(OffsetDateTime::now_utc),
        }
    }
}
