//! # attrel-core
//!
//! Shared building blocks for the attribute release crates:
//!
//! - [`attribute`] - protocol-neutral attributes and typed values
//! - [`facts`] - ambient request facts consulted during evaluation
//! - [`lifecycle`] - initialize/validate/destroy state for configured components
//! - [`dyn_key`] - equality and hashing for configuration trait objects
//! - [`error`] - configuration errors raised on the build path

pub mod attribute;
pub mod dyn_key;
pub mod error;
pub mod facts;
pub mod lifecycle;

pub use attribute::{Attribute, AttributeValue, EmptyKind};
pub use dyn_key::DynKey;
pub use error::{ConfigError, ConfigResult};
pub use facts::{RequestFacts, RequestFactsBuilder};
pub use lifecycle::{Component, ComponentState};
