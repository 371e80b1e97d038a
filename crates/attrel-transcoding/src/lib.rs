//! # attrel-transcoding
//!
//! Translation between internal attributes and protocol wire objects.
//!
//! Wire types are open: any `'static` type can be registered with a
//! [`TypeInfo`] and served by [`AttributeTranscoder`] implementations for
//! that type. The [`AttributeTranscoderRegistry`] indexes
//! [`TranscodingRule`]s by attribute id (encoding) and by the wire object's
//! canonical name (decoding).
//!
//! ```text
//! Attribute ──encode_first / encode_all──▶ [T]
//!         ◀──────────── decode ──────────── T
//! ```
//!
//! The [`claims`] module carries reference transcoders for JSON claims.

pub mod catalog;
pub mod claims;
pub mod error;
pub mod registry;
pub mod rule;
pub mod transcode;
pub mod transcoder;
pub mod type_info;

pub use catalog::{TranscoderCatalog, TranscodingRuleDefinition};
pub use claims::{BinaryClaimTranscoder, Claim, ScopedClaimTranscoder, StringClaimTranscoder};
pub use error::{DecodingError, EncodingError, TranscodingError, TranscodingResult};
pub use registry::{AttributeTranscoderRegistry, RegistryBuilder};
pub use rule::{
    ActivationCondition, Properties, PropertyValue, TranscoderRef, TranscodingRule, names,
};
pub use transcode::{decode, encode_all, encode_first};
pub use transcoder::AttributeTranscoder;
pub use type_info::TypeInfo;
