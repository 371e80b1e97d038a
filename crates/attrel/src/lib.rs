//! # attrel
//!
//! Attribute release for a federated identity provider.
//!
//! This crate ties the filtering engine ([`attrel_filter`]) and the
//! transcoder registry ([`attrel_transcoding`]) into one
//! [`ReleaseService`] whose configuration can be replaced at runtime without
//! blocking requests.
//!
//! ```ignore
//! use attrel::{ReleaseConfig, ReleaseDefinitions, ReleaseService};
//! use attrel::transcoding::{Claim, TranscoderCatalog, claims};
//!
//! let (engine, registry) = attrel::build_generation(
//!     &config,
//!     &definitions,
//!     &TranscoderCatalog::with_claims(),
//!     [claims::type_info()],
//! )?;
//! let service = ReleaseService::new(config, engine, registry)?;
//!
//! let released: Vec<Claim> = service.release(&mut ctx)?;
//! ```

pub mod activation;
pub mod config;
pub mod error;
pub mod service;

pub use activation::activation_from_rule;
pub use config::{ReleaseConfig, TranscodingConfig};
pub use error::{ServiceError, ServiceResult};
pub use service::{Generation, ReleaseDefinitions, ReleaseService, build_generation};

pub use attrel_filter as filter;
pub use attrel_transcoding as transcoding;
