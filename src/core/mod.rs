//! Core CFDI types, the invoice tree builder and error types.
//!
//! The model follows Anexo 20 of the Resolución Miscelánea Fiscal (CFDI 4.0).
//! Attribute names from the schema are kept in the field docs so the mapping
//! to the XML stays obvious.

mod builder;
mod error;
mod types;

pub use builder::*;
pub use error::*;
pub use types::*;

/// CFDI schema version produced by this crate.
pub const CFDI_VERSION: &str = "4.0";
