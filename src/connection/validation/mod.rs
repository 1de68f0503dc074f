//! Pure validation transform from raw to validated descriptors.
//!
//! Validation never opens a network connection. It resolves which
//! representation is authoritative, fills absent fields with the
//! documented defaults, and synchronizes the canonical URI string with
//! the structured fields.

mod canonical;
mod service;

pub use canonical::build_canonical_uri;
pub use service::{
    DEFAULT_DATABASE, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_USER, validate,
};
pub(crate) use service::with_ssl_disabled;
