//! Domain types for connection descriptors.

mod descriptor;
mod error;
mod ids;
mod ssl;
mod validated;

pub use descriptor::{ConnectionDescriptor, DescriptorKind};
pub use error::{ConnectionValidationError, ParseDescriptorKindError, ParseSslModeError};
pub use ids::ConnectionId;
pub use ssl::{SslCertificates, SslMode};
pub use validated::{DescriptorSignature, ValidatedConnectionDescriptor};
