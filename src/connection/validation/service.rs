//! The descriptor validation transform.

use super::canonical::{build_canonical_uri, parse_uri};
use crate::connection::domain::{
    ConnectionDescriptor, ConnectionValidationError, DescriptorKind, SslMode,
    ValidatedConnectionDescriptor,
};

/// Default host applied when a descriptor omits one.
pub const DEFAULT_HOST: &str = "localhost";
/// Default port applied when a descriptor omits one.
pub const DEFAULT_PORT: u16 = 5432;
/// Default user applied when a descriptor omits one.
pub const DEFAULT_USER: &str = "postgres";
/// Default database applied when a descriptor omits one.
pub const DEFAULT_DATABASE: &str = "postgres";

/// Normalizes a raw descriptor into a fully-populated validated one.
///
/// Pure and total for any descriptor that declares (or allows
/// inferring) a kind. Explicit structured fields win over URI-derived
/// values; the raw URI string is retained verbatim only when it was
/// supplied and nothing overrides it, and is rebuilt canonically
/// otherwise. Validation is idempotent: revalidating either
/// representation of the result yields an equal value.
///
/// # Errors
///
/// Returns [`ConnectionValidationError::UnsupportedDescriptorKind`]
/// when no kind is declared and none can be inferred, and URI parse
/// errors for malformed `ConnectionUri` descriptors.
pub fn validate(
    descriptor: &ConnectionDescriptor,
) -> Result<ValidatedConnectionDescriptor, ConnectionValidationError> {
    match resolve_kind(descriptor)? {
        DescriptorKind::ConnectionUri => validate_uri_form(descriptor),
        DescriptorKind::Standard => Ok(validate_standard_form(descriptor)),
    }
}

fn resolve_kind(
    descriptor: &ConnectionDescriptor,
) -> Result<DescriptorKind, ConnectionValidationError> {
    if let Some(kind) = descriptor.kind() {
        return Ok(kind);
    }
    if descriptor.has_structured_fields() {
        return Ok(DescriptorKind::Standard);
    }
    if descriptor.connection_uri().is_some() {
        return Ok(DescriptorKind::ConnectionUri);
    }
    Err(ConnectionValidationError::UnsupportedDescriptorKind)
}

fn validate_uri_form(
    descriptor: &ConnectionDescriptor,
) -> Result<ValidatedConnectionDescriptor, ConnectionValidationError> {
    let Some(raw_uri) = descriptor.connection_uri() else {
        // A ConnectionUri descriptor without a URI degrades to the
        // structured fields; the canonical URI is recomputed.
        return Ok(validate_standard_form(descriptor));
    };

    let parts = parse_uri(raw_uri)?;
    let overridden = descriptor.has_structured_fields() || descriptor.ssl_mode().is_some();

    let host = descriptor
        .host()
        .map(ToOwned::to_owned)
        .or(parts.host)
        .unwrap_or_else(|| DEFAULT_HOST.to_owned());
    let port = descriptor.port().or(parts.port).unwrap_or(DEFAULT_PORT);
    let user = descriptor
        .user()
        .map(ToOwned::to_owned)
        .or(parts.user)
        .unwrap_or_else(|| DEFAULT_USER.to_owned());
    let password = descriptor
        .password()
        .map(ToOwned::to_owned)
        .or(parts.password)
        .unwrap_or_default();
    let database_name = descriptor
        .database_name()
        .map(ToOwned::to_owned)
        .or(parts.database_name)
        .unwrap_or_else(|| DEFAULT_DATABASE.to_owned());
    let ssl_mode = descriptor
        .ssl_mode()
        .or(parts.ssl_mode)
        .unwrap_or_default();

    let connection_uri = if overridden {
        build_canonical_uri(&host, port, &user, &password, &database_name, ssl_mode)
    } else {
        raw_uri.trim().to_owned()
    };

    Ok(ValidatedConnectionDescriptor::assemble(
        host,
        port,
        user,
        password,
        database_name,
        ssl_mode,
        descriptor.certificates().clone(),
        connection_uri,
    ))
}

fn validate_standard_form(descriptor: &ConnectionDescriptor) -> ValidatedConnectionDescriptor {
    let host = descriptor
        .host()
        .map_or_else(|| DEFAULT_HOST.to_owned(), ToOwned::to_owned);
    let port = descriptor.port().unwrap_or(DEFAULT_PORT);
    let user = descriptor
        .user()
        .map_or_else(|| DEFAULT_USER.to_owned(), ToOwned::to_owned);
    let password = descriptor.password().unwrap_or_default().to_owned();
    let database_name = descriptor
        .database_name()
        .map_or_else(|| DEFAULT_DATABASE.to_owned(), ToOwned::to_owned);
    let ssl_mode = descriptor.ssl_mode().unwrap_or_default();

    let connection_uri =
        build_canonical_uri(&host, port, &user, &password, &database_name, ssl_mode);

    ValidatedConnectionDescriptor::assemble(
        host,
        port,
        user,
        password,
        database_name,
        ssl_mode,
        descriptor.certificates().clone(),
        connection_uri,
    )
}

/// Shorthand for [`validate`] applied to a `prefer`-mode fallback
/// retry: the same coordinates re-expressed in structured form with
/// `sslmode=disable`.
#[must_use]
pub(crate) fn with_ssl_disabled(
    descriptor: &ValidatedConnectionDescriptor,
) -> ValidatedConnectionDescriptor {
    let raw = descriptor
        .as_standard_descriptor()
        .with_ssl_mode(SslMode::Disable);
    validate_standard_form(&raw)
}
