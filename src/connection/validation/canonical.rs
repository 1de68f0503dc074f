//! Canonical URI construction and parsing helpers.

use crate::connection::domain::{ConnectionValidationError, SslMode};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use url::Url;

/// Characters escaped inside the userinfo section of a connection URI.
///
/// Everything that would terminate or restructure the authority
/// component must be escaped; libpq accepts the rest verbatim.
const USERINFO: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Characters escaped inside the database-name path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Builds the canonical connection URI from final field values.
///
/// The construction is deterministic regardless of input order: scheme
/// `postgresql`, encoded userinfo, explicit port, encoded database
/// path, and a trailing `sslmode` parameter.
#[must_use]
pub fn build_canonical_uri(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    database_name: &str,
    ssl_mode: SslMode,
) -> String {
    let encoded_user = utf8_percent_encode(user, USERINFO);
    let encoded_database = utf8_percent_encode(database_name, PATH_SEGMENT);
    if password.is_empty() {
        format!(
            "postgresql://{encoded_user}@{host}:{port}/{encoded_database}?sslmode={ssl_mode}"
        )
    } else {
        let encoded_password = utf8_percent_encode(password, USERINFO);
        format!(
            "postgresql://{encoded_user}:{encoded_password}@{host}:{port}/{encoded_database}?sslmode={ssl_mode}"
        )
    }
}

/// Connection fields recovered from a raw URI.
///
/// Absent components stay `None`; the validator applies defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct UriParts {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database_name: Option<String>,
    pub ssl_mode: Option<SslMode>,
}

/// Parses a raw connection URI into its structured fields.
pub(crate) fn parse_uri(raw: &str) -> Result<UriParts, ConnectionValidationError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|err| ConnectionValidationError::InvalidConnectionUri(err.to_string()))?;

    match parsed.scheme() {
        "postgres" | "postgresql" => {}
        other => {
            return Err(ConnectionValidationError::UnsupportedUriScheme(
                other.to_owned(),
            ));
        }
    }

    let host = parsed.host_str().map(ToOwned::to_owned);
    let port = parsed.port();

    let user = match parsed.username() {
        "" => None,
        encoded => Some(decode_component(encoded)),
    };
    let password = parsed.password().map(decode_component);

    let database_name = match parsed.path().trim_start_matches('/') {
        "" => None,
        encoded => Some(decode_component(encoded)),
    };

    let mut ssl_mode = None;
    for (key, value) in parsed.query_pairs() {
        if key == "sslmode" {
            ssl_mode = Some(SslMode::try_from(value.as_ref())?);
        }
    }

    Ok(UriParts {
        host,
        port,
        user,
        password,
        database_name,
        ssl_mode,
    })
}

fn decode_component(encoded: &str) -> String {
    percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}
