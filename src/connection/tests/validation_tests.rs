//! Unit tests for the validation transform.

use crate::connection::domain::{
    ConnectionDescriptor, ConnectionValidationError, DescriptorKind, SslMode,
};
use crate::connection::validation::{
    DEFAULT_DATABASE, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_USER, validate,
};
use rstest::rstest;

#[rstest]
fn standard_descriptor_receives_documented_defaults() {
    let validated = validate(&ConnectionDescriptor::with_kind(DescriptorKind::Standard))
        .expect("empty standard descriptor should validate");

    assert_eq!(validated.host(), DEFAULT_HOST);
    assert_eq!(validated.port(), DEFAULT_PORT);
    assert_eq!(validated.user(), DEFAULT_USER);
    assert_eq!(validated.database_name(), DEFAULT_DATABASE);
    assert_eq!(validated.ssl_mode(), SslMode::Prefer);
    assert_eq!(
        validated.canonical_uri(),
        "postgresql://postgres@localhost:5432/postgres?sslmode=prefer"
    );
}

#[rstest]
fn descriptor_without_kind_or_fields_is_rejected() {
    let result = validate(&ConnectionDescriptor::new());
    assert_eq!(
        result,
        Err(ConnectionValidationError::UnsupportedDescriptorKind)
    );
}

#[rstest]
fn kind_is_inferred_from_structured_fields() {
    let validated = validate(&ConnectionDescriptor::new().with_host("db.internal"))
        .expect("host-bearing descriptor should validate");
    assert_eq!(validated.host(), "db.internal");
}

#[rstest]
fn kind_is_inferred_from_a_raw_uri() {
    let validated = validate(
        &ConnectionDescriptor::new().with_connection_uri("postgresql://db.internal/app"),
    )
    .expect("uri descriptor should validate");
    assert_eq!(validated.host(), "db.internal");
    assert_eq!(validated.database_name(), "app");
}

#[rstest]
fn uri_fields_are_parsed_and_defaulted() {
    let validated = validate(&ConnectionDescriptor::from_uri(
        "postgres://svc:pw@db.internal:6432/app?sslmode=require",
    ))
    .expect("uri descriptor should validate");

    assert_eq!(validated.host(), "db.internal");
    assert_eq!(validated.port(), 6432);
    assert_eq!(validated.user(), "svc");
    assert_eq!(validated.password(), "pw");
    assert_eq!(validated.database_name(), "app");
    assert_eq!(validated.ssl_mode(), SslMode::Require);
}

#[rstest]
fn uri_absent_fields_fall_back_to_defaults() {
    let validated = validate(&ConnectionDescriptor::from_uri("postgresql://db.internal"))
        .expect("uri descriptor should validate");

    assert_eq!(validated.port(), DEFAULT_PORT);
    assert_eq!(validated.user(), DEFAULT_USER);
    assert_eq!(validated.database_name(), DEFAULT_DATABASE);
    assert_eq!(validated.ssl_mode(), SslMode::Prefer);
}

#[rstest]
fn explicit_structured_fields_win_over_uri_values() {
    let validated = validate(
        &ConnectionDescriptor::from_uri("postgresql://svc:pw@db.internal:6432/app")
            .with_port(7432)
            .with_user("admin"),
    )
    .expect("uri descriptor should validate");

    assert_eq!(validated.port(), 7432);
    assert_eq!(validated.user(), "admin");
    // Overrides force a canonical rebuild so the URI stays in sync.
    assert!(validated.canonical_uri().contains(":7432/"));
    assert!(validated.canonical_uri().starts_with("postgresql://admin:"));
}

#[rstest]
fn unmodified_raw_uri_is_retained_verbatim() {
    let raw = "postgres://svc:pw@db.internal:6432/app?sslmode=require";
    let validated =
        validate(&ConnectionDescriptor::from_uri(raw)).expect("uri descriptor should validate");
    assert_eq!(validated.canonical_uri(), raw);
}

#[rstest]
fn non_postgres_scheme_is_rejected() {
    let result = validate(&ConnectionDescriptor::from_uri("mysql://db.internal/app"));
    assert_eq!(
        result,
        Err(ConnectionValidationError::UnsupportedUriScheme(
            "mysql".to_owned()
        ))
    );
}

#[rstest]
fn malformed_uri_detail_excludes_the_uri_text() {
    let result = validate(&ConnectionDescriptor::from_uri("postgresql://u:secret@["));
    let Err(ConnectionValidationError::InvalidConnectionUri(detail)) = result else {
        panic!("expected an invalid-URI error");
    };
    assert!(!detail.contains("secret"));
}

#[rstest]
fn validation_is_idempotent_for_the_standard_form() {
    let validated = validate(
        &ConnectionDescriptor::with_kind(DescriptorKind::Standard)
            .with_host("db.internal")
            .with_port(6432)
            .with_user("svc")
            .with_password("pw")
            .with_database_name("app")
            .with_ssl_mode(SslMode::Require),
    )
    .expect("descriptor should validate");

    let revalidated = validate(&validated.as_standard_descriptor())
        .expect("revalidation should succeed");
    assert_eq!(revalidated, validated);
}

#[rstest]
fn validation_is_representation_independent() {
    let validated = validate(
        &ConnectionDescriptor::with_kind(DescriptorKind::Standard)
            .with_host("db.internal")
            .with_user("svc")
            .with_password("pw")
            .with_database_name("app"),
    )
    .expect("descriptor should validate");

    let via_uri =
        validate(&validated.as_uri_descriptor()).expect("uri round-trip should validate");
    assert_eq!(via_uri, validated);
}

#[rstest]
fn credentials_with_reserved_characters_round_trip_through_the_uri_form() {
    let validated = validate(
        &ConnectionDescriptor::with_kind(DescriptorKind::Standard)
            .with_user("svc@corp")
            .with_password("p@ss: word/#"),
    )
    .expect("descriptor should validate");

    let via_uri =
        validate(&validated.as_uri_descriptor()).expect("uri round-trip should validate");
    assert_eq!(via_uri.user(), "svc@corp");
    assert_eq!(via_uri.password(), "p@ss: word/#");
    assert_eq!(via_uri, validated);
}

#[rstest]
fn connection_uri_kind_without_uri_uses_structured_fields() {
    let validated = validate(
        &ConnectionDescriptor::with_kind(DescriptorKind::ConnectionUri).with_host("db.internal"),
    )
    .expect("descriptor should validate");

    assert_eq!(validated.host(), "db.internal");
    assert!(validated.canonical_uri().contains("db.internal"));
}
