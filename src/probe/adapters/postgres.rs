//! Diesel-backed probe driver for `PostgreSQL` targets.

use crate::connection::domain::ValidatedConnectionDescriptor;
use crate::probe::ports::{ProbeDriver, ProbeDriverError, ProbeSession};
use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::ConnectionError;
use diesel::sql_types::{Bool, Text};
use std::time::Duration;

/// Reads the superuser bit of the connected role.
const SUPERUSER_SQL: &str =
    "SELECT usesuper FROM pg_catalog.pg_user WHERE usename = current_user";

/// Reads the installed schema version, when the versions table exists.
const SCHEMA_VERSION_SQL: &str =
    "SELECT version FROM brunel.versions ORDER BY version DESC LIMIT 1";

/// Reads the create-database privilege of the connected role.
const CAN_CREATE_DB_SQL: &str = "\
    SELECT rolcreatedb OR rolsuper AS can_create_db \
    FROM pg_catalog.pg_roles \
    WHERE rolname = current_user";

#[derive(QueryableByName)]
struct SuperuserRow {
    #[diesel(sql_type = Bool)]
    usesuper: bool,
}

#[derive(QueryableByName)]
struct SchemaVersionRow {
    #[diesel(sql_type = Text)]
    version: String,
}

#[derive(QueryableByName)]
struct CanCreateDbRow {
    #[diesel(sql_type = Bool)]
    can_create_db: bool,
}

/// Probe driver backed by a real `PostgreSQL` connection via Diesel.
///
/// Connection establishment runs on the blocking pool bounded by an
/// external timeout; an attempt that outlives its bound finishes on
/// the blocking pool and releases its connection there.
#[derive(Debug, Clone, Copy, Default)]
pub struct DieselProbeDriver;

impl DieselProbeDriver {
    /// Creates the driver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProbeDriver for DieselProbeDriver {
    async fn connect(
        &self,
        descriptor: &ValidatedConnectionDescriptor,
        timeout: Duration,
    ) -> Result<Box<dyn ProbeSession>, ProbeDriverError> {
        let uri = descriptor.canonical_uri().to_owned();
        let attempt = tokio::task::spawn_blocking(move || {
            PgConnection::establish(&uri).map_err(map_connection_error)
        });

        match tokio::time::timeout(timeout, attempt).await {
            Err(_elapsed) => Err(ProbeDriverError::Timeout(timeout)),
            Ok(Err(join_error)) => Err(ProbeDriverError::Io(join_error.to_string())),
            Ok(Ok(result)) => result.map(|connection| {
                Box::new(DieselProbeSession {
                    connection: Some(connection),
                }) as Box<dyn ProbeSession>
            }),
        }
    }
}

struct DieselProbeSession {
    connection: Option<PgConnection>,
}

impl DieselProbeSession {
    async fn run<F, T>(&mut self, job: F) -> Result<T, ProbeDriverError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, ProbeDriverError> + Send + 'static,
        T: Send + 'static,
    {
        let mut connection = self
            .connection
            .take()
            .ok_or_else(|| ProbeDriverError::Io("probe session already closed".to_owned()))?;

        let join = tokio::task::spawn_blocking(move || {
            let outcome = job(&mut connection);
            (connection, outcome)
        })
        .await;

        match join {
            Ok((connection, outcome)) => {
                self.connection = Some(connection);
                outcome
            }
            Err(join_error) => Err(ProbeDriverError::Io(join_error.to_string())),
        }
    }
}

#[async_trait]
impl ProbeSession for DieselProbeSession {
    async fn is_superuser(&mut self) -> Result<bool, ProbeDriverError> {
        self.run(|connection| {
            let row = diesel::sql_query(SUPERUSER_SQL)
                .get_result::<SuperuserRow>(connection)
                .optional()
                .map_err(map_query_error)?;
            Ok(row.is_some_and(|found| found.usesuper))
        })
        .await
    }

    async fn schema_version(&mut self) -> Result<Option<String>, ProbeDriverError> {
        self.run(|connection| {
            let row = diesel::sql_query(SCHEMA_VERSION_SQL)
                .get_result::<SchemaVersionRow>(connection)
                .optional()
                .map_err(map_query_error)?;
            Ok(row.map(|found| found.version))
        })
        .await
    }

    async fn can_create_database(&mut self) -> Result<bool, ProbeDriverError> {
        self.run(|connection| {
            let row = diesel::sql_query(CAN_CREATE_DB_SQL)
                .get_result::<CanCreateDbRow>(connection)
                .optional()
                .map_err(map_query_error)?;
            Ok(row.is_some_and(|found| found.can_create_db))
        })
        .await
    }

    async fn execute(&mut self, sql: &str) -> Result<(), ProbeDriverError> {
        let statement = sql.to_owned();
        self.run(move |connection| {
            connection.batch_execute(&statement).map_err(map_query_error)
        })
        .await
    }

    async fn close(self: Box<Self>) {
        if let Some(connection) = self.connection {
            // PQfinish can block on the socket; keep it off the runtime.
            tokio::task::spawn_blocking(move || drop(connection))
                .await
                .ok();
        }
    }
}

fn map_connection_error(error: ConnectionError) -> ProbeDriverError {
    match error {
        ConnectionError::BadConnection(message) => classify_bad_connection(message),
        ConnectionError::InvalidConnectionUrl(message) => {
            ProbeDriverError::InvalidConfiguration(message)
        }
        ConnectionError::CouldntSetupConfiguration(inner) => map_query_error(inner),
        other => ProbeDriverError::Io(other.to_string()),
    }
}

fn classify_bad_connection(message: String) -> ProbeDriverError {
    if message.contains("does not support SSL") {
        return ProbeDriverError::NoSslSupport;
    }
    match sqlstate_from_message(&message) {
        Some(code) => ProbeDriverError::Server {
            code: Some(code),
            message,
        },
        None => ProbeDriverError::Io(message),
    }
}

fn map_query_error(error: diesel::result::Error) -> ProbeDriverError {
    match error {
        diesel::result::Error::DatabaseError(_, info) => {
            let message = info.message().to_owned();
            let code = sqlstate_from_message(&message);
            ProbeDriverError::Server { code, message }
        }
        other => ProbeDriverError::Io(other.to_string()),
    }
}

/// Recovers well-known sqlstate codes from libpq diagnostics.
///
/// Diesel's connection errors carry the server message but not the
/// sqlstate, so the two codes the retry policy treats as fatal are
/// recognised by their stable message shapes.
fn sqlstate_from_message(message: &str) -> Option<String> {
    if message.contains("password authentication failed")
        || message.contains("authentication failed")
    {
        return Some("28P01".to_owned());
    }
    if message.contains("database") && message.contains("does not exist") {
        return Some("3D000".to_owned());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssl_rejection_is_recognised() {
        let error =
            classify_bad_connection("server does not support SSL, but SSL was required".to_owned());
        assert_eq!(error, ProbeDriverError::NoSslSupport);
    }

    #[test]
    fn authentication_failures_carry_their_sqlstate() {
        let error = classify_bad_connection(
            "FATAL:  password authentication failed for user \"svc\"".to_owned(),
        );
        assert_eq!(error.sqlstate(), Some("28P01"));
    }

    #[test]
    fn missing_databases_carry_their_sqlstate() {
        let error =
            classify_bad_connection("FATAL:  database \"app\" does not exist".to_owned());
        assert_eq!(error.sqlstate(), Some("3D000"));
    }

    #[test]
    fn unrecognised_failures_stay_io_errors() {
        let error = classify_bad_connection("could not connect to server".to_owned());
        assert!(matches!(error, ProbeDriverError::Io(_)));
    }
}
