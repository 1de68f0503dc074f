//! Connection probing with SSL-mode fallback and capability checks.

use crate::connection::domain::{SslMode, ValidatedConnectionDescriptor};
use crate::connection::validation::with_ssl_disabled;
use crate::probe::domain::{ErrorClass, ProbeError, ProbeReport, docker_localhost_hint};
use crate::probe::ports::{ProbeCheck, ProbeDriver, ProbeDriverError, ProbeSession};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Bound for quick connectivity checks.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Bound for authoritative checks preceding a session open.
pub const AUTHORITATIVE_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable marking a containerised deployment.
const IN_DOCKER_ENV: &str = "BRUNEL_IN_DOCKER";

/// Internal attempt outcome, before folding into a [`ProbeError`].
enum AttemptError {
    Driver(ProbeDriverError),
    NotSuperuser,
    Check(ProbeDriverError),
}

/// Probes database targets with a bounded timeout.
///
/// A probe opens a connection, optionally asserts the superuser bit,
/// runs an optional caller-supplied setup check, opportunistically
/// discovers the installed schema version and create-database
/// privilege, and always closes the session before returning.
pub struct ConnectionProber<D>
where
    D: ProbeDriver,
{
    driver: Arc<D>,
    timeout: Duration,
    in_docker: bool,
}

impl<D> Clone for ConnectionProber<D>
where
    D: ProbeDriver,
{
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            timeout: self.timeout,
            in_docker: self.in_docker,
        }
    }
}

impl<D> ConnectionProber<D>
where
    D: ProbeDriver,
{
    /// Creates a prober with the quick-check timeout.
    #[must_use]
    pub fn new(driver: Arc<D>) -> Self {
        Self {
            driver,
            timeout: DEFAULT_PROBE_TIMEOUT,
            in_docker: std::env::var_os(IN_DOCKER_ENV).is_some(),
        }
    }

    /// Overrides the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides containerised-deployment detection.
    #[must_use]
    pub const fn with_docker_hints(mut self, in_docker: bool) -> Self {
        self.in_docker = in_docker;
        self
    }

    /// Probes a validated descriptor.
    ///
    /// On the specific "server does not support SSL" condition with
    /// `sslmode=prefer`, retries exactly once with `sslmode=disable`
    /// and tags the report with `ssl_fallback_used`. The fallback is a
    /// pure function of the inputs, never sticky across calls.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ProbeError`]; expected failure modes
    /// never surface as panics.
    pub async fn probe(
        &self,
        descriptor: &ValidatedConnectionDescriptor,
        require_superuser: bool,
        check: Option<&dyn ProbeCheck>,
    ) -> Result<ProbeReport, ProbeError> {
        match self.attempt(descriptor, require_superuser, check).await {
            Ok(report) => Ok(report),
            Err(AttemptError::Driver(ProbeDriverError::NoSslSupport))
                if descriptor.ssl_mode() == SslMode::Prefer =>
            {
                warn!(
                    host = descriptor.host(),
                    "server does not support sslmode=prefer; falling back to sslmode=disable"
                );
                let fallback = with_ssl_disabled(descriptor);
                match self.attempt(&fallback, require_superuser, check).await {
                    Ok(report) => Ok(report.via_ssl_fallback()),
                    Err(error) => Err(self.to_probe_error(error, &fallback)),
                }
            }
            Err(error) => Err(self.to_probe_error(error, descriptor)),
        }
    }

    async fn attempt(
        &self,
        descriptor: &ValidatedConnectionDescriptor,
        require_superuser: bool,
        check: Option<&dyn ProbeCheck>,
    ) -> Result<ProbeReport, AttemptError> {
        let mut session = self
            .driver
            .connect(descriptor, self.timeout)
            .await
            .map_err(AttemptError::Driver)?;

        let outcome =
            Self::inspect(session.as_mut(), descriptor, require_superuser, check).await;
        // The session is released on every path, including check
        // failures: scoped acquisition with guaranteed close.
        session.close().await;
        outcome
    }

    async fn inspect(
        session: &mut dyn ProbeSession,
        descriptor: &ValidatedConnectionDescriptor,
        require_superuser: bool,
        check: Option<&dyn ProbeCheck>,
    ) -> Result<ProbeReport, AttemptError> {
        if require_superuser {
            let superuser = session.is_superuser().await.map_err(AttemptError::Driver)?;
            if !superuser {
                return Err(AttemptError::NotSuperuser);
            }
        }

        if let Some(setup_check) = check {
            setup_check
                .run(session)
                .await
                .map_err(AttemptError::Check)?;
        }

        // Ancillary discovery is best-effort: a failing catalog query
        // degrades to "unknown" rather than failing the probe.
        let schema_version = session.schema_version().await.ok().flatten();
        let can_create_db = session.can_create_database().await.ok();

        Ok(ProbeReport::new(
            descriptor.clone(),
            schema_version,
            can_create_db,
        ))
    }

    fn to_probe_error(
        &self,
        error: AttemptError,
        descriptor: &ValidatedConnectionDescriptor,
    ) -> ProbeError {
        let probe_error = match error {
            AttemptError::NotSuperuser => ProbeError::new(
                ErrorClass::NotSuperuser,
                "provided user must be a superuser",
            ),
            AttemptError::Driver(driver_error) | AttemptError::Check(driver_error) => {
                classify_driver_error(&driver_error, descriptor)
            }
        };

        match docker_localhost_hint(descriptor.host(), self.in_docker) {
            Some(hint) if probe_error.class() == ErrorClass::TransientConnectivity => {
                probe_error.with_hint(hint)
            }
            _ => probe_error,
        }
    }
}

fn classify_driver_error(
    error: &ProbeDriverError,
    descriptor: &ValidatedConnectionDescriptor,
) -> ProbeError {
    let detail = format!("{error} ({})", descriptor.redacted_uri());
    match error {
        ProbeDriverError::InvalidConfiguration(_) => {
            ProbeError::new(ErrorClass::Configuration, detail)
        }
        ProbeDriverError::Server {
            code: Some(code), ..
        } => match code.as_str() {
            "28P01" => ProbeError::new(ErrorClass::Authentication, detail).with_code(code.clone()),
            "3D000" => ProbeError::new(ErrorClass::DatabaseMissing, detail).with_code(code.clone()),
            _ => {
                ProbeError::new(ErrorClass::TransientConnectivity, detail).with_code(code.clone())
            }
        },
        ProbeDriverError::NoSslSupport
        | ProbeDriverError::Timeout(_)
        | ProbeDriverError::Server { code: None, .. }
        | ProbeDriverError::Io(_) => {
            ProbeError::new(ErrorClass::TransientConnectivity, detail)
        }
    }
}
