//! Operator guidance for connectivity failures.

/// Hosts that resolve to the Docker host machine from inside a
/// container.
const DOCKER_LOCAL_HOSTS: [&str; 4] = [
    "host.docker.internal",
    "localhost",
    "127.0.0.1",
    "172.17.0.1",
];

/// Guidance for reaching a host-local database from inside Docker.
const DOCKER_HINT: &str = "\
To connect to a localhost database from docker you need to either use \"host\" networking mode or:
1) If using docker-compose.yml, uncomment extra_hosts:
  extra_hosts:
    - \"host.docker.internal:host-gateway\"
2) Ensure the target database postgresql.conf contains either:
  listen_addresses = 'localhost,172.17.0.1'
  OR a more permissive setting like:
  listen_addresses = '*'
3) Ensure the target database pg_hba.conf contains:
  host  all   all   172.17.0.0/16  md5
4) Restart the postgresql server to apply the changes.
5) Ensure the user you connect with has an encrypted password.
6) Use \"172.17.0.1\" or \"host.docker.internal\" instead of \"localhost\" in the above connection details";

/// Returns Docker networking guidance for a failed local connection.
///
/// Only produced when the process runs inside a container and the
/// target host is one of the host-local aliases; `None` otherwise.
#[must_use]
pub fn docker_localhost_hint(host: &str, in_docker: bool) -> Option<&'static str> {
    (in_docker && DOCKER_LOCAL_HOSTS.contains(&host)).then_some(DOCKER_HINT)
}
