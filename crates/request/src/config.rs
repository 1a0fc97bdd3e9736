use std::time::Duration;

use serde::Deserialize;

use crate::{Error, error::Result};

const USER_AGENT: &str = concat!("pooled-https/", env!("CARGO_PKG_VERSION"));

const DEFAULT_CONNECTION_REQUEST_TIMEOUT_SECONDS: u64 = 5;
const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 5;
const DEFAULT_SOCKET_TIMEOUT_SECONDS: u64 = 20;
const DEFAULT_MAX_TOTAL_CONNECTIONS_IN_POOL: usize = 100;
const DEFAULT_MAX_CONNECTIONS_PER_ROUTE: usize = 100;
const DEFAULT_IDLE_CONNECTION_TIMEOUT_SECONDS: u64 = 60;

/// Tunables for a [`ClientFactory`](crate::ClientFactory).
///
/// Every field is optional when deserialized; missing fields take their
/// defaults. All values must be positive, which is checked when the factory
/// is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// How long to wait for a connection slot from the pool.
    pub connection_request_timeout_seconds: u64,
    /// How long to wait for the TCP and TLS handshake.
    pub connect_timeout_seconds: u64,
    /// How long to wait for data on an established connection, per read.
    pub socket_timeout_seconds: u64,
    /// Cap on leased connections across all routes.
    pub max_total_connections_in_pool: usize,
    /// Cap on leased connections to a single route.
    pub max_connections_per_route: usize,
    /// Idle routes and idle transport connections older than this are evicted.
    pub idle_connection_timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection_request_timeout_seconds: DEFAULT_CONNECTION_REQUEST_TIMEOUT_SECONDS,
            connect_timeout_seconds: DEFAULT_CONNECT_TIMEOUT_SECONDS,
            socket_timeout_seconds: DEFAULT_SOCKET_TIMEOUT_SECONDS,
            max_total_connections_in_pool: DEFAULT_MAX_TOTAL_CONNECTIONS_IN_POOL,
            max_connections_per_route: DEFAULT_MAX_CONNECTIONS_PER_ROUTE,
            idle_connection_timeout_seconds: DEFAULT_IDLE_CONNECTION_TIMEOUT_SECONDS,
        }
    }
}

impl ClientConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        let fields = [
            (
                "connection_request_timeout_seconds",
                self.connection_request_timeout_seconds,
            ),
            ("connect_timeout_seconds", self.connect_timeout_seconds),
            ("socket_timeout_seconds", self.socket_timeout_seconds),
            (
                "max_total_connections_in_pool",
                self.max_total_connections_in_pool as u64,
            ),
            (
                "max_connections_per_route",
                self.max_connections_per_route as u64,
            ),
            (
                "idle_connection_timeout_seconds",
                self.idle_connection_timeout_seconds,
            ),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(Error::InvalidConfig { field, value });
            }
        }
        for (field, value) in [
            (
                "max_total_connections_in_pool",
                self.max_total_connections_in_pool,
            ),
            ("max_connections_per_route", self.max_connections_per_route),
        ] {
            if value > tokio::sync::Semaphore::MAX_PERMITS {
                return Err(Error::InvalidConfig {
                    field,
                    value: value as u64,
                });
            }
        }
        Ok(())
    }

    pub(crate) const fn idle_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_connection_timeout_seconds)
    }

    /// Idle keep-alive sockets kept per host. Never more than the whole pool.
    pub(crate) const fn max_idle_per_host(&self) -> usize {
        if self.max_connections_per_route < self.max_total_connections_in_pool {
            self.max_connections_per_route
        } else {
            self.max_total_connections_in_pool
        }
    }

    /// Transport settings: only `https` URLs are accepted, certificates are
    /// verified against the platform's native root store, and redirects are
    /// handed back to the caller so every hop is leased on its own route.
    pub(crate) fn transport_builder(&self) -> reqwest::ClientBuilder {
        let request = self.request_config();
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .use_rustls_tls()
            .https_only(true)
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(request.connect_timeout)
            .read_timeout(request.socket_timeout)
            .pool_max_idle_per_host(self.max_idle_per_host())
            .pool_idle_timeout(self.idle_connection_timeout())
    }

    pub(crate) fn build_transport(&self) -> Result<reqwest::Client> {
        self.transport_builder().build().map_err(Error::Build)
    }

    pub(crate) const fn request_config(&self) -> RequestConfig {
        RequestConfig {
            connection_request_timeout: Duration::from_secs(
                self.connection_request_timeout_seconds,
            ),
            connect_timeout: Duration::from_secs(self.connect_timeout_seconds),
            socket_timeout: Duration::from_secs(self.socket_timeout_seconds),
        }
    }
}

/// The timeouts applied to every request issued through a client handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestConfig {
    pub connection_request_timeout: Duration,
    pub connect_timeout: Duration,
    pub socket_timeout: Duration,
}
