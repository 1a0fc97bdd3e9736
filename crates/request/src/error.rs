use std::time::Duration;

use crate::route::Route;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A tunable was zero when the factory was built.
    #[error("invalid client config: {field} must be positive, got {value}")]
    InvalidConfig { field: &'static str, value: u64 },

    /// The shared transport could not be assembled.
    #[error("failed to build HTTPS transport: {0}")]
    Build(#[source] reqwest::Error),

    #[error("unsupported scheme {scheme:?}: only https is allowed")]
    UnsupportedScheme { scheme: String },

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("URL has no host: {url}")]
    MissingHost { url: String },

    /// No connection slot became available within the connection request timeout.
    #[error("timed out after {waited:?} waiting for a pooled connection to {route}")]
    PoolTimeout { route: Route, waited: Duration },

    #[error("connection pool has been shut down")]
    PoolShutdown,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Whether the failure came from one of the configured timeouts: waiting
    /// for a pool slot, connecting, or reading.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::PoolTimeout { .. } => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}
