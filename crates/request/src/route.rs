use std::fmt;

use url::Url;

use crate::{Error, error::Result};

/// Schemes the transport will dial. Plain `http` is deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Https,
}

impl Scheme {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "https" => Some(Self::Https),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Https => "https",
        }
    }

    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Https => 443,
        }
    }
}

/// A pooling bucket: connections are capped per `(scheme, host, port)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    scheme: Scheme,
    /// Pre-normalized: trimmed of trailing dots and lowercased.
    host: String,
    port: u16,
}

impl Route {
    /// Resolve the route a request to `url` would be pooled under.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedScheme`] for anything but `https`, and
    /// [`Error::MissingHost`] for URLs without a host.
    pub fn from_url(url: &Url) -> Result<Self> {
        let scheme = Scheme::parse(url.scheme()).ok_or_else(|| Error::UnsupportedScheme {
            scheme: url.scheme().to_string(),
        })?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::MissingHost {
                url: url.to_string(),
            })?
            .trim_end_matches('.')
            .to_ascii_lowercase();
        let port = url.port().unwrap_or_else(|| scheme.default_port());
        Ok(Self { scheme, host, port })
    }

    #[must_use]
    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(s: &str) -> Result<Route> {
        Route::from_url(&Url::parse(s).unwrap())
    }

    #[test]
    fn https_uses_default_port() {
        let r = route("https://Example.COM./path?q=1").unwrap();
        assert_eq!(r.scheme(), Scheme::Https);
        assert_eq!(r.host(), "example.com");
        assert_eq!(r.port(), 443);
        assert_eq!(r.to_string(), "https://example.com:443");
    }

    #[test]
    fn explicit_port_is_a_distinct_route() {
        let a = route("https://example.com/").unwrap();
        let b = route("https://example.com:8443/").unwrap();
        assert_ne!(a, b);
        assert_eq!(b.port(), 8443);
        assert_eq!(a, route("https://example.com:443/other").unwrap());
    }

    #[test]
    fn plaintext_is_rejected() {
        let err = route("http://example.com/").unwrap_err();
        assert!(
            matches!(err, Error::UnsupportedScheme { ref scheme } if scheme == "http"),
            "{err:?}"
        );
    }

    #[test]
    fn other_schemes_are_rejected() {
        for url in ["ws://example.com/", "wss://example.com/", "ftp://example.com/"] {
            assert!(matches!(
                route(url),
                Err(Error::UnsupportedScheme { .. })
            ));
        }
    }

    #[test]
    fn ip_literal_host() {
        let r = route("https://127.0.0.1:9443/").unwrap();
        assert_eq!(r.host(), "127.0.0.1");
        assert_eq!(r.port(), 9443);
    }
}
