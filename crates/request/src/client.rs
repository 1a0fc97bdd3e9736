use std::sync::Arc;

use bytes::Bytes;
use tracing::{Instrument, Span, field::Empty};
use url::Url;

use crate::{
    Error, RequestConfig, ResponseBody, error::Result, pool::PoolManager, route::Route,
};

/// A handle onto a factory's shared connection pool.
///
/// Cheap to clone; every clone and every handle from the same factory
/// leases connections from one pool under the same timeouts.
#[derive(Clone)]
pub struct Client {
    pool: Arc<PoolManager>,
    config: RequestConfig,
}

impl core::fmt::Debug for Client {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("stats", &self.pool.stats())
            .finish()
    }
}

impl Client {
    pub(crate) const fn new(pool: Arc<PoolManager>, config: RequestConfig) -> Self {
        Self { pool, config }
    }

    #[must_use]
    pub const fn request_config(&self) -> RequestConfig {
        self.config
    }

    #[cfg(test)]
    pub(crate) const fn pool(&self) -> &Arc<PoolManager> {
        &self.pool
    }

    /// Send a request over a pooled HTTPS connection.
    ///
    /// The connection stays leased until the returned body is read to the
    /// end or dropped. Redirects are not followed; a 3xx response is
    /// returned as is.
    ///
    /// # Errors
    /// - [`Error::UnsupportedScheme`] for any non-`https` URL; nothing is dialed.
    /// - [`Error::PoolTimeout`] if no connection slot frees up within the
    ///   connection request timeout.
    /// - [`Error::PoolShutdown`] once the factory is closed.
    /// - [`Error::Http`] for connect, TLS, read and timeout failures.
    pub async fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<ResponseBody>> {
        let url = Url::parse(&request.uri().to_string())?;
        let route = Route::from_url(&url)?;
        let span = request_span(request.method(), &route, &url);

        async {
            let lease = self
                .pool
                .lease(&route, self.config.connection_request_timeout)
                .await?;
            let transport = self.pool.transport()?;
            crate::http::http_impl(transport, lease, url, request).await
        }
        .instrument(span)
        .await
    }

    /// Send a `GET` with an empty body.
    ///
    /// # Errors
    /// See [`send`](Self::send); an unparseable URL is reported as
    /// [`Error::Internal`].
    pub async fn get(&self, url: &str) -> Result<http::Response<ResponseBody>> {
        let request = http::Request::get(url)
            .body(Bytes::new())
            .map_err(|e| Error::Internal(Box::new(e)))?;
        self.send(request).await
    }
}

fn request_span(method: &http::Method, route: &Route, url: &Url) -> Span {
    use opentelemetry_semantic_conventions::attribute as trace;

    tracing::debug_span!(
        "https.request",
        otel.kind = "client",
        { trace::HTTP_REQUEST_METHOD } = method.as_str(),
        { trace::SERVER_ADDRESS } = route.host(),
        { trace::SERVER_PORT } = route.port(),
        { trace::URL_FULL } = url.as_str(),
        { trace::HTTP_RESPONSE_STATUS_CODE } = Empty,
        { trace::HTTP_RESPONSE_BODY_SIZE } = Empty,
        { trace::OTEL_STATUS_CODE } = Empty,
    )
}
