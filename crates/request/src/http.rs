use std::{
    pin::Pin,
    task::{Context, Poll},
};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, stream::BoxStream};
use http::header::HOST;
use opentelemetry_semantic_conventions::attribute as trace;
use pin_project_lite::pin_project;
use tracing::Span;
use url::Url;

use crate::{Error, error::Result, pool::Lease};

pub async fn http_impl(
    client: reqwest::Client,
    lease: Lease,
    url: Url,
    mut request: http::Request<Bytes>,
) -> Result<http::Response<ResponseBody>> {
    // The transport derives `Host` from the URL; a caller-supplied one is dropped.
    request.headers_mut().remove(HOST);
    let (parts, body) = request.into_parts();
    let r = client
        .request(parts.method, url)
        .headers(parts.headers)
        .body(body);
    let span = Span::current();
    let mut resp = match r.send().await {
        Ok(r) => {
            let status = r.status();
            span.record(trace::HTTP_RESPONSE_STATUS_CODE, status.as_u16());
            if status.is_server_error() || status.is_client_error() {
                span.record(trace::OTEL_STATUS_CODE, "ERROR");
            }
            r
        }
        Err(e) => {
            span.record(trace::OTEL_STATUS_CODE, "ERROR");
            return Err(Error::Http(e));
        }
    };

    let mut builder = http::response::Builder::new()
        .status(resp.status())
        .version(resp.version());
    if let Some(h) = builder.headers_mut() {
        *h = std::mem::take(resp.headers_mut());
    }
    let body = ResponseBody::new(span, lease, resp.bytes_stream().boxed());
    builder.body(body).map_err(|e| Error::Internal(Box::new(e)))
}

pin_project! {
    /// Streamed response body.
    ///
    /// Keeps its connection leased from the pool until the body is fully
    /// read, fails, or is dropped.
    pub struct ResponseBody {
        #[pin]
        stream: BoxStream<'static, reqwest::Result<Bytes>>,
        span: Span,
        size: usize,
        lease: Option<Lease>,
    }
}

impl ResponseBody {
    fn new(span: Span, lease: Lease, stream: BoxStream<'static, reqwest::Result<Bytes>>) -> Self {
        Self {
            stream,
            span,
            size: 0,
            lease: Some(lease),
        }
    }

    /// Read the rest of the body into memory.
    ///
    /// # Errors
    /// Returns the first transport error hit while reading, including a
    /// socket timeout.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl core::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResponseBody")
            .field("size", &self.size)
            .field("route", &self.lease.as_ref().map(Lease::route))
            .finish_non_exhaustive()
    }
}

impl Stream for ResponseBody {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let span = &this.span;
        let enter = span.enter();
        match this.stream.poll_next(cx) {
            Poll::Ready(None) => {
                span.record(trace::OTEL_STATUS_CODE, "OK");
                span.record(trace::HTTP_RESPONSE_BODY_SIZE, *this.size as u64);
                drop(enter);
                *this.span = Span::none();
                this.lease.take();
                Poll::Ready(None)
            }
            Poll::Ready(Some(Ok(d))) => {
                *this.size += d.len();
                Poll::Ready(Some(Ok(d)))
            }
            Poll::Ready(Some(Err(e))) => {
                span.record(trace::OTEL_STATUS_CODE, "ERROR");
                drop(enter);
                *this.span = Span::none();
                this.lease.take();
                Poll::Ready(Some(Err(Error::Http(e))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
