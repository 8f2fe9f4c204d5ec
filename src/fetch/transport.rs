//! The request/response exchange underneath the redirect loop.
//!
//! A [`Transport`] performs exactly one exchange: it sends a request and
//! returns the response head with a body that has not been read yet. It never
//! follows redirects and never decompresses.

use std::net::SocketAddr;

use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::BodyExt;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Version};
use url::Url;

use crate::config::ClientConfig;
use crate::error_handling::{FetchError, InitializationError};
use crate::initialization::init_client;
use crate::request::ByteStream;
use crate::response::ResponseFrames;

/// Body of a [`TransportRequest`].
pub enum TransportBody {
    /// No body
    Empty,
    /// In-memory body with a known length
    Bytes(Bytes),
    /// Streamed body, sent with chunked transfer encoding
    Stream(ByteStream),
}

impl std::fmt::Debug for TransportBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportBody::Empty => f.write_str("Empty"),
            TransportBody::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            TransportBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// One hop's request, ready for the wire.
#[derive(Debug)]
pub struct TransportRequest {
    /// Request method
    pub method: Method,
    /// Absolute target URL, without embedded credentials
    pub url: Url,
    /// Complete header set; the transport adds nothing but framing headers
    pub headers: HeaderMap,
    /// Request body
    pub body: TransportBody,
    /// Skip TLS certificate validation
    pub insecure: bool,
}

/// One hop's response, with its body still unread.
pub struct TransportResponse {
    /// Status code
    pub status: StatusCode,
    /// Protocol version
    pub version: Version,
    /// Response headers as received
    pub headers: HeaderMap,
    /// URL the request was sent to
    pub url: Url,
    /// Peer address, when the transport knows it
    pub remote_addr: Option<SocketAddr>,
    /// Unread (and undecoded) body
    pub body: ResponseFrames,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("version", &self.version)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .finish()
    }
}

/// Sends a single request and returns its response.
///
/// Dropping the returned future aborts the exchange and closes its
/// connection; the redirect loop relies on this for idle timeouts.
pub trait Transport: Send + Sync + 'static {
    /// Sends `request` and resolves once the response head has arrived.
    fn send(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, FetchError>>;
}

/// [`Transport`] backed by `reqwest`.
///
/// Holds one client that validates certificates and one that does not; the
/// request's `insecure` flag picks between them, so the choice is per call.
#[derive(Clone)]
pub struct ReqwestTransport {
    verified: reqwest::Client,
    insecure: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds both clients from `config`.
    ///
    /// # Errors
    ///
    /// Returns `InitializationError::HttpClientError` if a client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, InitializationError> {
        Ok(Self {
            verified: init_client(config, false)?,
            insecure: init_client(config, true)?,
        })
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, FetchError>> {
        let client = if request.insecure {
            self.insecure.clone()
        } else {
            self.verified.clone()
        };

        Box::pin(async move {
            let builder = client
                .request(request.method, request.url)
                .headers(request.headers);
            let builder = match request.body {
                TransportBody::Empty => builder,
                TransportBody::Bytes(bytes) => builder.body(bytes),
                TransportBody::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream)),
            };

            let response = builder.send().await.map_err(FetchError::connection)?;

            let status = response.status();
            let version = response.version();
            let headers = response.headers().clone();
            let url = response.url().clone();
            let remote_addr = response.remote_addr();
            // Read as raw frames so trailers survive
            let body = reqwest::Body::from(response)
                .map_err(FetchError::connection)
                .boxed_unsync();

            Ok(TransportResponse {
                status,
                version,
                headers,
                url,
                remote_addr,
                body,
            })
        })
    }
}
