//! The response delivered to the caller.
//!
//! A [`Response`] looks the same whether or not its body is being
//! decompressed: status, headers and the rest of the head are those the
//! server sent, and the bytes read from it are already decoded.

mod body;
mod decode;

use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::stream::Stream;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Version};
use url::Url;

pub use body::ResponseFrames;

use crate::error_handling::FetchError;
use crate::fetch::TransportResponse;
use body::ResponseBody;
use decode::Decoder;

/// Everything about a response except its body.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    trailers: HeaderMap,
    url: Url,
    remote_addr: Option<SocketAddr>,
}

impl ResponseHead {
    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Negotiated protocol version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Response headers as received.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Trailers sent after the body. Empty until the body has been read to the end.
    pub fn trailers(&self) -> &HeaderMap {
        &self.trailers
    }

    /// URL of the hop that produced this response.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Address of the peer the response came from, when known.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }
}

/// A terminal response: the end of the redirect chain.
///
/// Bodies with `content-encoding: gzip` or `deflate` are decoded as they are
/// read, except for responses to HEAD requests.
pub struct Response {
    head: ResponseHead,
    body: ResponseBody,
}

impl Response {
    /// Wraps a transport response for delivery to the caller.
    pub(crate) fn finalize(
        hop: TransportResponse,
        method: &Method,
        idle_timeout: Option<Duration>,
    ) -> Self {
        let decoder = if method == Method::HEAD {
            None
        } else {
            Decoder::for_headers(&hop.headers)
        };
        if let Some(decoder) = &decoder {
            log::debug!("Decoding response from {} with {:?}", hop.url, decoder);
        }

        Self {
            head: ResponseHead {
                status: hop.status,
                version: hop.version,
                headers: hop.headers,
                trailers: HeaderMap::new(),
                url: hop.url,
                remote_addr: hop.remote_addr,
            },
            body: ResponseBody::new(hop.body, decoder, idle_timeout),
        }
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.head.status
    }

    /// Negotiated protocol version.
    pub fn version(&self) -> Version {
        self.head.version
    }

    /// Response headers as received.
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Trailers sent after the body. Empty until the body has been read to the end.
    pub fn trailers(&self) -> &HeaderMap {
        &self.head.trailers
    }

    /// URL of the hop that produced this response.
    pub fn url(&self) -> &Url {
        &self.head.url
    }

    /// Address of the peer, when known.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.head.remote_addr
    }

    /// Everything but the body.
    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// Drops the body, keeping the head.
    pub fn into_head(self) -> ResponseHead {
        self.head
    }

    /// Sets (or clears) the idle timeout for body reads.
    ///
    /// When no data arrives for this long, the read fails with
    /// [`FetchError::Timeout`] and the connection is dropped.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.body.set_idle_timeout(timeout);
    }

    /// Reads the next chunk of the body; `Ok(None)` at the end.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        self.body.next_chunk(&mut self.head.trailers).await
    }

    /// Reads the rest of the body into memory.
    pub async fn bytes(mut self) -> Result<Bytes, FetchError> {
        self.read_to_end().await
    }

    /// Reads the rest of the body as text, replacing invalid UTF-8.
    pub async fn text(self) -> Result<String, FetchError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads the rest of the body, keeping the response (and its trailers) around.
    pub(crate) async fn read_to_end(&mut self) -> Result<Bytes, FetchError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    /// Converts the body into a stream of chunks.
    pub fn bytes_stream(self) -> impl Stream<Item = Result<Bytes, FetchError>> {
        futures::stream::unfold(Some(self), |state| async move {
            let mut response = state?;
            match response.chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(response))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.head.status)
            .field("version", &self.head.version)
            .field("url", &self.head.url.as_str())
            .field("headers", &self.head.headers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use futures::StreamExt;
    use http_body_util::{BodyExt, Full};
    use reqwest::header::{HeaderValue, CONTENT_ENCODING};
    use std::io::Write;

    fn transport_response(headers: HeaderMap, body: Bytes) -> TransportResponse {
        TransportResponse {
            status: StatusCode::OK,
            version: Version::HTTP_11,
            headers,
            url: Url::parse("http://localhost/").unwrap(),
            remote_addr: None,
            body: Full::new(body)
                .map_err(|never| match never {})
                .boxed_unsync(),
        }
    }

    fn gzipped(data: &[u8]) -> (HeaderMap, Bytes) {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        (headers, Bytes::from(encoder.finish().unwrap()))
    }

    #[tokio::test]
    async fn test_gzip_body_is_decoded_and_head_preserved() {
        let (headers, body) = gzipped(b"response");
        let response = Response::finalize(transport_response(headers, body), &Method::GET, None);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_ENCODING], "gzip");
        assert_eq!(&response.bytes().await.unwrap()[..], b"response");
    }

    #[tokio::test]
    async fn test_head_response_is_not_decoded() {
        let (headers, body) = gzipped(b"response");
        let raw = body.clone();
        let response = Response::finalize(transport_response(headers, body), &Method::HEAD, None);
        assert_eq!(response.bytes().await.unwrap(), raw);
    }

    #[tokio::test]
    async fn test_empty_gzip_body_reads_as_empty() {
        for status in [StatusCode::NO_CONTENT, StatusCode::NOT_MODIFIED, StatusCode::OK] {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            let mut hop = transport_response(headers, Bytes::new());
            hop.status = status;
            let response = Response::finalize(hop, &Method::GET, None);
            assert_eq!(response.status(), status);
            assert!(response.bytes().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_unknown_encoding_passes_through() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("br"));
        let response = Response::finalize(
            transport_response(headers, Bytes::from_static(b"opaque")),
            &Method::GET,
            None,
        );
        assert_eq!(response.text().await.unwrap(), "opaque");
    }

    #[tokio::test]
    async fn test_bytes_stream_yields_body() {
        let response = Response::finalize(
            transport_response(HeaderMap::new(), Bytes::from_static(b"streamed")),
            &Method::GET,
            None,
        );
        let chunks: Vec<_> = response.bytes_stream().collect().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(&chunks[0].as_ref().unwrap()[..], b"streamed");
    }
}
