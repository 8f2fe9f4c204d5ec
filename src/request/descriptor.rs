//! The normalized, hop-scoped request.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Method;
use url::Url;

use super::options::ByteStream;

/// Body of a [`RequestDescriptor`].
///
/// Exactly one of "no body", "in-memory bytes" and "live stream" holds.
#[derive(Debug)]
pub enum Body {
    /// No body
    Empty,
    /// In-memory bytes; can be re-sent on 307/308 redirects
    Bytes(Bytes),
    /// Live stream; can be sent once
    Stream(StreamBody),
}

impl Body {
    /// Length of an in-memory body, `None` for streams.
    pub fn len(&self) -> Option<usize> {
        match self {
            Body::Empty => Some(0),
            Body::Bytes(b) => Some(b.len()),
            Body::Stream(_) => None,
        }
    }

    /// `true` when there is no body.
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// `true` for a (possibly consumed) stream body.
    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }
}

/// A single-use request body stream.
///
/// The stream is handed to the transport on first transmission; after that
/// the body is still a stream body, but a consumed one.
pub struct StreamBody {
    inner: Option<ByteStream>,
}

impl StreamBody {
    pub(crate) fn new(stream: ByteStream) -> Self {
        Self {
            inner: Some(stream),
        }
    }

    /// Takes the stream for transmission.
    pub(crate) fn take(&mut self) -> Option<ByteStream> {
        self.inner.take()
    }

    /// `true` once the stream has been handed to the transport.
    pub fn is_consumed(&self) -> bool {
        self.inner.is_none()
    }
}

impl std::fmt::Debug for StreamBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBody")
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// A normalized request, valid for a single hop.
///
/// Created by [`crate::request::normalize`] for the original call, and
/// afresh for every redirect hop. Header names are lower-case and unique;
/// the method is upper-case.
#[derive(Debug)]
pub struct RequestDescriptor {
    pub(crate) url: Url,
    pub(crate) method: Method,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Body,
    pub(crate) max_redirects: u32,
    pub(crate) remaining_redirects: u32,
    pub(crate) follow_redirects: bool,
    pub(crate) json: bool,
    pub(crate) form: bool,
    pub(crate) insecure: bool,
    pub(crate) timeout: Option<Duration>,
}

impl RequestDescriptor {
    /// Absolute target URL of this hop (without embedded credentials).
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Method of this hop, upper-case.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Headers of this hop, names lower-case.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body of this hop.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Redirect budget the call started with.
    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    /// Redirects still allowed after this hop.
    pub fn remaining_redirects(&self) -> u32 {
        self.remaining_redirects
    }

    /// `false` when 3xx responses are returned as-is.
    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    /// `true` when the caller asked for JSON in and out.
    pub fn is_json(&self) -> bool {
        self.json
    }

    /// `true` when the body was produced from a form payload.
    pub fn is_form(&self) -> bool {
        self.form
    }

    /// `true` when TLS certificate validation is disabled for this call.
    pub fn is_insecure(&self) -> bool {
        self.insecure
    }

    /// Idle timeout for this call, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Fills in the timeout from client defaults when the call did not set one.
    pub(crate) fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        if self.timeout.is_none() {
            self.timeout = timeout;
        }
        self
    }
}
