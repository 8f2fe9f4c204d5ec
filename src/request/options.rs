//! Caller-facing request input types.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};

/// A live request body: chunks of bytes produced on demand.
pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// What the caller asked for: either a bare URL or a full options record.
///
/// A bare URL is equivalent to `RequestOptions { url: Some(url), ..Default::default() }`.
#[derive(Debug)]
pub enum RequestInput {
    /// A URL string, absolute or relative to `http://localhost`
    Url(String),
    /// A full options record
    Options(RequestOptions),
}

impl RequestInput {
    /// Converts the input into an options record.
    pub fn into_options(self) -> RequestOptions {
        match self {
            RequestInput::Url(url) => RequestOptions::new(url),
            RequestInput::Options(options) => options,
        }
    }
}

impl From<&str> for RequestInput {
    fn from(url: &str) -> Self {
        RequestInput::Url(url.to_string())
    }
}

impl From<String> for RequestInput {
    fn from(url: String) -> Self {
        RequestInput::Url(url)
    }
}

impl From<&String> for RequestInput {
    fn from(url: &String) -> Self {
        RequestInput::Url(url.clone())
    }
}

impl From<url::Url> for RequestInput {
    fn from(url: url::Url) -> Self {
        RequestInput::Url(url.into())
    }
}

impl From<RequestOptions> for RequestInput {
    fn from(options: RequestOptions) -> Self {
        RequestInput::Options(options)
    }
}

/// Request body as supplied by the caller.
pub enum BodyInput {
    /// Raw bytes, sent as-is
    Bytes(Bytes),
    /// Text; JSON-encoded as a string literal when the `json` flag is set
    Text(String),
    /// A JSON value, always serialized to JSON text
    Json(serde_json::Value),
    /// A live stream; sent with chunked transfer encoding and never buffered
    Stream(ByteStream),
}

impl BodyInput {
    /// Wraps a byte stream as a request body.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
    {
        BodyInput::Stream(stream.boxed())
    }

    pub(crate) fn is_stream(&self) -> bool {
        matches!(self, BodyInput::Stream(_))
    }

    /// `true` for in-memory bodies with no content.
    pub(crate) fn is_empty(&self) -> bool {
        match self {
            BodyInput::Bytes(b) => b.is_empty(),
            BodyInput::Text(s) => s.is_empty(),
            BodyInput::Json(_) | BodyInput::Stream(_) => false,
        }
    }
}

impl std::fmt::Debug for BodyInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodyInput::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            BodyInput::Text(s) => f.debug_tuple("Text").field(s).finish(),
            BodyInput::Json(v) => f.debug_tuple("Json").field(v).finish(),
            BodyInput::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<&str> for BodyInput {
    fn from(s: &str) -> Self {
        BodyInput::Text(s.to_string())
    }
}

impl From<String> for BodyInput {
    fn from(s: String) -> Self {
        BodyInput::Text(s)
    }
}

impl From<Vec<u8>> for BodyInput {
    fn from(b: Vec<u8>) -> Self {
        BodyInput::Bytes(Bytes::from(b))
    }
}

impl From<Bytes> for BodyInput {
    fn from(b: Bytes) -> Self {
        BodyInput::Bytes(b)
    }
}

impl From<serde_json::Value> for BodyInput {
    fn from(v: serde_json::Value) -> Self {
        BodyInput::Json(v)
    }
}

/// Form payload, sent as `application/x-www-form-urlencoded`.
#[derive(Debug, Clone)]
pub enum FormInput {
    /// An already-encoded query string, sent verbatim
    Encoded(String),
    /// Key/value pairs, URL-encoded in order
    Pairs(Vec<(String, String)>),
}

impl From<&str> for FormInput {
    fn from(s: &str) -> Self {
        FormInput::Encoded(s.to_string())
    }
}

impl From<String> for FormInput {
    fn from(s: String) -> Self {
        FormInput::Encoded(s)
    }
}

impl From<Vec<(String, String)>> for FormInput {
    fn from(pairs: Vec<(String, String)>) -> Self {
        FormInput::Pairs(pairs)
    }
}

impl From<BTreeMap<String, String>> for FormInput {
    fn from(map: BTreeMap<String, String>) -> Self {
        FormInput::Pairs(map.into_iter().collect())
    }
}

/// Options record for a single call.
///
/// All fields are optional. The URL components (`protocol`, `hostname`,
/// `host`, `port`, `pathname`, `search`, `hash`, `username`, `password`)
/// override the matching part of `url`; with no `url` they apply to
/// `http://localhost`.
///
/// `auth` and `path` are no longer supported and are rejected; use
/// `username`/`password` and `pathname` instead.
///
/// # Examples
///
/// ```
/// use redirect_fetch::RequestOptions;
/// use serde_json::json;
///
/// let options = RequestOptions::new("https://example.com/api")
///     .method("post")
///     .header("X-Request-Id", "42")
///     .json(true)
///     .body(json!({ "msg": "x" }))
///     .max_redirects(3);
/// assert!(options.json);
/// ```
#[derive(Debug, Default)]
pub struct RequestOptions {
    /// Target URL, absolute or relative to `http://localhost`
    pub url: Option<String>,
    /// Scheme override, with or without trailing `:`
    pub protocol: Option<String>,
    /// Host name override (no port)
    pub hostname: Option<String>,
    /// Host and optional port, as in `example.com:8080`
    pub host: Option<String>,
    /// Port override
    pub port: Option<u16>,
    /// Path override
    pub pathname: Option<String>,
    /// Query string override, with or without leading `?`
    pub search: Option<String>,
    /// Fragment override, with or without leading `#`
    pub hash: Option<String>,
    /// User name for basic authentication
    pub username: Option<String>,
    /// Password for basic authentication
    pub password: Option<String>,
    /// Removed: use `username` and `password`
    pub auth: Option<String>,
    /// Removed: use `pathname`
    pub path: Option<String>,
    /// HTTP method; defaults to GET, or POST when a body is present
    pub method: Option<String>,
    /// Request headers; names are matched case-insensitively and later entries win
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<BodyInput>,
    /// Form payload, used only when no `body` is given
    pub form: Option<FormInput>,
    /// Send and expect JSON
    pub json: bool,
    /// Redirect budget (default 10)
    pub max_redirects: Option<u32>,
    /// Follow 3xx responses (default true)
    pub follow_redirects: Option<bool>,
    /// Idle timeout for each hop and for reads of the final body
    pub timeout: Option<Duration>,
    /// Skip TLS certificate validation for this call
    pub insecure: bool,
}

impl RequestOptions {
    /// Creates options targeting `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Sets the method; case does not matter.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Adds a header. Names are lower-cased during normalization.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the request body.
    pub fn body(mut self, body: impl Into<BodyInput>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a form payload, used only when no body is given.
    pub fn form(mut self, form: impl Into<FormInput>) -> Self {
        self.form = Some(form.into());
        self
    }

    /// Sends the body as JSON and asks for JSON back.
    pub fn json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Caps the number of redirects followed.
    pub fn max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = Some(max);
        self
    }

    /// Turns redirect following on or off.
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = Some(follow);
        self
    }

    /// Sets the idle timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Skips TLS certificate validation for this call.
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }
}
