//! Configuration constants.
//!
//! This module defines the defaults applied while normalizing a request and
//! the timeouts used when building the underlying HTTP clients.

/// Maximum number of redirect hops followed when the caller does not say otherwise.
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Base URL used to resolve a relative (or missing) top-level URL.
///
/// A request for `"/status"` with no other URL components therefore goes to
/// `http://localhost/status`.
pub const DEFAULT_BASE_URL: &str = "http://localhost";

/// Value of the `accept-encoding` header installed on every request unless the
/// caller supplied one. Only encodings we know how to decode are advertised.
pub const DEFAULT_ACCEPT_ENCODING: &str = "gzip, deflate";

// Content types
/// Content type for JSON request bodies (also used as the `accept` value in JSON mode)
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// Content type for URL-encoded form bodies
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

// Network operation timeouts
/// TCP connection timeout in seconds
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 10;
