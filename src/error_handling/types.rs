//! Error type definitions.
//!
//! This module defines all error types used throughout the library.

use std::time::Duration;

use bytes::Bytes;
use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

use crate::response::ResponseHead;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// Errors produced while sending a request.
///
/// Every failure of a call is reported through exactly one of these, whether
/// it was detected while normalizing the input, on the wire, or while
/// following redirects.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The options record was contradictory or used a removed option name.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// A URL (the request target or a redirect `location`) could not be parsed.
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        /// The URL that failed to parse
        url: String,
        /// The underlying parse failure
        #[source]
        source: url::ParseError,
    },

    /// A header name or value supplied by the caller is not valid HTTP.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// The redirect chain is longer than the configured budget.
    #[error("Too many redirects (limit: {max})")]
    TooManyRedirects {
        /// Configured maximum number of redirects
        max: u32,
    },

    /// A redirect pointed somewhere that cannot be followed: the `location`
    /// does not parse, or it leaves http/https.
    #[error("Cannot follow redirect to '{location}': {reason}")]
    InvalidRedirect {
        /// The `location` header as sent by the server
        location: String,
        /// Why it was rejected
        reason: String,
    },

    /// Connecting to, writing to, or reading from the server failed.
    #[error("Connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// No progress was made on the exchange within the idle timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller-supplied request body stream failed while being sent.
    #[error("Request body stream error: {0}")]
    BodyStream(#[source] std::io::Error),

    /// A 307/308 redirect asked for the body to be re-sent, but it was a
    /// stream that has already been consumed.
    #[error("Cannot follow {status} redirect: streamed request body was already consumed")]
    StreamNotReplayable {
        /// Status code of the redirect response
        status: u16,
    },

    /// Decompressing a gzip/deflate response body failed.
    #[error("Failed to decode response body: {0}")]
    Decode(#[source] std::io::Error),

    /// Serializing a JSON request body failed.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl FetchError {
    /// Wraps any transport-level failure as a [`FetchError::Connection`].
    pub fn connection<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        FetchError::Connection(error.into())
    }
}

/// Errors produced by the buffering convenience ([`crate::Client::concat`]).
#[derive(Error, Debug)]
pub enum ConcatError {
    /// The request itself (or reading its body) failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The body was received in full but is not valid JSON.
    ///
    /// The response head and the raw bytes are kept so the caller can still
    /// inspect what the server sent.
    #[error("Failed to parse response body as JSON: {source}")]
    Json {
        /// The parse failure
        #[source]
        source: serde_json::Error,
        /// Head of the response whose body failed to parse
        response: Box<ResponseHead>,
        /// The raw (already decompressed) body
        body: Bytes,
    },
}

/// Categories of failures, used for reporting.
///
/// Each [`FetchError`] maps to exactly one category; transport errors are
/// refined by inspecting the underlying `reqwest::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorType {
    // Input errors
    /// Contradictory or removed options
    InvalidOptions,
    /// Unparseable request URL
    InvalidUrl,
    /// Header name or value not valid HTTP
    InvalidHeader,
    // Redirect policy errors
    /// Redirect budget spent
    TooManyRedirects,
    /// 307/308 with a consumed stream body
    RedirectBodyNotReplayable,
    /// Redirect `location` that cannot be followed
    InvalidRedirect,
    // Transport errors
    /// Connection could not be established
    HttpConnectError,
    /// Request could not be sent
    HttpRequestError,
    /// Response body could not be read
    HttpBodyError,
    /// No progress within the timeout
    HttpTimeout,
    /// Any other transport failure
    HttpOtherError,
    /// Caller-supplied body stream failed
    RequestBodyStreamError,
    // Decode errors
    /// Compressed body could not be decoded
    DecodeError,
    /// JSON could not be serialized or parsed
    JsonError,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorType {
    /// Stable, human-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::InvalidOptions => "Invalid options",
            ErrorType::InvalidUrl => "Invalid URL",
            ErrorType::InvalidHeader => "Invalid header",
            ErrorType::TooManyRedirects => "Too many redirects",
            ErrorType::RedirectBodyNotReplayable => "Redirect body not replayable",
            ErrorType::InvalidRedirect => "Invalid redirect location",
            ErrorType::HttpConnectError => "HTTP connect error",
            ErrorType::HttpRequestError => "HTTP request error",
            ErrorType::HttpBodyError => "HTTP body error",
            ErrorType::HttpTimeout => "HTTP timeout",
            ErrorType::HttpOtherError => "HTTP other error",
            ErrorType::RequestBodyStreamError => "Request body stream error",
            ErrorType::DecodeError => "Response decode error",
            ErrorType::JsonError => "JSON error",
        }
    }
}
