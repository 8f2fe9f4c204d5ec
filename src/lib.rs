//! redirect_fetch library: a small HTTP(S) request helper
//!
//! This library sends a single HTTP or HTTPS request, follows redirects up to
//! a configurable budget, transparently decodes gzip/deflate bodies, and
//! reports the outcome of every call exactly once. A buffering convenience
//! ([`Client::concat`]) reads the whole body and optionally parses it as JSON.
//!
//! # Example
//!
//! ```no_run
//! use redirect_fetch::{Client, RequestOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new()?;
//!
//! let page = client.concat("http://example.com/").await?;
//! println!("{} ({} bytes)", page.response.status(), page.body.len());
//!
//! let reply = client
//!     .concat(
//!         RequestOptions::new("http://example.com/api")
//!             .method("POST")
//!             .body(serde_json::json!({ "key": "value" }))
//!             .json(true),
//!     )
//!     .await?;
//! println!("{:?}", reply.json);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

#![warn(missing_docs)]

pub mod config;
mod error_handling;
mod fetch;
pub mod initialization;
mod request;
mod response;

// Re-export public API
pub use config::{ClientConfig, LogFormat, LogLevel};
pub use error_handling::{categorize_transport_error, ConcatError, ErrorType, FetchError};
pub use error_handling::InitializationError;
pub use fetch::{
    Client, Concatenated, ReqwestTransport, Transport, TransportBody, TransportRequest,
    TransportResponse,
};
pub use request::{
    normalize, Body, BodyInput, ByteStream, FormInput, RequestDescriptor, RequestInput,
    RequestOptions, StreamBody,
};
pub use response::{Response, ResponseFrames, ResponseHead};

/// Sends a request with a default [`Client`], following redirects.
///
/// Builds a new client per call; hold on to a [`Client`] to reuse connections.
///
/// # Errors
///
/// Returns any [`FetchError`] the call produces, including a connection error
/// if the HTTP client cannot be built.
pub async fn request(input: impl Into<RequestInput>) -> Result<Response, FetchError> {
    Client::new()
        .map_err(FetchError::connection)?
        .send(input)
        .await
}

/// Sends a request with a default [`Client`] and reads the whole body.
///
/// # Errors
///
/// See [`Client::concat`].
pub async fn concat(input: impl Into<RequestInput>) -> Result<Concatenated, ConcatError> {
    let client = Client::new().map_err(FetchError::connection)?;
    client.concat(input).await
}

/// Sends a GET request with a default [`Client`].
///
/// # Errors
///
/// See [`request`].
pub async fn get(input: impl Into<RequestInput>) -> Result<Response, FetchError> {
    Client::new().map_err(FetchError::connection)?.get(input).await
}
