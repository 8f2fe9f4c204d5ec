//! HTTP client initialization.

use reqwest::ClientBuilder;

use crate::config::ClientConfig;
use crate::error_handling::InitializationError;

/// Initializes an HTTP client for single-hop exchanges.
///
/// Creates a `reqwest::Client` configured with:
/// - Redirects disabled (the redirect loop follows them itself)
/// - No automatic decompression (bodies arrive as sent)
/// - Connect timeout from the configuration
/// - HTTP/2 support enabled
/// - Rustls TLS backend (no native TLS)
///
/// With `accept_invalid_certs` set, TLS certificate and host name validation
/// are skipped.
///
/// # Errors
///
/// Returns `InitializationError::HttpClientError` if client creation fails.
pub fn init_client(
    config: &ClientConfig,
    accept_invalid_certs: bool,
) -> Result<reqwest::Client, InitializationError> {
    crate::initialization::init_crypto_provider();

    let client = ClientBuilder::new()
        .use_rustls_tls()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(config.connect_timeout)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()?;
    Ok(client)
}
