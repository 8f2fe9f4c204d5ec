//! Error categorization.
//!
//! This module maps errors to `ErrorType` for reporting.

use super::types::{ConcatError, ErrorType, FetchError};

/// Categorizes the source of a [`FetchError::Connection`].
///
/// Transport errors coming from `reqwest` are refined by their kind; anything
/// else (a custom transport, an I/O error) is reported as a generic HTTP error.
pub fn categorize_transport_error(error: &(dyn std::error::Error + 'static)) -> ErrorType {
    let Some(reqwest_err) = error.downcast_ref::<reqwest::Error>() else {
        return ErrorType::HttpOtherError;
    };

    if reqwest_err.is_timeout() {
        ErrorType::HttpTimeout
    } else if reqwest_err.is_connect() {
        ErrorType::HttpConnectError
    } else if reqwest_err.is_body() || reqwest_err.is_decode() {
        ErrorType::HttpBodyError
    } else if reqwest_err.is_request() {
        ErrorType::HttpRequestError
    } else {
        ErrorType::HttpOtherError
    }
}

impl FetchError {
    /// Returns the reporting category of this error.
    pub fn error_type(&self) -> ErrorType {
        match self {
            FetchError::InvalidOptions(_) => ErrorType::InvalidOptions,
            FetchError::InvalidUrl { .. } => ErrorType::InvalidUrl,
            FetchError::InvalidHeader(_) => ErrorType::InvalidHeader,
            FetchError::TooManyRedirects { .. } => ErrorType::TooManyRedirects,
            FetchError::StreamNotReplayable { .. } => ErrorType::RedirectBodyNotReplayable,
            FetchError::InvalidRedirect { .. } => ErrorType::InvalidRedirect,
            FetchError::Connection(source) => categorize_transport_error(source.as_ref()),
            FetchError::Timeout(_) => ErrorType::HttpTimeout,
            FetchError::BodyStream(_) => ErrorType::RequestBodyStreamError,
            FetchError::Decode(_) => ErrorType::DecodeError,
            FetchError::Json(_) => ErrorType::JsonError,
        }
    }

    /// Returns `true` if the error was detected before any network activity.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self.error_type(),
            ErrorType::InvalidOptions | ErrorType::InvalidUrl | ErrorType::InvalidHeader
        )
    }
}

impl ConcatError {
    /// Returns the reporting category of this error.
    pub fn error_type(&self) -> ErrorType {
        match self {
            ConcatError::Fetch(e) => e.error_type(),
            ConcatError::Json { .. } => ErrorType::JsonError,
        }
    }
}
