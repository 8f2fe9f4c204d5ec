//! Error handling.
//!
//! This module provides:
//! - The error returned by every request (`FetchError`)
//! - The error returned by the buffering convenience (`ConcatError`)
//! - Initialization errors for loggers and HTTP clients
//! - Error categorization for reporting (`ErrorType`)
//!
//! Errors fall into four groups:
//! - **Input**: detected while normalizing options, before any I/O
//! - **Transport**: connect/write/read failures and idle timeouts
//! - **Redirect policy**: hop budget exhausted, body not replayable,
//!   unusable `location`
//! - **Decode**: decompression or JSON parse failures

mod categorization;
mod types;

// Re-export public API
pub use categorization::categorize_transport_error;
pub use types::{ConcatError, ErrorType, FetchError, InitializationError};
