//! Library configuration and constants.
//!
//! This module provides:
//! - Configuration constants (defaults, header values, timeouts)
//! - Client configuration and logging option types

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{ClientConfig, LogFormat, LogLevel};
