//! Configuration types.
//!
//! This module defines the enums and structs used to configure clients and
//! logging. None of them depend on the CLI.

use std::time::Duration;

use clap::ValueEnum;

use crate::config::constants::TCP_CONNECT_TIMEOUT_SECS;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Client configuration.
///
/// Settings here apply to every request sent through a [`crate::Client`].
/// Per-request behavior (timeouts, redirect budget, certificate validation)
/// lives on [`crate::RequestOptions`] instead.
///
/// # Examples
///
/// ```no_run
/// use redirect_fetch::{Client, ClientConfig};
/// use std::time::Duration;
///
/// let config = ClientConfig {
///     user_agent: Some("my-tool/1.0".to_string()),
///     default_timeout: Some(Duration::from_secs(30)),
///     ..Default::default()
/// };
/// let client = Client::with_config(&config).expect("client");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// TCP connect timeout for each hop
    pub connect_timeout: Duration,

    /// Idle timeout applied to requests that do not set their own
    pub default_timeout: Option<Duration>,

    /// `User-Agent` header sent when the request does not carry one
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS),
            default_timeout: None,
            user_agent: None,
        }
    }
}
