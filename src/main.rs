//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `redirect_fetch` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - Writing the response to stdout
//!
//! All core functionality is implemented in the library crate.

use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::BytesMut;
use clap::Parser;
use log::error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use redirect_fetch::config::DEFAULT_MAX_REDIRECTS;
use redirect_fetch::initialization::{init_crypto_provider, init_logger_with};
use redirect_fetch::{
    BodyInput, Client, ClientConfig, FetchError, LogFormat, LogLevel, RequestOptions,
};

/// Fetch a URL, following redirects, and print the response body.
#[derive(Debug, Parser)]
#[command(name = "redirect_fetch", version, about)]
struct Cli {
    /// URL to fetch (relative URLs resolve against http://localhost)
    url: String,

    /// HTTP method (defaults to GET, or POST when a body is given)
    #[arg(short = 'X', long)]
    method: Option<String>,

    /// Extra request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Request body
    #[arg(short = 'd', long, conflicts_with = "data_stdin")]
    data: Option<String>,

    /// Stream the request body from stdin
    #[arg(long)]
    data_stdin: bool,

    /// Form field as "name=value" (repeatable); ignored when a body is given
    #[arg(long = "form", value_name = "FIELD")]
    form: Vec<String>,

    /// Send the body as JSON and expect JSON back
    #[arg(long)]
    json: bool,

    /// Maximum number of redirects to follow
    #[arg(long, default_value_t = DEFAULT_MAX_REDIRECTS)]
    max_redirects: u32,

    /// Return the first response even if it is a redirect
    #[arg(long)]
    no_follow: bool,

    /// Idle timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Skip TLS certificate validation
    #[arg(short = 'k', long)]
    insecure: bool,

    /// User-Agent header sent unless -H overrides it
    #[arg(long)]
    user_agent: Option<String>,

    /// Print the status line and response headers before the body
    #[arg(short = 'i', long)]
    include: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value = "plain")]
    log_format: LogFormat,
}

impl Cli {
    fn request_options(&self) -> Result<RequestOptions> {
        let mut options = RequestOptions::new(self.url.clone())
            .json(self.json)
            .max_redirects(self.max_redirects)
            .follow_redirects(!self.no_follow)
            .insecure(self.insecure);
        options.method = self.method.clone();

        for header in &self.headers {
            let (name, value) = header
                .split_once(':')
                .with_context(|| format!("Header '{}' is not of the form 'Name: value'", header))?;
            options = options.header(name.trim(), value.trim());
        }

        if let Some(data) = &self.data {
            options = options.body(body_from_arg(data, self.json));
        } else if self.data_stdin {
            options = options.body(BodyInput::stream(stdin_stream()));
        }

        if !self.form.is_empty() {
            let pairs = self
                .form
                .iter()
                .map(|field| match field.split_once('=') {
                    Some((name, value)) => (name.to_string(), value.to_string()),
                    None => (field.clone(), String::new()),
                })
                .collect::<Vec<_>>();
            options = options.form(pairs);
        }

        if let Some(ms) = self.timeout_ms {
            options = options.timeout(Duration::from_millis(ms));
        }

        Ok(options)
    }
}

/// In JSON mode a body that already is JSON is sent as-is rather than quoted.
fn body_from_arg(data: &str, json: bool) -> BodyInput {
    if json {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(data) {
            return BodyInput::Json(value);
        }
    }
    BodyInput::from(data)
}

fn stdin_stream() -> impl futures::Stream<Item = std::io::Result<bytes::Bytes>> + Send + 'static {
    futures::stream::unfold(Some(tokio::io::stdin()), |state| async move {
        let mut stdin = state?;
        let mut buf = BytesMut::with_capacity(8 * 1024);
        match stdin.read_buf(&mut buf).await {
            Ok(0) => None,
            Ok(_) => Some((Ok(buf.freeze()), Some(stdin))),
            Err(e) => Some((Err(e), None)),
        }
    })
}

async fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig {
        user_agent: cli.user_agent.clone(),
        ..Default::default()
    };
    let client = Client::with_config(&config).context("Failed to build HTTP client")?;
    let options = cli.request_options()?;

    let mut response = client.send(options).await?;
    let mut stdout = tokio::io::stdout();

    if cli.include {
        let mut head = format!("{:?} {}\r\n", response.version(), response.status());
        for (name, value) in response.headers() {
            head.push_str(&format!(
                "{}: {}\r\n",
                name,
                String::from_utf8_lossy(value.as_bytes())
            ));
        }
        head.push_str("\r\n");
        stdout.write_all(head.as_bytes()).await?;
    }

    while let Some(chunk) = response.chunk().await? {
        stdout.write_all(&chunk).await?;
    }
    stdout.flush().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger based on CLI options
    init_logger_with(cli.log_level.clone().into(), cli.log_format.clone())
        .context("Failed to initialize logger")?;

    // Initialize crypto provider for TLS operations
    init_crypto_provider();

    if let Err(e) = run(cli).await {
        if let Some(fetch_error) = e.downcast_ref::<FetchError>() {
            error!("Request failed: {}", fetch_error.error_type());
        }
        eprintln!("redirect_fetch error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}
