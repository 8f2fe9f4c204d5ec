//! Sending requests and following redirects.
//!
//! This module provides:
//! - [`Client`]: the entry point; runs the redirect loop for each call
//! - The [`Transport`] seam that performs a single exchange
//! - Redirect classification and next-hop construction
//! - The buffering convenience ([`Client::concat`])
//!
//! Each call is a sequence of hops. A hop dispatches the current descriptor,
//! waits for the response head, and either finishes the call or produces the
//! descriptor for the next hop. Every way a call can finish goes through one
//! single-fire delivery gate.

mod completion;
mod concat;
mod redirects;
mod transport;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::stream::{StreamExt, TryStreamExt};
use futures::FutureExt;
use log::debug;
use reqwest::Method;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub use concat::Concatenated;
pub use transport::{
    ReqwestTransport, Transport, TransportBody, TransportRequest, TransportResponse,
};

use crate::config::ClientConfig;
use crate::error_handling::{FetchError, InitializationError};
use crate::request::{normalize, Body, ByteStream, RequestDescriptor, RequestInput};
use crate::response::Response;
use completion::Completion;
use redirects::{classify, next_hop, HopOutcome};

type Outcome = Completion<Result<Response, FetchError>>;

/// An HTTP(S) client that follows redirects.
///
/// Cloning is cheap; clones share the underlying transport.
///
/// # Example
///
/// ```no_run
/// use redirect_fetch::{Client, RequestOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new()?;
/// let response = client
///     .send(RequestOptions::new("http://example.com/").max_redirects(5))
///     .await?;
/// println!("{} from {}", response.status(), response.url());
/// let body = response.text().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP clients cannot be built.
    pub fn new() -> Result<Self, InitializationError> {
        Self::with_config(&ClientConfig::default())
    }

    /// Creates a client backed by `reqwest` with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP clients cannot be built.
    pub fn with_config(config: &ClientConfig) -> Result<Self, InitializationError> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(transport, config.clone()))
    }

    /// Creates a client that sends every hop through `transport`.
    pub fn with_transport(transport: impl Transport, config: ClientConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            config: Arc::new(config),
        }
    }

    /// Sends a request, following redirects, and returns the terminal response.
    ///
    /// # Errors
    ///
    /// Input errors are returned before anything is sent. After that, the
    /// first failure of the call is returned: transport error, timeout,
    /// request body stream error, or redirect policy error.
    pub async fn send(&self, input: impl Into<RequestInput>) -> Result<Response, FetchError> {
        let descriptor = normalize(input)?;
        self.execute(descriptor).await
    }

    /// Runs the redirect loop for an already-normalized request.
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<Response, FetchError> {
        let (tx, rx) = oneshot::channel();
        let outcome = Completion::new(move |result| {
            // The receiver only goes away if the caller stopped waiting
            let _ = tx.send(result);
        });
        self.run(descriptor, outcome).await;
        rx.await.unwrap_or_else(|_| {
            Err(FetchError::connection(
                "exchange ended without delivering a result",
            ))
        })
    }

    /// Sends a request on a background task and hands the result to `callback`.
    ///
    /// `callback` runs exactly once. Input errors are returned here instead,
    /// and then `callback` never runs. Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an input error if the options cannot be normalized.
    pub fn request_with_callback<F>(
        &self,
        input: impl Into<RequestInput>,
        callback: F,
    ) -> Result<JoinHandle<()>, FetchError>
    where
        F: FnOnce(Result<Response, FetchError>) + Send + 'static,
    {
        let descriptor = normalize(input)?;
        let outcome = Completion::new(callback);
        let task_outcome = outcome.clone();
        let client = self.clone();
        Ok(spawn_settled(outcome, async move {
            client.run(descriptor, task_outcome).await;
        }))
    }

    /// [`Client::send`] with the method defaulting to GET.
    pub async fn get(&self, input: impl Into<RequestInput>) -> Result<Response, FetchError> {
        self.send(with_method(input, Method::GET)).await
    }

    /// [`Client::send`] with the method defaulting to POST.
    pub async fn post(&self, input: impl Into<RequestInput>) -> Result<Response, FetchError> {
        self.send(with_method(input, Method::POST)).await
    }

    /// [`Client::send`] with the method defaulting to PUT.
    pub async fn put(&self, input: impl Into<RequestInput>) -> Result<Response, FetchError> {
        self.send(with_method(input, Method::PUT)).await
    }

    /// [`Client::send`] with the method defaulting to PATCH.
    pub async fn patch(&self, input: impl Into<RequestInput>) -> Result<Response, FetchError> {
        self.send(with_method(input, Method::PATCH)).await
    }

    /// [`Client::send`] with the method defaulting to HEAD.
    pub async fn head(&self, input: impl Into<RequestInput>) -> Result<Response, FetchError> {
        self.send(with_method(input, Method::HEAD)).await
    }

    /// [`Client::send`] with the method defaulting to DELETE.
    pub async fn delete(&self, input: impl Into<RequestInput>) -> Result<Response, FetchError> {
        self.send(with_method(input, Method::DELETE)).await
    }

    /// Drives one call to completion and delivers its result through `outcome`.
    async fn run(&self, descriptor: RequestDescriptor, outcome: Outcome) {
        let descriptor = descriptor.with_default_timeout(self.config.default_timeout);
        let result = self.follow(descriptor, &outcome).await;
        if !outcome.deliver(result) {
            debug!("Call already settled; dropping late result");
        }
    }

    /// The hop loop.
    async fn follow(
        &self,
        mut descriptor: RequestDescriptor,
        outcome: &Outcome,
    ) -> Result<Response, FetchError> {
        loop {
            let hop = self.exchange(&mut descriptor, outcome).await?;

            match classify(&descriptor, hop.status, &hop.headers) {
                HopOutcome::Terminal => {
                    debug!("{} {} -> {}", descriptor.method, descriptor.url, hop.status);
                    return Ok(Response::finalize(
                        hop,
                        &descriptor.method,
                        descriptor.timeout,
                    ));
                }
                HopOutcome::Redirect(location) => {
                    let status = hop.status;
                    // Discard the redirect body unread; this also releases the connection
                    drop(hop);
                    descriptor = next_hop(descriptor, status, &location)?;
                }
            }
        }
    }

    /// Sends the current hop and waits for its response head.
    ///
    /// The idle timeout covers the whole wait. When it fires the in-flight
    /// exchange is dropped, which closes its connection.
    async fn exchange(
        &self,
        descriptor: &mut RequestDescriptor,
        outcome: &Outcome,
    ) -> Result<TransportResponse, FetchError> {
        debug!(
            "{} {} ({} redirects left)",
            descriptor.method, descriptor.url, descriptor.remaining_redirects
        );

        let mut headers = descriptor.headers.clone();
        if let Some(user_agent) = &self.config.user_agent {
            if !headers.contains_key(reqwest::header::USER_AGENT) {
                if let Ok(value) = reqwest::header::HeaderValue::from_str(user_agent) {
                    headers.insert(reqwest::header::USER_AGENT, value);
                }
            }
        }

        let body = match &mut descriptor.body {
            Body::Empty => TransportBody::Empty,
            Body::Bytes(bytes) => TransportBody::Bytes(bytes.clone()),
            Body::Stream(stream) => match stream.take() {
                Some(stream) => TransportBody::Stream(funnel_stream_errors(stream, outcome.clone())),
                None => {
                    return Err(FetchError::BodyStream(std::io::Error::other(
                        "request body stream was already consumed",
                    )))
                }
            },
        };

        let request = TransportRequest {
            method: descriptor.method.clone(),
            url: descriptor.url.clone(),
            headers,
            body,
            insecure: descriptor.insecure,
        };

        let response = match descriptor.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.transport.send(request))
                .await
                .map_err(|_| {
                    debug!("{} timed out after {:?}", descriptor.url, timeout);
                    FetchError::Timeout(timeout)
                })?,
            None => self.transport.send(request).await,
        };

        if outcome.is_settled() {
            // The request body stream failed and the call has been reported already
            return Err(FetchError::BodyStream(std::io::Error::other(
                "request body stream failed",
            )));
        }

        response
    }
}

/// Spawns `task`, which is expected to settle `outcome` itself.
///
/// If the task panics first, the panic is delivered through `outcome` as a
/// connection error so the callback still runs.
pub(crate) fn spawn_settled<T, E, F>(outcome: Completion<Result<T, E>>, task: F) -> JoinHandle<()>
where
    T: Send + 'static,
    E: From<FetchError> + Send + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if AssertUnwindSafe(task).catch_unwind().await.is_err() {
            log::error!("Request task panicked");
            outcome.deliver(Err(E::from(FetchError::connection(
                "request task panicked",
            ))));
        }
    })
}

/// Reports request body stream errors through the call's delivery gate.
///
/// The error still propagates to the transport, which aborts the exchange;
/// the transport's own error is then dropped by the gate.
fn funnel_stream_errors(stream: ByteStream, outcome: Outcome) -> ByteStream {
    stream
        .inspect_err(move |e| {
            debug!("Request body stream failed: {}", e);
            outcome.deliver(Err(FetchError::BodyStream(std::io::Error::new(
                e.kind(),
                e.to_string(),
            ))));
        })
        .boxed()
}

/// Pre-sets the method of a call; an explicit method in the options still wins.
pub(crate) fn with_method(input: impl Into<RequestInput>, method: Method) -> RequestInput {
    let mut options = input.into().into_options();
    if options.method.is_none() {
        options.method = Some(method.to_string());
    }
    RequestInput::Options(options)
}

#[cfg(test)]
mod tests;
