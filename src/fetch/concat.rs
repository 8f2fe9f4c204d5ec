//! Buffering convenience on top of [`Client::send`].

use bytes::Bytes;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::{spawn_settled, Client, Completion};
use crate::error_handling::{ConcatError, FetchError};
use crate::request::{normalize, RequestDescriptor, RequestInput};
use crate::response::ResponseHead;

/// A response read to the end.
#[derive(Debug, Clone)]
pub struct Concatenated {
    /// Head of the terminal response, including any trailers
    pub response: ResponseHead,
    /// Full (decompressed) body
    pub body: Bytes,
    /// Parsed body, present when the request was made in JSON mode
    pub json: Option<Value>,
}

impl Concatenated {
    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl Client {
    /// Sends a request and reads the whole response body.
    ///
    /// In JSON mode the body is also parsed; a parse failure is reported as
    /// [`ConcatError::Json`], which still carries the response head and the
    /// raw body.
    ///
    /// # Errors
    ///
    /// Returns `ConcatError::Fetch` if the request fails or the body cannot
    /// be read, and `ConcatError::Json` if a JSON body does not parse.
    pub async fn concat(&self, input: impl Into<RequestInput>) -> Result<Concatenated, ConcatError> {
        let descriptor = normalize(input)?;
        self.concat_descriptor(descriptor).await
    }

    async fn concat_descriptor(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<Concatenated, ConcatError> {
        let json = descriptor.is_json();

        let mut response = self.execute(descriptor).await?;
        let body = response.read_to_end().await?;
        let head = response.into_head();

        if !json {
            return Ok(Concatenated {
                response: head,
                body,
                json: None,
            });
        }

        match serde_json::from_slice(&body) {
            Ok(value) => Ok(Concatenated {
                response: head,
                body,
                json: Some(value),
            }),
            Err(source) => {
                log::debug!("Response from {} is not valid JSON: {}", head.url(), source);
                Err(ConcatError::Json {
                    source,
                    response: Box::new(head),
                    body,
                })
            }
        }
    }

    /// Callback form of [`Client::concat`]; `callback` runs exactly once.
    ///
    /// # Errors
    ///
    /// Returns an input error if the options cannot be normalized; `callback`
    /// never runs in that case.
    pub fn concat_with_callback<F>(
        &self,
        input: impl Into<RequestInput>,
        callback: F,
    ) -> Result<JoinHandle<()>, FetchError>
    where
        F: FnOnce(Result<Concatenated, ConcatError>) + Send + 'static,
    {
        // Validate up front so input errors are reported synchronously
        let descriptor = normalize(input)?;
        let outcome = Completion::new(callback);
        let task_outcome = outcome.clone();
        let client = self.clone();
        Ok(spawn_settled(outcome, async move {
            task_outcome.deliver(client.concat_descriptor(descriptor).await);
        }))
    }
}
