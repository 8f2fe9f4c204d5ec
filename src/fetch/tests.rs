// Redirect loop tests against a scripted transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use http_body_util::{BodyExt, Full};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Version};
use tokio::sync::oneshot;

use super::*;
use crate::error_handling::ConcatError;
use crate::request::{BodyInput, RequestOptions};

enum Step {
    Respond {
        status: u16,
        headers: Vec<(&'static str, String)>,
        body: &'static [u8],
    },
    Hang,
    Panic,
}

fn respond(status: u16, headers: &[(&'static str, &str)], body: &'static [u8]) -> Step {
    Step::Respond {
        status,
        headers: headers
            .iter()
            .map(|(name, value)| (*name, value.to_string()))
            .collect(),
        body,
    }
}

fn redirect(status: u16, location: &str) -> Step {
    respond(status, &[("location", location)], b"")
}

/// What the transport saw for one hop.
#[derive(Debug, Clone)]
struct Seen {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

#[derive(Clone, Default)]
struct ScriptedTransport {
    steps: Arc<Mutex<VecDeque<Step>>>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl ScriptedTransport {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into())),
            seen: Arc::default(),
        }
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn client(&self) -> Client {
        Client::with_transport(self.clone(), ClientConfig::default())
    }
}

impl Transport for ScriptedTransport {
    fn send(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, FetchError>> {
        let steps = Arc::clone(&self.steps);
        let seen = Arc::clone(&self.seen);

        Box::pin(async move {
            let body = match request.body {
                TransportBody::Empty => None,
                TransportBody::Bytes(bytes) => Some(bytes),
                TransportBody::Stream(mut stream) => {
                    let mut buf = BytesMut::new();
                    while let Some(chunk) = stream.next().await {
                        let chunk = chunk.map_err(FetchError::connection)?;
                        buf.extend_from_slice(&chunk);
                    }
                    Some(buf.freeze())
                }
            };
            seen.lock().unwrap().push(Seen {
                method: request.method.clone(),
                url: request.url.to_string(),
                headers: request.headers.clone(),
                body,
            });

            let step = steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Respond {
                    status,
                    headers,
                    body,
                }) => {
                    let mut map = HeaderMap::new();
                    for (name, value) in headers {
                        map.append(
                            HeaderName::from_static(name),
                            HeaderValue::from_str(&value).unwrap(),
                        );
                    }
                    Ok(TransportResponse {
                        status: StatusCode::from_u16(status).unwrap(),
                        version: Version::HTTP_11,
                        headers: map,
                        url: request.url,
                        remote_addr: None,
                        body: Full::new(Bytes::from_static(body))
                            .map_err(|never| match never {})
                            .boxed_unsync(),
                    })
                }
                Some(Step::Hang) => futures::future::pending().await,
                Some(Step::Panic) => panic!("scripted transport failure"),
                None => Err(FetchError::connection("no scripted response left")),
            }
        })
    }
}

#[tokio::test]
async fn test_follows_redirect_chain_to_terminal_response() {
    let transport = ScriptedTransport::new(vec![
        redirect(301, "http://localhost/b"),
        redirect(302, "/c"),
        redirect(307, "d"),
        respond(200, &[], b"done"),
    ]);

    let response = transport.client().send("http://localhost/a").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.url().as_str(), "http://localhost/d");
    assert_eq!(response.text().await.unwrap(), "done");

    let urls: Vec<_> = transport.seen().into_iter().map(|s| s.url).collect();
    assert_eq!(
        urls,
        vec![
            "http://localhost/a",
            "http://localhost/b",
            "http://localhost/c",
            "http://localhost/d",
        ]
    );
}

#[tokio::test]
async fn test_redirect_budget_allows_exactly_max_redirects() {
    let transport = ScriptedTransport::new(vec![
        redirect(302, "/1"),
        redirect(302, "/2"),
        respond(200, &[], b"ok"),
    ]);

    let response = transport
        .client()
        .send(RequestOptions::new("http://localhost/0").max_redirects(2))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(transport.seen().len(), 3);
}

#[tokio::test]
async fn test_too_many_redirects_stops_without_extra_request() {
    let transport = ScriptedTransport::new(vec![
        redirect(302, "/1"),
        redirect(302, "/2"),
        redirect(302, "/3"),
        respond(200, &[], b"unreachable"),
    ]);

    let err = transport
        .client()
        .send(RequestOptions::new("http://localhost/0").max_redirects(2))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::TooManyRedirects { max: 2 }));
    assert_eq!(transport.seen().len(), 3);
}

#[tokio::test]
async fn test_zero_redirect_budget_fails_on_first_redirect() {
    let transport = ScriptedTransport::new(vec![redirect(301, "/next")]);

    let err = transport
        .client()
        .send(RequestOptions::new("http://localhost/").max_redirects(0))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::TooManyRedirects { max: 0 }));
    assert_eq!(transport.seen().len(), 1);
}

#[tokio::test]
async fn test_follow_disabled_returns_redirect_response() {
    let transport = ScriptedTransport::new(vec![redirect(301, "/elsewhere")]);

    let response = transport
        .client()
        .send(RequestOptions::new("http://localhost/").follow_redirects(false))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()["location"], "/elsewhere");
    assert_eq!(transport.seen().len(), 1);
}

#[tokio::test]
async fn test_redirect_without_location_is_terminal() {
    let transport = ScriptedTransport::new(vec![respond(302, &[], b"nowhere")]);

    let response = transport.client().send("http://localhost/").await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.text().await.unwrap(), "nowhere");
}

#[tokio::test]
async fn test_redirect_off_http_is_a_policy_error() {
    let transport = ScriptedTransport::new(vec![redirect(302, "ftp://files.example/x")]);

    let err = transport.client().send("http://localhost/").await.unwrap_err();
    assert!(matches!(err, FetchError::InvalidRedirect { .. }));
    assert!(!err.is_input_error());
    assert_eq!(transport.seen().len(), 1);
}

#[tokio::test]
async fn test_post_becomes_get_after_302() {
    let transport = ScriptedTransport::new(vec![
        redirect(302, "/landing"),
        respond(200, &[], b"ok"),
    ]);

    transport
        .client()
        .post(RequestOptions::new("http://localhost/submit").body("payload"))
        .await
        .unwrap();

    let seen = transport.seen();
    assert_eq!(seen[0].method, Method::POST);
    assert_eq!(seen[0].body.as_deref(), Some(&b"payload"[..]));
    assert_eq!(seen[1].method, Method::GET);
    assert_eq!(seen[1].body, None);
    assert!(!seen[1].headers.contains_key("content-length"));
    assert!(!seen[1].headers.contains_key("content-type"));
}

#[tokio::test]
async fn test_307_resends_in_memory_body() {
    let transport = ScriptedTransport::new(vec![
        redirect(307, "/again"),
        respond(200, &[], b"ok"),
    ]);

    transport
        .client()
        .put(RequestOptions::new("http://localhost/").body("same body"))
        .await
        .unwrap();

    let seen = transport.seen();
    assert_eq!(seen[1].method, Method::PUT);
    assert_eq!(seen[1].body.as_deref(), Some(&b"same body"[..]));
}

#[tokio::test]
async fn test_307_with_consumed_stream_fails() {
    let transport = ScriptedTransport::new(vec![
        redirect(307, "/again"),
        respond(200, &[], b"unreachable"),
    ]);
    let chunks = stream::iter(vec![Ok(Bytes::from_static(b"streamed"))]);

    let err = transport
        .client()
        .post(RequestOptions::new("http://localhost/").body(BodyInput::stream(chunks)))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::StreamNotReplayable { status: 307 }));

    let seen = transport.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].body.as_deref(), Some(&b"streamed"[..]));
}

#[tokio::test]
async fn test_cross_host_redirect_strips_credentials() {
    let transport = ScriptedTransport::new(vec![
        redirect(302, "http://127.0.0.1/other"),
        respond(200, &[], b"ok"),
    ]);

    transport
        .client()
        .send(
            RequestOptions::new("http://localhost/")
                .header("Cookie", "session=1")
                .header("Authorization", "Bearer token")
                .header("X-Custom", "kept"),
        )
        .await
        .unwrap();

    let seen = transport.seen();
    assert_eq!(seen[0].headers["cookie"], "session=1");
    assert!(!seen[1].headers.contains_key("cookie"));
    assert!(!seen[1].headers.contains_key("authorization"));
    assert_eq!(seen[1].headers["x-custom"], "kept");
}

#[tokio::test]
async fn test_timeout_reports_once_and_aborts() {
    let transport = ScriptedTransport::new(vec![Step::Hang]);
    let client = transport.client();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = oneshot::channel();

    let handle = {
        let calls = Arc::clone(&calls);
        client
            .request_with_callback(
                RequestOptions::new("http://localhost/").timeout(Duration::from_millis(20)),
                move |result| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let _ = tx.send(result);
                },
            )
            .unwrap()
    };

    let result = rx.await.unwrap();
    handle.await.unwrap();
    assert!(matches!(result, Err(FetchError::Timeout(d)) if d == Duration::from_millis(20)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_client_default_timeout_applies() {
    let transport = ScriptedTransport::new(vec![Step::Hang]);
    let config = ClientConfig {
        default_timeout: Some(Duration::from_millis(10)),
        ..Default::default()
    };
    let client = Client::with_transport(transport, config);

    let err = client.send("http://localhost/").await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout(_)));
}

#[tokio::test]
async fn test_failing_body_stream_is_reported_once() {
    let transport = ScriptedTransport::new(vec![respond(200, &[], b"unreachable")]);
    let client = transport.client();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = oneshot::channel();
    let chunks = stream::iter(vec![
        Ok(Bytes::from_static(b"partial")),
        Err(std::io::Error::other("disk on fire")),
    ]);

    let handle = {
        let calls = Arc::clone(&calls);
        client
            .request_with_callback(
                RequestOptions::new("http://localhost/")
                    .method("POST")
                    .body(BodyInput::stream(chunks)),
                move |result| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let _ = tx.send(result);
                },
            )
            .unwrap()
    };

    let result = rx.await.unwrap();
    handle.await.unwrap();
    match result {
        Err(FetchError::BodyStream(e)) => assert_eq!(e.to_string(), "disk on fire"),
        other => panic!("expected body stream error, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_callback_runs_when_request_task_panics() {
    let transport = ScriptedTransport::new(vec![Step::Panic]);
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = oneshot::channel();

    let handle = {
        let calls = Arc::clone(&calls);
        transport
            .client()
            .request_with_callback("http://localhost/", move |result| {
                calls.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(result);
            })
            .unwrap()
    };

    let result = rx.await.unwrap();
    handle.await.unwrap();
    assert!(matches!(result, Err(FetchError::Connection(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concat_callback_runs_when_request_task_panics() {
    let transport = ScriptedTransport::new(vec![Step::Panic]);
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = oneshot::channel();

    let handle = {
        let calls = Arc::clone(&calls);
        transport
            .client()
            .concat_with_callback("http://localhost/", move |result| {
                calls.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(result);
            })
            .unwrap()
    };

    let result = rx.await.unwrap();
    handle.await.unwrap();
    assert!(matches!(
        result,
        Err(ConcatError::Fetch(FetchError::Connection(_)))
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_callback_input_error_is_synchronous() {
    let transport = ScriptedTransport::new(vec![]);
    let called = Arc::new(AtomicUsize::new(0));

    let result = {
        let called = Arc::clone(&called);
        transport.client().request_with_callback(
            RequestOptions::new("ftp://localhost/"),
            move |_| {
                called.fetch_add(1, Ordering::SeqCst);
            },
        )
    };

    assert!(matches!(result, Err(FetchError::InvalidOptions(_))));
    tokio::task::yield_now().await;
    assert_eq!(called.load(Ordering::SeqCst), 0);
    assert!(transport.seen().is_empty());
}

#[tokio::test]
async fn test_shorthand_does_not_override_explicit_method() {
    let transport = ScriptedTransport::new(vec![
        respond(200, &[], b""),
        respond(200, &[], b""),
    ]);
    let client = transport.client();

    client
        .post(RequestOptions::new("http://localhost/").method("put"))
        .await
        .unwrap();
    client.head("http://localhost/").await.unwrap();

    let seen = transport.seen();
    assert_eq!(seen[0].method, Method::PUT);
    assert_eq!(seen[1].method, Method::HEAD);
}

#[tokio::test]
async fn test_user_agent_from_config() {
    let transport = ScriptedTransport::new(vec![
        respond(200, &[], b""),
        respond(200, &[], b""),
    ]);
    let config = ClientConfig {
        user_agent: Some("fetch-test/1.0".to_string()),
        ..Default::default()
    };
    let client = Client::with_transport(transport.clone(), config);

    client.get("http://localhost/").await.unwrap();
    client
        .get(RequestOptions::new("http://localhost/").header("User-Agent", "mine"))
        .await
        .unwrap();

    let seen = transport.seen();
    assert_eq!(seen[0].headers["user-agent"], "fetch-test/1.0");
    assert_eq!(seen[1].headers["user-agent"], "mine");
}

#[tokio::test]
async fn test_concat_parses_json() {
    let transport = ScriptedTransport::new(vec![respond(
        200,
        &[("content-type", "application/json")],
        br#"{"message":"hello"}"#,
    )]);

    let result = transport
        .client()
        .concat(RequestOptions::new("http://localhost/").json(true))
        .await
        .unwrap();
    assert_eq!(result.response.status(), StatusCode::OK);
    assert_eq!(result.json.unwrap()["message"], "hello");
    assert_eq!(transport.seen()[0].headers["accept"], "application/json");
}

#[tokio::test]
async fn test_concat_json_error_keeps_response_and_body() {
    let transport = ScriptedTransport::new(vec![respond(200, &[], b"not json")]);

    let err = transport
        .client()
        .concat(RequestOptions::new("http://localhost/").json(true))
        .await
        .unwrap_err();
    match err {
        ConcatError::Json { response, body, .. } => {
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(&body[..], b"not json");
        }
        other => panic!("expected JSON error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_concat_without_json_returns_raw_text() {
    let transport = ScriptedTransport::new(vec![respond(200, &[], b"plain")]);

    let result = transport.client().concat("http://localhost/").await.unwrap();
    assert_eq!(result.text(), "plain");
    assert!(result.json.is_none());
}

#[tokio::test]
async fn test_concat_with_callback_runs_once() {
    let transport = ScriptedTransport::new(vec![respond(200, &[], b"buffered")]);
    let (tx, rx) = oneshot::channel();

    let handle = transport
        .client()
        .concat_with_callback("http://localhost/", move |result| {
            let _ = tx.send(result);
        })
        .unwrap();

    let result = rx.await.unwrap().unwrap();
    handle.await.unwrap();
    assert_eq!(&result.body[..], b"buffered");
}
