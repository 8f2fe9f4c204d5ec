//! Redirect classification and next-hop construction.
//!
//! Given a response head, decide whether it ends the chain, and if not,
//! build the descriptor for the next hop: resolve `location`, scrub headers,
//! adjust method and body, and spend one redirect.

use log::{debug, warn};
use reqwest::header::{
    HeaderMap, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST, LOCATION,
};
use reqwest::{Method, StatusCode};

use crate::error_handling::FetchError;
use crate::request::{for_redirect, Body, RequestDescriptor};

/// Headers dropped when a redirect leaves the current host.
const CREDENTIAL_HEADERS: &[reqwest::header::HeaderName] = &[COOKIE, AUTHORIZATION];

/// What to do with a response.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum HopOutcome {
    /// The response ends the chain.
    Terminal,
    /// Follow the redirect to this (possibly relative) location.
    Redirect(String),
}

/// Classifies a response as terminal or as a redirect to follow.
///
/// A response is terminal when redirects are disabled, the status is outside
/// 300-399, or there is no `location` header.
pub(crate) fn classify(
    descriptor: &RequestDescriptor,
    status: StatusCode,
    headers: &HeaderMap,
) -> HopOutcome {
    if !descriptor.follow_redirects() || !status.is_redirection() {
        return HopOutcome::Terminal;
    }

    match headers.get(LOCATION) {
        Some(location) => {
            HopOutcome::Redirect(String::from_utf8_lossy(location.as_bytes()).into_owned())
        }
        None => {
            warn!(
                "Redirect status {} for {} but no Location header",
                status.as_u16(),
                descriptor.url()
            );
            HopOutcome::Terminal
        }
    }
}

/// Builds the descriptor for the hop after a redirect.
///
/// Consumes the current hop's descriptor; the returned one is independent.
///
/// # Errors
///
/// - `TooManyRedirects` when the redirect budget is spent
/// - `InvalidRedirect` when `location` does not resolve to an http(s) URL
/// - `StreamNotReplayable` when the method and body must be kept but the body
///   was a stream that has already been sent
pub(crate) fn next_hop(
    mut current: RequestDescriptor,
    status: StatusCode,
    location: &str,
) -> Result<RequestDescriptor, FetchError> {
    if current.remaining_redirects == 0 {
        warn!(
            "Giving up on {} after {} redirects",
            current.url,
            current.max_redirects
        );
        return Err(FetchError::TooManyRedirects {
            max: current.max_redirects,
        });
    }

    let target = current
        .url
        .join(location)
        .map_err(|source| FetchError::InvalidRedirect {
            location: location.to_string(),
            reason: source.to_string(),
        })?;

    if !matches!(target.scheme(), "http" | "https") {
        return Err(FetchError::InvalidRedirect {
            location: location.to_string(),
            reason: format!("unsupported protocol '{}:'", target.scheme()),
        });
    }

    let mut headers = std::mem::take(&mut current.headers);
    headers.remove(HOST);

    if target.host_str() != current.url.host_str() {
        for name in CREDENTIAL_HEADERS {
            if headers.remove(name).is_some() {
                debug!(
                    "Stripped {} header on redirect from {} to {}",
                    name,
                    current.url.host_str().unwrap_or_default(),
                    target.host_str().unwrap_or_default()
                );
            }
        }
    }

    let body = std::mem::replace(&mut current.body, Body::Empty);
    let (method, body) = redirect_method_and_body(&current.method, body, status, &mut headers)?;

    debug!(
        "Following {} redirect: {} {} -> {} {}",
        status.as_u16(),
        current.method,
        current.url,
        method,
        target
    );

    Ok(for_redirect(&current, target, method, headers, body))
}

/// Decides the method and body of the next hop.
///
/// POST on 301/302, and anything but GET/HEAD on 303, becomes a body-less
/// GET. Every other redirect keeps the method and body, which for a stream
/// body is only possible if it has not been sent yet.
fn redirect_method_and_body(
    method: &Method,
    body: Body,
    status: StatusCode,
    headers: &mut HeaderMap,
) -> Result<(Method, Body), FetchError> {
    let downgrade = match status {
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => method == Method::POST,
        StatusCode::SEE_OTHER => method != Method::GET && method != Method::HEAD,
        _ => false,
    };

    if downgrade {
        debug!("Rewriting {} to GET after {} redirect", method, status.as_u16());
        headers.remove(CONTENT_LENGTH);
        headers.remove(CONTENT_TYPE);
        return Ok((Method::GET, Body::Empty));
    }

    if let Body::Stream(stream) = &body {
        if stream.is_consumed() {
            return Err(FetchError::StreamNotReplayable {
                status: status.as_u16(),
            });
        }
    }

    Ok((method.clone(), body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{normalize, BodyInput, RequestOptions};
    use bytes::Bytes;
    use reqwest::header::HeaderValue;

    fn descriptor(options: RequestOptions) -> RequestDescriptor {
        normalize(options).expect("valid options")
    }

    fn location_headers(location: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_str(location).unwrap());
        headers
    }

    #[test]
    fn test_classify_redirect_with_location() {
        let d = descriptor(RequestOptions::new("http://a.example/"));
        assert_eq!(
            classify(&d, StatusCode::MOVED_PERMANENTLY, &location_headers("/next")),
            HopOutcome::Redirect("/next".to_string())
        );
    }

    #[test]
    fn test_classify_terminal_cases() {
        let d = descriptor(RequestOptions::new("http://a.example/"));
        assert_eq!(
            classify(&d, StatusCode::OK, &location_headers("/next")),
            HopOutcome::Terminal
        );
        assert_eq!(
            classify(&d, StatusCode::FOUND, &HeaderMap::new()),
            HopOutcome::Terminal
        );

        let no_follow = descriptor(RequestOptions::new("http://a.example/").follow_redirects(false));
        assert_eq!(
            classify(&no_follow, StatusCode::FOUND, &location_headers("/next")),
            HopOutcome::Terminal
        );
    }

    #[test]
    fn test_relative_location_resolves_against_current_url() {
        let d = descriptor(RequestOptions::new("http://a.example/dir/page?x=1"));
        let next = next_hop(d, StatusCode::FOUND, "other").unwrap();
        assert_eq!(next.url().as_str(), "http://a.example/dir/other");
        assert_eq!(next.remaining_redirects(), 9);
    }

    #[test]
    fn test_budget_exhausted() {
        let d = descriptor(RequestOptions::new("http://a.example/").max_redirects(0));
        assert!(matches!(
            next_hop(d, StatusCode::MOVED_PERMANENTLY, "/next"),
            Err(FetchError::TooManyRedirects { max: 0 })
        ));
    }

    #[test]
    fn test_host_header_always_removed() {
        let d = descriptor(
            RequestOptions::new("http://a.example/").header("Host", "a.example"),
        );
        let next = next_hop(d, StatusCode::FOUND, "/same-host").unwrap();
        assert!(next.headers().get(HOST).is_none());
    }

    #[test]
    fn test_credentials_kept_on_same_host() {
        let d = descriptor(
            RequestOptions::new("http://a.example/")
                .header("Cookie", "session=1")
                .header("Authorization", "Bearer t"),
        );
        let next = next_hop(d, StatusCode::FOUND, "http://a.example:8080/x").unwrap();
        assert_eq!(next.headers()[COOKIE], "session=1");
        assert_eq!(next.headers()[AUTHORIZATION], "Bearer t");
    }

    #[test]
    fn test_credentials_stripped_on_cross_host() {
        let d = descriptor(
            RequestOptions::new("http://a.example/")
                .header("Cookie", "session=1")
                .header("Authorization", "Bearer t")
                .header("X-Other", "kept"),
        );
        let next = next_hop(d, StatusCode::FOUND, "http://b.example/").unwrap();
        assert!(next.headers().get(COOKIE).is_none());
        assert!(next.headers().get(AUTHORIZATION).is_none());
        assert_eq!(next.headers()["x-other"], "kept");
    }

    #[test]
    fn test_post_downgraded_on_301_and_302() {
        for status in [StatusCode::MOVED_PERMANENTLY, StatusCode::FOUND] {
            let d = descriptor(RequestOptions::new("http://a.example/").json(true).body(
                serde_json::json!({ "a": 1 }),
            ));
            let next = next_hop(d, status, "/next").unwrap();
            assert_eq!(next.method(), Method::GET);
            assert!(next.body().is_empty());
            assert!(next.headers().get(CONTENT_LENGTH).is_none());
            assert!(next.headers().get(CONTENT_TYPE).is_none());
        }
    }

    #[test]
    fn test_put_kept_on_301() {
        let d = descriptor(RequestOptions::new("http://a.example/").method("PUT").body("x"));
        let next = next_hop(d, StatusCode::MOVED_PERMANENTLY, "/next").unwrap();
        assert_eq!(next.method(), Method::PUT);
        assert_eq!(next.body().len(), Some(1));
    }

    #[test]
    fn test_see_other_becomes_get() {
        let d = descriptor(RequestOptions::new("http://a.example/").method("DELETE").body("x"));
        let next = next_hop(d, StatusCode::SEE_OTHER, "/next").unwrap();
        assert_eq!(next.method(), Method::GET);
        assert!(next.body().is_empty());
    }

    #[test]
    fn test_temporary_redirect_preserves_method_and_bytes() {
        let d = descriptor(RequestOptions::new("http://a.example/").body("payload"));
        let next = next_hop(d, StatusCode::TEMPORARY_REDIRECT, "/next").unwrap();
        assert_eq!(next.method(), Method::POST);
        match next.body() {
            Body::Bytes(b) => assert_eq!(&b[..], b"payload"),
            other => panic!("unexpected body {:?}", other),
        }
        assert_eq!(next.headers()[CONTENT_LENGTH], "7");
    }

    #[test]
    fn test_consumed_stream_cannot_be_replayed() {
        let stream = futures::stream::iter(vec![Ok(Bytes::from_static(b"abc"))]);
        let mut d = descriptor(RequestOptions::new("http://a.example/").body(BodyInput::stream(stream)));
        if let Body::Stream(s) = &mut d.body {
            assert!(s.take().is_some());
        }
        assert!(matches!(
            next_hop(d, StatusCode::PERMANENT_REDIRECT, "/next"),
            Err(FetchError::StreamNotReplayable { status: 308 })
        ));
    }

    #[test]
    fn test_non_http_location_is_rejected() {
        let d = descriptor(RequestOptions::new("http://a.example/"));
        assert!(matches!(
            next_hop(d, StatusCode::FOUND, "file:///etc/passwd"),
            Err(FetchError::InvalidRedirect { ref location, .. }) if location == "file:///etc/passwd"
        ));
    }

    #[test]
    fn test_unparseable_location_is_a_redirect_error() {
        let d = descriptor(RequestOptions::new("http://a.example/"));
        let err = next_hop(d, StatusCode::FOUND, "http://[broken/").unwrap_err();
        assert!(matches!(err, FetchError::InvalidRedirect { .. }));
        assert!(!err.is_input_error());
    }
}
