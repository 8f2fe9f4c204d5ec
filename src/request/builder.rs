//! Request normalization.
//!
//! Turns a [`RequestInput`] into a [`RequestDescriptor`]: resolves the URL,
//! lower-cases header names, installs default headers, derives the body and
//! its content headers, and settles the method. Performs no I/O.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CONTENT_LENGTH,
    CONTENT_TYPE,
};
use reqwest::Method;
use url::Url;

use super::descriptor::{Body, RequestDescriptor, StreamBody};
use super::options::{BodyInput, FormInput, RequestInput, RequestOptions};
use crate::config::{
    CONTENT_TYPE_FORM, CONTENT_TYPE_JSON, DEFAULT_ACCEPT_ENCODING, DEFAULT_BASE_URL,
    DEFAULT_MAX_REDIRECTS,
};
use crate::error_handling::FetchError;

/// Normalizes caller input into a descriptor for the first hop.
///
/// # Errors
///
/// Returns an input error (`InvalidOptions`, `InvalidUrl`, `InvalidHeader`)
/// when the options are contradictory, use a removed option name, or contain
/// values that are not valid HTTP. Nothing has been sent at that point.
///
/// # Examples
///
/// ```
/// use redirect_fetch::{normalize, RequestOptions};
///
/// let descriptor = normalize(RequestOptions::new("http://example.com/a").body("hi")).unwrap();
/// assert_eq!(descriptor.method().as_str(), "POST");
/// assert_eq!(descriptor.headers()["content-length"], "2");
/// assert_eq!(descriptor.headers()["accept-encoding"], "gzip, deflate");
/// ```
pub fn normalize(input: impl Into<RequestInput>) -> Result<RequestDescriptor, FetchError> {
    let options = input.into().into_options();
    reject_removed_options(&options)?;

    let mut url = resolve_url(&options)?;
    check_scheme(&url)?;

    let RequestOptions {
        method,
        headers,
        body,
        form,
        json,
        max_redirects,
        follow_redirects,
        timeout,
        insecure,
        ..
    } = options;

    let mut headers = build_headers(&headers)?;
    move_credentials_to_header(&mut url, &mut headers);

    let (body, form) = derive_body(body, form, json, &mut headers)?;
    let method = resolve_method(method.as_deref(), &body)?;
    let max_redirects = max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS);

    Ok(RequestDescriptor {
        url,
        method,
        headers,
        body,
        max_redirects,
        remaining_redirects: max_redirects,
        follow_redirects: follow_redirects.unwrap_or(true),
        json,
        form,
        insecure,
        timeout,
    })
}

/// Builds the descriptor for the next redirect hop.
///
/// `method`, `headers` and `body` have already been adjusted for the redirect;
/// call settings carry over from `previous` and one redirect is spent.
/// `url` has already been checked to be http(s).
pub(crate) fn for_redirect(
    previous: &RequestDescriptor,
    mut url: Url,
    method: Method,
    mut headers: HeaderMap,
    body: Body,
) -> RequestDescriptor {
    move_credentials_to_header(&mut url, &mut headers);

    RequestDescriptor {
        url,
        method,
        headers,
        body,
        max_redirects: previous.max_redirects,
        remaining_redirects: previous.remaining_redirects.saturating_sub(1),
        follow_redirects: previous.follow_redirects,
        json: previous.json,
        form: previous.form,
        insecure: previous.insecure,
        timeout: previous.timeout,
    }
}

/// Turns credentials embedded in `url` into a basic `authorization` header.
///
/// An explicit `authorization` header wins. The credentials are removed from
/// the URL either way, so they only ever travel as a header (and are dropped
/// with it on cross-host redirects).
pub(crate) fn move_credentials_to_header(url: &mut Url, headers: &mut HeaderMap) {
    if url.username().is_empty() && url.password().is_none() {
        return;
    }

    if !headers.contains_key(AUTHORIZATION) {
        let username = percent_decode_str(url.username()).decode_utf8_lossy();
        let password = url
            .password()
            .map(|p| percent_decode_str(p).decode_utf8_lossy())
            .unwrap_or_default();
        let token = BASE64_STANDARD.encode(format!("{}:{}", username, password));
        if let Ok(value) = HeaderValue::from_str(&format!("Basic {}", token)) {
            headers.insert(AUTHORIZATION, value);
        }
    }

    // Only fails for URLs that cannot carry credentials in the first place
    let _ = url.set_username("");
    let _ = url.set_password(None);
}

fn reject_removed_options(options: &RequestOptions) -> Result<(), FetchError> {
    if options.auth.is_some() {
        return Err(FetchError::InvalidOptions(
            "`auth` has been removed in favour of `username` and `password`".to_string(),
        ));
    }
    if options.path.is_some() {
        return Err(FetchError::InvalidOptions(
            "`path` has been removed in favour of `pathname`".to_string(),
        ));
    }
    if options.host.is_some() && (options.hostname.is_some() || options.port.is_some()) {
        return Err(FetchError::InvalidOptions(
            "`host` cannot be combined with `hostname` or `port`".to_string(),
        ));
    }
    Ok(())
}

fn invalid_url(url: &str, source: url::ParseError) -> FetchError {
    FetchError::InvalidUrl {
        url: url.to_string(),
        source,
    }
}

fn resolve_url(options: &RequestOptions) -> Result<Url, FetchError> {
    let base = Url::parse(DEFAULT_BASE_URL).map_err(|e| invalid_url(DEFAULT_BASE_URL, e))?;
    let raw = options.url.as_deref().unwrap_or("");
    let mut url = base.join(raw).map_err(|e| invalid_url(raw, e))?;

    if let Some(protocol) = &options.protocol {
        let scheme = protocol.trim_end_matches(':');
        url.set_scheme(scheme).map_err(|()| {
            FetchError::InvalidOptions(format!("cannot switch URL to protocol '{}'", protocol))
        })?;
    }

    if let Some(host) = &options.host {
        let authority = format!("{}://{}", url.scheme(), host);
        let parsed = Url::parse(&authority).map_err(|e| invalid_url(&authority, e))?;
        url.set_host(parsed.host_str())
            .map_err(|e| invalid_url(host, e))?;
        url.set_port(parsed.port())
            .map_err(|()| FetchError::InvalidOptions(format!("cannot set host '{}'", host)))?;
    }

    if let Some(hostname) = &options.hostname {
        url.set_host(Some(hostname))
            .map_err(|e| invalid_url(hostname, e))?;
    }

    if let Some(port) = options.port {
        url.set_port(Some(port))
            .map_err(|()| FetchError::InvalidOptions(format!("cannot set port {}", port)))?;
    }

    if let Some(pathname) = &options.pathname {
        url.set_path(pathname);
    }

    if let Some(search) = &options.search {
        let query = search.trim_start_matches('?');
        url.set_query((!query.is_empty()).then_some(query));
    }

    if let Some(hash) = &options.hash {
        let fragment = hash.trim_start_matches('#');
        url.set_fragment((!fragment.is_empty()).then_some(fragment));
    }

    if let Some(username) = &options.username {
        url.set_username(username).map_err(|()| {
            FetchError::InvalidOptions("URL cannot carry a username".to_string())
        })?;
    }

    if let Some(password) = &options.password {
        url.set_password(Some(password)).map_err(|()| {
            FetchError::InvalidOptions("URL cannot carry a password".to_string())
        })?;
    }

    Ok(url)
}

/// Only `http` and `https` targets can be requested.
fn check_scheme(url: &Url) -> Result<(), FetchError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(FetchError::InvalidOptions(format!(
            "unsupported protocol '{}:' in {}",
            other, url
        ))),
    }
}

fn build_headers(pairs: &[(String, String)]) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT_ENCODING,
        HeaderValue::from_static(DEFAULT_ACCEPT_ENCODING),
    );

    for (name, value) in pairs {
        let header_name = HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes())
            .map_err(|_| FetchError::InvalidHeader(format!("invalid header name '{}'", name)))?;
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            FetchError::InvalidHeader(format!("invalid value for header '{}'", name))
        })?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

/// Derives the body and its content headers.
///
/// Returns the body and whether it came from the form payload.
fn derive_body(
    body: Option<BodyInput>,
    form: Option<FormInput>,
    json: bool,
    headers: &mut HeaderMap,
) -> Result<(Body, bool), FetchError> {
    let has_form = form.is_some();

    let (body, from_form) = match body.filter(|b| !b.is_empty()) {
        Some(input) => (encode_body(input, json)?, false),
        None => match form {
            Some(form) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_FORM));
                (Body::Bytes(encode_form(form)?), true)
            }
            None => (Body::Empty, false),
        },
    };

    if let Body::Bytes(bytes) = &body {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
    }
    if json && !has_form && !body.is_empty() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
    }
    if json {
        headers.insert(ACCEPT, HeaderValue::from_static(CONTENT_TYPE_JSON));
    }

    Ok((body, from_form))
}

fn encode_body(input: BodyInput, json: bool) -> Result<Body, FetchError> {
    let body = match input {
        BodyInput::Stream(stream) => Body::Stream(StreamBody::new(stream)),
        BodyInput::Json(value) => Body::Bytes(Bytes::from(serde_json::to_vec(&value)?)),
        BodyInput::Text(text) if json => Body::Bytes(Bytes::from(serde_json::to_vec(&text)?)),
        BodyInput::Text(text) => Body::Bytes(Bytes::from(text)),
        BodyInput::Bytes(bytes) => Body::Bytes(bytes),
    };
    Ok(body)
}

fn encode_form(form: FormInput) -> Result<Bytes, FetchError> {
    match form {
        FormInput::Encoded(encoded) => Ok(Bytes::from(encoded)),
        FormInput::Pairs(pairs) => serde_urlencoded::to_string(&pairs)
            .map(Bytes::from)
            .map_err(|e| FetchError::InvalidOptions(format!("cannot encode form: {}", e))),
    }
}

fn resolve_method(method: Option<&str>, body: &Body) -> Result<Method, FetchError> {
    let method = match method {
        Some(m) => m.to_ascii_uppercase(),
        None if !body.is_empty() => "POST".to_string(),
        None => "GET".to_string(),
    };
    Method::from_bytes(method.as_bytes())
        .map_err(|_| FetchError::InvalidOptions(format!("invalid method '{}'", method)))
}
