//! WebDAV request/response types and the [`Transport`] seam.
//!
//! Discovery and fetch code only build [`DavRequest`]s and read
//! [`DavResponse`]s, so they can be driven by an in-memory transport in
//! tests. Status codes are not interpreted here except by
//! [`check_status`]; discovery needs to look at redirects and 404s itself.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::BoxFuture;

/// WebDAV methods used by the CardDAV flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DavMethod {
    /// Property lookup.
    Propfind,
    /// Addressbook query.
    Report,
}

impl DavMethod {
    /// Returns the HTTP method token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Propfind => "PROPFIND",
            Self::Report => "REPORT",
        }
    }
}

impl fmt::Display for DavMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of the `Depth` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Depth {
    /// The resource itself.
    Zero,
    /// The resource and its direct children.
    One,
}

impl Depth {
    /// Returns the header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
        }
    }
}

/// A single WebDAV request.
#[derive(Debug, Clone)]
pub struct DavRequest {
    /// Method.
    pub method: DavMethod,
    /// Absolute target URL.
    pub url: Url,
    /// `Depth` header, if any.
    pub depth: Option<Depth>,
    /// XML body.
    pub body: Option<String>,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
    /// Whether redirects are followed transparently.
    pub follow_redirects: bool,
}

impl DavRequest {
    /// Creates a PROPFIND request.
    pub fn propfind(url: Url, depth: Depth, body: impl Into<String>) -> Self {
        Self {
            method: DavMethod::Propfind,
            url,
            depth: Some(depth),
            body: Some(body.into()),
            timeout: None,
            follow_redirects: true,
        }
    }

    /// Creates a Depth 1 REPORT request.
    pub fn report(url: Url, body: impl Into<String>) -> Self {
        Self {
            method: DavMethod::Report,
            url,
            depth: Some(Depth::One),
            body: Some(body.into()),
            timeout: None,
            follow_redirects: true,
        }
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns 3xx responses to the caller instead of following them.
    pub fn without_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

/// A WebDAV response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, names lowercased.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: String,
}

impl DavResponse {
    /// Creates an empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the first value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the `Location` header.
    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    /// Returns true for 3xx.
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Returns true for 207 Multi-Status.
    pub fn is_multistatus(&self) -> bool {
        self.status == 207
    }

    /// Returns true for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Returns the error an HTTP status stands for, or `None` below 400.
pub fn status_error(status: u16, body: &str) -> Option<ProviderError> {
    let err = match status {
        s if s < 400 => return None,
        401 => ProviderError::authentication("Authentication failed: invalid credentials"),
        403 => ProviderError::authorization("Access denied to addressbook"),
        404 => ProviderError::not_found("Addressbook or resource not found"),
        429 => ProviderError::rate_limited("Too many requests to server"),
        s if s >= 500 => {
            ProviderError::server(format!("Server error ({}): {}", s, snippet(body)))
        }
        s => ProviderError::invalid_response(format!("Unexpected status {}: {}", s, snippet(body))),
    };
    Some(err.with_status(status))
}

/// Maps error statuses to [`ProviderError`]s; 2xx and 3xx pass through.
pub fn check_status(response: DavResponse) -> ProviderResult<DavResponse> {
    match status_error(response.status, &response.body) {
        Some(err) => Err(err),
        None => Ok(response),
    }
}

fn snippet(body: &str) -> &str {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.trim();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].trim()
}

/// Sends WebDAV requests.
pub trait Transport: Send + Sync {
    /// Sends one request and returns the raw response.
    ///
    /// # Errors
    ///
    /// Only transport failures (connect, TLS, timeout) are errors; any HTTP
    /// status is returned as a response.
    fn send(&self, request: DavRequest) -> BoxFuture<'_, ProviderResult<DavResponse>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: DavRequest) -> BoxFuture<'_, ProviderResult<DavResponse>> {
        (**self).send(request)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn propfind_request_defaults() {
        let req = DavRequest::propfind(url("https://a.example/"), Depth::Zero, "<x/>")
            .with_timeout(Duration::from_secs(15))
            .without_redirects();
        assert_eq!(req.method.as_str(), "PROPFIND");
        assert_eq!(req.depth, Some(Depth::Zero));
        assert_eq!(req.timeout, Some(Duration::from_secs(15)));
        assert!(!req.follow_redirects);
    }

    #[test]
    fn report_is_depth_one() {
        let req = DavRequest::report(url("https://a.example/card/"), "<q/>");
        assert_eq!(req.method, DavMethod::Report);
        assert_eq!(req.depth.map(|d| d.as_str()), Some("1"));
        assert!(req.follow_redirects);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let resp = DavResponse::new(301)
            .with_header("Location", "https://p1.example/")
            .with_header("X-Apple-User-Partition", "42");
        assert_eq!(resp.location(), Some("https://p1.example/"));
        assert_eq!(resp.header("x-apple-user-partition"), Some("42"));
        assert!(resp.is_redirect());
        assert!(!resp.is_success());
    }

    #[test]
    fn check_status_mapping() {
        assert!(check_status(DavResponse::new(207)).is_ok());
        assert!(check_status(DavResponse::new(302)).is_ok());

        let cases = [
            (401, ProviderErrorCode::AuthenticationFailed),
            (403, ProviderErrorCode::AuthorizationFailed),
            (404, ProviderErrorCode::NotFound),
            (429, ProviderErrorCode::RateLimited),
            (503, ProviderErrorCode::ServerError),
            (400, ProviderErrorCode::InvalidResponse),
        ];
        for (status, code) in cases {
            let err = check_status(DavResponse::new(status)).unwrap_err();
            assert_eq!(err.code(), code, "status {status}");
            assert_eq!(err.status(), Some(status));
        }
    }

    #[test]
    fn long_bodies_are_truncated_in_errors() {
        let body = "é".repeat(300);
        let err = check_status(DavResponse::new(500).with_body(body)).unwrap_err();
        assert!(err.message().len() < 260);
    }
}
