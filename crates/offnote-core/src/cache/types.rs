//! Request and response values seen at the interception boundary.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, DATE};
use http::{HeaderMap, Method, StatusCode};
use serde::{Deserialize, Serialize};

/// What the request is fetching, as declared by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level HTML navigation
    Document,
    Script,
    Style,
    Image,
    Font,
    Other,
}

/// An intercepted outgoing request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub destination: Destination,
}

impl Request {
    /// A `GET` for a subresource.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            destination: Destination::Other,
        }
    }

    /// A `GET` document navigation.
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            destination: Destination::Document,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Document
    }

    /// Canonical cache key for this request.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }
}

/// Canonical cache key: `"<METHOD> <url>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn new(method: &Method, url: &str) -> Self {
        Self(format!("{} {}", method.as_str(), url))
    }

    /// Rebuild a key previously produced by `as_str`.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A response, live or cached. Cloning is cheap (`Bytes` body).
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// The minimal error response served when neither network nor cache can answer.
    pub fn service_unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "Offline")
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Stamp the `date` header.
    pub fn with_date(self, date: DateTime<Utc>) -> Self {
        match HeaderValue::from_str(&http_date(date)) {
            Ok(value) => self.with_header(DATE, value),
            Err(_) => self,
        }
    }

    /// Parsed `date` header, if present and well-formed.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        let raw = self.headers.get(DATE)?.to_str().ok()?;
        DateTime::parse_from_rfc2822(raw.trim())
            .ok()
            .map(|date| date.with_timezone(&Utc))
    }
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Network,
    Cache,
    /// Built locally because neither network nor cache could answer
    Synthesized,
}

/// A response handed back to the page.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: ServedFrom,
}

impl Served {
    pub fn network(response: Response) -> Self {
        Self {
            response,
            source: ServedFrom::Network,
        }
    }

    pub fn cache(response: Response) -> Self {
        Self {
            response,
            source: ServedFrom::Cache,
        }
    }

    pub fn synthesized(response: Response) -> Self {
        Self {
            response,
            source: ServedFrom::Synthesized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_key_includes_method() {
        let get = Request::get("https://app.test/app.js").key();
        let post = Request::get("https://app.test/app.js")
            .with_method(Method::POST)
            .key();
        assert_eq!(get.as_str(), "GET https://app.test/app.js");
        assert_ne!(get, post);
    }

    #[test]
    fn test_date_header_round_trip() {
        let date = DateTime::parse_from_rfc3339("2024-03-05T10:15:30Z")
            .unwrap()
            .with_timezone(&Utc);
        let response = Response::ok("x").with_date(date);
        assert_eq!(
            response.headers.get(DATE).unwrap(),
            "Tue, 05 Mar 2024 10:15:30 GMT"
        );
        assert_eq!(response.date(), Some(date));
    }

    #[test]
    fn test_unparseable_date_is_none() {
        let response =
            Response::ok("x").with_header(DATE, HeaderValue::from_static("last tuesday"));
        assert_eq!(response.date(), None);
        assert_eq!(Response::ok("x").date(), None);
    }

    #[test]
    fn test_service_unavailable_shape() {
        let response = Response::service_unavailable();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body, Bytes::from_static(b"Offline"));
    }
}
