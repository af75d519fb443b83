//! Decoded HTTP requests and responses for the upgrade exchange.
//!
//! Parsing never fails outright: a request that cannot be decoded is still
//! returned, flagged with `decode_success == false`, so the negotiator can
//! answer it with a `400` like any other bad upgrade.

use bytes::Bytes;

use crate::error::{Error, Result};

/// Header map with case-insensitive lookup that preserves insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// Create an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`, compared case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if at least one value exists for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of values stored for `name`.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .count()
    }

    /// Append a value, keeping existing values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every value for `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.entries.push((name, value.into()));
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no headers are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Headers that must appear at most once in an upgrade request.
const SINGLE_VALUED: [&str; 4] = [
    "host",
    "upgrade",
    "sec-websocket-key",
    "sec-websocket-version",
];

/// An HTTP request as handed over by the decoding collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method, e.g. `GET`.
    pub method: String,
    /// Request target, e.g. `/websocket`.
    pub uri: String,
    /// Protocol version, e.g. `HTTP/1.1`.
    pub version: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// `false` when the bytes could not be decoded as an HTTP request.
    pub decode_success: bool,
    /// Why decoding failed, when it did.
    pub decode_error: Option<String>,
}

impl HttpRequest {
    /// Create a successfully decoded request with no headers.
    #[must_use]
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            version: "HTTP/1.1".to_string(),
            headers: HeaderMap::new(),
            decode_success: true,
            decode_error: None,
        }
    }

    /// Create a request standing for bytes that failed to decode.
    #[must_use]
    pub fn decode_failure(reason: impl Into<String>) -> Self {
        Self {
            method: String::new(),
            uri: String::new(),
            version: String::new(),
            headers: HeaderMap::new(),
            decode_success: false,
            decode_error: Some(reason.into()),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Header value, looked up case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The path component of the request target, without query string.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.split(['?', '#']).next().unwrap_or_default()
    }

    /// Declared body length, if any.
    #[must_use]
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length")
            .and_then(|v| v.trim().parse().ok())
    }

    /// Decode a request head (request line and headers).
    ///
    /// Anything after the blank line terminating the head is ignored.
    #[must_use]
    pub fn parse(data: &[u8]) -> Self {
        match Self::try_parse(data) {
            Ok(request) => request,
            Err(Error::MalformedUpgradeRequest(reason)) => Self::decode_failure(reason),
            Err(other) => Self::decode_failure(other.to_string()),
        }
    }

    /// Decode a request head, flagging it as failed if it exceeds `max_size`.
    #[must_use]
    pub fn parse_with_limit(data: &[u8], max_size: usize) -> Self {
        if data.len() > max_size {
            return Self::decode_failure(
                Error::HandshakeTooLarge {
                    size: data.len(),
                    max: max_size,
                }
                .to_string(),
            );
        }
        Self::parse(data)
    }

    fn try_parse(data: &[u8]) -> Result<Self> {
        let malformed = |msg: &str| Error::MalformedUpgradeRequest(msg.to_string());

        let head_end = data
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .ok_or_else(|| malformed("Request head not terminated"))?;
        let head = std::str::from_utf8(&data[..head_end]).map_err(|_| malformed("Invalid UTF-8"))?;
        let mut lines = head.split("\r\n");

        let request_line = lines
            .next()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| malformed("Empty request"))?;

        let mut parts = request_line.split(' ').filter(|p| !p.is_empty());
        let (Some(method), Some(uri), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("Invalid request line"));
        };

        if !version.starts_with("HTTP/1.") {
            return Err(Error::MalformedUpgradeRequest(format!(
                "Unsupported HTTP version: {version}"
            )));
        }

        let mut headers = HeaderMap::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::MalformedUpgradeRequest(format!("Invalid header line: {line}")))?;
            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(Error::MalformedUpgradeRequest(format!(
                    "Invalid header name: {name:?}"
                )));
            }
            headers.append(name, value.trim());
        }

        if let Some(dup) = SINGLE_VALUED.iter().find(|h| headers.count(h) > 1) {
            return Err(Error::MalformedUpgradeRequest(format!(
                "Duplicate header: {dup}"
            )));
        }

        Ok(Self {
            method: method.to_string(),
            uri: uri.to_string(),
            version: version.to_string(),
            headers,
            decode_success: true,
            decode_error: None,
        })
    }
}

/// An HTTP status code with its canonical reason phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    /// 101 Switching Protocols.
    pub const SWITCHING_PROTOCOLS: StatusCode = StatusCode(101);
    /// 200 OK.
    pub const OK: StatusCode = StatusCode(200);
    /// 400 Bad Request.
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    /// 404 Not Found.
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    /// 426 Upgrade Required.
    pub const UPGRADE_REQUIRED: StatusCode = StatusCode(426);

    /// Canonical reason phrase.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self.0 {
            101 => "Switching Protocols",
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            426 => "Upgrade Required",
            500 => "Internal Server Error",
            _ => "Unknown",
        }
    }
}

impl std::fmt::Display for StatusCode {
    /// Renders as `"400 Bad Request"`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.0, self.reason())
    }
}

/// An HTTP response for the encoding collaborator to serialise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Optional body.
    pub body: Option<Bytes>,
}

impl HttpResponse {
    /// Create a response with no headers and no body.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Create a rejection response.
    ///
    /// For any status other than 200 the body is the textual status (for
    /// example `"400 Bad Request"`) and `Content-Length` is its byte length.
    /// The connection is always marked for close.
    #[must_use]
    pub fn rejection(status: StatusCode) -> Self {
        let mut response = Self::new(status);
        if status != StatusCode::OK {
            let body = Bytes::from(status.to_string());
            response
                .headers
                .set("Content-Type", "text/plain; charset=UTF-8");
            response
                .headers
                .set("Content-Length", body.len().to_string());
            response.body = Some(body);
        }
        response.headers.set("Connection", "close");
        response
    }

    /// Add or replace a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Header value, looked up case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Body bytes, empty if there is no body.
    #[must_use]
    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }

    /// Returns `true` if the transport must be closed once this is flushed.
    #[must_use]
    pub fn closes_connection(&self) -> bool {
        self.header("connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("close"))
    }

    /// Serialise the response into `buf`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHeaderValue` if a header name or value contains CR or LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(format!("HTTP/1.1 {}\r\n", self.status).as_bytes());
        for (name, value) in self.headers.iter() {
            validate_header_value(name, name)?;
            validate_header_value(name, value)?;
            buf.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(self.body_bytes());
        Ok(())
    }
}

/// Validate that a header value does not contain CR or LF characters.
fn validate_header_value(header_name: &str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(Error::InvalidHeaderValue {
            header: header_name.to_string(),
            reason: "contains CR or LF characters".to_string(),
        });
    }
    Ok(())
}
