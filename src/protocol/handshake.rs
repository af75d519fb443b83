//! WebSocket upgrade negotiation (RFC 6455 Section 4.2).
//!
//! [`Negotiator::negotiate`] inspects a decoded HTTP request and decides
//! whether the connection may be promoted to WebSocket framing. It computes an
//! outcome only; applying it to a connection is the state machine's job.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::config::Config;
use crate::error::Error;
use crate::protocol::frame::Frame;
use crate::protocol::http::{HttpRequest, HttpResponse, StatusCode};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this gateway speaks.
pub const SUPPORTED_VERSION: u8 = 13;

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wsgate::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Context of a completed upgrade, owned by exactly one connection.
///
/// Present while the connection is `Established` or `Closing`; used to answer
/// the close handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeToken {
    accept_key: String,
    version: u8,
    endpoint: String,
    requested_path: String,
}

impl HandshakeToken {
    /// The Sec-WebSocket-Accept value sent to the client.
    #[must_use]
    pub fn accept_key(&self) -> &str {
        &self.accept_key
    }

    /// Negotiated protocol version.
    #[must_use]
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// The advertised endpoint URI.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The path the client actually requested.
    #[must_use]
    pub fn requested_path(&self) -> &str {
        &self.requested_path
    }

    /// Close frame answering the peer's close.
    ///
    /// The status code and reason are echoed back unchanged.
    #[must_use]
    pub fn close_reply(&self, inbound: &Frame) -> Frame {
        Frame::new(crate::protocol::OpCode::Close, inbound.payload().clone())
    }

    /// The `101 Switching Protocols` response completing the upgrade.
    #[must_use]
    pub fn response(&self) -> HttpResponse {
        HttpResponse::new(StatusCode::SWITCHING_PROTOCOLS)
            .with_header("Upgrade", "websocket")
            .with_header("Connection", "Upgrade")
            .with_header("Sec-WebSocket-Accept", self.accept_key.clone())
    }
}

/// Result of negotiating one upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// The upgrade is refused. The response must be sent, then the connection closed.
    Rejected {
        /// Response to send before closing.
        response: HttpResponse,
        /// Why the request was refused.
        reason: Error,
    },
    /// The upgrade is accepted.
    Accepted {
        /// Context to store on the connection.
        token: HandshakeToken,
        /// The `101` response to send.
        response: HttpResponse,
    },
}

impl HandshakeOutcome {
    /// Returns `true` for `Accepted`.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, HandshakeOutcome::Accepted { .. })
    }

    /// The response to send, whatever the outcome.
    #[must_use]
    pub fn response(&self) -> &HttpResponse {
        match self {
            HandshakeOutcome::Rejected { response, .. }
            | HandshakeOutcome::Accepted { response, .. } => response,
        }
    }
}

/// Validates upgrade requests against the configured endpoint.
#[derive(Debug, Clone)]
pub struct Negotiator {
    endpoint_uri: String,
    endpoint_path: String,
    enforce_path: bool,
}

impl Negotiator {
    /// Create a negotiator for the endpoint described by `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            endpoint_uri: config.endpoint_uri(),
            endpoint_path: config.endpoint_path.clone(),
            enforce_path: config.enforce_path,
        }
    }

    /// Decide whether `request` may upgrade.
    ///
    /// Checks run in order, the first failure wins:
    /// 1. decode failure or `Upgrade` not exactly `websocket`: `400`
    /// 2. path mismatch, only with `enforce_path`: `404`
    /// 3. `Sec-WebSocket-Version` missing or not 13: `426` with
    ///    `Sec-WebSocket-Version: 13`
    /// 4. `Sec-WebSocket-Key` missing or not 16 base64-encoded bytes: `400`
    #[must_use]
    pub fn negotiate(&self, request: &HttpRequest) -> HandshakeOutcome {
        if !request.decode_success {
            let reason = request
                .decode_error
                .clone()
                .unwrap_or_else(|| "request could not be decoded".to_string());
            return reject(StatusCode::BAD_REQUEST, Error::MalformedUpgradeRequest(reason));
        }

        if request.header("upgrade") != Some("websocket") {
            return reject(
                StatusCode::BAD_REQUEST,
                Error::MalformedUpgradeRequest(format!(
                    "Upgrade header is {:?}, expected \"websocket\"",
                    request.header("upgrade")
                )),
            );
        }

        let path = request.path();
        if path != self.endpoint_path {
            if self.enforce_path {
                return reject(StatusCode::NOT_FOUND, Error::PathNotServed(path.to_string()));
            }
            debug!(
                requested = path,
                endpoint = %self.endpoint_path,
                "upgrade requested for a path other than the endpoint"
            );
        }

        let version = request.header("sec-websocket-version");
        if version.map(str::trim) != Some("13") {
            let response = HttpResponse::rejection(StatusCode::UPGRADE_REQUIRED)
                .with_header("Sec-WebSocket-Version", SUPPORTED_VERSION.to_string());
            return HandshakeOutcome::Rejected {
                response,
                reason: Error::UnsupportedProtocolVersion(version.map(str::to_string)),
            };
        }

        let key = match request.header("sec-websocket-key").map(str::trim) {
            Some(key) if is_valid_key(key) => key,
            Some(_) => {
                return reject(
                    StatusCode::BAD_REQUEST,
                    Error::MalformedUpgradeRequest(
                        "Sec-WebSocket-Key must be 16 base64-encoded bytes".into(),
                    ),
                );
            }
            None => {
                return reject(
                    StatusCode::BAD_REQUEST,
                    Error::MalformedUpgradeRequest("Missing Sec-WebSocket-Key header".into()),
                );
            }
        };

        let token = HandshakeToken {
            accept_key: compute_accept_key(key),
            version: SUPPORTED_VERSION,
            endpoint: self.endpoint_uri.clone(),
            requested_path: path.to_string(),
        };
        let response = token.response();
        HandshakeOutcome::Accepted { token, response }
    }
}

fn reject(status: StatusCode, reason: Error) -> HandshakeOutcome {
    HandshakeOutcome::Rejected {
        response: HttpResponse::rejection(status),
        reason,
    }
}

fn is_valid_key(key: &str) -> bool {
    BASE64.decode(key).is_ok_and(|decoded| decoded.len() == 16)
}
