//! Error types for the upgrade gateway.
//!
//! Every error is scoped to a single connection. None of them is fatal to the
//! process; the connection that raised it is torn down and the others keep
//! running.

use thiserror::Error;

use crate::protocol::OpCode;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while negotiating, dispatching or transporting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The HTTP request could not be decoded or is not a structurally valid
    /// WebSocket upgrade.
    #[error("Malformed upgrade request: {0}")]
    MalformedUpgradeRequest(String),

    /// The client asked for a WebSocket version this gateway does not speak.
    #[error("Unsupported WebSocket version: {}", .0.as_deref().unwrap_or("(none)"))]
    UnsupportedProtocolVersion(Option<String>),

    /// The upgrade targeted a path other than the configured endpoint.
    #[error("Path not served: {0}")]
    PathNotServed(String),

    /// A frame arrived whose opcode the dispatcher does not handle.
    #[error("{0} frame types not supported")]
    UnsupportedFrameType(OpCode),

    /// A unit arrived that does not fit the current connection phase.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in text frame.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// The transport failed underneath the connection.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The peer closed the transport.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Handshake request exceeds configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Actual request size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Invalid opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Unmasked client frame (security violation).
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Header value would break the response framing.
    #[error("Invalid value for header {header}: {reason}")]
    InvalidHeaderValue {
        /// Header name.
        header: String,
        /// Why the value was refused.
        reason: String,
    },
}

impl Error {
    /// Returns `true` for errors raised while the connection still speaks HTTP,
    /// where a diagnostic response can be sent before closing.
    #[must_use]
    pub const fn is_handshake_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedUpgradeRequest(_)
                | Error::UnsupportedProtocolVersion(_)
                | Error::PathNotServed(_)
                | Error::HandshakeTooLarge { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
