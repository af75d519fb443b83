//! Configuration and limits for the gateway and the delimiter echo server.

use std::net::SocketAddr;

/// Configuration limits for gateway connections.
///
/// These limits bound the memory a single connection can make the server
/// buffer before a unit is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum payload size of a single frame in bytes.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_frame_size: usize,

    /// Maximum size of the upgrade request (head and body) in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024, // 16 MB
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(max_frame_size: usize, max_handshake_size: usize) -> Self {
        Self {
            max_frame_size,
            max_handshake_size,
        }
    }

    /// Validate that frame size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_frame_size {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that handshake size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`](crate::Error::HandshakeTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_handshake_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_handshake_size {
            Err(crate::Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Wording appended to every echoed text message.
///
/// The reply to a text frame is `text + separator + phrase + timestamp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// Placed directly after the echoed text.
    ///
    /// Default: `" , "`
    pub separator: String,

    /// Welcome phrase placed before the server timestamp.
    pub phrase: String,
}

impl Default for Greeting {
    fn default() -> Self {
        Self {
            separator: " , ".to_string(),
            phrase: "welcome to the WebSocket gateway, the time is now: ".to_string(),
        }
    }
}

impl Greeting {
    /// Create a greeting with a custom separator and phrase.
    #[must_use]
    pub fn new(separator: impl Into<String>, phrase: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            phrase: phrase.into(),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the server listens on.
    ///
    /// Default: `127.0.0.1:8080`
    pub bind_addr: SocketAddr,

    /// Path of the advertised WebSocket endpoint.
    ///
    /// Default: `/websocket`
    pub endpoint_path: String,

    /// Reject upgrades whose request path differs from `endpoint_path`.
    ///
    /// When `false`, any path is upgraded and a mismatch is only logged.
    /// Default: false
    pub enforce_path: bool,

    /// Resource limits.
    pub limits: Limits,

    /// Text echo wording.
    pub greeting: Greeting,

    /// Accept unmasked frames from clients.
    ///
    /// RFC 6455 requires clients to mask all frames. Setting this to `true`
    /// is non-compliant but may be useful for testing.
    ///
    /// Default: false
    pub accept_unmasked_frames: bool,

    /// Read buffer size (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub read_buffer_size: usize,

    /// Write buffer size (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub write_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            endpoint_path: "/websocket".to_string(),
            enforce_path: false,
            limits: Limits::default(),
            greeting: Greeting::default(),
            accept_unmasked_frames: false,
            read_buffer_size: 8192,
            write_buffer_size: 8192,
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listen address.
    #[must_use]
    pub const fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the advertised endpoint path.
    #[must_use]
    pub fn with_endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.endpoint_path = path.into();
        self
    }

    /// Reject upgrades to paths other than the endpoint path.
    #[must_use]
    pub const fn with_enforce_path(mut self, enforce: bool) -> Self {
        self.enforce_path = enforce;
        self
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the text echo wording.
    #[must_use]
    pub fn with_greeting(mut self, greeting: Greeting) -> Self {
        self.greeting = greeting;
        self
    }

    /// Accept unmasked client frames.
    #[must_use]
    pub const fn with_accept_unmasked_frames(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Set read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set write buffer size.
    #[must_use]
    pub const fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// The advertised endpoint URI, e.g. `ws://127.0.0.1:8080/websocket`.
    #[must_use]
    pub fn endpoint_uri(&self) -> String {
        format!("ws://{}{}", self.bind_addr, self.endpoint_path)
    }
}

/// Configuration for the delimiter-based echo server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimiterConfig {
    /// Address the server listens on.
    ///
    /// Default: `127.0.0.1:8080`
    pub bind_addr: SocketAddr,

    /// Byte sequence terminating every unit.
    ///
    /// Default: `$_`
    pub delimiter: Vec<u8>,

    /// Longest unit accepted before a delimiter must appear.
    ///
    /// Default: 1024
    pub max_frame_length: usize,
}

impl Default for DelimiterConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            delimiter: b"$_".to_vec(),
            max_frame_length: 1024,
        }
    }
}

impl DelimiterConfig {
    /// Set the listen address.
    #[must_use]
    pub const fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the delimiter. An empty delimiter is replaced by the default.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: impl Into<Vec<u8>>) -> Self {
        let delimiter = delimiter.into();
        if !delimiter.is_empty() {
            self.delimiter = delimiter;
        }
        self
    }

    /// Set the maximum unit length.
    #[must_use]
    pub const fn with_max_frame_length(mut self, len: usize) -> Self {
        self.max_frame_length = len;
        self
    }
}
