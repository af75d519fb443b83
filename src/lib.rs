//! # wsgate - HTTP to WebSocket upgrade gateway
//!
//! `wsgate` accepts plain HTTP connections, negotiates the RFC 6455 upgrade
//! and then serves a small frame protocol on the upgraded connection:
//!
//! - **Close** frames are echoed and the connection is shut down
//! - **Ping** frames are answered with a Pong carrying the same payload
//! - **Text** frames are answered with the text, a greeting and the current time
//! - anything else tears the connection down
//!
//! The protocol core ([`connection::StateMachine`]) performs no I/O; it consumes
//! decoded units and returns the units to send. The tokio runtime in
//! [`server`] and [`codec`] drives it over TCP.
//!
//! The crate also ships an unrelated delimiter-framed echo service in
//! [`delimiter`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wsgate::{Config, Server};
//!
//! # async fn example() -> wsgate::Result<()> {
//! let server = Server::bind(Config::default()).await?;
//! server.run().await
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod delimiter;
pub mod error;
pub mod protocol;

#[cfg(feature = "async-tokio")]
pub mod codec;
#[cfg(feature = "async-tokio")]
pub mod server;

pub use config::{Config, DelimiterConfig, Greeting, Limits};
pub use connection::{ConnectionId, ConnectionState, DecodedUnit, Outbound, Phase, StateMachine, Step};
pub use delimiter::{DelimiterDecoder, DelimiterEcho};
pub use error::{Error, Result};
pub use protocol::{
    compute_accept_key, Frame, HandshakeOutcome, HandshakeToken, HttpRequest, HttpResponse,
    OpCode, StatusCode, WS_GUID,
};

#[cfg(feature = "async-tokio")]
pub use codec::GatewayCodec;
#[cfg(feature = "async-tokio")]
pub use server::{serve_connection, Server};
