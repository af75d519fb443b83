//! Async byte-level codec between a tokio transport and the state machine.
//!
//! Frame and HTTP encoding live in [`crate::protocol`]; this module adds the
//! buffering and phase-dependent decoding over an `AsyncRead + AsyncWrite`.

mod framed;

pub use framed::GatewayCodec;
