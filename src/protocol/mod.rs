//! Protocol building blocks: frames, opcodes, masking, HTTP and the upgrade handshake.

pub mod frame;
pub mod handshake;
pub mod http;
pub mod mask;
pub mod opcode;

pub use frame::{Frame, FrameHeader};
pub use handshake::{HandshakeOutcome, HandshakeToken, Negotiator, WS_GUID, compute_accept_key};
pub use http::{HeaderMap, HttpRequest, HttpResponse, StatusCode};
pub use mask::apply_mask;
pub use opcode::OpCode;
