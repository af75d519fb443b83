//! Per-connection protocol handling.
//!
//! ## Connection Lifecycle
//!
//! 1. **AwaitingUpgrade** - speaking HTTP; the first request is negotiated
//! 2. **Established** - upgraded; frames are dispatched
//! 3. **Closing** - outbound units are flushed, then the transport shuts down
//! 4. **Closed** - terminal
//!
//! Every connection owns its own [`StateMachine`]. Nothing in this module is
//! shared between connections, and nothing here performs I/O.
//!
//! ## Example
//!
//! ```
//! use wsgate::connection::{ConnectionId, Outbound, Phase, StateMachine};
//! use wsgate::protocol::{Frame, HttpRequest};
//! use wsgate::Config;
//!
//! let mut machine = StateMachine::new(ConnectionId(1), &Config::default());
//!
//! let request = HttpRequest::new("GET", "/websocket")
//!     .with_header("Upgrade", "websocket")
//!     .with_header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")
//!     .with_header("Sec-WebSocket-Version", "13");
//! let step = machine.handle(request);
//! assert_eq!(step.phase, Phase::Established);
//!
//! let step = machine.handle(Frame::ping(vec![1, 2]));
//! assert_eq!(step.outbound, vec![Outbound::Frame(Frame::pong(vec![1, 2]))]);
//! ```

mod dispatcher;
mod machine;
mod state;
mod teardown;

pub use dispatcher::{Clock, DispatchResult, FixedClock, FrameDispatcher, SystemClock};
pub use machine::{DecodedUnit, Outbound, StateMachine, Step};
pub use state::{ConnectionId, ConnectionState, Phase};
