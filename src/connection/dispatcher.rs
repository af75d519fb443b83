//! Frame dispatch for established connections.
//!
//! Opcodes are handled in priority order:
//!
//! | Inbound | Reply                                       | Next phase  |
//! |---------|---------------------------------------------|-------------|
//! | Close   | Close, same payload                         | Closing     |
//! | Ping    | Pong, same payload                          | unchanged   |
//! | Text    | Text, `input + separator + phrase + time`   | unchanged   |
//! | other   | none, `Error::UnsupportedFrameType`         | (teardown)  |
//!
//! Dispatch performs no I/O. The only outside input is the clock reading used
//! for the text echo.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::Greeting;
use crate::connection::state::{ConnectionState, Phase};
use crate::error::{Error, Result};
use crate::protocol::{Frame, OpCode};

/// Source of the timestamp appended to echoed text.
pub trait Clock {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always reads the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Frames to emit and the phase to move to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    /// Frames for the codec to encode, in order.
    pub emit: Vec<Frame>,
    /// Phase after this frame.
    pub next_phase: Phase,
}

impl DispatchResult {
    fn stay(state: &ConnectionState, frame: Frame) -> Self {
        Self {
            emit: vec![frame],
            next_phase: state.phase(),
        }
    }
}

/// Timestamp layout of the text echo, e.g. `Mon Jun 29 13:23:00 UTC 2018`.
const TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %Z %Y";

/// Classifies inbound frames and produces replies.
#[derive(Debug, Clone)]
pub struct FrameDispatcher<C = SystemClock> {
    greeting: Greeting,
    clock: C,
}

impl FrameDispatcher<SystemClock> {
    /// Dispatcher using the system clock.
    #[must_use]
    pub fn new(greeting: Greeting) -> Self {
        Self::with_clock(greeting, SystemClock)
    }
}

impl<C: Clock> FrameDispatcher<C> {
    /// Dispatcher reading time from `clock`.
    #[must_use]
    pub fn with_clock(greeting: Greeting, clock: C) -> Self {
        Self { greeting, clock }
    }

    /// Handle one frame received on an established connection.
    ///
    /// # Errors
    ///
    /// - `Error::UnsupportedFrameType` for any opcode other than Close, Ping or Text
    /// - `Error::InvalidUtf8` if a Text payload is not UTF-8
    /// - `Error::ProtocolViolation` if the connection holds no handshake token
    pub fn dispatch(&self, frame: &Frame, state: &ConnectionState) -> Result<DispatchResult> {
        match frame.opcode {
            OpCode::Close => {
                let token = state.token().ok_or_else(|| {
                    Error::ProtocolViolation("close frame without a completed handshake".into())
                })?;
                Ok(DispatchResult {
                    emit: vec![token.close_reply(frame)],
                    next_phase: Phase::Closing,
                })
            }
            OpCode::Ping => Ok(DispatchResult::stay(
                state,
                Frame::pong(frame.payload().clone()),
            )),
            OpCode::Text if frame.fin => {
                let text = frame.as_text()?;
                debug!(connection = %state.id(), received = text, "text frame");
                Ok(DispatchResult::stay(state, Frame::text(self.reply_to(text))))
            }
            OpCode::Text | OpCode::Binary | OpCode::Continuation | OpCode::Pong => {
                Err(Error::UnsupportedFrameType(frame.opcode))
            }
        }
    }

    /// Reply text for an inbound text message. Always starts with `text`.
    #[must_use]
    pub fn reply_to(&self, text: &str) -> String {
        format!(
            "{text}{}{}{}",
            self.greeting.separator,
            self.greeting.phrase,
            self.clock.now().format(TIMESTAMP_FORMAT)
        )
    }
}
