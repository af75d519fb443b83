//! The per-connection state machine.
//!
//! One [`StateMachine`] exists per physical connection. The transport feeds it
//! decoded units one at a time and writes back whatever [`Step::outbound`]
//! holds before feeding the next unit.

use tracing::trace;

use crate::config::Config;
use crate::connection::dispatcher::{Clock, FrameDispatcher, SystemClock};
use crate::connection::state::{ConnectionId, ConnectionState, Phase};
use crate::connection::teardown::teardown;
use crate::error::Error;
use crate::protocol::{Frame, HandshakeOutcome, HttpRequest, HttpResponse, Negotiator};

/// A unit decoded by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedUnit {
    /// An HTTP request; only meaningful before the upgrade.
    Http(HttpRequest),
    /// A WebSocket frame; only meaningful after the upgrade.
    Frame(Frame),
}

impl DecodedUnit {
    fn kind(&self) -> &'static str {
        match self {
            DecodedUnit::Http(_) => "HTTP request",
            DecodedUnit::Frame(_) => "WebSocket frame",
        }
    }
}

impl From<HttpRequest> for DecodedUnit {
    fn from(request: HttpRequest) -> Self {
        DecodedUnit::Http(request)
    }
}

impl From<Frame> for DecodedUnit {
    fn from(frame: Frame) -> Self {
        DecodedUnit::Frame(frame)
    }
}

/// A unit for the transport collaborator to encode and write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// HTTP response (handshake phase only).
    Response(HttpResponse),
    /// WebSocket frame.
    Frame(Frame),
}

/// What handling one unit produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Units to write, in order.
    pub outbound: Vec<Outbound>,
    /// Phase after handling the unit.
    pub phase: Phase,
    /// The fatal condition, if the connection is being torn down because of one.
    pub error: Option<Error>,
}

impl Step {
    fn emit(outbound: Vec<Outbound>, phase: Phase) -> Self {
        Self {
            outbound,
            phase,
            error: None,
        }
    }
}

/// Routes decoded units to the negotiator or the dispatcher depending on phase.
#[derive(Debug)]
pub struct StateMachine<C = SystemClock> {
    state: ConnectionState,
    negotiator: Negotiator,
    dispatcher: FrameDispatcher<C>,
}

impl StateMachine<SystemClock> {
    /// Fresh machine in `AwaitingUpgrade`.
    #[must_use]
    pub fn new(id: ConnectionId, config: &Config) -> Self {
        Self::with_clock(id, config, SystemClock)
    }
}

impl<C: Clock> StateMachine<C> {
    /// Fresh machine whose text echo reads time from `clock`.
    #[must_use]
    pub fn with_clock(id: ConnectionId, config: &Config, clock: C) -> Self {
        Self {
            state: ConnectionState::new(id),
            negotiator: Negotiator::new(config),
            dispatcher: FrameDispatcher::with_clock(config.greeting.clone(), clock),
        }
    }

    /// The connection's state.
    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Handle one decoded unit.
    pub fn handle(&mut self, unit: impl Into<DecodedUnit>) -> Step {
        let phase = self.state.phase();
        match (phase, unit.into()) {
            (Phase::AwaitingUpgrade, DecodedUnit::Http(request)) => self.upgrade(&request),
            (Phase::Established, DecodedUnit::Frame(frame)) => self.dispatch(&frame),
            (Phase::Closing | Phase::Closed, unit) => {
                trace!(connection = %self.state.id(), %phase, unit = unit.kind(), "discarding unit");
                Step::emit(Vec::new(), phase)
            }
            (_, unit) => {
                let cause = Error::ProtocolViolation(format!("{} received while {phase}", unit.kind()));
                teardown(&mut self.state, cause, None)
            }
        }
    }

    /// Tear the connection down because of a failure outside the core, such as
    /// a decode or transport error.
    pub fn fail(&mut self, cause: Error) -> Step {
        teardown(&mut self.state, cause, None)
    }

    /// The transport has flushed everything and shut down.
    pub fn on_shutdown(&mut self) -> Phase {
        self.state.advance(Phase::Closed)
    }

    fn upgrade(&mut self, request: &HttpRequest) -> Step {
        match self.negotiator.negotiate(request) {
            HandshakeOutcome::Accepted { token, response } => {
                self.state.establish(token);
                Step::emit(vec![Outbound::Response(response)], self.state.phase())
            }
            HandshakeOutcome::Rejected { response, reason } => {
                teardown(&mut self.state, reason, Some(response))
            }
        }
    }

    fn dispatch(&mut self, frame: &Frame) -> Step {
        self.state.record_dispatch();
        let result = frame
            .validate()
            .and_then(|()| self.dispatcher.dispatch(frame, &self.state));
        match result {
            Ok(result) => {
                let phase = self.state.advance(result.next_phase);
                let outbound = result.emit.into_iter().map(Outbound::Frame).collect();
                Step::emit(outbound, phase)
            }
            Err(cause) => teardown(&mut self.state, cause, None),
        }
    }
}
