//! Per-connection protocol phase and state.

use crate::protocol::HandshakeToken;

/// Identifier assigned to a connection when the transport accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position of a connection in the upgrade/established/closing lifecycle.
///
/// Phases are ordered; a connection only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Phase {
    /// Speaking HTTP, waiting for an upgrade request.
    #[default]
    AwaitingUpgrade,
    /// Upgraded; frames are dispatched.
    Established,
    /// Outbound units are being flushed before the transport shuts down.
    Closing,
    /// Terminal.
    Closed,
}

impl Phase {
    /// Returns `true` for every phase but `Closed`.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, Phase::Closed)
    }

    /// Returns `true` once the connection is winding down.
    #[must_use]
    #[inline]
    pub const fn is_closing(&self) -> bool {
        matches!(self, Phase::Closing | Phase::Closed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::AwaitingUpgrade => write!(f, "AwaitingUpgrade"),
            Phase::Established => write!(f, "Established"),
            Phase::Closing => write!(f, "Closing"),
            Phase::Closed => write!(f, "Closed"),
        }
    }
}

/// State owned by exactly one connection.
///
/// Created when the transport reports a new connection and dropped when it
/// reports closure. Never shared across connections.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionState {
    id: ConnectionId,
    phase: Phase,
    token: Option<HandshakeToken>,
    frames_dispatched: u64,
}

impl ConnectionState {
    /// Fresh state in `AwaitingUpgrade`.
    #[must_use]
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Handshake context, present only while `Established` or `Closing`.
    #[must_use]
    pub fn token(&self) -> Option<&HandshakeToken> {
        self.token.as_ref()
    }

    /// Number of frames handed to the dispatcher on this connection.
    #[must_use]
    pub const fn frames_dispatched(&self) -> u64 {
        self.frames_dispatched
    }

    /// Move to `next` if it lies ahead of the current phase.
    ///
    /// Returns the phase in effect afterwards. Backward moves are ignored.
    pub fn advance(&mut self, next: Phase) -> Phase {
        if next > self.phase {
            self.phase = next;
            if next == Phase::Closed {
                self.token = None;
            }
        }
        self.phase
    }

    /// Complete the upgrade: store the token and enter `Established`.
    pub(crate) fn establish(&mut self, token: HandshakeToken) {
        if self.phase == Phase::AwaitingUpgrade {
            self.token = Some(token);
            self.phase = Phase::Established;
        }
    }

    pub(crate) fn record_dispatch(&mut self) {
        self.frames_dispatched += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::protocol::{HandshakeOutcome, HttpRequest, Negotiator};

    fn token() -> HandshakeToken {
        let request = HttpRequest::new("GET", "/websocket")
            .with_header("Upgrade", "websocket")
            .with_header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")
            .with_header("Sec-WebSocket-Version", "13");
        match Negotiator::new(&Config::default()).negotiate(&request) {
            HandshakeOutcome::Accepted { token, .. } => token,
            HandshakeOutcome::Rejected { reason, .. } => panic!("rejected: {reason}"),
        }
    }

    #[test]
    fn test_initial_state() {
        let state = ConnectionState::new(ConnectionId(7));
        assert_eq!(state.phase(), Phase::AwaitingUpgrade);
        assert_eq!(state.id(), ConnectionId(7));
        assert!(state.token().is_none());
    }

    #[test]
    fn test_phase_ordering() {
        assert!(Phase::AwaitingUpgrade < Phase::Established);
        assert!(Phase::Established < Phase::Closing);
        assert!(Phase::Closing < Phase::Closed);
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut state = ConnectionState::new(ConnectionId(1));
        assert_eq!(state.advance(Phase::Closing), Phase::Closing);
        assert_eq!(state.advance(Phase::Established), Phase::Closing);
        assert_eq!(state.advance(Phase::AwaitingUpgrade), Phase::Closing);
        assert_eq!(state.advance(Phase::Closed), Phase::Closed);
    }

    #[test]
    fn test_token_lifecycle() {
        let mut state = ConnectionState::new(ConnectionId(1));
        state.establish(token());
        assert_eq!(state.phase(), Phase::Established);
        assert!(state.token().is_some());

        state.advance(Phase::Closing);
        assert!(state.token().is_some());

        state.advance(Phase::Closed);
        assert!(state.token().is_none());
    }

    #[test]
    fn test_establish_only_from_awaiting_upgrade() {
        let mut state = ConnectionState::new(ConnectionId(1));
        state.advance(Phase::Closing);
        state.establish(token());
        assert_eq!(state.phase(), Phase::Closing);
        assert!(state.token().is_none());
    }

    #[test]
    fn test_phase_predicates() {
        assert!(Phase::AwaitingUpgrade.is_active());
        assert!(Phase::Closing.is_active());
        assert!(!Phase::Closed.is_active());
        assert!(!Phase::Established.is_closing());
        assert!(Phase::Closing.is_closing());
        assert!(Phase::Closed.is_closing());
    }

    #[test]
    fn test_display() {
        assert_eq!(Phase::AwaitingUpgrade.to_string(), "AwaitingUpgrade");
        assert_eq!(Phase::Closed.to_string(), "Closed");
        assert_eq!(ConnectionId(42).to_string(), "#42");
    }
}
