//! The single teardown path shared by negotiation, dispatch and transport failures.

use tracing::{info, warn};

use crate::connection::machine::{Outbound, Step};
use crate::connection::state::{ConnectionState, Phase};
use crate::error::Error;
use crate::protocol::HttpResponse;

/// Log `cause` and move the connection to `Closing`.
///
/// A diagnostic response is only emitted for handshake-phase errors; once a
/// fatal condition is raised on an established connection nothing else is
/// sent.
pub(crate) fn teardown(
    state: &mut ConnectionState,
    cause: Error,
    diagnostic: Option<HttpResponse>,
) -> Step {
    let phase = state.phase();
    if cause.is_handshake_error() {
        info!(connection = %state.id(), %phase, error = %cause, "upgrade refused");
    } else {
        warn!(connection = %state.id(), %phase, error = %cause, "tearing down connection");
    }

    let outbound = diagnostic
        .filter(|_| phase == Phase::AwaitingUpgrade && cause.is_handshake_error())
        .map(Outbound::Response)
        .into_iter()
        .collect();

    Step {
        outbound,
        phase: state.advance(Phase::Closing),
        error: Some(cause),
    }
}
