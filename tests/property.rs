//! Property-based tests for negotiation and dispatch.
//!
//! These tests use proptest to check the dispatch table and the handshake
//! rules over arbitrary payloads and headers.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use wsgate::connection::{FixedClock, Outbound, StateMachine};
use wsgate::protocol::{HttpRequest, Negotiator};
use wsgate::{Config, ConnectionId, Error, Frame, OpCode, Phase, StatusCode, compute_accept_key};

fn upgrade_request() -> HttpRequest {
    upgrade_request_with("websocket")
}

fn upgrade_request_with(upgrade: &str) -> HttpRequest {
    HttpRequest::new("GET", "/websocket")
        .with_header("Host", "localhost:8080")
        .with_header("Upgrade", upgrade)
        .with_header("Connection", "Upgrade")
        .with_header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")
        .with_header("Sec-WebSocket-Version", "13")
}

fn established() -> StateMachine<FixedClock> {
    let clock = FixedClock(Utc.with_ymd_and_hms(2018, 6, 29, 13, 23, 0).unwrap());
    let mut machine = StateMachine::with_clock(ConnectionId(1), &Config::default(), clock);
    let step = machine.handle(upgrade_request());
    assert_eq!(step.phase, Phase::Established);
    machine
}

fn unsupported_opcode_strategy() -> impl Strategy<Value = OpCode> {
    prop_oneof![
        Just(OpCode::Binary),
        Just(OpCode::Continuation),
        Just(OpCode::Pong),
    ]
}

proptest! {
    // =========================================================================
    // Ping: exactly one Pong with the identical payload, phase unchanged
    // =========================================================================
    #[test]
    fn test_pong_echoes_payload(payload in prop::collection::vec(any::<u8>(), 0..=125)) {
        let mut machine = established();
        let step = machine.handle(Frame::ping(payload.clone()));
        prop_assert_eq!(step.outbound, vec![Outbound::Frame(Frame::pong(payload))]);
        prop_assert_eq!(step.phase, Phase::Established);
    }

    // =========================================================================
    // Ping handling is idempotent
    // =========================================================================
    #[test]
    fn test_ping_is_idempotent(payload in prop::collection::vec(any::<u8>(), 0..=125)) {
        let mut machine = established();
        let first = machine.handle(Frame::ping(payload.clone()));
        let second = machine.handle(Frame::ping(payload));
        prop_assert_eq!(first, second);
    }

    // =========================================================================
    // Text: reply always begins with the original text
    // =========================================================================
    #[test]
    fn test_text_reply_prefix(text in "\\PC{0,200}") {
        let mut machine = established();
        let step = machine.handle(Frame::text(text.clone()));
        prop_assert_eq!(step.outbound.len(), 1);
        let Outbound::Frame(reply) = &step.outbound[0] else {
            panic!("expected a frame");
        };
        prop_assert_eq!(reply.opcode, OpCode::Text);
        let reply = reply.as_text().unwrap();
        prop_assert!(reply.starts_with(&text));
        prop_assert!(reply.len() > text.len());
    }

    // =========================================================================
    // Text: same input and same clock give the same reply
    // =========================================================================
    #[test]
    fn test_text_reply_deterministic(text in "\\PC{0,64}") {
        let a = established().handle(Frame::text(text.clone()));
        let b = established().handle(Frame::text(text));
        prop_assert_eq!(a, b);
    }

    // =========================================================================
    // Anything else is fatal and silent
    // =========================================================================
    #[test]
    fn test_unsupported_frames_tear_down(
        opcode in unsupported_opcode_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..=64)
    ) {
        let mut machine = established();
        let step = machine.handle(Frame::new(opcode, payload));
        prop_assert!(step.outbound.is_empty());
        prop_assert_eq!(step.phase, Phase::Closing);
        prop_assert_eq!(step.error, Some(Error::UnsupportedFrameType(opcode)));
    }

    // =========================================================================
    // Handshake: missing Upgrade header is always a 400
    // =========================================================================
    #[test]
    fn test_missing_upgrade_rejected(
        path in "/[a-z0-9/]{0,20}",
        extra in prop::collection::vec(("X-[A-Za-z]{1,10}", "[a-z0-9]{0,10}"), 0..5)
    ) {
        let mut request = HttpRequest::new("GET", path)
            .with_header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")
            .with_header("Sec-WebSocket-Version", "13");
        for (name, value) in extra {
            request = request.with_header(name, value);
        }
        let outcome = Negotiator::new(&Config::default()).negotiate(&request);
        prop_assert!(!outcome.is_accepted());
        prop_assert_eq!(outcome.response().status, StatusCode::BAD_REQUEST);
    }

    // =========================================================================
    // Handshake: Upgrade value is matched exactly
    // =========================================================================
    #[test]
    fn test_upgrade_value_must_match(value in "[A-Za-z]{1,12}") {
        prop_assume!(value != "websocket");
        let request = upgrade_request_with(&value);
        let outcome = Negotiator::new(&Config::default()).negotiate(&request);
        prop_assert_eq!(outcome.response().status, StatusCode::BAD_REQUEST);
    }

    // =========================================================================
    // Accept key is always 28 base64 characters
    // =========================================================================
    #[test]
    fn test_accept_key_shape(key in "[A-Za-z0-9+/]{22}==") {
        let accept = compute_accept_key(&key);
        prop_assert_eq!(accept.len(), 28);
        prop_assert!(accept.ends_with('='));
    }
}
