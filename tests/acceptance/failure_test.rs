//! A misbehaving peer aborts the run at the failing iteration.
//!
//! The engine has no retry or reconnect path: the first empty, short, or
//! failed transfer ends the run and no samples are returned.

use super::common::{endpoint, params, spawn_raw_peer, spawn_responder};
use latency_common::config::TransportKind;
use latency_common::error::LatencyError;
use latency_common::state::{ExchangeState, ProtocolVariant};
use latency_common::time::ClockOffset;
use latency_engine::clock::Tsc;
use latency_engine::protocol::run_initiator;
use latency_transport::connect;
use std::io::{Read, Write};

fn expect_protocol_error(err: &LatencyError, iteration: usize, state: ExchangeState) {
    match err {
        LatencyError::Protocol {
            iteration: i,
            state: s,
            reason,
        } => {
            println!("aborted as expected: {err}");
            assert_eq!(*i, iteration, "wrong iteration ({reason})");
            assert_eq!(*s, state, "wrong state ({reason})");
        }
        other => panic!("expected protocol error, got {other}"),
    }
}

#[test]
fn test_initiator_aborts_when_peer_closes() {
    let ep = endpoint(TransportKind::Tcp);
    // Answer three requests, then hang up.
    let peer = spawn_raw_peer(ep.acceptor, |chan| {
        let mut request = [0u8; 32];
        for _ in 0..3 {
            chan.read_exact(&mut request).unwrap();
            chan.write_all(b"s").unwrap();
        }
    });

    let mut channel = connect(&ep.peer, &ep.transport).unwrap();
    let err = run_initiator(
        channel.as_mut(),
        &mut Tsc,
        &params(10, 32, ProtocolVariant::RoundTrip),
    )
    .unwrap_err();
    peer.join().unwrap();

    expect_protocol_error(&err, 3, ExchangeState::Recv);
}

#[test]
fn test_responder_aborts_on_short_request() {
    let ep = endpoint(TransportKind::Unix);
    let responder = spawn_responder(
        ep.acceptor,
        params(10, 32, ProtocolVariant::OneWay),
        ClockOffset::ZERO,
    );

    let mut channel = connect(&ep.peer, &ep.transport).unwrap();
    // Half a request, then keep the channel open until the responder gives up.
    channel.write_all(&[b'c'; 16]).unwrap();
    let err = responder.join().unwrap().unwrap_err();
    drop(channel);

    expect_protocol_error(&err, 0, ExchangeState::Recv);
    assert!(err.to_string().contains("short read: 16 of 32 bytes"));
}

#[test]
fn test_responder_aborts_when_initiator_disconnects() {
    let ep = endpoint(TransportKind::Tcp);
    let responder = spawn_responder(
        ep.acceptor,
        params(10, 32, ProtocolVariant::RoundTrip),
        ClockOffset::ZERO,
    );

    let mut channel = connect(&ep.peer, &ep.transport).unwrap();
    // Complete two exchanges by hand, then disconnect.
    let mut ack = [0u8; 1];
    for _ in 0..2 {
        channel.write_all(&[b'c'; 32]).unwrap();
        channel.read_exact(&mut ack).unwrap();
        assert_eq!(&ack, b"s");
    }
    drop(channel);

    let err = responder.join().unwrap().unwrap_err();
    expect_protocol_error(&err, 2, ExchangeState::Recv);
    assert!(err.is_protocol());
}

#[test]
fn test_connect_without_responder() {
    let ep = endpoint(TransportKind::Unix);
    let (peer, transport) = (ep.peer.clone(), ep.transport.clone());
    // Dropping the acceptor unlinks the socket path.
    drop(ep);

    let err = connect(&peer, &transport).err().expect("connect must fail");
    assert!(matches!(err, LatencyError::Channel(_)));
}
