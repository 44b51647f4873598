//! vsock exchanges.
//!
//! # Requirements
//!
//! - Linux with the vsock_loopback module (`modprobe vsock_loopback`), or a
//!   guest/host pair with the responder already running on the host
//!
//! These tests are ignored by default.

use super::common::{assert_consistent, params, print_summary, run_pair, Endpoint};
use latency_common::config::{TransportConfig, TransportKind};
use latency_common::state::ProtocolVariant;
use latency_common::time::ClockOffset;
use latency_transport::{listen, PeerAddress};

/// Loopback context id.
const CID_LOCAL: u32 = 1;

fn vsock_endpoint(port: u32) -> Endpoint {
    let transport = TransportConfig {
        kind: TransportKind::Vsock,
        vsock_port: port,
        ..TransportConfig::default()
    };
    let acceptor = listen(&transport).expect("bind vsock");
    Endpoint {
        acceptor,
        peer: PeerAddress::Vsock { cid: CID_LOCAL },
        transport,
        _dir: None,
    }
}

#[test]
#[ignore = "Requires the vsock_loopback kernel module"]
fn test_vsock_round_trip() {
    let p = params(1000, 32, ProtocolVariant::RoundTrip);
    let (initiator, responder) = run_pair(vsock_endpoint(52_401), &p, ClockOffset::ZERO);
    assert_consistent(&initiator, 1000);
    assert_consistent(&responder, 1000);
    print_summary("vsock round-trip initiator", &initiator);
}

#[test]
#[ignore = "Requires the vsock_loopback kernel module"]
fn test_vsock_one_way() {
    let p = params(1000, 32, ProtocolVariant::OneWay);
    let (_, responder) = run_pair(vsock_endpoint(52_402), &p, ClockOffset::ZERO);
    assert_consistent(&responder, 1000);
    print_summary("vsock one-way responder", &responder);
}
