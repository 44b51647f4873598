//! End-to-end exchanges between a real initiator and responder.
//!
//! Both roles run in this process on the cycle counter, so one-way samples
//! need no clock offset: both sides read the same counter.

use super::common::{assert_consistent, endpoint, params, print_summary, run_pair};
use latency_common::config::TransportKind;
use latency_common::state::{ProtocolVariant, Role};
use latency_common::time::ClockOffset;

fn exchange(kind: TransportKind, variant: ProtocolVariant, iterations: usize, request_size: usize) {
    let p = params(iterations, request_size, variant);
    let (initiator, responder) = run_pair(endpoint(kind), &p, ClockOffset::ZERO);

    assert_eq!(initiator.role(), Role::Initiator);
    assert_eq!(responder.role(), Role::Responder);
    assert_consistent(&initiator, iterations);
    assert_consistent(&responder, iterations);

    print_summary(&format!("{kind} {variant} initiator"), &initiator);
    print_summary(&format!("{kind} {variant} responder"), &responder);
}

#[test]
fn test_tcp_round_trip() {
    exchange(TransportKind::Tcp, ProtocolVariant::RoundTrip, 200, 32);
}

#[test]
fn test_tcp_one_way() {
    exchange(TransportKind::Tcp, ProtocolVariant::OneWay, 200, 32);
}

#[test]
fn test_unix_round_trip() {
    exchange(TransportKind::Unix, ProtocolVariant::RoundTrip, 200, 32);
}

#[test]
fn test_unix_one_way() {
    exchange(TransportKind::Unix, ProtocolVariant::OneWay, 200, 32);
}

#[test]
fn test_minimum_sizes() {
    // Two iterations leave one retained sample; one byte is the smallest
    // round-trip request and eight the smallest one-way request.
    exchange(TransportKind::Unix, ProtocolVariant::RoundTrip, 2, 1);
    exchange(TransportKind::Unix, ProtocolVariant::OneWay, 2, 8);
}

#[test]
fn test_large_request() {
    exchange(TransportKind::Unix, ProtocolVariant::OneWay, 50, 4096);
}

#[test]
fn test_offset_shifts_one_way_samples() {
    const OFFSET: i64 = 1_000_000_000;
    let p = params(50, 16, ProtocolVariant::OneWay);
    let (_, responder) = run_pair(endpoint(TransportKind::Tcp), &p, ClockOffset(OFFSET));

    // Raw legs are tiny next to the offset. Cross-core counter skew may
    // make one slightly negative, so only require most of the offset.
    let floor = (OFFSET / 2).unsigned_abs();
    let ceiling = (OFFSET * 2).unsigned_abs();
    assert!(responder.as_slice().iter().all(|&s| s > floor && s < ceiling));
}
