//! Common utilities for acceptance tests.
//!
//! Provides helpers for:
//! - Binding responders on ephemeral loopback endpoints
//! - Running a responder in a background thread
//! - Checking that a sample set is internally consistent

#![allow(dead_code)] // Not every test file uses every helper

use latency_common::config::{TransportConfig, TransportKind};
use latency_common::error::LatencyResult;
use latency_common::state::ProtocolVariant;
use latency_common::time::ClockOffset;
use latency_engine::channel::Channel;
use latency_engine::clock::Tsc;
use latency_engine::protocol::{run_initiator, run_responder, RunParameters, SampleSet};
use latency_transport::tcp::TcpAcceptor;
use latency_transport::unix::UnixAcceptor;
use latency_transport::{connect, Acceptor, PeerAddress};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::thread::JoinHandle;
use tempfile::TempDir;

/// A bound responder endpoint and how to reach it.
pub struct Endpoint {
    /// Listener to hand to the responder thread.
    pub acceptor: Box<dyn Acceptor>,
    /// Address the initiator connects to.
    pub peer: PeerAddress,
    /// Transport settings matching the listener.
    pub transport: TransportConfig,
    /// Keeps a Unix socket directory alive for the test's duration.
    pub _dir: Option<TempDir>,
}

/// Bind a TCP responder on an ephemeral loopback port.
pub fn tcp_endpoint() -> Endpoint {
    let acceptor = TcpAcceptor::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
        .expect("bind loopback TCP");
    let addr = acceptor.local_addr().expect("local addr");
    let transport = TransportConfig {
        kind: TransportKind::Tcp,
        tcp_port: addr.port(),
        tcp_bind: addr.ip(),
        ..TransportConfig::default()
    };
    Endpoint {
        acceptor: Box::new(acceptor),
        peer: PeerAddress::Tcp(addr.ip()),
        transport,
        _dir: None,
    }
}

/// Bind a Unix responder in a fresh temporary directory.
pub fn unix_endpoint() -> Endpoint {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("latency.sock");
    let acceptor = UnixAcceptor::bind(&path).expect("bind Unix socket");
    let transport = TransportConfig {
        kind: TransportKind::Unix,
        unix_path: path.clone(),
        ..TransportConfig::default()
    };
    Endpoint {
        acceptor: Box::new(acceptor),
        peer: PeerAddress::Unix(path),
        transport,
        _dir: Some(dir),
    }
}

/// Endpoint for the given transport kind (TCP or Unix).
pub fn endpoint(kind: TransportKind) -> Endpoint {
    match kind {
        TransportKind::Tcp => tcp_endpoint(),
        TransportKind::Unix => unix_endpoint(),
        TransportKind::Vsock => panic!("vsock endpoints are built in vsock_test"),
    }
}

/// Parameters for a run.
pub fn params(iterations: usize, request_size: usize, variant: ProtocolVariant) -> RunParameters {
    RunParameters {
        iterations,
        request_size,
        variant,
    }
}

/// Accept one peer and run the responder side in a background thread.
pub fn spawn_responder(
    acceptor: Box<dyn Acceptor>,
    params: RunParameters,
    offset: ClockOffset,
) -> JoinHandle<LatencyResult<SampleSet>> {
    std::thread::spawn(move || {
        let mut channel = acceptor.accept_one()?;
        run_responder(channel.as_mut(), &mut Tsc, &params, offset)
    })
}

/// Accept one peer and hand the raw channel to `script`.
pub fn spawn_raw_peer<F>(acceptor: Box<dyn Acceptor>, script: F) -> JoinHandle<()>
where
    F: FnOnce(&mut dyn Channel) + Send + 'static,
{
    std::thread::spawn(move || {
        let mut channel = acceptor.accept_one().expect("accept raw peer");
        script(channel.as_mut());
    })
}

/// Run both roles against each other and return (initiator, responder).
pub fn run_pair(
    endpoint: Endpoint,
    params: &RunParameters,
    offset: ClockOffset,
) -> (SampleSet, SampleSet) {
    let Endpoint {
        acceptor,
        peer,
        transport,
        _dir,
    } = endpoint;
    let responder = spawn_responder(acceptor, *params, offset);

    let mut channel = connect(&peer, &transport).expect("connect initiator");
    let initiator = run_initiator(channel.as_mut(), &mut Tsc, params).expect("initiator run");
    let responder = responder
        .join()
        .expect("responder thread panicked")
        .expect("responder run");
    (initiator, responder)
}

/// Print a short summary, in the style of a benchmark log line.
pub fn print_summary(label: &str, samples: &SampleSet) {
    if let Some(s) = samples.summarize(&[99.0]) {
        println!(
            "{label}: n={} initial={} min={} median={} max={} mean={:.1} stddev={:.1}",
            s.count, s.initial, s.min, s.median, s.max, s.mean, s.stddev
        );
    }
}

/// Check that a completed set has one sample per iteration and that its
/// summary agrees with the raw samples.
pub fn assert_consistent(samples: &SampleSet, iterations: usize) {
    assert_eq!(samples.len(), iterations);
    let summary = samples.summarize(&[]).expect("summary");
    let retained = &samples.as_slice()[1..];
    assert_eq!(summary.count, iterations);
    assert_eq!(summary.initial, samples.as_slice()[0]);
    assert_eq!(summary.min, *retained.iter().min().expect("retained"));
    assert_eq!(summary.max, *retained.iter().max().expect("retained"));
    assert!(summary.min <= summary.median && summary.median <= summary.max);
    assert!(summary.stddev >= 0.0);
}
