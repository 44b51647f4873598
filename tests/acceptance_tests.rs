//! Acceptance tests for vsock-latency.
//!
//! These tests run both roles of the benchmark against each other:
//! - Round-trip and one-way exchanges over TCP and Unix sockets
//! - Fatal handling of misbehaving peers
//! - vsock exchanges (ignored by default)
//!
//! vsock tests require:
//! - A Linux kernel with the vsock_loopback module loaded

mod acceptance;
