//! Integration tests for vsock-latency acceptance testing.
//!
//! Each test starts a responder thread, connects an initiator to it, and
//! checks the sample sets both sides produce.

mod common;
mod exchange_test;
mod failure_test;
mod vsock_test;
