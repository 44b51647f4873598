//! Sample protocol engine.
//!
//! Each role runs a fixed number of iterations over one channel:
//!
//! ```text
//! initiator:  BEGIN(t0) ─ SEND(request) ─ RECV(ack) ─ END(t1)   sample = t1 − t0
//! responder:  RECV(request[, t0]) ─ ACK ─ END(t1)               sample = t1 − t0 + offset
//! ```
//!
//! Every transfer is a single `read`/`write` call. A failed, empty, or short
//! transfer ends the run with [`LatencyError::Protocol`] and the samples
//! collected so far are dropped.

use crate::channel::Channel;
use crate::clock::ClockSource;
use latency_common::config::{BenchConfig, ACK_SIZE, MAX_REQUEST_SIZE};
use latency_common::error::{LatencyError, LatencyResult};
use latency_common::state::{ExchangeState, ProtocolVariant, Role};
use latency_common::stats::{reduce_with_percentiles, SampleSummary};
use latency_common::time::{ClockOffset, CycleTimestamp};
use static_assertions::const_assert;
use std::io::{Read, Write};
use tracing::{debug, info, trace, warn};

const_assert!(ACK_SIZE >= 1);
const_assert!(MAX_REQUEST_SIZE >= CycleTimestamp::WIRE_SIZE);

/// Filler byte for request payload bytes that carry no timestamp.
pub const REQUEST_FILL: u8 = b'c';

/// Acknowledgment payload.
pub const ACK_PAYLOAD: [u8; ACK_SIZE] = [b's'];

/// Fixed parameters of a run. Both sides must use the same values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunParameters {
    /// Number of exchanges.
    pub iterations: usize,
    /// Request payload size in bytes.
    pub request_size: usize,
    /// Wire protocol variant.
    pub variant: ProtocolVariant,
}

impl RunParameters {
    /// Take the run parameters from a validated configuration.
    #[must_use]
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            iterations: config.iterations,
            request_size: config.request_size,
            variant: config.variant,
        }
    }

    fn check(&self) -> LatencyResult<()> {
        if self.iterations == 0 {
            return Err(LatencyError::Config("iterations must be non-zero".into()));
        }
        let min = if self.variant.carries_timestamp() {
            CycleTimestamp::WIRE_SIZE
        } else {
            1
        };
        if self.request_size < min || self.request_size > MAX_REQUEST_SIZE {
            return Err(LatencyError::Config(format!(
                "request size {} outside {min}..={MAX_REQUEST_SIZE} for {} variant",
                self.request_size, self.variant
            )));
        }
        Ok(())
    }

    fn request_template(&self) -> Vec<u8> {
        vec![REQUEST_FILL; self.request_size]
    }
}

/// Completed samples of one run, in iteration order.
///
/// Only the engine creates these, and only after every iteration succeeded,
/// so `len()` always equals the run's iteration count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSet {
    role: Role,
    samples: Box<[u64]>,
}

impl SampleSet {
    /// Role that produced the samples.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// The samples in iteration order.
    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.samples
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false for a set produced by a run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Summary statistics, excluding the initial sample.
    #[must_use]
    pub fn summarize(&self, percentiles: &[f64]) -> Option<SampleSummary> {
        reduce_with_percentiles(&self.samples, percentiles)
    }
}

fn protocol_error(iteration: usize, state: ExchangeState, reason: String) -> LatencyError {
    LatencyError::Protocol {
        iteration,
        state,
        reason,
    }
}

/// One `write` call that must transfer the whole buffer.
#[inline]
fn send_once<C: Write + ?Sized>(
    channel: &mut C,
    buf: &[u8],
    iteration: usize,
    state: ExchangeState,
) -> LatencyResult<()> {
    match channel.write(buf) {
        Ok(n) if n == buf.len() => Ok(()),
        Ok(n) => Err(protocol_error(
            iteration,
            state,
            format!("short write: {n} of {} bytes", buf.len()),
        )),
        Err(e) => Err(protocol_error(iteration, state, format!("write failed: {e}"))),
    }
}

/// One `read` call. Returns the byte count, which is always non-zero.
#[inline]
fn recv_once<C: Read + ?Sized>(
    channel: &mut C,
    buf: &mut [u8],
    iteration: usize,
) -> LatencyResult<usize> {
    match channel.read(buf) {
        Ok(0) => Err(protocol_error(
            iteration,
            ExchangeState::Recv,
            "peer closed the channel".into(),
        )),
        Ok(n) => Ok(n),
        Err(e) => Err(protocol_error(
            iteration,
            ExchangeState::Recv,
            format!("read failed: {e}"),
        )),
    }
}

/// Run the initiator side: time `iterations` full request/ack exchanges.
///
/// Each sample is `t1 − t0` on the local clock and includes the peer's
/// processing time and both transport legs.
///
/// # Errors
///
/// Returns [`LatencyError::Protocol`] on the first failed, empty, or short
/// transfer, or [`LatencyError::Config`] for unusable parameters.
pub fn run_initiator<C, K>(
    channel: &mut C,
    clock: &mut K,
    params: &RunParameters,
) -> LatencyResult<SampleSet>
where
    C: Channel + ?Sized,
    K: ClockSource + ?Sized,
{
    params.check()?;
    info!(
        peer = %channel.peer_description(),
        iterations = params.iterations,
        request_size = params.request_size,
        variant = %params.variant,
        "Initiator starting"
    );

    let mut samples = vec![0u64; params.iterations].into_boxed_slice();
    let mut request = params.request_template();
    let mut ack = [0u8; ACK_SIZE];

    for (i, slot) in samples.iter_mut().enumerate() {
        let t0 = clock.read_begin();
        if params.variant.carries_timestamp() {
            request[..CycleTimestamp::WIRE_SIZE].copy_from_slice(&t0.to_wire());
        }
        send_once(channel, &request, i, ExchangeState::Send)?;
        let received = recv_once(channel, &mut ack, i)?;
        let t1 = clock.read_end();

        *slot = t1.cycles_since(t0);
        trace!(iteration = i, received, cycles = *slot, "Initiator received ack");
    }

    debug!(iterations = params.iterations, "Initiator finished");
    Ok(SampleSet {
        role: Role::Initiator,
        samples,
    })
}

/// Run the responder side: answer `iterations` requests.
///
/// In the one-way variant each sample is the initiator-send to
/// responder-receive leg, `t1 − t0 + offset`, with `t0` taken from the
/// request. In the round-trip variant the request carries nothing, so each
/// sample is the local receive-and-acknowledge time and `offset` is unused.
///
/// # Errors
///
/// Returns [`LatencyError::Protocol`] on the first failed, empty, short, or
/// wrong-length transfer, or [`LatencyError::Config`] for unusable
/// parameters.
pub fn run_responder<C, K>(
    channel: &mut C,
    clock: &mut K,
    params: &RunParameters,
    offset: ClockOffset,
) -> LatencyResult<SampleSet>
where
    C: Channel + ?Sized,
    K: ClockSource + ?Sized,
{
    params.check()?;
    if params.variant == ProtocolVariant::RoundTrip && offset != ClockOffset::ZERO {
        warn!(%offset, "Clock offset has no effect in the round-trip variant");
    }
    info!(
        peer = %channel.peer_description(),
        iterations = params.iterations,
        request_size = params.request_size,
        variant = %params.variant,
        %offset,
        "Responder starting"
    );

    let mut samples = vec![0u64; params.iterations].into_boxed_slice();
    let mut request = vec![0u8; params.request_size];

    for (i, slot) in samples.iter_mut().enumerate() {
        let local_begin = match params.variant {
            ProtocolVariant::RoundTrip => Some(clock.read_begin()),
            ProtocolVariant::OneWay => None,
        };

        let received = recv_once(channel, &mut request, i)?;
        if received != params.request_size {
            return Err(protocol_error(
                i,
                ExchangeState::Recv,
                format!("short read: {received} of {} bytes", params.request_size),
            ));
        }

        send_once(channel, &ACK_PAYLOAD, i, ExchangeState::Ack)?;
        let t1 = clock.read_end();

        *slot = match local_begin {
            Some(t0) => t1.cycles_since(t0),
            None => {
                let t0 = CycleTimestamp::from_wire(&request).ok_or_else(|| {
                    protocol_error(i, ExchangeState::End, "request too short for timestamp".into())
                })?;
                offset.compensate(t0, t1)
            }
        };
        trace!(iteration = i, received, cycles = *slot, "Responder acknowledged");
    }

    debug!(iterations = params.iterations, "Responder finished");
    Ok(SampleSet {
        role: Role::Responder,
        samples,
    })
}
