//! Cycle-counter timestamps and cross-domain offset compensation.
//!
//! A [`CycleTimestamp`] is only comparable with another reading from the
//! same clock domain. Readings taken on the initiator are brought into the
//! responder's domain with [`ClockOffset::compensate`].

use crate::error::{LatencyError, LatencyResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw hardware cycle-counter reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CycleTimestamp(pub u64);

impl CycleTimestamp {
    /// Encoded width on the wire in bytes.
    pub const WIRE_SIZE: usize = 8;

    /// Raw cycle count.
    #[inline]
    #[must_use]
    pub fn cycles(self) -> u64 {
        self.0
    }

    /// Cycles elapsed from `earlier` to `self` in the same clock domain.
    ///
    /// Modular so a counter wrap yields the true distance.
    #[inline]
    #[must_use]
    pub fn cycles_since(self, earlier: CycleTimestamp) -> u64 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Encode into the leading bytes of a request payload.
    #[inline]
    #[must_use]
    pub fn to_wire(self) -> [u8; Self::WIRE_SIZE] {
        self.0.to_le_bytes()
    }

    /// Decode from the leading bytes of a request payload.
    ///
    /// Returns `None` if `bytes` is shorter than [`Self::WIRE_SIZE`].
    #[must_use]
    pub fn from_wire(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; Self::WIRE_SIZE] = bytes.get(..Self::WIRE_SIZE)?.try_into().ok()?;
        Some(Self(u64::from_le_bytes(raw)))
    }
}

impl fmt::Display for CycleTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operator-supplied bias between clock domains (responder − initiator).
///
/// Trusted as given; nothing in the system checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClockOffset(pub i64);

impl ClockOffset {
    /// No bias between the two clocks.
    pub const ZERO: Self = Self(0);

    /// One-way duration `t1 − t0 + offset`, where `t0` was read on the
    /// initiator and `t1` on the responder.
    #[inline]
    #[must_use]
    pub fn compensate(self, t0: CycleTimestamp, t1: CycleTimestamp) -> u64 {
        t1.cycles_since(t0).wrapping_add_signed(self.0)
    }
}

impl FromStr for ClockOffset {
    type Err = LatencyError;

    fn from_str(s: &str) -> LatencyResult<Self> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|e| LatencyError::Argument(format!("invalid clock offset {s:?}: {e}")))
    }
}

impl fmt::Display for ClockOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
