//! Roles, protocol variants, and per-iteration exchange states.
//!
//! Initiator iterations walk BEGIN → SEND → RECV → END.
//! Responder iterations walk RECV → ACK → END (round-trip responders
//! also take a BEGIN reading before RECV). A counter read cannot fail, so
//! BEGIN never appears as a failure state.

use crate::error::{LatencyError, LatencyResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which side of the exchange this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Starts each exchange and times the full round trip.
    Initiator,
    /// Answers each exchange and times the one-way leg.
    Responder,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiator => write!(f, "initiator"),
            Self::Responder => write!(f, "responder"),
        }
    }
}

/// Wire protocol variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolVariant {
    /// Opaque request payload; both sides time locally.
    #[default]
    RoundTrip,
    /// Request carries the initiator's begin timestamp; the responder
    /// converts it into its own clock domain with the operator offset.
    OneWay,
}

impl ProtocolVariant {
    /// Whether the request payload carries a timestamp.
    #[must_use]
    pub fn carries_timestamp(self) -> bool {
        matches!(self, Self::OneWay)
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundTrip => write!(f, "round-trip"),
            Self::OneWay => write!(f, "one-way"),
        }
    }
}

impl FromStr for ProtocolVariant {
    type Err = LatencyError;

    fn from_str(s: &str) -> LatencyResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "round-trip" | "roundtrip" => Ok(Self::RoundTrip),
            "one-way" | "oneway" => Ok(Self::OneWay),
            other => Err(LatencyError::Argument(format!(
                "unknown protocol variant {other:?} (expected round-trip or one-way)"
            ))),
        }
    }
}

/// Step within a single protocol iteration at which a run can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeState {
    /// Request written.
    Send,
    /// Request or acknowledgment read.
    Recv,
    /// Acknowledgment written.
    Ack,
    /// End timestamp taken and sample recorded.
    End,
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => write!(f, "SEND"),
            Self::Recv => write!(f, "RECV"),
            Self::Ack => write!(f, "ACK"),
            Self::End => write!(f, "END"),
        }
    }
}
