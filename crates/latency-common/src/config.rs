//! Configuration structures for a measurement run.
//!
//! Supports TOML deserialization with defaults matching the well-known
//! ports and payload sizes both sides must agree on.

use crate::error::{LatencyError, LatencyResult};
use crate::state::ProtocolVariant;
use crate::time::{ClockOffset, CycleTimestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;

/// Well-known port for the vsock and TCP transports.
pub const DEFAULT_PORT: u16 = 12345;

/// Largest request payload a run may use.
pub const MAX_REQUEST_SIZE: usize = 4096;

/// Acknowledgment payload size. Fixed for every run.
pub const ACK_SIZE: usize = 1;

/// Top-level run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Number of exchanges per run.
    pub iterations: usize,

    /// Request payload size in bytes.
    pub request_size: usize,

    /// Wire protocol variant.
    pub variant: ProtocolVariant,

    /// Cycles the responder adds to each one-way sample.
    pub offset: ClockOffset,

    /// Transport addressing.
    pub transport: TransportConfig,

    /// CPU pinning and memory locking.
    pub pinning: PinningConfig,

    /// Report output.
    pub report: ReportConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            request_size: 32,
            variant: ProtocolVariant::RoundTrip,
            offset: ClockOffset::ZERO,
            transport: TransportConfig::default(),
            pinning: PinningConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

/// How the single channel of a run is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Hypervisor guest/host socket, addressed by context id and port.
    #[default]
    Vsock,
    /// Unix domain socket, addressed by filesystem path.
    Unix,
    /// TCP socket, addressed by IP literal and port.
    Tcp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vsock => write!(f, "vsock"),
            Self::Unix => write!(f, "unix"),
            Self::Tcp => write!(f, "tcp"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = LatencyError;

    fn from_str(s: &str) -> LatencyResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "vsock" => Ok(Self::Vsock),
            "unix" => Ok(Self::Unix),
            "tcp" => Ok(Self::Tcp),
            other => Err(LatencyError::Argument(format!(
                "unknown transport {other:?} (expected vsock, unix, or tcp)"
            ))),
        }
    }
}

/// Transport selection and addressing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Which transport to use.
    pub kind: TransportKind,

    /// vsock port the responder listens on.
    pub vsock_port: u32,

    /// TCP port the responder listens on and the initiator dials.
    pub tcp_port: u16,

    /// Address the TCP responder binds to.
    pub tcp_bind: IpAddr,

    /// Unix domain socket path.
    pub unix_path: PathBuf,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Vsock,
            vsock_port: u32::from(DEFAULT_PORT),
            tcp_port: DEFAULT_PORT,
            tcp_bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            unix_path: PathBuf::from("/tmp/vsock-latency.sock"),
        }
    }
}

/// CPU pinning and memory locking for the measuring process.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PinningConfig {
    /// CPU to pin the process to (None = leave to the OS / taskset).
    pub cpu_affinity: Option<usize>,

    /// Lock all memory pages (mlockall) before measuring.
    pub lock_memory: bool,
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// `index: value` lines followed by the summary.
    #[default]
    Text,
    /// A single JSON object.
    Json,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = LatencyError;

    fn from_str(s: &str) -> LatencyResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(LatencyError::Argument(format!(
                "unknown report format {other:?} (expected text or json)"
            ))),
        }
    }
}

/// Report configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReportConfig {
    /// Output format.
    pub format: ReportFormat,

    /// Extra percentiles to report (e.g., [90, 99, 99.9]).
    pub percentiles: Vec<f64>,
}

impl BenchConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check that the run parameters describe a measurable run.
    ///
    /// # Errors
    ///
    /// Returns [`LatencyError::Config`] if the iteration count leaves no
    /// samples after the initial one is excluded, or the request size does
    /// not fit the variant.
    pub fn validate(&self) -> LatencyResult<()> {
        if self.iterations < 2 {
            return Err(LatencyError::Config(format!(
                "iterations must be at least 2, got {}",
                self.iterations
            )));
        }

        let min_request = if self.variant.carries_timestamp() {
            CycleTimestamp::WIRE_SIZE
        } else {
            1
        };
        if !(min_request..=MAX_REQUEST_SIZE).contains(&self.request_size) {
            return Err(LatencyError::Config(format!(
                "request_size must be within {min_request}..={MAX_REQUEST_SIZE} bytes for the {} variant, got {}",
                self.variant, self.request_size
            )));
        }

        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}
