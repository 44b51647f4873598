//! Channel establishment for the latency benchmark.
//!
//! This crate provides:
//! - [`Acceptor`] trait: a bound listener that admits exactly one peer
//! - [`listen`] / [`connect`]: pick the transport from [`TransportKind`]
//! - [`vsock`], [`unix`], [`tcp`] modules with the concrete variants
//!
//! Once established, a channel is just a [`Channel`]; the measurement
//! engine never sees which transport it came from.

#[cfg(target_os = "linux")]
pub mod vsock;
pub mod tcp;
#[cfg(unix)]
pub mod unix;

use latency_common::config::{TransportConfig, TransportKind};
use latency_common::error::{LatencyError, LatencyResult};
use latency_engine::channel::Channel;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing::info;

/// A bound listener waiting for the run's single peer.
pub trait Acceptor: Send {
    /// Address the listener is bound to, for logs.
    fn local_endpoint(&self) -> String;

    /// Block until one peer connects, then stop listening.
    ///
    /// # Errors
    ///
    /// Returns [`LatencyError::Channel`] if the accept fails.
    fn accept_one(self: Box<Self>) -> LatencyResult<Box<dyn Channel>>;
}

/// Where the initiator connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddress {
    /// vsock context id of the responder.
    Vsock {
        /// Context id (2 = host).
        cid: u32,
    },
    /// Filesystem path of the responder's socket.
    Unix(PathBuf),
    /// IP literal of the responder.
    Tcp(IpAddr),
}

impl PeerAddress {
    /// Parse an operator-supplied address for the given transport.
    ///
    /// # Errors
    ///
    /// Returns [`LatencyError::Argument`] if `text` is not a decimal context
    /// id, a non-empty path, or an IP literal respectively.
    pub fn parse(kind: TransportKind, text: &str) -> LatencyResult<Self> {
        match kind {
            TransportKind::Vsock => text
                .parse::<u32>()
                .map(|cid| Self::Vsock { cid })
                .map_err(|e| LatencyError::Argument(format!("invalid cid {text:?}: {e}"))),
            TransportKind::Unix => {
                if text.is_empty() {
                    Err(LatencyError::Argument("empty socket path".into()))
                } else {
                    Ok(Self::Unix(PathBuf::from(text)))
                }
            }
            TransportKind::Tcp => text
                .parse::<IpAddr>()
                .map(Self::Tcp)
                .map_err(|e| LatencyError::Argument(format!("invalid IP address {text:?}: {e}"))),
        }
    }

    /// Transport this address belongs to.
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Vsock { .. } => TransportKind::Vsock,
            Self::Unix(_) => TransportKind::Unix,
            Self::Tcp(_) => TransportKind::Tcp,
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vsock { cid } => write!(f, "vsock:{cid}"),
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp(ip) => write!(f, "tcp:{ip}"),
        }
    }
}

/// Bind the responder's listener for `config.kind`.
///
/// # Errors
///
/// Returns [`LatencyError::Channel`] if the socket cannot be created or bound.
pub fn listen(config: &TransportConfig) -> LatencyResult<Box<dyn Acceptor>> {
    let acceptor: Box<dyn Acceptor> = match config.kind {
        TransportKind::Vsock => listen_vsock(config.vsock_port)?,
        TransportKind::Unix => listen_unix(config)?,
        TransportKind::Tcp => Box::new(tcp::TcpAcceptor::bind(SocketAddr::new(
            config.tcp_bind,
            config.tcp_port,
        ))?),
    };
    info!(transport = %config.kind, endpoint = %acceptor.local_endpoint(), "Listening");
    Ok(acceptor)
}

/// Connect the initiator to `peer`.
///
/// # Errors
///
/// Returns [`LatencyError::Channel`] if the connection cannot be made.
pub fn connect(peer: &PeerAddress, config: &TransportConfig) -> LatencyResult<Box<dyn Channel>> {
    info!(%peer, "Connecting");
    let channel: Box<dyn Channel> = match peer {
        PeerAddress::Vsock { cid } => connect_vsock(*cid, config.vsock_port)?,
        PeerAddress::Unix(path) => connect_unix(path)?,
        PeerAddress::Tcp(ip) => Box::new(tcp::connect(SocketAddr::new(*ip, config.tcp_port))?),
    };
    info!(peer = %channel.peer_description(), "Connected");
    Ok(channel)
}

#[cfg(target_os = "linux")]
fn listen_vsock(port: u32) -> LatencyResult<Box<dyn Acceptor>> {
    Ok(Box::new(vsock::VsockAcceptor::bind(port)?))
}

#[cfg(not(target_os = "linux"))]
fn listen_vsock(_port: u32) -> LatencyResult<Box<dyn Acceptor>> {
    Err(LatencyError::Channel(
        "vsock is only supported on Linux".into(),
    ))
}

#[cfg(target_os = "linux")]
fn connect_vsock(cid: u32, port: u32) -> LatencyResult<Box<dyn Channel>> {
    Ok(Box::new(vsock::connect(vsock::VsockAddr { cid, port })?))
}

#[cfg(not(target_os = "linux"))]
fn connect_vsock(_cid: u32, _port: u32) -> LatencyResult<Box<dyn Channel>> {
    Err(LatencyError::Channel(
        "vsock is only supported on Linux".into(),
    ))
}

#[cfg(unix)]
fn listen_unix(config: &TransportConfig) -> LatencyResult<Box<dyn Acceptor>> {
    Ok(Box::new(unix::UnixAcceptor::bind(&config.unix_path)?))
}

#[cfg(not(unix))]
fn listen_unix(_config: &TransportConfig) -> LatencyResult<Box<dyn Acceptor>> {
    Err(LatencyError::Channel(
        "Unix domain sockets are not supported on this platform".into(),
    ))
}

#[cfg(unix)]
fn connect_unix(path: &std::path::Path) -> LatencyResult<Box<dyn Channel>> {
    Ok(Box::new(unix::connect(path)?))
}

#[cfg(not(unix))]
fn connect_unix(_path: &std::path::Path) -> LatencyResult<Box<dyn Channel>> {
    Err(LatencyError::Channel(
        "Unix domain sockets are not supported on this platform".into(),
    ))
}

/// Wrap an I/O error from channel setup.
pub(crate) fn channel_error(what: &str, target: impl fmt::Display, e: &std::io::Error) -> LatencyError {
    LatencyError::Channel(format!("{what} {target}: {e}"))
}
