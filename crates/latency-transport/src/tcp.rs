//! TCP transport.
//!
//! Nagle's algorithm is disabled on both ends; with it on, every one-byte
//! acknowledgment would wait for the delayed-ACK timer.

use crate::{channel_error, Acceptor};
use latency_common::error::LatencyResult;
use latency_engine::channel::Channel;
use std::net::{SocketAddr, TcpListener, TcpStream};
use tracing::{debug, info};

/// Bound TCP listener.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Bind to `addr`. Port 0 picks an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns a channel error if the address is in use or not local.
    pub fn bind(addr: SocketAddr) -> LatencyResult<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| channel_error("bind", addr, &e))?;
        Ok(Self { listener })
    }

    /// Address actually bound.
    ///
    /// # Errors
    ///
    /// Returns a channel error if the socket cannot report its address.
    pub fn local_addr(&self) -> LatencyResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| channel_error("local_addr of", "tcp listener", &e))
    }
}

impl Acceptor for TcpAcceptor {
    fn local_endpoint(&self) -> String {
        self.listener
            .local_addr()
            .map_or_else(|_| "tcp:<unknown>".to_string(), |a| format!("tcp:{a}"))
    }

    fn accept_one(self: Box<Self>) -> LatencyResult<Box<dyn Channel>> {
        let (stream, peer) = self
            .listener
            .accept()
            .map_err(|e| channel_error("accept on", self.local_endpoint(), &e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| channel_error("set TCP_NODELAY for", peer, &e))?;
        info!(%peer, "Accepted TCP peer");
        Ok(Box::new(stream))
    }
}

/// Connect to a TCP responder.
///
/// # Errors
///
/// Returns a channel error if the connection is refused or TCP_NODELAY
/// cannot be set.
pub fn connect(addr: SocketAddr) -> LatencyResult<TcpStream> {
    let stream = TcpStream::connect(addr).map_err(|e| channel_error("connect to", addr, &e))?;
    stream
        .set_nodelay(true)
        .map_err(|e| channel_error("set TCP_NODELAY for", addr, &e))?;
    debug!(%addr, "TCP connected");
    Ok(stream)
}
