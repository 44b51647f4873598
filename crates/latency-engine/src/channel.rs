//! Duplex byte-stream channel contract.
//!
//! The engine sees only `Read + Write`. How the single channel of a run is
//! established (vsock, Unix socket, TCP) is decided elsewhere.

use std::io::{Read, Write};

/// A connected, ordered, reliable byte stream to the peer.
pub trait Channel: Read + Write + Send {
    /// Human-readable peer address for logs.
    fn peer_description(&self) -> String;
}

impl Channel for std::net::TcpStream {
    fn peer_description(&self) -> String {
        self.peer_addr()
            .map_or_else(|_| "tcp:<unknown>".to_string(), |a| format!("tcp:{a}"))
    }
}

#[cfg(unix)]
impl Channel for std::os::unix::net::UnixStream {
    fn peer_description(&self) -> String {
        let addr = self.peer_addr().ok().or_else(|| self.local_addr().ok());
        match addr.as_ref().and_then(|a| a.as_pathname()) {
            Some(path) => format!("unix:{}", path.display()),
            None => "unix:<unnamed>".to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) use mock::{MockChannel, MockStep};
