//! Unix domain socket transport.

use crate::{channel_error, Acceptor};
use latency_common::error::{LatencyError, LatencyResult};
use latency_engine::channel::Channel;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bound Unix listener. The socket file is removed once the peer is
/// accepted, or when the acceptor is dropped unused.
#[derive(Debug)]
pub struct UnixAcceptor {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixAcceptor {
    /// Bind at `path`, replacing a stale socket file left by an earlier run.
    ///
    /// Anything at `path` that is not a socket is left untouched.
    ///
    /// # Errors
    ///
    /// Returns a channel error if the path holds something other than a
    /// socket, a stale socket cannot be removed, or the bind fails.
    pub fn bind(path: &Path) -> LatencyResult<Self> {
        remove_stale_socket(path)?;
        let listener =
            UnixListener::bind(path).map_err(|e| channel_error("bind", path.display(), &e))?;
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Filesystem path of the socket.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn remove_stale_socket(path: &Path) -> LatencyResult<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(channel_error("inspect", path.display(), &e)),
    };
    if !metadata.file_type().is_socket() {
        return Err(LatencyError::Channel(format!(
            "{} exists and is not a socket",
            path.display()
        )));
    }
    std::fs::remove_file(path).map_err(|e| channel_error("remove stale", path.display(), &e))?;
    debug!(path = %path.display(), "Removed stale socket file");
    Ok(())
}

impl Drop for UnixAcceptor {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove socket file");
            }
        }
    }
}

impl Acceptor for UnixAcceptor {
    fn local_endpoint(&self) -> String {
        format!("unix:{}", self.path.display())
    }

    fn accept_one(self: Box<Self>) -> LatencyResult<Box<dyn Channel>> {
        let (stream, _) = self
            .listener
            .accept()
            .map_err(|e| channel_error("accept on", self.local_endpoint(), &e))?;
        info!(path = %self.path.display(), "Accepted Unix peer");
        // Dropping self unlinks the path; the accepted stream stays open.
        Ok(Box::new(stream))
    }
}

/// Connect to a Unix responder.
///
/// # Errors
///
/// Returns a channel error if nothing listens at `path`.
pub fn connect(path: &Path) -> LatencyResult<UnixStream> {
    let stream =
        UnixStream::connect(path).map_err(|e| channel_error("connect to", path.display(), &e))?;
    debug!(path = %path.display(), "Unix socket connected");
    Ok(stream)
}
