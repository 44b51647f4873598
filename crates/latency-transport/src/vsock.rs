//! AF_VSOCK transport (Linux only).
//!
//! std has no vsock sockets, so this wraps the raw libc calls in owned file
//! descriptors. The listener binds `VMADDR_CID_ANY` and accepts a single
//! guest or host peer.

#![allow(unsafe_code)]

use crate::{channel_error, Acceptor};
use latency_common::error::LatencyResult;
use latency_engine::channel::Channel;
use std::fmt;
use std::io::{self, Read, Write};
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use tracing::{debug, info};

/// Context id that matches any local address.
pub const CID_ANY: u32 = libc::VMADDR_CID_ANY;

/// Context id of the host.
pub const CID_HOST: u32 = libc::VMADDR_CID_HOST;

/// Local loopback context id.
pub const CID_LOCAL: u32 = 1;

/// vsock endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VsockAddr {
    /// Context id.
    pub cid: u32,
    /// Port.
    pub port: u32,
}

impl VsockAddr {
    fn to_sockaddr(self) -> libc::sockaddr_vm {
        // SAFETY: sockaddr_vm is plain old data; all-zero is a valid value
        // and leaves the reserved fields cleared as the kernel requires.
        let mut addr: libc::sockaddr_vm = unsafe { mem::zeroed() };
        addr.svm_family = libc::AF_VSOCK as libc::sa_family_t;
        addr.svm_port = self.port;
        addr.svm_cid = self.cid;
        addr
    }

    fn from_sockaddr(addr: &libc::sockaddr_vm) -> Self {
        Self {
            cid: addr.svm_cid,
            port: addr.svm_port,
        }
    }
}

impl fmt::Display for VsockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vsock:{}:{}", self.cid, self.port)
    }
}

const SOCKADDR_VM_LEN: libc::socklen_t = mem::size_of::<libc::sockaddr_vm>() as libc::socklen_t;

fn new_socket() -> io::Result<OwnedFd> {
    // SAFETY: socket() has no pointer arguments; a non-negative return is a
    // fresh descriptor we take ownership of.
    let fd = unsafe { libc::socket(libc::AF_VSOCK, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fd is valid and owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn cvt(ret: libc::c_int) -> io::Result<()> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Bound and listening vsock socket.
#[derive(Debug)]
pub struct VsockAcceptor {
    fd: OwnedFd,
    local: VsockAddr,
}

impl VsockAcceptor {
    /// Bind `VMADDR_CID_ANY:port` and start listening.
    ///
    /// # Errors
    ///
    /// Returns a channel error if the kernel lacks vsock support or the
    /// port is taken.
    pub fn bind(port: u32) -> LatencyResult<Self> {
        let local = VsockAddr { cid: CID_ANY, port };
        let fd = new_socket().map_err(|e| channel_error("create socket for", local, &e))?;
        let addr = local.to_sockaddr();

        // SAFETY: addr is a valid sockaddr_vm and the length matches it.
        cvt(unsafe {
            libc::bind(
                fd.as_raw_fd(),
                std::ptr::addr_of!(addr).cast::<libc::sockaddr>(),
                SOCKADDR_VM_LEN,
            )
        })
        .map_err(|e| channel_error("bind", local, &e))?;

        // SAFETY: plain syscall on a descriptor we own.
        cvt(unsafe { libc::listen(fd.as_raw_fd(), 1) })
            .map_err(|e| channel_error("listen on", local, &e))?;

        Ok(Self { fd, local })
    }
}

impl Acceptor for VsockAcceptor {
    fn local_endpoint(&self) -> String {
        self.local.to_string()
    }

    fn accept_one(self: Box<Self>) -> LatencyResult<Box<dyn Channel>> {
        // SAFETY: zeroed sockaddr_vm is valid.
        let mut peer: libc::sockaddr_vm = unsafe { mem::zeroed() };
        let mut len = SOCKADDR_VM_LEN;
        // SAFETY: peer and len describe a writable sockaddr_vm.
        let fd = unsafe {
            libc::accept4(
                self.fd.as_raw_fd(),
                std::ptr::addr_of_mut!(peer).cast::<libc::sockaddr>(),
                &mut len,
                libc::SOCK_CLOEXEC,
            )
        };
        if fd < 0 {
            let e = io::Error::last_os_error();
            return Err(channel_error("accept on", self.local, &e));
        }
        // SAFETY: accept4 returned a fresh descriptor.
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        let peer = VsockAddr::from_sockaddr(&peer);
        info!(cid = peer.cid, port = peer.port, "Accepted vsock peer");
        // The listener closes when self drops here; one peer per run.
        Ok(Box::new(VsockStream { fd, peer }))
    }
}

/// Connected vsock stream.
#[derive(Debug)]
pub struct VsockStream {
    fd: OwnedFd,
    peer: VsockAddr,
}

impl VsockStream {
    /// Remote endpoint.
    #[must_use]
    pub fn peer_addr(&self) -> VsockAddr {
        self.peer
    }
}

/// Connect to a vsock responder.
///
/// # Errors
///
/// Returns a channel error if the socket cannot be created or the peer
/// refuses the connection.
pub fn connect(peer: VsockAddr) -> LatencyResult<VsockStream> {
    let fd = new_socket().map_err(|e| channel_error("create socket for", peer, &e))?;
    let addr = peer.to_sockaddr();

    // SAFETY: addr is a valid sockaddr_vm and the length matches it.
    cvt(unsafe {
        libc::connect(
            fd.as_raw_fd(),
            std::ptr::addr_of!(addr).cast::<libc::sockaddr>(),
            SOCKADDR_VM_LEN,
        )
    })
    .map_err(|e| channel_error("connect to", peer, &e))?;

    debug!(%peer, "vsock connected");
    Ok(VsockStream { fd, peer })
}

impl Read for VsockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: buf is valid for writes of buf.len() bytes.
        let n = unsafe { libc::read(self.fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n.unsigned_abs())
    }
}

impl Write for VsockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: buf is valid for reads of buf.len() bytes.
        let n = unsafe { libc::write(self.fd.as_raw_fd(), buf.as_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n.unsigned_abs())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Channel for VsockStream {
    fn peer_description(&self) -> String {
        self.peer.to_string()
    }
}
