//! Socket base behavior: open/bind/connect/close/state/blocking mode.
//!
//! Grounded directly on `original_source/network/tcp.c`'s `_tcp_socket_open`
//! control flow (open never raises, only logs and leaves `fd` invalid on
//! failure) generalized to both protocols, and on spec.md §4.3/§4.8.

use crate::address::{Address, Family};
use crate::event::{self, EventId};
use crate::handle::{SocketHandle, SocketKind};

/// Byte size of the buffered read/write windows on every socket base
/// record, matching the original's `BUFSZ` (spec.md §3).
pub(crate) const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Socket lifecycle state (spec.md §3, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// No connection: freshly created, or bound but not yet connected/listening.
    NotConnected,
    /// A bounded `connect` is in flight.
    Connecting,
    /// Connected (TCP) or explicitly connected-to-a-peer (UDP).
    Connected,
    /// Listening for incoming TCP connections.
    Listening,
    /// Terminally closed.
    Disconnected,
}

pub(crate) mod flag {
    pub(crate) const BLOCKING: u8 = 1 << 0;
    pub(crate) const TCP_DELAY: u8 = 1 << 1;
    #[allow(dead_code)] // mirrors spec.md §3's flag set; no behavior keys off it directly yet
    pub(crate) const REFLUSH: u8 = 1 << 2;
    pub(crate) const HANGUP: u8 = 1 << 3;
}

/// The hot, per-socket slice-table entry (spec.md §3 "Socket base record").
pub(crate) struct BaseRecord {
    pub(crate) socket: Option<socket2::Socket>,
    pub(crate) state: SocketState,
    pub(crate) flags: u8,
    pub(crate) read_buffer: Vec<u8>,
    pub(crate) read_offset: usize,
    pub(crate) read_length: usize,
    pub(crate) write_buffer: Vec<u8>,
    pub(crate) write_length: usize,
    pub(crate) last_event: Option<EventId>,
    pub(crate) bytes_transferred: u64,
}

impl Default for BaseRecord {
    fn default() -> Self {
        BaseRecord {
            socket: None,
            state: SocketState::NotConnected,
            flags: flag::BLOCKING,
            read_buffer: vec![0u8; DEFAULT_BUFFER_SIZE],
            read_offset: 0,
            read_length: 0,
            write_buffer: vec![0u8; DEFAULT_BUFFER_SIZE],
            write_length: 0,
            last_event: None,
            bytes_transferred: 0,
        }
    }
}

impl BaseRecord {
    pub(crate) fn is_blocking(&self) -> bool {
        self.flags & flag::BLOCKING != 0
    }

    pub(crate) fn is_open(&self) -> bool {
        self.socket.is_some()
    }
}

#[cfg(unix)]
fn raw_fd(sock: &socket2::Socket) -> i64 {
    use std::os::unix::io::AsRawFd;
    sock.as_raw_fd() as i64
}

#[cfg(windows)]
fn raw_fd(sock: &socket2::Socket) -> i64 {
    use std::os::windows::io::AsRawSocket;
    sock.as_raw_socket() as i64
}

fn domain_for(family: Family) -> socket2::Domain {
    match family {
        Family::V4 => socket2::Domain::IPV4,
        Family::V6 => socket2::Domain::IPV6,
    }
}

fn type_and_protocol(kind: SocketKind) -> (socket2::Type, socket2::Protocol) {
    match kind {
        SocketKind::Tcp => (socket2::Type::STREAM, socket2::Protocol::TCP),
        SocketKind::Udp => (socket2::Type::DGRAM, socket2::Protocol::UDP),
    }
}

/// Create an OS descriptor for `family`. Never raises: on failure `socket`
/// stays `None` and the attempt is logged (spec.md §4.3 "Open").
pub(crate) fn open(base: &mut BaseRecord, family: Family, kind: SocketKind, handle: SocketHandle) {
    if base.socket.is_some() {
        return;
    }
    let (ty, proto) = type_and_protocol(kind);
    match socket2::Socket::new(domain_for(family), ty, Some(proto)) {
        Ok(sock) => {
            if let Err(err) = sock.set_nonblocking(!base.is_blocking()) {
                tracing::warn!(%handle, error = %err, "failed to apply initial blocking mode");
            }
            if kind == SocketKind::Tcp {
                let _ = sock.set_nodelay(base.flags & flag::TCP_DELAY == 0);
            }
            tracing::debug!(%handle, fd = raw_fd(&sock), "opened socket");
            base.socket = Some(sock);
            base.state = SocketState::NotConnected;
        }
        Err(err) => {
            tracing::error!(%handle, error = %err, "unable to open socket");
            base.socket = None;
        }
    }
}

/// Bind `base`'s descriptor (opening it lazily if needed) to `addr`.
/// Failure is non-fatal; the caller may retry with a different address.
pub(crate) fn bind(base: &mut BaseRecord, kind: SocketKind, addr: &Address, handle: SocketHandle) -> bool {
    if base.socket.is_none() {
        open(base, addr.family(), kind, handle);
    }
    let Some(sock) = base.socket.as_ref() else {
        return false;
    };
    match sock.bind(&socket2::SockAddr::from(addr.as_std())) {
        Ok(()) => {
            tracing::debug!(%handle, %addr, "bound socket");
            true
        }
        Err(err) => {
            tracing::warn!(%handle, %addr, error = %err, "bind failed");
            false
        }
    }
}

fn is_in_progress(err: &std::io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(code) if code == libc::EINPROGRESS || code == libc::EALREADY
    ) || err.kind() == std::io::ErrorKind::WouldBlock
}

/// Connect `base`'s descriptor (opening it lazily if needed) to `addr`,
/// honoring `timeout_ms` via a temporary non-blocking toggle plus `poll`,
/// exactly as `original_source/network/tcp.c`'s `tcp_socket_accept` brackets
/// its own blocking-mode toggle (spec.md §4.3 "Connect").
pub(crate) fn connect(
    base: &mut BaseRecord,
    kind: SocketKind,
    addr: &Address,
    timeout_ms: u32,
    handle: SocketHandle,
) -> bool {
    if base.socket.is_none() {
        open(base, addr.family(), kind, handle);
    }
    let Some(sock) = base.socket.as_ref() else {
        return false;
    };

    base.state = SocketState::Connecting;
    let was_blocking = base.is_blocking();
    if timeout_ms > 0 && was_blocking {
        let _ = sock.set_nonblocking(true);
    }

    let sockaddr = socket2::SockAddr::from(addr.as_std());
    let success = match sock.connect(&sockaddr) {
        Ok(()) => true,
        Err(err) if is_in_progress(&err) => {
            if timeout_ms == 0 {
                // caller polls state; in-progress counts as success for now
                true
            } else {
                #[cfg(unix)]
                {
                    wait_writable(sock, timeout_ms) && sock.take_error().ok().flatten().is_none()
                }
                #[cfg(not(unix))]
                {
                    false
                }
            }
        }
        Err(err) => {
            tracing::debug!(%handle, %addr, error = %err, "connect failed");
            false
        }
    };

    if timeout_ms > 0 && was_blocking {
        let _ = sock.set_nonblocking(false);
    }

    base.state = if success {
        SocketState::Connected
    } else {
        SocketState::NotConnected
    };
    if success {
        tracing::debug!(%handle, %addr, "connected");
    }
    success
}

#[cfg(unix)]
pub(crate) fn wait_writable(sock: &socket2::Socket, timeout_ms: u32) -> bool {
    use std::os::unix::io::AsRawFd;
    let mut pfd = libc::pollfd {
        fd: sock.as_raw_fd(),
        events: libc::POLLOUT,
        revents: 0,
    };
    let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms as libc::c_int) };
    ret > 0 && (pfd.revents & (libc::POLLOUT | libc::POLLERR)) != 0
}

#[cfg(unix)]
pub(crate) fn wait_readable(sock: &socket2::Socket, timeout_ms: u32) -> bool {
    use std::os::unix::io::AsRawFd;
    let mut pfd = libc::pollfd {
        fd: sock.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms as libc::c_int) };
    ret > 0 && (pfd.revents & (libc::POLLIN | libc::POLLERR | libc::POLLHUP)) != 0
}

/// Write `data` in one syscall to whatever the descriptor's default peer is
/// — the connected remote end for TCP, or the `connect`-ed peer for UDP in
/// stream mode. Used by the stream adapter's flush path (spec.md §4.6).
pub(crate) fn raw_send(base: &BaseRecord, data: &[u8]) -> crate::error::Result<usize> {
    let sock = base
        .socket
        .as_ref()
        .ok_or(crate::error::Error::InvalidHandle)?;
    sock.send(data).map_err(crate::error::Error::from_io)
}

/// Read directly into `base.read_buffer` from the descriptor's default peer,
/// in one syscall. Used by the stream adapter's refill path (spec.md §4.6).
pub(crate) fn raw_recv(base: &mut BaseRecord) -> crate::error::Result<usize> {
    use std::mem::MaybeUninit;
    let BaseRecord {
        socket, read_buffer, ..
    } = base;
    let sock = socket.as_ref().ok_or(crate::error::Error::InvalidHandle)?;
    let buf: &mut [MaybeUninit<u8>] = unsafe {
        std::slice::from_raw_parts_mut(read_buffer.as_mut_ptr().cast(), read_buffer.len())
    };
    sock.recv(buf).map_err(crate::error::Error::from_io)
}

/// Graceful shutdown then close. Idempotent: closing an already-closed
/// socket is a no-op (including not re-posting `Hangup`).
pub(crate) fn close(base: &mut BaseRecord, handle: SocketHandle) {
    let Some(sock) = base.socket.take() else {
        return;
    };
    let _ = sock.shutdown(socket2::Shutdown::Both);
    base.state = SocketState::Disconnected;
    base.read_offset = 0;
    base.read_length = 0;
    base.write_length = 0;
    base.flags |= flag::HANGUP;
    tracing::debug!(%handle, "closed socket");
    event::post_coalesced(base, EventId::Hangup, handle);
}

/// Update the `Blocking` flag and toggle the OS non-blocking flag, effective
/// across subsequent reads/writes/accepts (spec.md §4.3 "Blocking mode").
pub(crate) fn set_blocking(base: &mut BaseRecord, blocking: bool) {
    if blocking {
        base.flags |= flag::BLOCKING;
    } else {
        base.flags &= !flag::BLOCKING;
    }
    if let Some(sock) = &base.socket {
        let _ = sock.set_nonblocking(!blocking);
    }
}
