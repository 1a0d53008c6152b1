//! Stream adapter: a single buffered byte/datagram-stream contract over
//! either protocol.
//!
//! Grounded on spec.md §4.6's read/write algorithms and on
//! `original_source/network/tcp.c`'s buffered base-record fields
//! (`read_buffer`/`read_offset`/`read_length`, `write_buffer`/`write_length`),
//! generalized across `src/tcp.rs` and `src/udp.rs` via `src/base.rs`'s
//! `raw_send`/`raw_recv` helpers, which issue the one-syscall-per-call
//! `send`/`recv` common to both a connected TCP socket and a `connect`-ed
//! UDP socket.

use crate::base::{self, BaseRecord, SocketState};
use crate::error::Error;
use crate::event::{self, EventId};
use crate::handle::{SocketHandle, SocketKind};
use crate::udp;

/// A view over a socket handle presenting one stream contract regardless of
/// the underlying protocol (spec.md §3 "Stream").
#[derive(Debug, Clone)]
pub struct Stream {
    handle: SocketHandle,
    /// Bytes written are delivered in the order written.
    pub inorder: bool,
    /// The transport guarantees delivery (TCP) or not (UDP).
    pub reliable: bool,
    /// Message boundaries are preserved (UDP) or not (TCP, a plain byte
    /// stream).
    pub sequential: bool,
    path: String,
}

impl Stream {
    pub(crate) fn new(handle: SocketHandle, kind: SocketKind) -> Self {
        match kind {
            SocketKind::Tcp => Stream {
                handle,
                inorder: true,
                reliable: true,
                sequential: false,
                path: crate::tcp::stream_path(handle),
            },
            SocketKind::Udp => Stream {
                handle,
                inorder: false,
                reliable: false,
                sequential: true,
                path: udp::stream_path(handle),
            },
        }
    }

    /// The handle this stream is bound to.
    pub fn handle(&self) -> SocketHandle {
        self.handle
    }

    /// `tcp://<id>` or `udp://<id>`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Read up to `buf.len()` bytes. Returns the number of bytes actually
    /// copied into `buf`; `0` means either "nothing available right now"
    /// (non-blocking) or "peer closed" (blocking) — spec.md §4.6, §7 total
    /// function contract.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        crate::table()
            .with_parts(self.handle, |rec, base| read_impl(rec.kind, base, buf, self.handle))
            .unwrap_or(0)
    }

    /// Buffer up to `buf.len()` bytes for later transmission, flushing the
    /// write buffer as it fills. Returns the number of bytes accepted.
    pub fn write(&self, buf: &[u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        crate::table()
            .with_parts(self.handle, |rec, base| write_impl(rec.kind, base, buf, self.handle))
            .unwrap_or(0)
    }

    /// Drain the write buffer, blocking until empty if the socket is
    /// blocking. Returns `true` on a fully drained buffer.
    pub fn flush(&self) -> bool {
        crate::table()
            .with_parts(self.handle, |rec, base| flush_impl(rec.kind, base, self.handle))
            .unwrap_or(false)
    }

    /// Bytes already buffered and ready to read without a syscall.
    pub fn available(&self) -> usize {
        crate::table()
            .with_parts(self.handle, |_, base| base.read_length - base.read_offset)
            .unwrap_or(0)
    }

    /// Close the underlying socket base. The handle itself remains valid
    /// until [`crate::socket_free`] is called.
    pub fn close(&self) {
        let _ = crate::table().with_parts(self.handle, |_, base| base::close(base, self.handle));
    }

    /// No-op for sockets (spec.md §4.6): sockets have no seekable position.
    pub fn seek(&self, _pos: u64) -> bool {
        false
    }

    /// Total bytes transferred (sent + received) over this socket's
    /// lifetime, standing in for a seek position.
    pub fn tell(&self) -> u64 {
        crate::table()
            .with_parts(self.handle, |_, base| base.bytes_transferred)
            .unwrap_or(0)
    }
}

fn read_impl(kind: SocketKind, base: &mut BaseRecord, out: &mut [u8], handle: SocketHandle) -> usize {
    let mut served = 0;
    loop {
        let buffered = base.read_length - base.read_offset;
        if buffered > 0 {
            let n = buffered.min(out.len() - served);
            out[served..served + n]
                .copy_from_slice(&base.read_buffer[base.read_offset..base.read_offset + n]);
            base.read_offset += n;
            served += n;
            base.bytes_transferred += n as u64;
        }
        if served == out.len() {
            return served;
        }
        if !refill(kind, base, handle) {
            return served;
        }
    }
}

/// Refill `base.read_buffer` in one syscall: `recv` on the socket's default
/// peer. For TCP that is the connected remote; for UDP stream mode the
/// Open Question resolution (see `DESIGN.md`) requires the socket to have
/// been `connect`-ed first, so the same single-datagram-per-call `recv`
/// already yields exactly one message, honoring `sequential` for UDP.
/// Returns `false` when no further data can be produced right now
/// (non-blocking with nothing pending, or the peer closed).
fn refill(_kind: SocketKind, base: &mut BaseRecord, handle: SocketHandle) -> bool {
    if !base.is_open() || base.state == SocketState::Disconnected {
        return false;
    }
    match base::raw_recv(base) {
        Ok(0) => {
            tracing::debug!(%handle, "peer closed, posting hangup");
            base::close(base, handle);
            false
        }
        Ok(n) => {
            base.read_offset = 0;
            base.read_length = n;
            event::post_coalesced(base, EventId::Data, handle);
            true
        }
        Err(Error::WouldBlock) => false,
        Err(err) => {
            tracing::debug!(%handle, error = %err, "refill failed, closing");
            base::close(base, handle);
            false
        }
    }
}

fn write_impl(kind: SocketKind, base: &mut BaseRecord, data: &[u8], handle: SocketHandle) -> usize {
    let mut accepted = 0;
    while accepted < data.len() {
        let capacity = base.write_buffer.len() - base.write_length;
        if capacity == 0 {
            if !flush_impl(kind, base, handle) {
                break;
            }
            continue;
        }
        let n = capacity.min(data.len() - accepted);
        base.write_buffer[base.write_length..base.write_length + n]
            .copy_from_slice(&data[accepted..accepted + n]);
        base.write_length += n;
        accepted += n;
        if base.write_length == base.write_buffer.len() {
            if !flush_impl(kind, base, handle) {
                break;
            }
        }
    }
    accepted
}

/// Drain `write_buffer` in one syscall per datagram (UDP) or repeated
/// `send`s until empty (TCP, re-queueing the unsent tail on a partial send).
fn flush_impl(kind: SocketKind, base: &mut BaseRecord, handle: SocketHandle) -> bool {
    while base.write_length > 0 {
        let result = base::raw_send(base, &base.write_buffer[..base.write_length]);
        match result {
            Ok(0) => return false,
            Ok(n) => {
                let remaining = base.write_length - n;
                base.write_buffer.copy_within(n..base.write_length, 0);
                base.write_length = remaining;
                base.bytes_transferred += n as u64;
                if kind == SocketKind::Udp {
                    // one datagram per flush: the whole buffer must go in
                    // the single `send` above, never split across calls.
                    break;
                }
            }
            Err(Error::WouldBlock) => return false,
            Err(err) => {
                tracing::debug!(%handle, error = %err, "flush failed, closing");
                base::close(base, handle);
                return false;
            }
        }
    }
    base.write_length == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_stream_reports_byte_semantics() {
        let h = crate::table().create(SocketKind::Tcp).unwrap();
        let s = Stream::new(h, SocketKind::Tcp);
        assert!(s.inorder);
        assert!(s.reliable);
        assert!(!s.sequential);
        assert_eq!(s.path(), format!("tcp://{h}"));
        crate::table().free(h);
    }

    #[test]
    fn udp_stream_reports_datagram_semantics() {
        let h = crate::table().create(SocketKind::Udp).unwrap();
        let s = Stream::new(h, SocketKind::Udp);
        assert!(!s.inorder);
        assert!(!s.reliable);
        assert!(s.sequential);
        assert_eq!(s.path(), format!("udp://{h}"));
        crate::table().free(h);
    }

    #[test]
    fn read_on_never_opened_socket_returns_zero() {
        let h = crate::table().create(SocketKind::Tcp).unwrap();
        let s = Stream::new(h, SocketKind::Tcp);
        let mut buf = [0u8; 16];
        assert_eq!(s.read(&mut buf), 0);
        crate::table().free(h);
    }

    #[test]
    fn seek_is_a_no_op() {
        let h = crate::table().create(SocketKind::Tcp).unwrap();
        let s = Stream::new(h, SocketKind::Tcp);
        assert!(!s.seek(0));
        crate::table().free(h);
    }
}
