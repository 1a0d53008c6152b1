#![warn(missing_docs, unreachable_pub)]

//! A portable byte-stream abstraction over TCP and UDP sockets.
//!
//! Sockets are referred to by an opaque, generation-checked
//! [`SocketHandle`] rather than an owned Rust value, so the table holding
//! live descriptors can be shared process-wide without lifetime
//! gymnastics — the same shape `original_source/network/socket.h`'s
//! `object_t` uses. A [`Stream`] adapter then layers buffered read/write
//! semantics over either protocol uniformly.

mod address;
mod base;
mod config;
mod error;
mod event;
mod handle;
mod slab;
mod stream;
mod tcp;
mod udp;

pub use address::{Address, Family, Format};
pub use base::SocketState;
pub use config::Config;
pub use error::Error;
pub use event::{Event, EventId};
pub use handle::SocketHandle;
pub use stream::Stream;

use std::sync::OnceLock;

use handle::{SocketKind, SocketTable};

static TABLE: OnceLock<SocketTable> = OnceLock::new();

fn table() -> &'static SocketTable {
    TABLE.get_or_init(SocketTable::new)
}

/// Initialize the module: brings up the event bus with
/// `config.event_stream_size` as its capacity hint. Idempotent.
pub fn module_initialize(config: &Config) {
    event::initialize(config);
    tracing::info!(event_stream_size = config.event_stream_size, "module initialized");
}

/// Tear down the module: drains and deallocates the event bus. Any
/// sockets still open are left as-is; callers are expected to
/// [`socket_free`] them first.
pub fn module_finalize() {
    event::finalize();
    tracing::info!("module finalized");
}

/// Allocate a new TCP socket record. No OS descriptor is opened yet.
pub fn tcp_socket_create() -> Result<SocketHandle, Error> {
    table().create(SocketKind::Tcp)
}

/// Allocate a new UDP socket record. No OS descriptor is opened yet.
pub fn udp_socket_create() -> Result<SocketHandle, Error> {
    table().create(SocketKind::Udp)
}

/// Release `handle`: closes the OS descriptor if open and returns the
/// slot to the free list. `handle` is invalid for any further call after
/// this returns.
pub fn socket_free(handle: SocketHandle) {
    table().free(handle);
}

/// `handle` still resolves to a live socket record.
pub fn socket_is_socket(handle: SocketHandle) -> bool {
    table().is_socket(handle)
}

/// Bind `handle`'s descriptor (opened lazily) to `addr`. Returns `false`
/// on failure; the caller may retry with a different address.
pub fn socket_bind(handle: SocketHandle, addr: &Address) -> bool {
    let Ok(kind) = table().kind(handle) else {
        return false;
    };
    table()
        .with_parts(handle, |rec, base| {
            let ok = base::bind(base, kind, addr, handle);
            if ok {
                rec.address_local = Some(*addr);
            }
            ok
        })
        .unwrap_or(false)
}

/// Connect `handle`'s descriptor (opened lazily) to `addr`, honoring
/// `timeout_ms` as a bounded wait when the socket is currently blocking.
/// `timeout_ms == 0` treats an in-progress connect as success.
pub fn socket_connect(handle: SocketHandle, addr: &Address, timeout_ms: u32) -> bool {
    let Ok(kind) = table().kind(handle) else {
        return false;
    };
    table()
        .with_parts(handle, |rec, base| {
            let ok = base::connect(base, kind, addr, timeout_ms, handle);
            if ok {
                rec.address_remote = Some(*addr);
                event::post(EventId::Connect, handle);
            }
            ok
        })
        .unwrap_or(false)
}

/// Shut down and close `handle`'s descriptor. Idempotent.
pub fn socket_close(handle: SocketHandle) {
    let _ = table().with_parts(handle, |_, base| base::close(base, handle));
}

/// Whether `handle` is currently in blocking mode. Sockets default to
/// blocking, even before an OS descriptor exists.
pub fn socket_blocking(handle: SocketHandle) -> bool {
    table().peek_blocking(handle).unwrap_or(true)
}

/// Set `handle`'s blocking mode, effective immediately if a descriptor is
/// already open and on every descriptor opened afterward.
pub fn socket_set_blocking(handle: SocketHandle, blocking: bool) {
    let _ = table().with_parts(handle, |_, base| base::set_blocking(base, blocking));
}

/// The locally bound address, if any.
pub fn socket_address_local(handle: SocketHandle) -> Option<Address> {
    table().with_record(handle, |rec| rec.address_local).ok().flatten()
}

/// The connected remote address, if any.
pub fn socket_address_remote(handle: SocketHandle) -> Option<Address> {
    table().with_record(handle, |rec| rec.address_remote).ok().flatten()
}

/// The socket's current lifecycle state.
pub fn socket_state(handle: SocketHandle) -> SocketState {
    table().peek_state(handle).unwrap_or(SocketState::NotConnected)
}

/// Build the [`Stream`] adapter for `handle`. Fails only if `handle` does
/// not resolve to a live socket.
pub fn socket_stream(handle: SocketHandle) -> Result<Stream, Error> {
    let kind = table().kind(handle)?;
    Ok(Stream::new(handle, kind))
}

/// Start listening on `handle`. Requires a prior successful
/// [`socket_bind`] and `state == NotConnected`.
pub fn tcp_socket_listen(handle: SocketHandle) -> bool {
    let has_local = table()
        .with_record(handle, |rec| rec.address_local.is_some())
        .unwrap_or(false);
    table()
        .with_parts(handle, |_, base| tcp::listen(base, has_local, handle))
        .unwrap_or(false)
}

/// Accept one pending connection on a listening socket, waiting up to
/// `timeout_ms` if the listener is blocking. Returns a freshly allocated
/// socket handle for the accepted connection, or `None`.
pub fn tcp_socket_accept(handle: SocketHandle, timeout_ms: u32) -> Option<SocketHandle> {
    let accepted = table()
        .with_parts(handle, |_, base| tcp::accept(base, timeout_ms, handle))
        .ok()??;
    let new_base = tcp::base_from_accepted(accepted.socket);
    let new_handle = table()
        .adopt(
            SocketKind::Tcp,
            new_base,
            Some(accepted.address_local),
            Some(accepted.address_remote),
        )
        .ok()?;
    event::post(EventId::Accept, new_handle);
    Some(new_handle)
}

/// Whether Nagle's algorithm is currently held off (`delay == true` means
/// Nagle is on, i.e. `TCP_NODELAY == 0`).
pub fn tcp_socket_delay(handle: SocketHandle) -> bool {
    table().with_parts(handle, |_, base| tcp::delay(base)).unwrap_or(false)
}

/// Set whether Nagle's algorithm is held off.
pub fn tcp_socket_set_delay(handle: SocketHandle, delay: bool) {
    let _ = table().with_parts(handle, |_, base| tcp::set_delay(base, delay));
}

/// Send one datagram atomically to `target`. Returns the number of bytes
/// sent, which equals `datagram.len()` on success.
pub fn udp_socket_sendto(handle: SocketHandle, datagram: &[u8], target: &Address) -> Result<usize, Error> {
    table().with_parts(handle, |_, base| udp::sendto(base, datagram, target, handle))?
}

/// Receive exactly one datagram, blocking if the socket is blocking and
/// none is available yet.
pub fn udp_socket_recvfrom(handle: SocketHandle) -> Result<(Vec<u8>, Address), Error> {
    table().with_parts(handle, |rec, base| {
        let (datagram, peer) = udp::recvfrom(base, handle)?;
        rec.udp_last_peer = Some(peer);
        Ok((datagram, peer))
    })?
}

/// A handle with which a single consumer drains lifecycle events in FIFO
/// order.
pub fn event_stream() -> EventStream {
    EventStream(())
}

/// Append an event manually (used by tests and by callers that need to
/// synthesize a transition the socket layer itself does not produce).
pub fn event_post(id: EventId, handle: SocketHandle) {
    event::post(id, handle);
}

/// The socket a drained [`Event`] occurred on.
pub fn event_socket(event: &Event) -> SocketHandle {
    event.object
}

/// A drain handle over the process-wide event bus.
#[derive(Debug, Clone, Copy)]
pub struct EventStream(());

impl EventStream {
    /// Pop the next queued event, if any. Clears that socket's coalescing
    /// marker so a subsequent `Data`/`Hangup` posts again rather than being
    /// suppressed as a duplicate of the one just drained.
    pub fn next(&self) -> Option<Event> {
        let event = event::next()?;
        let _ = table().with_parts(event.object, |_, base| event::clear_last_event(base));
        Some(event)
    }

    /// Drain all currently queued events in FIFO order, clearing each
    /// drained socket's coalescing marker as they go.
    pub fn drain(&self) -> Vec<Event> {
        let events = event::drain();
        for event in &events {
            let _ = table().with_parts(event.object, |_, base| event::clear_last_event(base));
        }
        events
    }
}
