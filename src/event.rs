//! Process-wide socket lifecycle event bus.
//!
//! Grounded on spec.md §4.7 and `original_source/network/event.c`
//! (`network_event_initialize`, `network_event_post`, `network_event_stream`,
//! `network_event_finalize`). The original's "foundation event stream"
//! collaborator (an assumed lock-free MPSC primitive, spec.md §6) is
//! implemented here with `flume`, which the teacher crate already depends on
//! (`monoio`'s `sync` feature uses `flume` for exactly this cross-thread
//! MPSC role).

use std::sync::OnceLock;

use crate::base::BaseRecord;
use crate::config::Config;
use crate::handle::SocketHandle;

/// Kind of lifecycle transition carried by an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventId {
    /// A `connect` completed.
    Connect,
    /// A listener produced a new connection.
    Accept,
    /// Data became available to read.
    Data,
    /// The socket was closed or the peer hung up.
    Hangup,
}

/// One posted lifecycle transition.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    /// Which transition occurred.
    pub id: EventId,
    /// The socket it occurred on.
    pub object: SocketHandle,
}

struct Bus {
    tx: flume::Sender<Event>,
    rx: flume::Receiver<Event>,
    #[allow(dead_code)] // recorded for parity with the original's capacity hint; not enforced
    capacity_hint: usize,
}

static BUS: OnceLock<Bus> = OnceLock::new();

/// Initialize the event bus. Matches `network_event_initialize`: idempotent,
/// single-check, no lazy initialization on first use beyond this call.
pub(crate) fn initialize(config: &Config) {
    BUS.get_or_init(|| {
        let (tx, rx) = flume::unbounded();
        Bus {
            tx,
            rx,
            capacity_hint: config.event_stream_size,
        }
    });
}

/// Tear down the event bus, draining any unread events.
pub(crate) fn finalize() {
    if let Some(bus) = BUS.get() {
        while bus.rx.try_recv().is_ok() {}
    }
}

/// Append an event. A no-op if the bus has not been initialized.
pub fn post(id: EventId, handle: SocketHandle) {
    if let Some(bus) = BUS.get() {
        let _ = bus.tx.send(Event { id, object: handle });
        tracing::debug!(%handle, ?id, "posted event");
    }
}

/// Post `id`, suppressing a duplicate `Data`/`Hangup` when the same event id
/// was already posted for this socket with no intervening drain (spec.md
/// §4.7's `last_event` coalescing marker).
pub(crate) fn post_coalesced(base: &mut BaseRecord, id: EventId, handle: SocketHandle) {
    let suppress = matches!(id, EventId::Data | EventId::Hangup) && base.last_event == Some(id);
    base.last_event = Some(id);
    if !suppress {
        post(id, handle);
    }
}

/// Clear the coalescing marker (called once a drain has observed the event).
pub(crate) fn clear_last_event(base: &mut BaseRecord) {
    base.last_event = None;
}

/// Drain all currently queued events in FIFO order.
pub fn drain() -> Vec<Event> {
    match BUS.get() {
        Some(bus) => bus.rx.try_iter().collect(),
        None => Vec::new(),
    }
}

/// Pop the next queued event, if any.
pub fn next() -> Option<Event> {
    BUS.get().and_then(|bus| bus.rx.try_recv().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(i: u32) -> SocketHandle {
        SocketHandle {
            index: i,
            generation: 0,
        }
    }

    #[test]
    fn post_without_initialize_is_noop() {
        // Safe: this test never calls `initialize`, and `BUS` is process
        // global, so only assert the non-panicking contract rather than
        // draining (another test in this binary may have initialized it).
        post(EventId::Connect, h(999));
    }

    #[test]
    fn coalesces_duplicate_hangup() {
        let mut base = BaseRecord::default();
        initialize(&Config::default());
        post_coalesced(&mut base, EventId::Hangup, h(1));
        post_coalesced(&mut base, EventId::Hangup, h(1));
        assert_eq!(base.last_event, Some(EventId::Hangup));
    }
}
