//! Error taxonomy.
//!
//! The teacher crate surfaces `std::io::Result` directly throughout `net/`;
//! this crate's richer taxonomy mirrors the one spec.md's error handling
//! design calls for, and is implemented with `thiserror` the way the
//! `wasmtime`/`wasi-common` crates in the example pack structure their error
//! enums.

use std::io;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// The error taxonomy this crate surfaces internally.
///
/// Public entry points never propagate this type directly (see spec.md §7 —
/// "all I/O operations are total functions returning a well-defined
/// sentinel"); it exists so internal plumbing can use `?` and so the
/// sentinel-producing call sites have one place to decide how to log and
/// collapse each variant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The handle does not resolve to a live socket record.
    #[error("handle does not resolve to a live socket")]
    InvalidHandle,

    /// The operation is not valid given the socket's current state.
    #[error("operation not valid in current socket state")]
    InvalidState,

    /// The address text could not be parsed.
    #[error("malformed address: {0}")]
    InvalidAddress(String),

    /// The socket table has no free slots.
    #[error("socket table exhausted")]
    OutOfSlots,

    /// A system call failed.
    #[error("system call failed: {0}")]
    SystemCall(#[from] io::Error),

    /// The operation would block and the socket is non-blocking.
    #[error("operation would block")]
    WouldBlock,

    /// A bounded wait (connect/accept) elapsed with no result.
    #[error("operation timed out")]
    Timeout,

    /// A datagram exceeded what a single `sendto` could transmit.
    #[error("datagram of {attempted} bytes exceeds path MTU ({mtu} bytes)")]
    MessageTooLarge {
        /// Size of the datagram the caller attempted to send.
        attempted: usize,
        /// The MTU-derived limit that rejected it.
        mtu: usize,
    },

    /// The peer reset the connection.
    #[error("connection reset by peer")]
    ConnectionReset,

    /// Name resolution returned zero addresses.
    #[error("name resolution returned no results for {0}")]
    ResolveFailure(String),
}

impl Error {
    /// Classify a raw `io::Error` the way spec.md §7's policy requires:
    /// transient errors become [`Error::WouldBlock`], a reset becomes
    /// [`Error::ConnectionReset`], everything else is a [`Error::SystemCall`].
    pub(crate) fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock => Error::WouldBlock,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Error::ConnectionReset,
            io::ErrorKind::TimedOut => Error::Timeout,
            _ => Error::SystemCall(err),
        }
    }
}
