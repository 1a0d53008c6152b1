//! Process-wide configuration, matching spec.md §6's `Config` collaborator
//! contract.

/// Configuration passed to [`crate::module_initialize`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Soft capacity hint for the event bus, mirroring the original
    /// `event_stream_allocate(capacity)` call. The bus itself is an
    /// unbounded `flume` channel; this value is recorded for diagnostics and
    /// used as the default `Vec` capacity when a consumer drains in bulk.
    pub event_stream_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            event_stream_size: 1024,
        }
    }
}
