//! The writer-side debug event notification, mirroring `dc_hash_tbl.h`'s
//! `enum dcht_event_e` and the `NOTIFY_CB` macro in `dc_hash_tbl.c`.
//!
//! The hook is delivered synchronously on the writer thread only, and must not mutate the table
//! it was called from — the borrow checker enforces the latter half of that contract, since the
//! hook only ever receives the bucket index and slot position, not a handle back into `Table`.

/// A writer-side event a caller-installed hook may observe.
///
/// These are purely informational; no operation's result depends on whether a hook is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// An insert filled the last vacancy of a bucket.
    BucketFull,
    /// Cuckoo relocation moved an entry to free a slot.
    MovedEntry,
    /// Insert placed a new key into a slot freed by cuckoo relocation.
    CuckooReplaced,
    /// An insert with `skip_update = false` overwrote the value of an existing key.
    UpdateValue,
}

/// A writer-installed callback observing [`Event`]s as they happen.
///
/// Install one through [`crate::Table::set_event_hook`]. Only ever invoked on the writer thread,
/// synchronously, with the bucket index and slot position the event occurred at. `Send + Sync`
/// so a `Table` carrying one stays shareable across threads the same way a bare `Table` is.
pub type EventHook = Box<dyn FnMut(Event, u32, usize) + Send + Sync + 'static>;
