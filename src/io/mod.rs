//! On-disk layout of a doctor store: a checksummed snapshot plus a write-ahead journal.

pub mod journal;
pub mod snapshot;

pub use journal::{Journal, JournalRecord, JournalStats};
pub use snapshot::{SnapshotState, read_snapshot, write_snapshot};
