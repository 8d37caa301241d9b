//! Store layout constants and doctor record defaults.

/// Snapshot magic bytes (`HNX` + format generation).
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"HNX1";
/// Snapshot layout version.
pub const SNAPSHOT_VERSION: u16 = 0x0100;
/// Snapshot header: magic (4) + version (2) + reserved (2) + checksum (32) + payload length (8).
pub const SNAPSHOT_HEADER_SIZE: usize = 48;

/// File extension of the collection snapshot.
pub const SNAPSHOT_EXTENSION: &str = "hnx";
/// File extension of the write-ahead journal that sits next to the snapshot.
pub const JOURNAL_EXTENSION: &str = "hnx-journal";
/// File extension of the process lock file.
pub const LOCK_EXTENSION: &str = "lock";

/// Journal records appended before the snapshot is rewritten.
pub const DEFAULT_CHECKPOINT_PERIOD: u64 = 64;
/// Upper bound on a single journal payload.
pub const MAX_JOURNAL_PAYLOAD: usize = 16 * 1024 * 1024;

/// Database name used when `HEALTHNEXUS_DB` is not set.
pub const DEFAULT_DATABASE_NAME: &str = "healthnexus7";
/// Time allowed to acquire the store lock before giving up.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;
/// Poll interval while waiting for the store lock.
pub const LOCK_POLL_INTERVAL_MS: u64 = 50;

/// bcrypt work factor applied to doctor credentials.
pub const DEFAULT_BCRYPT_COST: u32 = 10;
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;
/// Password assigned to doctors created without one.
pub const DEFAULT_DOCTOR_PASSWORD: &str = "doctor123";
/// Prefix of generated placeholder credentials.
pub const PLACEHOLDER_PASSWORD_PREFIX: &str = "hnx-";
/// Random bytes behind each placeholder credential.
pub const PLACEHOLDER_PASSWORD_BYTES: usize = 18;

pub const DEFAULT_CONSULTATION_FEE: f64 = 150.0;
pub const DEFAULT_AVAILABLE_TIME: &str = "9:00 AM - 5:00 PM";

/// Name of the implicit primary-key index.
pub const PRIMARY_INDEX_NAME: &str = "_id_";

/// Failures tolerated by a maintenance job before it aborts.
pub const DEFAULT_FAILURE_THRESHOLD: usize = 10;
/// Directory holding uploaded doctor images when none is configured.
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";
