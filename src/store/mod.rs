//! Durable doctor record store.
//!
//! A store lives in a data directory as three files named after the database:
//! - `<db>.hnx`: checksummed snapshot of every record and index definition.
//! - `<db>.hnx-journal`: mutations appended since that snapshot.
//! - `<db>.lock`: held exclusively while a handle is open.
//!
//! Writes pass through the registered hooks, then validation and unique-index checks, and are
//! journaled before the in-memory state changes. A rejected write leaves no trace on disk.

mod hooks;
mod indexes;
mod lifecycle;
mod mutation;
mod query;

use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use hooks::{PendingWrite, WriteHook, WriteKind};
pub use mutation::UpdateResult;

use crate::config::StoreConfig;
use crate::io::Journal;
use crate::types::{Doctor, DoctorId, IndexSpec};
use indexes::IndexCatalog;

/// One journaled mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum JournalOp {
    Upsert { doctor: Box<Doctor> },
    Delete { id: DoctorId },
    CreateIndex { spec: IndexSpec },
    DropIndex { name: String },
}

/// Handle to an open doctor collection.
///
/// The handle owns the store lock; a second `open` of the same database fails (after the
/// configured connect timeout) until this one is closed or dropped.
pub struct DoctorStore {
    config: StoreConfig,
    snapshot_path: PathBuf,
    journal: Journal,
    _lock: File,
    doctors: BTreeMap<DoctorId, Doctor>,
    indexes: IndexCatalog,
    hooks: Vec<Box<dyn WriteHook>>,
}

impl std::fmt::Debug for DoctorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoctorStore")
            .field("database", &self.config.database)
            .field("snapshot", &self.snapshot_path)
            .field("doctors", &self.doctors.len())
            .field(
                "hooks",
                &self.hooks.iter().map(|hook| hook.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}
