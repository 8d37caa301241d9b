//! Opening, checkpointing and closing a doctor store.
//!
//! Responsibilities:
//! - Take the exclusive store lock, polling until the connect timeout runs out.
//! - Load the snapshot and replay journal records newer than it.
//! - Seed a brand-new store with the policy indexes.
//! - Fold the journal back into the snapshot every `checkpoint_period` appends and on close.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use log::info;
use tracing::instrument;

use super::indexes::IndexCatalog;
use super::{DoctorStore, JournalOp, WriteHook};
use crate::config::StoreConfig;
use crate::constants::LOCK_POLL_INTERVAL_MS;
use crate::error::{HealthNexusError, Result};
use crate::io::{Journal, JournalRecord, JournalStats, SnapshotState, read_snapshot, write_snapshot};
use crate::password::PasswordGuard;
use crate::types::{Doctor, DoctorId, IndexSpec, policy_indexes};

impl DoctorStore {
    /// Open (creating if needed) the database named by `config`.
    #[instrument(skip_all, fields(database = %config.database))]
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let data_dir = config.data_dir()?;
        fs_err::create_dir_all(&data_dir)?;

        let lock = acquire_lock(&config.lock_path()?, config.connect_timeout_ms)?;
        let snapshot_path = config.snapshot_path()?;
        let snapshot = read_snapshot(&snapshot_path)?;
        let fresh = snapshot.is_none();
        let SnapshotState {
            sequence,
            indexes,
            doctors,
        } = snapshot.unwrap_or_default();

        let (journal, records) = Journal::open(&config.journal_path()?, sequence)?;
        let mut doctors: BTreeMap<DoctorId, Doctor> =
            doctors.into_iter().map(|doctor| (doctor.id, doctor)).collect();
        let mut specs = indexes;
        let replayed = replay(&records, sequence, &mut doctors, &mut specs)?;

        let seed = fresh && records.is_empty();
        if seed {
            specs = policy_indexes();
        }
        let catalog = IndexCatalog::rebuild(specs, doctors.values());

        let guard: Box<dyn WriteHook> = Box::new(PasswordGuard::new(config.bcrypt_cost));
        let mut store = Self {
            config: config.clone(),
            snapshot_path,
            journal,
            _lock: lock,
            doctors,
            indexes: catalog,
            hooks: vec![guard],
        };
        if seed {
            store.checkpoint()?;
        }

        info!(
            "store open: database={} doctors={} replayed={} sequence={}",
            store.config.database,
            store.doctors.len(),
            replayed,
            store.journal.last_sequence()
        );
        Ok(store)
    }

    /// Checkpoint outstanding journal records and release the lock.
    pub fn close(mut self) -> Result<()> {
        if self.journal.appends_since_checkpoint() > 0 {
            self.checkpoint()?;
        }
        info!("store closed: database={}", self.config.database);
        Ok(())
    }

    /// Write a fresh snapshot and truncate the journal.
    pub fn checkpoint(&mut self) -> Result<()> {
        let state = SnapshotState {
            sequence: self.journal.last_sequence(),
            indexes: self.indexes.specs(),
            doctors: self.doctors.values().cloned().collect(),
        };
        write_snapshot(&self.snapshot_path, &state)?;
        self.journal.reset()?;
        tracing::debug!(
            target: "healthnexus::store",
            sequence = state.sequence,
            doctors = state.doctors.len(),
            "checkpoint complete"
        );
        Ok(())
    }

    /// Register an additional write hook. Hooks run in registration order, after the
    /// password guard installed by `open`.
    pub fn register_hook(&mut self, hook: Box<dyn WriteHook>) {
        self.hooks.push(hook);
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[must_use]
    pub fn journal_stats(&self) -> JournalStats {
        self.journal.stats()
    }

    pub(crate) fn persist(&mut self, op: &JournalOp) -> Result<u64> {
        let payload = serde_json::to_vec(op)?;
        self.journal.append(&payload)
    }

    /// Checkpoint once enough appends have accumulated. A failure here leaves the journal
    /// intact, so the write that triggered it still stands.
    pub(crate) fn maybe_checkpoint(&mut self) {
        if self.journal.appends_since_checkpoint() < self.config.checkpoint_period {
            return;
        }
        if let Err(err) = self.checkpoint() {
            tracing::warn!(
                target: "healthnexus::store",
                error = %err,
                "checkpoint failed; journal retained"
            );
        }
    }
}

fn acquire_lock(path: &Path, timeout_ms: u64) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    let started = Instant::now();
    let contended = fs2::lock_contended_error().kind();
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(file),
            Err(err) if err.kind() == contended => {
                let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                if waited_ms >= timeout_ms {
                    return Err(HealthNexusError::Lock {
                        path: path.to_path_buf(),
                        waited_ms,
                    });
                }
                let remaining = timeout_ms - waited_ms;
                thread::sleep(Duration::from_millis(LOCK_POLL_INTERVAL_MS.min(remaining)));
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Apply journal records newer than the snapshot. Returns how many were applied.
fn replay(
    records: &[JournalRecord],
    snapshot_sequence: u64,
    doctors: &mut BTreeMap<DoctorId, Doctor>,
    specs: &mut Vec<IndexSpec>,
) -> Result<usize> {
    let mut applied = 0;
    for record in records.iter().filter(|record| record.sequence > snapshot_sequence) {
        let op: JournalOp =
            serde_json::from_slice(&record.payload).map_err(|err| HealthNexusError::CorruptJournal {
                offset: record.sequence,
                reason: format!("undecodable record: {err}"),
            })?;
        match op {
            JournalOp::Upsert { doctor } => {
                doctors.insert(doctor.id, *doctor);
            }
            JournalOp::Delete { id } => {
                doctors.remove(&id);
            }
            JournalOp::CreateIndex { spec } => {
                specs.retain(|existing| existing.name != spec.name);
                specs.push(spec);
            }
            JournalOp::DropIndex { name } => specs.retain(|existing| existing.name != name),
        }
        applied += 1;
    }
    Ok(applied)
}
