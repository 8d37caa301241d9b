//! Write path: insert, import, replace, partial updates and deletes.
//!
//! Every write goes through the same pipeline: write hooks, normalization, record validation,
//! unique-index checks, then a synced journal append. Only after the append succeeds does the
//! in-memory collection change.

use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::hooks::{PendingWrite, WriteKind};
use super::indexes::primary_index;
use super::{DoctorStore, JournalOp};
use crate::constants::DEFAULT_DOCTOR_PASSWORD;
use crate::error::{HealthNexusError, Result};
use crate::password::{is_password_hash, verify_password};
use crate::types::{Doctor, DoctorFilter, DoctorId, DoctorPatch, NewDoctor};

/// Outcome of `update_where`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub matched: usize,
    pub modified: usize,
}

impl DoctorStore {
    /// Register a new doctor. A missing or empty password falls back to the system default,
    /// which is hashed like any other credential.
    #[instrument(skip_all, fields(email = %new.email.trim()))]
    pub fn insert(&mut self, new: NewDoctor) -> Result<Doctor> {
        let mut doctor = new.into_doctor(DEFAULT_DOCTOR_PASSWORD, Utc::now());
        self.run_hooks(&mut PendingWrite::Document {
            kind: WriteKind::Insert,
            doctor: &mut doctor,
        })?;
        let doctor = self.commit(doctor)?;
        info!("doctor inserted: id={} email={}", doctor.id, doctor.email);
        Ok(doctor)
    }

    /// Store a fully formed record as is (id and timestamps included), e.g. when loading an
    /// export. The password still passes through the hooks.
    pub fn import(&mut self, mut doctor: Doctor) -> Result<Doctor> {
        if self.doctors.contains_key(&doctor.id) {
            return Err(HealthNexusError::DuplicateKey {
                index: primary_index().name,
                key: doctor.id.to_string(),
            });
        }
        self.run_hooks(&mut PendingWrite::Document {
            kind: WriteKind::Import,
            doctor: &mut doctor,
        })?;
        let doctor = self.commit(doctor)?;
        info!("doctor imported: id={} email={}", doctor.id, doctor.email);
        Ok(doctor)
    }

    /// Replace a whole record. `createdAt` is preserved and `updatedAt` refreshed.
    pub fn replace(&mut self, mut doctor: Doctor) -> Result<Doctor> {
        let existing = self
            .doctors
            .get(&doctor.id)
            .ok_or(HealthNexusError::NotFound { id: doctor.id })?;
        doctor.created_at = existing.created_at;
        doctor.updated_at = Utc::now();
        self.run_hooks(&mut PendingWrite::Document {
            kind: WriteKind::Replace,
            doctor: &mut doctor,
        })?;
        let doctor = self.commit(doctor)?;
        info!("doctor replaced: id={}", doctor.id);
        Ok(doctor)
    }

    /// Apply `patch` to one record and return the stored result.
    pub fn update(&mut self, id: DoctorId, mut patch: DoctorPatch) -> Result<Doctor> {
        if !self.doctors.contains_key(&id) {
            return Err(HealthNexusError::NotFound { id });
        }
        self.run_hooks(&mut PendingWrite::Patch(&mut patch))?;
        let doctor = self.patch_one(id, &patch)?.0;
        Ok(doctor)
    }

    /// Apply `patch` to every record matching `filter`.
    ///
    /// Records are written one at a time. An error stops the run; records already updated
    /// stay updated.
    pub fn update_where(&mut self, filter: &DoctorFilter, mut patch: DoctorPatch) -> Result<UpdateResult> {
        let ids: Vec<DoctorId> = self.find(filter).into_iter().map(|doctor| doctor.id).collect();
        let mut result = UpdateResult {
            matched: ids.len(),
            modified: 0,
        };
        if ids.is_empty() || patch.is_empty() {
            return Ok(result);
        }
        self.run_hooks(&mut PendingWrite::Patch(&mut patch))?;
        for id in ids {
            if self.patch_one(id, &patch)?.1 {
                result.modified += 1;
            }
        }
        info!(
            "doctors updated: matched={} modified={}",
            result.matched, result.modified
        );
        Ok(result)
    }

    /// Remove a record. Returns the removed record, or `None` when the id is unknown.
    pub fn delete(&mut self, id: DoctorId) -> Result<Option<Doctor>> {
        if !self.doctors.contains_key(&id) {
            return Ok(None);
        }
        self.persist(&JournalOp::Delete { id })?;
        let removed = self.doctors.remove(&id);
        if let Some(doctor) = &removed {
            self.indexes.remove(doctor);
            info!("doctor deleted: id={} email={}", doctor.id, doctor.email);
        }
        self.maybe_checkpoint();
        Ok(removed)
    }

    /// Look up a doctor by email and check the candidate password against the stored hash.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Option<&Doctor>> {
        let Some(doctor) = self.find_one(&DoctorFilter::by_email(email)) else {
            return Ok(None);
        };
        if verify_password(password, &doctor.password)? {
            Ok(Some(doctor))
        } else {
            Ok(None)
        }
    }

    fn run_hooks(&self, write: &mut PendingWrite<'_>) -> Result<()> {
        for hook in &self.hooks {
            if let Err(err) = hook.before_write(write) {
                tracing::warn!(
                    target: "healthnexus::store",
                    hook = hook.name(),
                    error = %err,
                    "write hook rejected write"
                );
                return Err(err);
            }
        }
        Ok(())
    }

    /// Returns the stored record and whether it changed.
    fn patch_one(&mut self, id: DoctorId, patch: &DoctorPatch) -> Result<(Doctor, bool)> {
        let current = self
            .doctors
            .get(&id)
            .ok_or(HealthNexusError::NotFound { id })?;
        let mut next = current.clone();
        patch.apply_to(&mut next)?;
        next.normalize();
        if &next == current {
            return Ok((next, false));
        }
        next.updated_at = Utc::now();
        let doctor = self.commit(next)?;
        tracing::debug!(target: "healthnexus::store", id = %doctor.id, "doctor patched");
        Ok((doctor, true))
    }

    fn commit(&mut self, mut doctor: Doctor) -> Result<Doctor> {
        doctor.normalize();
        doctor.validate()?;
        if !is_password_hash(&doctor.password) {
            return Err(HealthNexusError::validation(
                "password",
                "must be stored as a bcrypt hash",
            ));
        }
        self.indexes.check_unique(&doctor)?;

        self.persist(&JournalOp::Upsert {
            doctor: Box::new(doctor.clone()),
        })?;
        if let Some(previous) = self.doctors.insert(doctor.id, doctor.clone()) {
            self.indexes.remove(&previous);
        }
        self.indexes.insert(&doctor);
        self.maybe_checkpoint();
        Ok(doctor)
    }
}
