//! Default-password de-collision.
//!
//! Every record whose hash still verifies against the shared default password gets its own
//! random placeholder, written through the store so the hashing guard stores only the hash.
//! The plaintext placeholders are handed back to the caller, never logged.

use std::fmt;

use serde::Serialize;

use super::JobRun;
use crate::constants::DEFAULT_DOCTOR_PASSWORD;
use crate::error::Result;
use crate::password::{generate_placeholder, verify_password};
use crate::store::DoctorStore;
use crate::types::{
    DefaultPasswordMatch, DefaultPasswordPlan, DoctorId, DoctorPatch, JobKind, JobReport,
    MaintenanceOptions, RecordOutcome,
};

/// A placeholder credential issued to one doctor.
#[derive(Clone, Serialize)]
pub struct IssuedCredential {
    pub doctor: DoctorId,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("doctor", &self.doctor)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
pub struct PasswordRotation {
    pub report: JobReport<DefaultPasswordPlan>,
    /// Credentials issued by this run; empty on a dry run.
    pub issued: Vec<IssuedCredential>,
}

pub fn plan(store: &DoctorStore) -> Result<DefaultPasswordPlan> {
    let mut plan = DefaultPasswordPlan {
        scanned: store.len(),
        ..DefaultPasswordPlan::default()
    };
    for doctor in store.iter() {
        match verify_password(DEFAULT_DOCTOR_PASSWORD, &doctor.password) {
            Ok(true) => plan.matches.push(DefaultPasswordMatch {
                doctor: doctor.id,
                email: doctor.email.clone(),
            }),
            Ok(false) => {}
            Err(err) => plan.unverifiable.push((doctor.id, err.to_string())),
        }
    }
    Ok(plan)
}

pub fn apply(
    store: &mut DoctorStore,
    plan: DefaultPasswordPlan,
    options: &MaintenanceOptions,
) -> Result<PasswordRotation> {
    let mut run = JobRun::start(JobKind::RotateDefaultPasswords, options);
    let mut issued = Vec::new();
    if options.dry_run {
        let noop = plan.is_noop();
        return Ok(PasswordRotation {
            report: run.plan_only(plan, noop),
            issued,
        });
    }

    for (doctor, reason) in &plan.unverifiable {
        let outcome = RecordOutcome::Skipped(format!("hash not verifiable: {reason}"));
        if run.record(doctor.to_string(), Some(*doctor), outcome).is_break() {
            return Ok(PasswordRotation {
                report: run.finish(plan),
                issued,
            });
        }
    }

    for candidate in &plan.matches {
        let outcome = match rotate(store, candidate) {
            Ok(Some(credential)) => {
                issued.push(credential);
                RecordOutcome::Fixed("placeholder credential issued".to_string())
            }
            Ok(None) => RecordOutcome::Skipped("no longer uses the default".to_string()),
            Err(err) => RecordOutcome::Failed(err.to_string()),
        };
        if run
            .record(candidate.email.as_str(), Some(candidate.doctor), outcome)
            .is_break()
        {
            break;
        }
    }

    Ok(PasswordRotation {
        report: run.finish(plan),
        issued,
    })
}

pub fn run(store: &mut DoctorStore, options: &MaintenanceOptions) -> Result<PasswordRotation> {
    let plan = plan(store)?;
    apply(store, plan, options)
}

/// Re-check the record and replace its password. `None` when it no longer matches.
fn rotate(
    store: &mut DoctorStore,
    candidate: &DefaultPasswordMatch,
) -> Result<Option<IssuedCredential>> {
    let Some(doctor) = store.get(candidate.doctor) else {
        return Ok(None);
    };
    if !verify_password(DEFAULT_DOCTOR_PASSWORD, &doctor.password)? {
        return Ok(None);
    }

    let placeholder = generate_placeholder();
    let updated = store.update(
        candidate.doctor,
        DoctorPatch::new().password(placeholder.clone()),
    )?;
    Ok(Some(IssuedCredential {
        doctor: updated.id,
        email: updated.email,
        password: placeholder,
    }))
}
