//! Legacy-index removal.
//!
//! Drops every index outside the current policy (the primary `_id_` index is never touched),
//! then unsets the null-valued extra fields those indexes used to force onto records. Indexes
//! go first: a null left under a unique index would collide with every other absent value.

use super::JobRun;
use crate::constants::PRIMARY_INDEX_NAME;
use crate::error::{HealthNexusError, Result};
use crate::store::DoctorStore;
use crate::types::{
    DoctorPatch, JobKind, JobReport, LegacyIndexPlan, MaintenanceOptions, NullFieldCleanup,
    RecordOutcome, is_policy_index,
};

pub fn plan(store: &DoctorStore) -> Result<LegacyIndexPlan> {
    let legacy = store
        .list_indexes()
        .into_iter()
        .filter(|spec| spec.name != PRIMARY_INDEX_NAME && !is_policy_index(spec))
        .collect();

    let cleanups = store
        .iter()
        .filter_map(|doctor| {
            let fields: Vec<String> = doctor
                .extra
                .iter()
                .filter(|(_, value)| value.is_null())
                .map(|(field, _)| field.clone())
                .collect();
            (!fields.is_empty()).then(|| NullFieldCleanup {
                doctor: doctor.id,
                email: doctor.email.clone(),
                fields,
            })
        })
        .collect();

    Ok(LegacyIndexPlan {
        drop: legacy,
        cleanups,
    })
}

pub fn apply(
    store: &mut DoctorStore,
    plan: LegacyIndexPlan,
    options: &MaintenanceOptions,
) -> Result<JobReport<LegacyIndexPlan>> {
    let mut run = JobRun::start(JobKind::DropLegacyIndexes, options);
    if options.dry_run {
        let noop = plan.is_noop();
        return Ok(run.plan_only(plan, noop));
    }

    for spec in &plan.drop {
        let outcome = match store.drop_index(&spec.name) {
            Ok(true) => RecordOutcome::Fixed(format!("dropped {spec}")),
            Ok(false) => RecordOutcome::Skipped("already absent".to_string()),
            Err(err) => RecordOutcome::Failed(err.to_string()),
        };
        if run.record(spec.name.as_str(), None, outcome).is_break() {
            return Ok(run.finish(plan));
        }
    }

    for cleanup in &plan.cleanups {
        let patch = cleanup
            .fields
            .iter()
            .fold(DoctorPatch::new(), |patch, field| patch.unset_field(field.as_str()));
        let outcome = match store.update(cleanup.doctor, patch) {
            Ok(_) => RecordOutcome::Fixed(format!("unset {}", cleanup.fields.join(", "))),
            Err(HealthNexusError::NotFound { .. }) => {
                RecordOutcome::Skipped("record no longer exists".to_string())
            }
            Err(err) => RecordOutcome::Failed(err.to_string()),
        };
        if run
            .record(cleanup.email.as_str(), Some(cleanup.doctor), outcome)
            .is_break()
        {
            break;
        }
    }

    Ok(run.finish(plan))
}

pub fn run(
    store: &mut DoctorStore,
    options: &MaintenanceOptions,
) -> Result<JobReport<LegacyIndexPlan>> {
    let plan = plan(store)?;
    apply(store, plan, options)
}
