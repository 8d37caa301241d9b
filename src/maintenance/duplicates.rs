//! Duplicate-email resolution: keep the most recently created record per email, delete the rest.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use super::JobRun;
use crate::error::Result;
use crate::store::DoctorStore;
use crate::types::{
    Doctor, DuplicateEmailPlan, DuplicateGroup, JobKind, JobReport, MaintenanceOptions,
    RecordOutcome,
};

pub fn plan(store: &DoctorStore) -> Result<DuplicateEmailPlan> {
    let mut by_email: BTreeMap<&str, Vec<&Doctor>> = BTreeMap::new();
    for doctor in store.iter() {
        by_email.entry(doctor.email.as_str()).or_default().push(doctor);
    }

    let groups = by_email
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(email, mut members)| {
            // Latest createdAt wins; updatedAt then id break ties deterministically.
            members.sort_by_key(|doctor| {
                Reverse((doctor.created_at, doctor.updated_at, doctor.id))
            });
            let keep = members[0];
            DuplicateGroup {
                email: email.to_string(),
                keep: keep.id,
                keep_created_at: keep.created_at,
                remove: members[1..].iter().map(|doctor| doctor.id).collect(),
            }
        })
        .collect();

    Ok(DuplicateEmailPlan {
        scanned: store.len(),
        groups,
    })
}

pub fn apply(
    store: &mut DoctorStore,
    plan: DuplicateEmailPlan,
    options: &MaintenanceOptions,
) -> Result<JobReport<DuplicateEmailPlan>> {
    let mut run = JobRun::start(JobKind::DedupeEmails, options);
    if options.dry_run {
        for group in &plan.groups {
            run.note(format!(
                "{}: would keep {} and remove {} record(s)",
                group.email,
                group.keep,
                group.remove.len()
            ));
        }
        let noop = plan.is_noop();
        return Ok(run.plan_only(plan, noop));
    }

    'groups: for group in &plan.groups {
        // Never delete a group's duplicates unless the survivor is still there.
        if store.get(group.keep).is_none() {
            for id in &group.remove {
                let flow = run.record(
                    group.email.as_str(),
                    Some(*id),
                    RecordOutcome::Skipped(format!("kept record {} is gone; re-plan", group.keep)),
                );
                if flow.is_break() {
                    break 'groups;
                }
            }
            continue;
        }

        for id in &group.remove {
            let outcome = match store.delete(*id) {
                Ok(Some(_)) => RecordOutcome::Fixed(format!("removed, kept {}", group.keep)),
                Ok(None) => RecordOutcome::Skipped("already removed".to_string()),
                Err(err) => RecordOutcome::Failed(err.to_string()),
            };
            if run.record(group.email.as_str(), Some(*id), outcome).is_break() {
                break 'groups;
            }
        }
    }

    if !plan.is_noop() && !store.has_index("email_1") {
        run.note("email_1 is missing; run sync-indexes to enforce unique emails");
    }
    Ok(run.finish(plan))
}

pub fn run(
    store: &mut DoctorStore,
    options: &MaintenanceOptions,
) -> Result<JobReport<DuplicateEmailPlan>> {
    let plan = plan(store)?;
    apply(store, plan, options)
}
