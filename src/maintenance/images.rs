//! Orphaned-image repair.
//!
//! File references whose file is gone from the uploads directory are cleared, and references
//! that resolve but are not stored as the bare file name are normalized. Inline payloads, absent
//! images and values that look like neither (remote URLs, free text) are left alone.

use std::collections::BTreeSet;
use std::path::Path;

use super::JobRun;
use crate::error::{HealthNexusError, Result};
use crate::store::DoctorStore;
use crate::types::{
    DoctorPatch, ImageAction, ImageFix, ImageRef, ImageRepairPlan, ImageSkip, JobKind,
    JobReport, MaintenanceOptions, RecordOutcome,
};

/// Fails before looking at any record when `uploads_dir` is not a readable directory.
pub fn plan(store: &DoctorStore, uploads_dir: &Path) -> Result<ImageRepairPlan> {
    let files = list_uploads(uploads_dir)?;
    let mut actions = Vec::new();
    let mut skipped = Vec::new();

    for doctor in store.iter() {
        let image = ImageRef::classify(doctor.image.as_deref());
        let reason = match image {
            ImageRef::File { stored, file_name } => {
                let fix = if !files.contains(file_name) {
                    ImageFix::Clear
                } else if stored != file_name {
                    ImageFix::Normalize(file_name.to_string())
                } else {
                    continue;
                };
                actions.push(ImageAction {
                    doctor: doctor.id,
                    email: doctor.email.clone(),
                    current: stored.to_string(),
                    fix,
                });
                continue;
            }
            ImageRef::Absent => "no image",
            ImageRef::Inline => "inline image",
            ImageRef::Unknown(_) => "unrecognized image value",
        };
        skipped.push(ImageSkip {
            doctor: doctor.id,
            email: doctor.email.clone(),
            kind: image.kind(),
            reason: reason.to_string(),
        });
    }

    Ok(ImageRepairPlan {
        uploads_dir: uploads_dir.to_path_buf(),
        files_on_disk: files.len(),
        actions,
        skipped,
    })
}

pub fn apply(
    store: &mut DoctorStore,
    plan: ImageRepairPlan,
    options: &MaintenanceOptions,
) -> Result<JobReport<ImageRepairPlan>> {
    let mut run = JobRun::start(JobKind::RepairImages, options);
    if options.dry_run {
        let noop = plan.is_noop();
        return Ok(run.plan_only(plan, noop));
    }

    for skip in &plan.skipped {
        let outcome = RecordOutcome::Skipped(skip.reason.clone());
        if run
            .record(skip.email.as_str(), Some(skip.doctor), outcome)
            .is_break()
        {
            return Ok(run.finish(plan));
        }
    }

    for action in &plan.actions {
        let unchanged = store
            .get(action.doctor)
            .is_some_and(|doctor| doctor.image.as_deref() == Some(action.current.as_str()));
        let outcome = if unchanged {
            let (patch, done) = match &action.fix {
                ImageFix::Clear => (
                    DoctorPatch::new().image(None),
                    format!("cleared missing {}", action.current),
                ),
                ImageFix::Normalize(name) => (
                    DoctorPatch::new().image(Some(name.clone())),
                    format!("normalized {} -> {name}", action.current),
                ),
            };
            match store.update(action.doctor, patch) {
                Ok(_) => RecordOutcome::Fixed(done),
                Err(err) => RecordOutcome::Failed(err.to_string()),
            }
        } else if store.get(action.doctor).is_none() {
            RecordOutcome::Skipped("record no longer exists".to_string())
        } else {
            RecordOutcome::Skipped("image changed since plan".to_string())
        };
        if run
            .record(action.email.as_str(), Some(action.doctor), outcome)
            .is_break()
        {
            break;
        }
    }
    Ok(run.finish(plan))
}

pub fn run(
    store: &mut DoctorStore,
    uploads_dir: &Path,
    options: &MaintenanceOptions,
) -> Result<JobReport<ImageRepairPlan>> {
    let plan = plan(store, uploads_dir)?;
    apply(store, plan, options)
}

fn list_uploads(dir: &Path) -> Result<BTreeSet<String>> {
    if !dir.is_dir() {
        return Err(HealthNexusError::Maintenance {
            job: JobKind::RepairImages.to_string(),
            reason: format!("uploads directory {} does not exist", dir.display()),
        });
    }
    let mut files = BTreeSet::new();
    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        // Follows symlinks: a link to an existing file is a present upload.
        if entry.path().is_file() {
            files.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(files)
}
