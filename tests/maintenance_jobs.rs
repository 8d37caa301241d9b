//! End-to-end runs of the integrity maintenance jobs against a scratch store.

mod common;

use std::collections::BTreeSet;

use healthnexus_core::constants::DEFAULT_DOCTOR_PASSWORD;
use healthnexus_core::maintenance::{duplicates, images, legacy_indexes, passwords};
use healthnexus_core::{
    DoctorFilter, DoctorPatch, HealthNexusError, ImageFix, IndexSpec, JobStatus,
    MaintenanceOptions, PendingWrite, RecordOutcome, WriteHook, policy_indexes, verify_password,
};
use serde_json::Value;
use tempfile::TempDir;

use common::{days_ago, legacy_record, new_doctor, open};

fn quiet() -> MaintenanceOptions {
    MaintenanceOptions {
        quiet: true,
        ..MaintenanceOptions::default()
    }
}

fn dry_run() -> MaintenanceOptions {
    MaintenanceOptions {
        dry_run: true,
        ..quiet()
    }
}

// ---------------------------------------------------------------------------
// Duplicate-email resolution
// ---------------------------------------------------------------------------

#[test]
fn dedupe_keeps_latest_and_converges() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    // Legacy data predates the unique email index.
    store.drop_index("email_1").unwrap();

    let older = store
        .import(legacy_record("x@y.com", "+1-555-0001", days_ago(20)))
        .unwrap();
    let newer = store
        .import(legacy_record("x@y.com", "+1-555-0002", days_ago(2)))
        .unwrap();
    let oldest = store
        .import(legacy_record("x@y.com", "+1-555-0003", days_ago(90)))
        .unwrap();
    let single = store
        .import(legacy_record("solo@y.com", "+1-555-0004", days_ago(5)))
        .unwrap();

    let plan = duplicates::plan(&store).unwrap();
    assert_eq!(plan.scanned, 4);
    assert_eq!(plan.groups.len(), 1);
    let group = &plan.groups[0];
    assert_eq!(group.email, "x@y.com");
    assert_eq!(group.keep, newer.id);
    assert_eq!(
        group.remove.iter().copied().collect::<BTreeSet<_>>(),
        BTreeSet::from([older.id, oldest.id])
    );

    let report = duplicates::apply(&mut store, plan, &quiet()).unwrap();
    assert_eq!(report.status, JobStatus::Repaired);
    assert_eq!(report.summary.fixed, 2);
    assert!(store.get(newer.id).is_some());
    assert!(store.get(older.id).is_none());
    assert!(store.get(oldest.id).is_none());
    assert!(store.get(single.id).is_some());
    assert!(!report.notes.is_empty(), "missing email_1 is reported");

    let snapshot: Vec<_> = store.iter().cloned().collect();
    let second = duplicates::run(&mut store, &quiet()).unwrap();
    assert_eq!(second.status, JobStatus::Clean);
    assert_eq!(second.summary.fixed, 0);
    assert!(second.plan.is_noop());
    assert_eq!(store.iter().cloned().collect::<Vec<_>>(), snapshot);

    // With duplicates gone the unique index can be restored.
    assert_eq!(store.sync_indexes().unwrap(), vec!["email_1".to_string()]);
}

#[test]
fn dedupe_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    store.drop_index("email_1").unwrap();
    store
        .import(legacy_record("dup@y.com", "+1-555-0101", days_ago(3)))
        .unwrap();
    store
        .import(legacy_record("dup@y.com", "+1-555-0102", days_ago(1)))
        .unwrap();

    let report = duplicates::run(&mut store, &dry_run()).unwrap();
    assert_eq!(report.status, JobStatus::PlanOnly);
    assert_eq!(report.plan.removals(), 1);
    assert!(report.records.is_empty());
    assert_eq!(store.len(), 2);
}

// ---------------------------------------------------------------------------
// Orphaned-image repair
// ---------------------------------------------------------------------------

#[test]
fn image_repair_clears_missing_and_skips_inline() {
    let dir = TempDir::new().unwrap();
    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();
    std::fs::write(uploads.join("present.png"), b"png").unwrap();

    let mut store = open(&dir);
    let missing = store
        .insert(new_doctor(1).image("uploads/missing.png"))
        .unwrap();
    let inline = store
        .insert(new_doctor(2).image("data:image/png;base64,AAAA"))
        .unwrap();
    let prefixed = store
        .insert(new_doctor(3).image("uploads/present.png"))
        .unwrap();
    let healthy = store.insert(new_doctor(4).image("present.png")).unwrap();
    let remote = store
        .insert(new_doctor(5).image("https://cdn.example.com/p.png"))
        .unwrap();
    let absent = store.insert(new_doctor(6)).unwrap();

    let plan = images::plan(&store, &uploads).unwrap();
    assert_eq!(plan.files_on_disk, 1);
    assert_eq!(plan.actions.len(), 2);
    assert!(plan
        .actions
        .iter()
        .any(|action| action.doctor == missing.id && action.fix == ImageFix::Clear));
    assert!(plan.actions.iter().any(|action| action.doctor == prefixed.id
        && action.fix == ImageFix::Normalize("present.png".into())));

    let report = images::apply(&mut store, plan, &quiet()).unwrap();
    assert_eq!(report.status, JobStatus::Repaired);
    assert_eq!(report.summary.fixed, 2);
    assert_eq!(report.summary.skipped, 3);

    assert_eq!(store.get(missing.id).unwrap().image, None);
    assert_eq!(store.get(prefixed.id).unwrap().image.as_deref(), Some("present.png"));
    assert_eq!(store.get(inline.id).unwrap(), &inline);
    assert_eq!(store.get(healthy.id).unwrap(), &healthy);
    assert_eq!(store.get(remote.id).unwrap(), &remote);
    assert_eq!(store.get(absent.id).unwrap(), &absent);

    let inline_record = report
        .records
        .iter()
        .find(|record| record.doctor == Some(inline.id))
        .unwrap();
    assert_eq!(inline_record.outcome, RecordOutcome::Skipped("inline image".into()));

    let again = images::run(&mut store, &uploads, &quiet()).unwrap();
    assert_eq!(again.summary.fixed, 0);
    assert_eq!(again.status, JobStatus::Clean);
}

#[test]
fn image_repair_requires_uploads_directory() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let doctor = store
        .insert(new_doctor(1).image("uploads/missing.png"))
        .unwrap();

    let err = images::run(&mut store, &dir.path().join("nowhere"), &quiet()).unwrap_err();
    assert!(matches!(err, HealthNexusError::Maintenance { .. }));
    assert_eq!(store.get(doctor.id).unwrap(), &doctor);
}

#[cfg(unix)]
#[test]
fn image_repair_keeps_symlinked_uploads() {
    let dir = TempDir::new().unwrap();
    let uploads = dir.path().join("uploads");
    let originals = dir.path().join("originals");
    std::fs::create_dir_all(&uploads).unwrap();
    std::fs::create_dir_all(&originals).unwrap();
    std::fs::write(originals.join("face.png"), b"png").unwrap();
    std::os::unix::fs::symlink(originals.join("face.png"), uploads.join("face.png")).unwrap();
    std::os::unix::fs::symlink(originals.join("gone.png"), uploads.join("dangling.png")).unwrap();

    let mut store = open(&dir);
    let linked = store.insert(new_doctor(1).image("face.png")).unwrap();
    let dangling = store.insert(new_doctor(2).image("dangling.png")).unwrap();

    let report = images::run(&mut store, &uploads, &quiet()).unwrap();
    assert_eq!(report.plan.files_on_disk, 1);
    assert_eq!(report.summary.fixed, 1);
    assert_eq!(store.get(linked.id).unwrap().image.as_deref(), Some("face.png"));
    assert_eq!(store.get(dangling.id).unwrap().image, None);
}

/// Rejects every partial update, to exercise per-record failure handling.
struct FrozenRecords;

impl WriteHook for FrozenRecords {
    fn name(&self) -> &'static str {
        "frozen"
    }

    fn before_write(&self, write: &mut PendingWrite<'_>) -> healthnexus_core::Result<()> {
        match write {
            PendingWrite::Patch(_) => Err(HealthNexusError::HookRejected {
                hook: self.name().into(),
                reason: "records are frozen".into(),
            }),
            PendingWrite::Document { .. } => Ok(()),
        }
    }
}

#[test]
fn failures_are_folded_until_threshold() {
    let dir = TempDir::new().unwrap();
    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();

    let mut store = open(&dir);
    for n in 0..4 {
        store
            .insert(new_doctor(n).image(format!("uploads/gone-{n}.png")))
            .unwrap();
    }
    store.register_hook(Box::new(FrozenRecords));

    let tolerant = MaintenanceOptions {
        failure_threshold: 10,
        ..quiet()
    };
    let report = images::run(&mut store, &uploads, &tolerant).unwrap();
    assert_eq!(report.status, JobStatus::Degraded);
    assert_eq!(report.summary.failed, 4);
    assert!(!report.status.is_failure());

    let strict = MaintenanceOptions {
        failure_threshold: 1,
        ..quiet()
    };
    let report = images::run(&mut store, &uploads, &strict).unwrap();
    assert_eq!(report.status, JobStatus::Aborted);
    assert_eq!(report.summary.failed, 2);
    assert_eq!(report.records.len(), 2);
    assert!(report.status.is_failure());
}

// ---------------------------------------------------------------------------
// Legacy-index removal
// ---------------------------------------------------------------------------

#[test]
fn legacy_index_is_dropped_and_nulls_unset() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);

    let mut licensed = legacy_record("licensed@y.com", "+1-555-0201", days_ago(10));
    licensed
        .extra
        .insert("licenseNumber".into(), Value::from("LIC-1"));
    let mut unlicensed = legacy_record("unlicensed@y.com", "+1-555-0202", days_ago(9));
    unlicensed.extra.insert("licenseNumber".into(), Value::Null);
    store.import(licensed).unwrap();
    let unlicensed = store.import(unlicensed).unwrap();
    assert!(store
        .create_index(IndexSpec::ascending("licenseNumber").unique())
        .unwrap());

    // The legacy index blocks any new doctor without a license number.
    let err = store.insert(new_doctor(1)).unwrap_err();
    assert!(matches!(err, HealthNexusError::DuplicateKey { ref index, .. } if index == "licenseNumber_1"));

    let report = legacy_indexes::run(&mut store, &quiet()).unwrap();
    assert_eq!(report.status, JobStatus::Repaired);
    assert_eq!(
        report.plan.drop.iter().map(|spec| spec.name.as_str()).collect::<Vec<_>>(),
        vec!["licenseNumber_1"]
    );
    assert_eq!(report.plan.cleanups.len(), 1);
    assert_eq!(report.summary.fixed, 2);

    assert!(!store.has_index("licenseNumber_1"));
    for policy in policy_indexes() {
        assert!(store.has_index(&policy.name), "{} was dropped", policy.name);
    }
    assert!(!store
        .get(unlicensed.id)
        .unwrap()
        .extra
        .contains_key("licenseNumber"));
    store.insert(new_doctor(1)).unwrap();

    let again = legacy_indexes::run(&mut store, &quiet()).unwrap();
    assert_eq!(again.status, JobStatus::Clean);
    assert!(again.plan.is_noop());
    assert!(again.records.is_empty());
}

// ---------------------------------------------------------------------------
// Default-password de-collision
// ---------------------------------------------------------------------------

#[test]
fn default_passwords_become_distinct() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let n = 5;
    for i in 0..n {
        store.insert(new_doctor(i)).unwrap();
    }
    let custom = store
        .insert(new_doctor(99).password("my-own-secret"))
        .unwrap();

    let preview = passwords::run(&mut store, &dry_run()).unwrap();
    assert_eq!(preview.report.status, JobStatus::PlanOnly);
    assert_eq!(preview.report.plan.matches.len(), n);
    assert!(preview.issued.is_empty());

    let rotation = passwords::run(&mut store, &quiet()).unwrap();
    assert_eq!(rotation.report.status, JobStatus::Repaired);
    assert_eq!(rotation.report.summary.fixed, n);
    assert_eq!(rotation.issued.len(), n);

    let hashes: BTreeSet<String> = store
        .find(&DoctorFilter::all().specialty("General Medicine"))
        .into_iter()
        .map(|doctor| doctor.password.clone())
        .collect();
    assert_eq!(hashes.len(), n + 1);

    for credential in &rotation.issued {
        let doctor = store.get(credential.doctor).unwrap();
        assert!(!verify_password(DEFAULT_DOCTOR_PASSWORD, &doctor.password).unwrap());
        assert!(store
            .authenticate(&credential.email, &credential.password)
            .unwrap()
            .is_some());
        assert!(!format!("{credential:?}").contains(&credential.password));
    }
    assert_eq!(store.get(custom.id).unwrap(), &custom);

    let again = passwords::run(&mut store, &quiet()).unwrap();
    assert!(again.report.plan.matches.is_empty());
    assert_eq!(again.report.status, JobStatus::Clean);
}

#[test]
fn rotation_skips_records_changed_since_plan() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let doctor = store.insert(new_doctor(1)).unwrap();

    let plan = passwords::plan(&store).unwrap();
    store
        .update(doctor.id, DoctorPatch::new().password("changed-meanwhile"))
        .unwrap();

    let rotation = passwords::apply(&mut store, plan, &quiet()).unwrap();
    assert!(rotation.issued.is_empty());
    assert_eq!(rotation.report.summary.skipped, 1);
    assert!(store
        .authenticate("doctor1@healthnexus.test", "changed-meanwhile")
        .unwrap()
        .is_some());
}
