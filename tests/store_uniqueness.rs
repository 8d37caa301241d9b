//! Email and phone uniqueness, enforced at write time and preserved across restarts.

mod common;

use std::collections::BTreeSet;

use healthnexus_core::{
    DoctorFilter, DoctorPatch, DoctorStore, HealthNexusError, IndexSpec, NewDoctor,
};
use tempfile::TempDir;

use common::{config, days_ago, legacy_record, new_doctor, open};

fn assert_unique(store: &DoctorStore) {
    let mut emails = BTreeSet::new();
    let mut phones = BTreeSet::new();
    for doctor in store.iter() {
        assert!(emails.insert(doctor.email.clone()), "duplicate email {}", doctor.email);
        assert!(phones.insert(doctor.phone.clone()), "duplicate phone {}", doctor.phone);
    }
}

#[test]
fn random_writes_never_break_uniqueness() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    fastrand::seed(7);

    let mut rejected = 0;
    for n in 0..60 {
        // Small pools force collisions on both keys.
        let email = format!("Doc{}@HealthNexus.test", fastrand::usize(0..15));
        let phone = format!("+1-555-{:04}", fastrand::usize(0..15));
        let candidate = NewDoctor::new(format!("Dr. {n}"), email, phone, "Pediatrics");
        match store.insert(candidate) {
            Ok(_) => {}
            Err(err) => {
                assert!(err.is_duplicate_key(), "unexpected error: {err}");
                assert!(!err.is_retryable());
                rejected += 1;
            }
        }
    }
    assert!(rejected > 0);
    assert_eq!(store.len() + rejected, 60);
    assert_unique(&store);

    store.close().unwrap();
    let store = open(&dir);
    assert_unique(&store);
}

#[test]
fn emails_compare_after_normalization() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let mut first = new_doctor(1);
    first.email = "X@Y.com".into();
    store.insert(first).unwrap();

    let mut second = new_doctor(2);
    second.email = "  x@y.COM ".into();
    let err = store.insert(second).unwrap_err();
    assert!(matches!(err, HealthNexusError::DuplicateKey { ref index, .. } if index == "email_1"));
}

#[test]
fn updates_cannot_steal_keys() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let a = store.insert(new_doctor(1)).unwrap();
    let b = store.insert(new_doctor(2)).unwrap();

    let err = store
        .update(b.id, DoctorPatch::new().phone(a.phone.clone()))
        .unwrap_err();
    assert!(matches!(err, HealthNexusError::DuplicateKey { ref index, .. } if index == "phone_1"));

    let mut stolen = b.clone();
    stolen.email = a.email.clone();
    assert!(store.replace(stolen).unwrap_err().is_duplicate_key());

    // Rejected writes leave the record as it was.
    assert_eq!(store.get(b.id).unwrap(), &b);

    // A record may keep its own keys.
    let renamed = store
        .update(a.id, DoctorPatch::new().email(a.email.to_uppercase()))
        .unwrap();
    assert_eq!(renamed.email, a.email);
}

#[test]
fn import_rejects_known_ids_and_keeps_timestamps() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let record = legacy_record("old@healthnexus.test", "+1-555-7000", days_ago(400));
    let imported = store.import(record.clone()).unwrap();
    assert_eq!(imported.created_at, record.created_at);
    assert_eq!(imported.id, record.id);

    let mut again = record.clone();
    again.email = "other@healthnexus.test".into();
    again.phone = "+1-555-7001".into();
    let err = store.import(again).unwrap_err();
    assert!(matches!(err, HealthNexusError::DuplicateKey { ref index, .. } if index == "_id_"));
}

#[test]
fn unique_index_cannot_be_built_over_duplicates() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    assert!(store.drop_index("email_1").unwrap());
    store
        .import(legacy_record("dup@healthnexus.test", "+1-555-1001", days_ago(3)))
        .unwrap();
    store
        .import(legacy_record("dup@healthnexus.test", "+1-555-1002", days_ago(1)))
        .unwrap();

    let err = store.sync_indexes().unwrap_err();
    assert!(err.is_duplicate_key());
    assert!(!store.has_index("email_1"));

    let err = store.drop_index("_id_").unwrap_err();
    assert!(matches!(err, HealthNexusError::Index { .. }));
    assert!(!store.drop_index("email_1").unwrap());
}

#[test]
fn create_index_is_idempotent_but_checks_shape() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    assert!(!store.create_index(IndexSpec::ascending("email").unique()).unwrap());
    let err = store.create_index(IndexSpec::ascending("email")).unwrap_err();
    assert!(matches!(err, HealthNexusError::Index { .. }));
    assert!(store.sync_indexes().unwrap().is_empty());
}

#[test]
fn sync_refuses_policy_names_with_the_wrong_shape() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    assert!(store.index_drift().is_clean());

    store.drop_index("email_1").unwrap();
    store.drop_index("phone_1").unwrap();
    // Same name as the policy index, but not unique.
    store.create_index(IndexSpec::ascending("email")).unwrap();

    let drift = store.index_drift();
    assert_eq!(drift.missing.len(), 1);
    assert_eq!(drift.missing[0].name, "phone_1");
    assert_eq!(drift.conflicting.len(), 1);
    assert!(!drift.conflicting[0].unique);

    let err = store.sync_indexes().unwrap_err();
    assert!(matches!(err, HealthNexusError::Index { .. }));
    assert!(!store.has_index("phone_1"));

    store.drop_index("email_1").unwrap();
    let created = store.sync_indexes().unwrap();
    assert_eq!(created, vec!["email_1".to_string(), "phone_1".to_string()]);
    assert!(store.index_drift().is_clean());
}

#[test]
fn store_lock_times_out() {
    let dir = TempDir::new().unwrap();
    let _held = open(&dir);
    let started = std::time::Instant::now();
    let err = DoctorStore::open(&config(&dir).with_connect_timeout_ms(120)).unwrap_err();
    assert!(matches!(err, HealthNexusError::Lock { .. }));
    assert!(started.elapsed().as_millis() >= 120);
}

#[test]
fn writes_survive_a_crash_before_checkpoint() {
    let dir = TempDir::new().unwrap();
    let ids: Vec<_> = {
        let mut store = open(&dir);
        let ids = (0..5)
            .map(|n| store.insert(new_doctor(n)).unwrap().id)
            .collect();
        store
            .update_where(&DoctorFilter::all(), DoctorPatch::new().specialty("Oncology"))
            .unwrap();
        ids
        // Dropped without close: only the journal holds these writes.
    };

    let store = open(&dir);
    assert_eq!(store.len(), 5);
    for id in ids {
        assert_eq!(store.get(id).unwrap().specialty, "Oncology");
    }
    let (_, plan) = store.find_with_plan(&DoctorFilter::by_email("doctor3@healthnexus.test"));
    assert_eq!(plan.index.as_deref(), Some("email_1"));
    assert_eq!(plan.returned, 1);
}
