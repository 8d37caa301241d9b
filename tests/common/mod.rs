//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use healthnexus_core::{
    Doctor, DoctorId, DoctorStatus, DoctorStore, NewDoctor, StoreConfig, Weekday,
};
use tempfile::TempDir;

/// Lowest bcrypt cost; keeps hashing fast in tests.
pub const TEST_COST: u32 = 4;

pub fn config(dir: &TempDir) -> StoreConfig {
    StoreConfig::new(dir.path().join("data").to_string_lossy(), "healthnexus7")
        .with_bcrypt_cost(TEST_COST)
        .with_connect_timeout_ms(0)
}

pub fn open(dir: &TempDir) -> DoctorStore {
    DoctorStore::open(&config(dir)).expect("open store")
}

pub fn new_doctor(n: usize) -> NewDoctor {
    NewDoctor::new(
        format!("Dr. Test {n}"),
        format!("doctor{n}@healthnexus.test"),
        format!("+1-555-{n:04}"),
        "General Medicine",
    )
}

/// A complete record as a legacy export would carry it; `password` is stored through the
/// hashing guard on import.
pub fn legacy_record(email: &str, phone: &str, created_at: DateTime<Utc>) -> Doctor {
    Doctor {
        id: DoctorId::new(),
        name: format!("Dr. {phone}"),
        email: email.to_string(),
        phone: phone.to_string(),
        password: "legacy-pass".to_string(),
        qualification: "MBBS".to_string(),
        experience: "5 years".to_string(),
        specialty: "Cardiology".to_string(),
        gender: None,
        address: None,
        bio: None,
        image: None,
        consultation_fee: 150.0,
        available_days: Weekday::WORKWEEK.into_iter().collect(),
        available_time: "9:00 AM - 5:00 PM".to_string(),
        status: DoctorStatus::Active,
        created_at,
        updated_at: created_at,
        extra: BTreeMap::new(),
    }
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}
