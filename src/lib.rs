#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::float_cmp
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Project-wide lint exceptions:
//
// Documentation lints: internal helpers are self-describing; public APIs still carry docs.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Casts are bounded by record and file sizes well below the target widths.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_lossless)]
//
// Pattern matching: these pedantic lints often suggest changes that reduce clarity.
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
//
// Builders take owned values and return `Self`.
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::unnecessary_wraps)]

/// The healthnexus-core crate version (matches `Cargo.toml`).
pub const HEALTHNEXUS_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod maintenance;
pub mod password;
pub mod store;
pub mod types;

pub use config::StoreConfig;
pub use error::{HealthNexusError, Result};
pub use maintenance::{IssuedCredential, PasswordRotation};
pub use password::{PasswordGuard, generate_placeholder, hash_password, is_password_hash, verify_password};
pub use store::{DoctorStore, PendingWrite, UpdateResult, WriteHook, WriteKind};
pub use types::{
    DOCTOR_SCHEMA_FIELDS, DefaultPasswordMatch, DefaultPasswordPlan, Doctor, DoctorFilter,
    DoctorId, DoctorPatch, DoctorStatus, DuplicateEmailPlan, DuplicateGroup, ImageAction,
    ImageFix, ImageKind, ImageRef, ImageRepairPlan, ImageSkip, IndexDirection, IndexDrift, IndexKey,
    IndexSpec, JobKind, JobReport, JobStatus, JobSummary, LegacyIndexPlan, MaintenanceOptions,
    NewDoctor, NullFieldCleanup, QueryPlan, RecordOutcome, RecordReport, Weekday,
    is_policy_index, is_schema_field, policy_indexes,
};
