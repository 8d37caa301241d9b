//! Public types exposed by the `healthnexus-core` crate.

pub mod doctor;
pub mod filter;
pub mod image;
pub mod index;
pub mod maintenance;
pub mod patch;

pub use doctor::{
    DOCTOR_SCHEMA_FIELDS, Doctor, DoctorId, DoctorStatus, NewDoctor, Weekday, is_schema_field,
};
pub use filter::{DoctorFilter, QueryPlan};
pub use image::{ImageKind, ImageRef};
pub use index::{IndexDirection, IndexDrift, IndexKey, IndexSpec, is_policy_index, policy_indexes};
pub use maintenance::{
    DefaultPasswordMatch, DefaultPasswordPlan, DuplicateEmailPlan, DuplicateGroup, ImageAction,
    ImageFix, ImageRepairPlan, ImageSkip, JobKind, JobReport, JobStatus, JobSummary,
    LegacyIndexPlan, MaintenanceOptions, NullFieldCleanup, RecordOutcome, RecordReport,
};
pub use patch::DoctorPatch;
