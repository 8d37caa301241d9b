//! Plans and reports produced by the integrity maintenance jobs.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::doctor::DoctorId;
use super::image::ImageKind;
use super::index::IndexSpec;
use crate::constants::DEFAULT_FAILURE_THRESHOLD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    DedupeEmails,
    RepairImages,
    DropLegacyIndexes,
    RotateDefaultPasswords,
}

impl JobKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DedupeEmails => "dedupe-emails",
            Self::RepairImages => "repair-images",
            Self::DropLegacyIndexes => "drop-legacy-indexes",
            Self::RotateDefaultPasswords => "rotate-default-passwords",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Knobs shared by every maintenance job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceOptions {
    /// Compute and report the plan without writing.
    pub dry_run: bool,
    /// Suppress console lines; the returned report is unaffected.
    pub quiet: bool,
    /// Per-record failures tolerated before the run aborts.
    pub failure_threshold: usize,
}

impl Default for MaintenanceOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            quiet: false,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RecordOutcome {
    Fixed(String),
    Skipped(String),
    Failed(String),
}

impl fmt::Display for RecordOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(detail) => write!(f, "fixed: {detail}"),
            Self::Skipped(detail) => write!(f, "skipped: {detail}"),
            Self::Failed(detail) => write!(f, "FAILED: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReport {
    /// Email, index name or other human-readable handle for the console line.
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<DoctorId>,
    pub outcome: RecordOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub fixed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl JobSummary {
    pub(crate) fn count(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Fixed(_) => self.fixed += 1,
            RecordOutcome::Skipped(_) => self.skipped += 1,
            RecordOutcome::Failed(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fixed={} skipped={} failed={}",
            self.fixed, self.skipped, self.failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Nothing to repair.
    Clean,
    /// Dry run with anomalies found.
    PlanOnly,
    Repaired,
    /// Finished, but some records failed (within the threshold).
    Degraded,
    /// Failures exceeded the threshold; remaining actions were not attempted.
    Aborted,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::PlanOnly => "plan_only",
            Self::Repaired => "repaired",
            Self::Degraded => "degraded",
            Self::Aborted => "aborted",
        }
    }

    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport<P> {
    pub job: JobKind,
    pub status: JobStatus,
    pub plan: P,
    pub records: Vec<RecordReport>,
    pub summary: JobSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    pub duration_ms: u64,
}

/// Records sharing one email; all but `keep` are removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub email: String,
    pub keep: DoctorId,
    pub keep_created_at: DateTime<Utc>,
    pub remove: Vec<DoctorId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateEmailPlan {
    pub scanned: usize,
    pub groups: Vec<DuplicateGroup>,
}

impl DuplicateEmailPlan {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.groups.is_empty()
    }

    #[must_use]
    pub fn removals(&self) -> usize {
        self.groups.iter().map(|group| group.remove.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "fix", content = "value", rename_all = "snake_case")]
pub enum ImageFix {
    /// Referenced file is gone; the portal falls back to initials.
    Clear,
    /// File exists but the stored path is not the canonical bare file name.
    Normalize(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAction {
    pub doctor: DoctorId,
    pub email: String,
    pub current: String,
    pub fix: ImageFix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSkip {
    pub doctor: DoctorId,
    pub email: String,
    pub kind: ImageKind,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRepairPlan {
    pub uploads_dir: PathBuf,
    pub files_on_disk: usize,
    pub actions: Vec<ImageAction>,
    pub skipped: Vec<ImageSkip>,
}

impl ImageRepairPlan {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullFieldCleanup {
    pub doctor: DoctorId,
    pub email: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyIndexPlan {
    pub drop: Vec<IndexSpec>,
    pub cleanups: Vec<NullFieldCleanup>,
}

impl LegacyIndexPlan {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.drop.is_empty() && self.cleanups.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultPasswordMatch {
    pub doctor: DoctorId,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultPasswordPlan {
    pub scanned: usize,
    pub matches: Vec<DefaultPasswordMatch>,
    /// Records whose stored hash could not be checked, with the reason.
    pub unverifiable: Vec<(DoctorId, String)>,
}

impl DefaultPasswordPlan {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.matches.is_empty()
    }
}
