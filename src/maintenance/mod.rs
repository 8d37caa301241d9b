//! Integrity maintenance jobs.
//!
//! Each job splits into a read-only `plan` over the current collection and an `apply` that
//! walks the plan one record at a time. `apply` folds every record into a `RecordOutcome`, so a
//! single bad record does not stop the run; only when failures exceed
//! `MaintenanceOptions::failure_threshold` does the job abort, leaving the rest untouched.
//! All jobs are safe to re-run: a second run plans against what the first one left behind.

use std::cell::Cell;
use std::ops::ControlFlow;
use std::time::Instant;

use crate::types::{
    DoctorId, JobKind, JobReport, JobStatus, JobSummary, MaintenanceOptions, RecordOutcome,
    RecordReport,
};

thread_local! {
    static MAINTENANCE_QUIET: Cell<bool> = const { Cell::new(false) };
}

fn set_maintenance_quiet(quiet: bool) {
    MAINTENANCE_QUIET.with(|q| q.set(quiet));
}

pub(crate) fn is_maintenance_quiet() -> bool {
    MAINTENANCE_QUIET.with(Cell::get)
}

/// Per-record console line, suppressed in quiet mode.
macro_rules! maintenance_log {
    ($($arg:tt)*) => {
        if !$crate::maintenance::is_maintenance_quiet() {
            println!($($arg)*);
        }
    };
}

pub mod duplicates;
pub mod images;
pub mod legacy_indexes;
pub mod passwords;

pub use passwords::{IssuedCredential, PasswordRotation};

/// Accumulates per-record outcomes for one job run.
pub(crate) struct JobRun {
    job: JobKind,
    threshold: usize,
    started: Instant,
    records: Vec<RecordReport>,
    summary: JobSummary,
    notes: Vec<String>,
    aborted: bool,
}

impl JobRun {
    pub(crate) fn start(job: JobKind, options: &MaintenanceOptions) -> Self {
        set_maintenance_quiet(options.quiet);
        tracing::info!(
            target: "healthnexus::maintenance",
            job = job.as_str(),
            dry_run = options.dry_run,
            failure_threshold = options.failure_threshold,
            "maintenance job started"
        );
        Self {
            job,
            threshold: options.failure_threshold,
            started: Instant::now(),
            records: Vec::new(),
            summary: JobSummary::default(),
            notes: Vec::new(),
            aborted: false,
        }
    }

    /// Fold one record. Breaks once failures exceed the threshold.
    pub(crate) fn record(
        &mut self,
        subject: impl Into<String>,
        doctor: Option<DoctorId>,
        outcome: RecordOutcome,
    ) -> ControlFlow<()> {
        let subject = subject.into();
        maintenance_log!("{}: {subject}: {outcome}", self.job);
        if let RecordOutcome::Failed(reason) = &outcome {
            tracing::warn!(
                target: "healthnexus::maintenance",
                job = self.job.as_str(),
                subject = %subject,
                reason = %reason,
                "record failed"
            );
        }
        self.summary.count(&outcome);
        self.records.push(RecordReport {
            subject,
            doctor,
            outcome,
        });

        if self.summary.failed > self.threshold {
            self.aborted = true;
            let note = format!(
                "aborted after {} failures (threshold {})",
                self.summary.failed, self.threshold
            );
            maintenance_log!("{}: {note}", self.job);
            self.notes.push(note);
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    pub(crate) fn note(&mut self, note: impl Into<String>) {
        let note = note.into();
        maintenance_log!("{}: {note}", self.job);
        self.notes.push(note);
    }

    pub(crate) fn finish<P>(self, plan: P) -> JobReport<P> {
        let status = if self.aborted {
            JobStatus::Aborted
        } else if self.summary.failed > 0 {
            JobStatus::Degraded
        } else if self.summary.fixed > 0 {
            JobStatus::Repaired
        } else {
            JobStatus::Clean
        };
        self.into_report(plan, status)
    }

    /// Report for a dry run: the plan and nothing else.
    pub(crate) fn plan_only<P>(self, plan: P, is_noop: bool) -> JobReport<P> {
        let status = if is_noop {
            JobStatus::Clean
        } else {
            JobStatus::PlanOnly
        };
        self.into_report(plan, status)
    }

    fn into_report<P>(self, plan: P, status: JobStatus) -> JobReport<P> {
        let duration_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        maintenance_log!("{}: {status} ({}) in {duration_ms} ms", self.job, self.summary);
        log::info!(
            "maintenance job finished: job={} status={} {}",
            self.job,
            status,
            self.summary
        );
        JobReport {
            job: self.job,
            status,
            plan,
            records: self.records,
            summary: self.summary,
            notes: self.notes,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(threshold: usize) -> MaintenanceOptions {
        MaintenanceOptions {
            quiet: true,
            failure_threshold: threshold,
            ..MaintenanceOptions::default()
        }
    }

    #[test]
    fn failures_within_threshold_degrade() {
        let mut run = JobRun::start(JobKind::RepairImages, &options(1));
        assert!(run
            .record("a", None, RecordOutcome::Fixed("ok".into()))
            .is_continue());
        assert!(run
            .record("b", None, RecordOutcome::Failed("boom".into()))
            .is_continue());
        let report = run.finish(());
        assert_eq!(report.status, JobStatus::Degraded);
        assert_eq!(report.summary.fixed, 1);
        assert_eq!(report.summary.failed, 1);
    }

    #[test]
    fn exceeding_threshold_aborts() {
        let mut run = JobRun::start(JobKind::DedupeEmails, &options(0));
        assert!(run
            .record("a", None, RecordOutcome::Failed("boom".into()))
            .is_break());
        let report = run.finish(());
        assert_eq!(report.status, JobStatus::Aborted);
        assert!(report.status.is_failure());
        assert_eq!(report.notes.len(), 1);
    }

    #[test]
    fn skipped_only_run_is_clean() {
        let mut run = JobRun::start(JobKind::RepairImages, &options(10));
        let _ = run.record("a", None, RecordOutcome::Skipped("inline".into()));
        assert_eq!(run.finish(()).status, JobStatus::Clean);

        let dry = JobRun::start(JobKind::RepairImages, &options(10));
        assert_eq!(dry.plan_only((), false).status, JobStatus::PlanOnly);
    }
}
