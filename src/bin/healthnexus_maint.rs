//! HealthNexus maintenance CLI
//!
//! Runs one integrity job against the doctor store named by the environment
//! (`HEALTHNEXUS_URI`, optionally `HEALTHNEXUS_DB`).
//!
//! Usage:
//!   healthnexus-maint [--dry-run] [--quiet] dedupe-emails
//!   healthnexus-maint repair-images [--uploads-dir <dir>]
//!   healthnexus-maint drop-legacy-indexes
//!   healthnexus-maint rotate-default-passwords [--reveal]
//!   healthnexus-maint sync-indexes

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use healthnexus_core::constants::{DEFAULT_FAILURE_THRESHOLD, DEFAULT_UPLOADS_DIR};
use healthnexus_core::maintenance::{duplicates, images, legacy_indexes, passwords};
use healthnexus_core::{
    DoctorStore, HealthNexusError, JobReport, JobStatus, MaintenanceOptions, StoreConfig,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "healthnexus-maint")]
#[command(version)]
#[command(about = "Integrity maintenance jobs for the HealthNexus doctor store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Compute and print the plan without writing
    #[arg(long, global = true)]
    dry_run: bool,

    /// Suppress per-record progress lines
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Per-record failures tolerated before the job aborts
    #[arg(long, global = true, default_value_t = DEFAULT_FAILURE_THRESHOLD)]
    failure_threshold: usize,

    /// Output format for the final report
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep the newest record per email and delete the rest
    DedupeEmails,

    /// Clear or normalize image references that do not resolve in the uploads directory
    RepairImages {
        /// Directory holding uploaded profile images
        #[arg(long, env = "HEALTHNEXUS_UPLOADS_DIR", default_value = DEFAULT_UPLOADS_DIR)]
        uploads_dir: PathBuf,
    },

    /// Drop indexes outside the current policy and unset leftover null fields
    DropLegacyIndexes,

    /// Give every doctor still on the default password a distinct placeholder
    RotateDefaultPasswords {
        /// Print the issued placeholder credentials
        #[arg(long)]
        reveal: bool,
    },

    /// Create any missing policy index
    SyncIndexes,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let outcome = run(&cli);
    match &outcome {
        Ok(JobStatus::Degraded) => {
            eprintln!("warning: some records failed; see the report above");
        }
        Ok(_) => {}
        Err(err) => {
            eprintln!("error: {err}");
            if err.is_duplicate_key() {
                eprintln!("hint: resolve duplicates (dedupe-emails) before building unique indexes");
            } else if matches!(err, HealthNexusError::Index { .. }) {
                eprintln!("hint: drop-legacy-indexes removes indexes that do not match policy");
            }
        }
    }
    ExitCode::from(exit_status(&outcome))
}

/// 1 for an aborted job or any error, 0 otherwise. A degraded run still exits 0.
fn exit_status(outcome: &Result<JobStatus, HealthNexusError>) -> u8 {
    match outcome {
        Ok(status) if status.is_failure() => 1,
        Ok(_) => 0,
        Err(_) => 1,
    }
}

fn run(cli: &Cli) -> Result<JobStatus, HealthNexusError> {
    let config = StoreConfig::from_env()?;
    let mut store = DoctorStore::open(&config)?;
    let options = MaintenanceOptions {
        dry_run: cli.dry_run,
        // JSON output owns stdout.
        quiet: cli.quiet || cli.format == Format::Json,
        failure_threshold: cli.failure_threshold,
    };

    let status = match &cli.command {
        Commands::DedupeEmails => emit(cli.format, &duplicates::run(&mut store, &options)?)?,
        Commands::RepairImages { uploads_dir } => {
            emit(cli.format, &images::run(&mut store, uploads_dir, &options)?)?
        }
        Commands::DropLegacyIndexes => {
            emit(cli.format, &legacy_indexes::run(&mut store, &options)?)?
        }
        Commands::RotateDefaultPasswords { reveal } => {
            rotate_default_passwords(&mut store, cli.format, *reveal, &options)?
        }
        Commands::SyncIndexes => sync_indexes(&mut store, cli)?,
    };

    store.close()?;
    Ok(status)
}

fn emit<P: Serialize>(format: Format, report: &JobReport<P>) -> Result<JobStatus, HealthNexusError> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(report)?),
        Format::Text => print_summary(report),
    }
    Ok(report.status)
}

fn print_summary<P>(report: &JobReport<P>) {
    println!("{}: {} ({})", report.job, report.status, report.summary);
    for note in &report.notes {
        println!("  note: {note}");
    }
}

/// In JSON mode the report and any revealed credentials form one document.
fn rotate_default_passwords(
    store: &mut DoctorStore,
    format: Format,
    reveal: bool,
    options: &MaintenanceOptions,
) -> Result<JobStatus, HealthNexusError> {
    let rotation = passwords::run(store, options)?;
    match format {
        Format::Json => {
            let document = serde_json::json!({
                "report": &rotation.report,
                "issued": reveal.then_some(&rotation.issued),
            });
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Format::Text => {
            print_summary(&rotation.report);
            if reveal {
                for credential in &rotation.issued {
                    println!("{}\t{}", credential.email, credential.password);
                }
            }
        }
    }
    if !reveal && !rotation.issued.is_empty() {
        eprintln!(
            "{} placeholder credential(s) issued but not shown (--reveal prints them); \
             the affected doctors need a password reset",
            rotation.issued.len()
        );
    }
    Ok(rotation.report.status)
}

fn sync_indexes(store: &mut DoctorStore, cli: &Cli) -> Result<JobStatus, HealthNexusError> {
    let drift = store.index_drift();
    let status = if drift.is_clean() {
        JobStatus::Clean
    } else if cli.dry_run {
        JobStatus::PlanOnly
    } else {
        store.sync_indexes()?;
        JobStatus::Repaired
    };

    let missing: Vec<&str> = drift.missing.iter().map(|spec| spec.name.as_str()).collect();
    match cli.format {
        Format::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "status": status,
                "missing": missing,
                "conflicting": drift.conflicting,
            }))?
        ),
        Format::Text => {
            println!("sync-indexes: {status}");
            for name in &missing {
                println!("  missing: {name}");
            }
            for spec in &drift.conflicting {
                println!("  conflicting: {spec}");
            }
        }
    }
    Ok(status)
}
