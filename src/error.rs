//! Crate-wide error type.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::DoctorId;

pub type Result<T> = std::result::Result<T, HealthNexusError>;

#[derive(Debug, Error)]
pub enum HealthNexusError {
    #[error("validation failed for `{field}`: {reason}")]
    Validation { field: String, reason: String },

    #[error("duplicate key on index `{index}`: {key}")]
    DuplicateKey { index: String, key: String },

    #[error("doctor {id} not found")]
    NotFound { id: DoctorId },

    /// Carries the hasher's reason only; the candidate password is never included.
    #[error("password hashing failed: {reason}")]
    PasswordHash { reason: String },

    #[error("write rejected by hook `{hook}`: {reason}")]
    HookRejected { hook: String, reason: String },

    #[error("index error: {reason}")]
    Index { reason: String },

    #[error("corrupt snapshot {path:?}: {reason}")]
    CorruptSnapshot { path: PathBuf, reason: String },

    #[error("corrupt journal at offset {offset}: {reason}")]
    CorruptJournal { offset: u64, reason: String },

    #[error("store at {path:?} is locked by another process (waited {waited_ms} ms)")]
    Lock { path: PathBuf, waited_ms: u64 },

    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error("maintenance job `{job}` failed: {reason}")]
    Maintenance { job: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HealthNexusError {
    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Constraint and validation failures repeat until the caller changes the input.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Lock { .. } | Self::Io(_))
    }

    #[must_use]
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}
