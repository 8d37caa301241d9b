//! Password hashing guard.
//!
//! Doctor credentials are persisted as bcrypt hashes only. The guard is registered as a write
//! hook on every `DoctorStore`, so whole-document saves and partial updates pass through the
//! same check: a value already in bcrypt form is kept as is, anything else is hashed.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;

use crate::constants::{PLACEHOLDER_PASSWORD_BYTES, PLACEHOLDER_PASSWORD_PREFIX};
use crate::error::{HealthNexusError, Result};
use crate::store::{PendingWrite, WriteHook};

// Modular crypt form: `$2b$10$` followed by 22 salt + 31 digest characters.
#[allow(clippy::expect_used)]
static BCRYPT_HASH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$2[abxy]\$\d{2}\$[./A-Za-z0-9]{53}$").expect("bcrypt hash pattern is valid")
});

/// Whether `value` is already a bcrypt hash.
#[must_use]
pub fn is_password_hash(value: &str) -> bool {
    BCRYPT_HASH.is_match(value)
}

pub fn hash_password(plain: &str, cost: u32) -> Result<String> {
    bcrypt::hash(plain, cost).map_err(|err| HealthNexusError::PasswordHash {
        reason: err.to_string(),
    })
}

pub fn verify_password(plain: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(plain, hash).map_err(|err| HealthNexusError::PasswordHash {
        reason: err.to_string(),
    })
}

/// Random credential handed out when a shared default password is retired.
#[must_use]
pub fn generate_placeholder() -> String {
    let mut bytes = [0u8; PLACEHOLDER_PASSWORD_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{PLACEHOLDER_PASSWORD_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes))
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordGuard {
    cost: u32,
}

impl PasswordGuard {
    #[must_use]
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash `candidate` unless it already is a hash. Applying this twice is a no-op.
    pub fn protect(&self, candidate: &str) -> Result<String> {
        if candidate.is_empty() {
            return Err(HealthNexusError::validation("password", "must not be empty"));
        }
        if is_password_hash(candidate) {
            return Ok(candidate.to_string());
        }
        hash_password(candidate, self.cost)
    }
}

impl WriteHook for PasswordGuard {
    fn name(&self) -> &'static str {
        "password-guard"
    }

    fn before_write(&self, write: &mut PendingWrite<'_>) -> Result<()> {
        match write {
            PendingWrite::Document { doctor, .. } => {
                doctor.password = self.protect(&doctor.password)?;
            }
            PendingWrite::Patch(patch) => {
                if let Some(password) = patch.password.as_mut() {
                    *password = self.protect(password)?;
                }
            }
        }
        Ok(())
    }
}
