//! Partial updates applied by `DoctorStore::update` and `DoctorStore::update_where`.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::doctor::{Doctor, DoctorStatus, Weekday, is_schema_field};
use crate::error::{HealthNexusError, Result};

/// Field-level changes to a doctor record.
///
/// `None` leaves a field untouched. Optional profile fields use `Option<Option<_>>` so a patch
/// can clear them (`Some(None)`). Fields outside the schema are set with `set_extra` and removed
/// with `unset`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DoctorPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub qualification: Option<String>,
    pub experience: Option<String>,
    pub specialty: Option<String>,
    pub gender: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub image: Option<Option<String>>,
    pub consultation_fee: Option<f64>,
    pub available_days: Option<BTreeSet<Weekday>>,
    pub available_time: Option<String>,
    pub status: Option<DoctorStatus>,
    pub set_extra: BTreeMap<String, Value>,
    pub unset: BTreeSet<String>,
}

impl DoctorPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    #[must_use]
    pub fn specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: DoctorStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn image(mut self, image: Option<String>) -> Self {
        self.image = Some(image);
        self
    }

    #[must_use]
    pub fn consultation_fee(mut self, fee: f64) -> Self {
        self.consultation_fee = Some(fee);
        self
    }

    #[must_use]
    pub fn set_field(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set_extra.insert(field.into(), value);
        self
    }

    #[must_use]
    pub fn unset_field(mut self, field: impl Into<String>) -> Self {
        self.unset.insert(field.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub fn touches_password(&self) -> bool {
        self.password.is_some()
    }

    /// Apply the patch to `doctor`. Validation of the merged record is the caller's job.
    pub fn apply_to(&self, doctor: &mut Doctor) -> Result<()> {
        if let Some(field) = self.set_extra.keys().find(|key| is_schema_field(key.as_str())) {
            return Err(HealthNexusError::validation(
                field.as_str(),
                "schema fields cannot be set as extra fields",
            ));
        }
        if let Some(password) = &self.password {
            if password.is_empty() {
                return Err(HealthNexusError::validation("password", "must not be empty"));
            }
        }

        assign(&mut doctor.name, &self.name);
        assign(&mut doctor.email, &self.email);
        assign(&mut doctor.phone, &self.phone);
        assign(&mut doctor.password, &self.password);
        assign(&mut doctor.qualification, &self.qualification);
        assign(&mut doctor.experience, &self.experience);
        assign(&mut doctor.specialty, &self.specialty);
        assign(&mut doctor.gender, &self.gender);
        assign(&mut doctor.address, &self.address);
        assign(&mut doctor.bio, &self.bio);
        assign(&mut doctor.image, &self.image);
        assign(&mut doctor.available_days, &self.available_days);
        assign(&mut doctor.available_time, &self.available_time);
        if let Some(fee) = self.consultation_fee {
            doctor.consultation_fee = fee;
        }
        if let Some(status) = self.status {
            doctor.status = status;
        }
        for (field, value) in &self.set_extra {
            doctor.extra.insert(field.clone(), value.clone());
        }

        for field in &self.unset {
            match field.as_str() {
                "gender" => doctor.gender = None,
                "address" => doctor.address = None,
                "bio" => doctor.bio = None,
                "image" => doctor.image = None,
                other if is_schema_field(other) => {
                    return Err(HealthNexusError::validation(
                        other,
                        "required field cannot be unset",
                    ));
                }
                other => {
                    doctor.extra.remove(other);
                }
            }
        }
        Ok(())
    }
}

fn assign<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *slot = value.clone();
    }
}
