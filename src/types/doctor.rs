//! Doctor entity, creation input and write-time normalization.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::constants::{DEFAULT_AVAILABLE_TIME, DEFAULT_CONSULTATION_FEE};
use crate::error::{HealthNexusError, Result};

/// System-assigned identifier of a doctor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoctorId(Uuid);

impl DoctorId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DoctorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DoctorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DoctorId {
    type Err = HealthNexusError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|err| HealthNexusError::validation("_id", err.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoctorStatus {
    #[default]
    Active,
    Inactive,
    Pending,
}

impl DoctorStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Pending => "pending",
        }
    }
}

impl fmt::Display for DoctorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const WORKWEEK: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];
}

fn default_consultation_fee() -> f64 {
    DEFAULT_CONSULTATION_FEE
}

fn default_available_days() -> BTreeSet<Weekday> {
    Weekday::WORKWEEK.into_iter().collect()
}

fn default_available_time() -> String {
    DEFAULT_AVAILABLE_TIME.to_string()
}

/// A persisted doctor record.
///
/// Field names serialize in the camelCase shape the REST surface exchanges with the portals.
/// Fields outside the schema (left behind by older versions of the collection) are kept
/// verbatim in `extra` so no write ever drops data it does not understand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    #[serde(rename = "_id")]
    pub id: DoctorId,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// bcrypt hash; the store's hashing guard replaces plaintext before it is persisted.
    pub password: String,
    pub qualification: String,
    pub experience: String,
    pub specialty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Inline `data:image/...` payload or a file name under the uploads directory.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_consultation_fee")]
    pub consultation_fee: f64,
    #[serde(default = "default_available_days")]
    pub available_days: BTreeSet<Weekday>,
    #[serde(default = "default_available_time")]
    pub available_time: String,
    #[serde(default)]
    pub status: DoctorStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Field names that belong to the doctor schema; anything else lands in `Doctor::extra`.
pub const DOCTOR_SCHEMA_FIELDS: &[&str] = &[
    "_id",
    "name",
    "email",
    "phone",
    "password",
    "qualification",
    "experience",
    "specialty",
    "gender",
    "address",
    "bio",
    "image",
    "consultationFee",
    "availableDays",
    "availableTime",
    "status",
    "createdAt",
    "updatedAt",
];

#[must_use]
pub fn is_schema_field(field: &str) -> bool {
    DOCTOR_SCHEMA_FIELDS.contains(&field)
}

impl Doctor {
    /// Value of a top-level field by its serialized name. Absent fields read as `Null`.
    #[must_use]
    pub fn field(&self, name: &str) -> Value {
        let value = match name {
            "_id" => serde_json::to_value(self.id),
            "name" => Ok(Value::from(self.name.as_str())),
            "email" => Ok(Value::from(self.email.as_str())),
            "phone" => Ok(Value::from(self.phone.as_str())),
            "specialty" => Ok(Value::from(self.specialty.as_str())),
            "status" => Ok(Value::from(self.status.as_str())),
            "createdAt" => serde_json::to_value(self.created_at),
            "updatedAt" => serde_json::to_value(self.updated_at),
            _ => {
                if let Some(value) = self.extra.get(name) {
                    return value.clone();
                }
                serde_json::to_value(self).map(|doc| doc.get(name).cloned().unwrap_or(Value::Null))
            }
        };
        value.unwrap_or(Value::Null)
    }

    /// Trim and lower-case the identifying fields in place.
    pub fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.email = normalize_email(&self.email);
        self.phone = self.phone.trim().to_string();
        self.specialty = self.specialty.trim().to_string();
        if self.image.as_deref().is_some_and(|image| image.trim().is_empty()) {
            self.image = None;
        }
    }

    /// Check the invariants every persisted record must satisfy.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("password", &self.password),
            ("qualification", &self.qualification),
            ("experience", &self.experience),
            ("specialty", &self.specialty),
        ] {
            if value.trim().is_empty() {
                return Err(HealthNexusError::validation(field, "is required"));
            }
        }
        if !self.email.contains('@') {
            return Err(HealthNexusError::validation(
                "email",
                "must be an email address",
            ));
        }
        if !self.consultation_fee.is_finite() || self.consultation_fee < 0.0 {
            return Err(HealthNexusError::validation(
                "consultationFee",
                "must be a non-negative number",
            ));
        }
        if let Some(field) = self.extra.keys().find(|key| is_schema_field(key.as_str())) {
            return Err(HealthNexusError::validation(
                field.as_str(),
                "schema field stored as an extra field",
            ));
        }
        Ok(())
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Input accepted by `DoctorStore::insert`.
///
/// Optional operational fields fall back to the collection defaults; a missing password
/// falls back to the system default and is hashed like any other credential.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDoctor {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub password: Option<String>,
    pub qualification: String,
    pub experience: String,
    pub specialty: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub consultation_fee: Option<f64>,
    #[serde(default)]
    pub available_days: Option<BTreeSet<Weekday>>,
    #[serde(default)]
    pub available_time: Option<String>,
    #[serde(default)]
    pub status: Option<DoctorStatus>,
}

impl NewDoctor {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        specialty: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            specialty: specialty.into(),
            qualification: "MBBS".to_string(),
            experience: "1 year".to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: DoctorStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Build the record with defaults applied. The password is still the candidate value;
    /// hashing happens in the store's write hooks.
    pub(crate) fn into_doctor(self, default_password: &str, now: DateTime<Utc>) -> Doctor {
        let password = self
            .password
            .filter(|password| !password.is_empty())
            .unwrap_or_else(|| default_password.to_string());
        Doctor {
            id: DoctorId::new(),
            name: self.name,
            email: self.email,
            phone: self.phone,
            password,
            qualification: self.qualification,
            experience: self.experience,
            specialty: self.specialty,
            gender: self.gender,
            address: self.address,
            bio: self.bio,
            image: self.image,
            consultation_fee: self.consultation_fee.unwrap_or(DEFAULT_CONSULTATION_FEE),
            available_days: self.available_days.unwrap_or_else(default_available_days),
            available_time: self.available_time.unwrap_or_else(default_available_time),
            status: self.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
            extra: BTreeMap::new(),
        }
    }
}
