//! Query filters for the doctor directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::doctor::{Doctor, DoctorId, DoctorStatus, Weekday, normalize_email};

/// Equality and range predicates over doctor records. Results are always returned most
/// recently created first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoctorFilter {
    pub id: Option<DoctorId>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialty: Option<String>,
    pub status: Option<DoctorStatus>,
    pub available_on: Option<Weekday>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl DoctorFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn by_id(id: DoctorId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn by_email(email: impl AsRef<str>) -> Self {
        Self {
            email: Some(normalize_email(email.as_ref())),
            ..Self::default()
        }
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
    pub fn available_on(mut self, day: Weekday) -> Self {
        self.available_on = Some(day);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Equality constraints keyed by serialized field name, used to pick an index.
    #[must_use]
    pub fn equality_constraints(&self) -> Vec<(&'static str, Value)> {
        let mut constraints = Vec::new();
        if let Some(email) = &self.email {
            constraints.push(("email", Value::from(normalize_email(email))));
        }
        if let Some(phone) = &self.phone {
            constraints.push(("phone", Value::from(phone.trim())));
        }
        if let Some(specialty) = &self.specialty {
            constraints.push(("specialty", Value::from(specialty.as_str())));
        }
        if let Some(status) = self.status {
            constraints.push(("status", Value::from(status.as_str())));
        }
        constraints
    }

    #[must_use]
    pub fn matches(&self, doctor: &Doctor) -> bool {
        if self.id.is_some_and(|id| id != doctor.id) {
            return false;
        }
        if self
            .email
            .as_deref()
            .is_some_and(|email| normalize_email(email) != doctor.email)
        {
            return false;
        }
        if self
            .phone
            .as_deref()
            .is_some_and(|phone| phone.trim() != doctor.phone)
        {
            return false;
        }
        if self
            .specialty
            .as_deref()
            .is_some_and(|specialty| specialty != doctor.specialty)
        {
            return false;
        }
        if self.status.is_some_and(|status| status != doctor.status) {
            return false;
        }
        if self
            .available_on
            .is_some_and(|day| !doctor.available_days.contains(&day))
        {
            return false;
        }
        if self
            .created_after
            .is_some_and(|after| doctor.created_at <= after)
        {
            return false;
        }
        if self
            .created_before
            .is_some_and(|before| doctor.created_at >= before)
        {
            return false;
        }
        true
    }
}

/// How a `find` was answered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Index used to narrow candidates; `None` means a full collection scan.
    pub index: Option<String>,
    /// Records examined before predicates and limit were applied.
    pub examined: usize,
    pub returned: usize,
}
