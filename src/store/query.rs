use std::cmp::Reverse;

use super::DoctorStore;
use super::indexes::primary_index;
use crate::types::{Doctor, DoctorFilter, DoctorId, QueryPlan};

impl DoctorStore {
    #[must_use]
    pub fn get(&self, id: DoctorId) -> Option<&Doctor> {
        self.doctors.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.doctors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.doctors.is_empty()
    }

    /// All records in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Doctor> {
        self.doctors.values()
    }

    /// Matching records, newest `createdAt` first.
    #[must_use]
    pub fn find(&self, filter: &DoctorFilter) -> Vec<&Doctor> {
        self.find_with_plan(filter).0
    }

    #[must_use]
    pub fn find_one(&self, filter: &DoctorFilter) -> Option<&Doctor> {
        self.find(&filter.clone().limit(1)).into_iter().next()
    }

    #[must_use]
    pub fn count(&self, filter: &DoctorFilter) -> usize {
        let mut unlimited = filter.clone();
        unlimited.limit = None;
        self.find(&unlimited).len()
    }

    /// Like `find`, also reporting which index narrowed the candidates.
    #[must_use]
    pub fn find_with_plan(&self, filter: &DoctorFilter) -> (Vec<&Doctor>, QueryPlan) {
        let (index, candidates): (Option<String>, Vec<&Doctor>) = if let Some(id) = filter.id {
            (Some(primary_index().name), self.doctors.get(&id).into_iter().collect())
        } else if let Some((name, ids)) = self.indexes.lookup(&filter.equality_constraints()) {
            let docs = ids.iter().filter_map(|id| self.doctors.get(id)).collect();
            (Some(name), docs)
        } else {
            (None, self.doctors.values().collect())
        };

        let examined = candidates.len();
        let mut matched: Vec<&Doctor> = candidates
            .into_iter()
            .filter(|doctor| filter.matches(doctor))
            .collect();
        matched.sort_by_key(|doctor| (Reverse(doctor.created_at), doctor.id));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }

        tracing::trace!(
            target: "healthnexus::store",
            index = index.as_deref().unwrap_or("scan"),
            examined,
            returned = matched.len(),
            "find"
        );
        let plan = QueryPlan {
            index,
            examined,
            returned: matched.len(),
        };
        (matched, plan)
    }
}
