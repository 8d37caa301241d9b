//! Secondary indexes over the doctor collection and the store's index management API.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::{DoctorStore, JournalOp};
use crate::constants::PRIMARY_INDEX_NAME;
use crate::error::{HealthNexusError, Result};
use crate::types::{Doctor, DoctorId, IndexDrift, IndexSpec, policy_indexes};

/// Index key: the indexed field values in key order, serialized as a JSON array. Missing
/// fields contribute `null`, so two records both lacking a uniquely indexed field collide.
fn index_key(values: impl Iterator<Item = Value>) -> String {
    Value::Array(values.collect()).to_string()
}

fn document_key(spec: &IndexSpec, doctor: &Doctor) -> String {
    index_key(spec.fields().map(|field| doctor.field(field)))
}

#[must_use]
pub(crate) fn primary_index() -> IndexSpec {
    let mut spec = IndexSpec::ascending("_id").unique();
    spec.name = PRIMARY_INDEX_NAME.to_string();
    spec
}

/// One built index, ready to be installed into the catalog.
#[derive(Debug, Clone)]
pub(crate) struct IndexState {
    spec: IndexSpec,
    entries: BTreeMap<String, BTreeSet<DoctorId>>,
}

impl IndexState {
    pub(crate) fn build<'a>(spec: IndexSpec, doctors: impl Iterator<Item = &'a Doctor>) -> Result<Self> {
        let mut state = Self {
            spec,
            entries: BTreeMap::new(),
        };
        for doctor in doctors {
            let key = document_key(&state.spec, doctor);
            let ids = state.entries.entry(key.clone()).or_default();
            if state.spec.unique && !ids.is_empty() {
                return Err(HealthNexusError::DuplicateKey {
                    index: state.spec.name.clone(),
                    key,
                });
            }
            ids.insert(doctor.id);
        }
        Ok(state)
    }

    fn conflict(&self, doctor: &Doctor) -> Option<String> {
        if !self.spec.unique {
            return None;
        }
        let key = document_key(&self.spec, doctor);
        self.entries
            .get(&key)
            .filter(|ids| ids.iter().any(|id| *id != doctor.id))
            .map(|_| key)
    }
}

/// In-memory secondary indexes, rebuilt from the collection on open.
#[derive(Debug, Clone, Default)]
pub(crate) struct IndexCatalog {
    indexes: BTreeMap<String, IndexState>,
}

impl IndexCatalog {
    /// Rebuild from persisted specs. Uniqueness is not re-checked: every record on disk was
    /// admitted under the same specs.
    pub(crate) fn rebuild<'a>(
        specs: Vec<IndexSpec>,
        doctors: impl Iterator<Item = &'a Doctor> + Clone,
    ) -> Self {
        let mut indexes = BTreeMap::new();
        for spec in specs {
            let mut state = IndexState {
                spec,
                entries: BTreeMap::new(),
            };
            for doctor in doctors.clone() {
                state
                    .entries
                    .entry(document_key(&state.spec, doctor))
                    .or_default()
                    .insert(doctor.id);
            }
            indexes.insert(state.spec.name.clone(), state);
        }
        Self { indexes }
    }

    pub(crate) fn specs(&self) -> Vec<IndexSpec> {
        self.indexes.values().map(|state| state.spec.clone()).collect()
    }

    pub(crate) fn get(&self, name: &str) -> Option<&IndexSpec> {
        self.indexes.get(name).map(|state| &state.spec)
    }

    /// First unique index `doctor` would collide on, ignoring its own entry.
    pub(crate) fn check_unique(&self, doctor: &Doctor) -> Result<()> {
        for state in self.indexes.values() {
            if let Some(key) = state.conflict(doctor) {
                return Err(HealthNexusError::DuplicateKey {
                    index: state.spec.name.clone(),
                    key,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, doctor: &Doctor) {
        for state in self.indexes.values_mut() {
            state
                .entries
                .entry(document_key(&state.spec, doctor))
                .or_default()
                .insert(doctor.id);
        }
    }

    pub(crate) fn remove(&mut self, doctor: &Doctor) {
        for state in self.indexes.values_mut() {
            let key = document_key(&state.spec, doctor);
            if let Some(ids) = state.entries.get_mut(&key) {
                ids.remove(&doctor.id);
                if ids.is_empty() {
                    state.entries.remove(&key);
                }
            }
        }
    }

    pub(crate) fn install(&mut self, state: IndexState) {
        self.indexes.insert(state.spec.name.clone(), state);
    }

    pub(crate) fn drop_index(&mut self, name: &str) -> Option<IndexSpec> {
        self.indexes.remove(name).map(|state| state.spec)
    }

    /// Pick the index covering the most equality constraints, where every indexed field is
    /// constrained, and return its name with the matching ids.
    pub(crate) fn lookup(&self, constraints: &[(&str, Value)]) -> Option<(String, BTreeSet<DoctorId>)> {
        let constrained = |field: &str| {
            constraints
                .iter()
                .find(|(name, _)| *name == field)
                .map(|(_, value)| value.clone())
        };
        let state = self
            .indexes
            .values()
            .filter(|state| state.spec.fields().all(|field| constrained(field).is_some()))
            .max_by_key(|state| (state.spec.keys.len(), state.spec.unique))?;
        let key = index_key(
            state
                .spec
                .fields()
                .map(|field| constrained(field).unwrap_or(Value::Null)),
        );
        let ids = state.entries.get(&key).cloned().unwrap_or_default();
        Some((state.spec.name.clone(), ids))
    }
}

impl DoctorStore {
    /// Every index on the collection, the implicit primary index first.
    #[must_use]
    pub fn list_indexes(&self) -> Vec<IndexSpec> {
        let mut specs = vec![primary_index()];
        specs.extend(self.indexes.specs());
        specs
    }

    #[must_use]
    pub fn has_index(&self, name: &str) -> bool {
        name == PRIMARY_INDEX_NAME || self.indexes.get(name).is_some()
    }

    /// Create `spec`. Returns `false` when an identical index already exists.
    ///
    /// Building a unique index over records that already collide fails with `DuplicateKey`
    /// and leaves the catalog unchanged.
    pub fn create_index(&mut self, spec: IndexSpec) -> Result<bool> {
        if spec.name.trim().is_empty() || spec.keys.is_empty() {
            return Err(HealthNexusError::Index {
                reason: "index needs a name and at least one key".into(),
            });
        }
        if spec.name == PRIMARY_INDEX_NAME {
            return Err(HealthNexusError::Index {
                reason: format!("`{PRIMARY_INDEX_NAME}` is reserved"),
            });
        }
        if let Some(existing) = self.indexes.get(&spec.name) {
            if existing.same_shape(&spec) {
                return Ok(false);
            }
            return Err(HealthNexusError::Index {
                reason: format!("index `{}` already exists with different keys or options", spec.name),
            });
        }

        let state = IndexState::build(spec.clone(), self.doctors.values())?;
        self.persist(&JournalOp::CreateIndex { spec: spec.clone() })?;
        self.indexes.install(state);
        log::info!("index created: {spec}");
        self.maybe_checkpoint();
        Ok(true)
    }

    /// Drop the named index. Returns `false` when no such index exists.
    pub fn drop_index(&mut self, name: &str) -> Result<bool> {
        if name == PRIMARY_INDEX_NAME {
            return Err(HealthNexusError::Index {
                reason: format!("cannot drop `{PRIMARY_INDEX_NAME}`"),
            });
        }
        if self.indexes.get(name).is_none() {
            return Ok(false);
        }
        self.persist(&JournalOp::DropIndex {
            name: name.to_string(),
        })?;
        self.indexes.drop_index(name);
        log::info!("index dropped: {name}");
        self.maybe_checkpoint();
        Ok(true)
    }

    /// Create any policy index the collection is missing. Returns the names created.
    ///
    /// Stops at the first index that cannot be built (typically a unique index blocked by
    /// duplicate records); indexes created before it stay in place.
    pub fn sync_indexes(&mut self) -> Result<Vec<String>> {
        let drift = self.index_drift();
        if !drift.conflicting.is_empty() {
            let names: Vec<String> =
                drift.conflicting.iter().map(ToString::to_string).collect();
            return Err(HealthNexusError::Index {
                reason: format!(
                    "{} shadow policy indexes with a different shape; drop them first",
                    names.join(", ")
                ),
            });
        }
        let mut created = Vec::new();
        for spec in drift.missing {
            let name = spec.name.clone();
            if self.create_index(spec)? {
                created.push(name);
            }
        }
        Ok(created)
    }

    /// Compare the catalog with the policy set by name and shape.
    #[must_use]
    pub fn index_drift(&self) -> IndexDrift {
        let mut drift = IndexDrift::default();
        for policy in policy_indexes() {
            match self.indexes.get(&policy.name) {
                None => drift.missing.push(policy),
                Some(existing) if !existing.same_shape(&policy) => {
                    drift.conflicting.push(existing.clone());
                }
                Some(_) => {}
            }
        }
        drift
    }
}
