//! Index definitions and the collection's indexing policy.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexDirection {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl IndexDirection {
    fn suffix(self) -> &'static str {
        match self {
            Self::Ascending => "1",
            Self::Descending => "-1",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexKey {
    pub field: String,
    pub direction: IndexDirection,
}

/// A named index over one or more top-level doctor fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub keys: Vec<IndexKey>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    /// Build a spec named after its keys (`email_1`, `specialty_1_status_1`, `createdAt_-1`).
    #[must_use]
    pub fn new(keys: &[(&str, IndexDirection)]) -> Self {
        let keys: Vec<IndexKey> = keys
            .iter()
            .map(|(field, direction)| IndexKey {
                field: (*field).to_string(),
                direction: *direction,
            })
            .collect();
        let name = keys
            .iter()
            .map(|key| format!("{}_{}", key.field, key.direction.suffix()))
            .collect::<Vec<_>>()
            .join("_");
        Self {
            name,
            keys,
            unique: false,
        }
    }

    #[must_use]
    pub fn ascending(field: &str) -> Self {
        Self::new(&[(field, IndexDirection::Ascending)])
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|key| key.field.as_str())
    }

    /// Same keys and uniqueness, regardless of name.
    #[must_use]
    pub fn same_shape(&self, other: &IndexSpec) -> bool {
        self.keys == other.keys && self.unique == other.unique
    }
}

impl fmt::Display for IndexSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.unique {
            f.write_str(" (unique)")?;
        }
        Ok(())
    }
}

/// Indexes the doctor collection is expected to carry.
#[must_use]
pub fn policy_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::ascending("email").unique(),
        IndexSpec::ascending("phone").unique(),
        IndexSpec::new(&[
            ("specialty", IndexDirection::Ascending),
            ("status", IndexDirection::Ascending),
        ]),
        IndexSpec::new(&[("createdAt", IndexDirection::Descending)]),
    ]
}

/// Where the live index catalog departs from [`policy_indexes`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDrift {
    /// Policy indexes with no index of that name.
    pub missing: Vec<IndexSpec>,
    /// Indexes that carry a policy name with a different key list or uniqueness.
    pub conflicting: Vec<IndexSpec>,
}

impl IndexDrift {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.conflicting.is_empty()
    }
}

#[must_use]
pub fn is_policy_index(spec: &IndexSpec) -> bool {
    policy_indexes()
        .iter()
        .any(|policy| policy.name == spec.name && policy.same_shape(spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_key_layout() {
        let names: Vec<String> = policy_indexes().into_iter().map(|spec| spec.name).collect();
        assert_eq!(
            names,
            vec!["email_1", "phone_1", "specialty_1_status_1", "createdAt_-1"]
        );
    }

    #[test]
    fn legacy_unique_index_is_not_policy() {
        let legacy = IndexSpec::ascending("licenseNumber").unique();
        assert_eq!(legacy.name, "licenseNumber_1");
        assert!(!is_policy_index(&legacy));

        // Same name, different uniqueness: still not the policy index.
        assert!(!is_policy_index(&IndexSpec::ascending("email")));
        assert!(is_policy_index(&IndexSpec::ascending("email").unique()));
    }
}
