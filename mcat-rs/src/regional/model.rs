//! Regional data model
//!
//! `RegionalRecord` is what the external authority publishes. `LocalRegional`
//! is one row of the local mirror. A row is never edited after insertion
//! except to flip `active` to false.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Descriptive attributes mirrored alongside the name
pub type Attributes = BTreeMap<String, String>;

/// Regional as published by the external source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionalRecord {
    /// Identifier assigned by the source, unique within one fetch
    pub external_id: String,
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl RegionalRecord {
    pub fn new(external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn fingerprint(&self) -> Fingerprint<'_> {
        Fingerprint {
            name: &self.name,
            attributes: &self.attributes,
        }
    }
}

/// One row of the local regional mirror
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalRegional {
    pub id: i64,
    pub external_id: String,
    pub name: String,
    pub attributes: Attributes,
    /// True when this row is the live state for its `external_id`
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LocalRegional {
    pub fn fingerprint(&self) -> Fingerprint<'_> {
        Fingerprint {
            name: &self.name,
            attributes: &self.attributes,
        }
    }
}

/// Every mirrored attribute, compared by exact equality
///
/// Any difference at all classifies a regional as changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint<'a> {
    pub name: &'a str,
    pub attributes: &'a Attributes,
}

/// Corrective operations computed by the reconciler
///
/// Persisting the plan is the store's job. Deactivations must be applied
/// before inserts so the one-active-row constraint holds at every step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// New rows, in the order the external source listed them
    pub to_insert: Vec<RegionalRecord>,
    /// Local row ids to flip to inactive
    pub to_deactivate: BTreeSet<i64>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_deactivate.is_empty()
    }
}
