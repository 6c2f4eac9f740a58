//! Per-external-id history of mirror rows
//!
//! Each external identity moves through `NoRow -> Active -> Superseded`, and
//! back to `Active` when the source republishes it. A [`RegionalHistory`]
//! keeps every row ever written for the identity plus an explicit pointer to
//! the current one, so "at most one active row" is a property of the type
//! rather than something callers re-derive by scanning flags.

use super::model::LocalRegional;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Lifecycle state of one external identity in the mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionalState {
    /// No row has ever been written
    NoRow,
    /// One row is live
    Active,
    /// Rows exist, none is live (removed upstream)
    Superseded,
}

/// The local mirror holds more than one active row for an external id
///
/// Indicates earlier corruption. Reconciliation must not proceed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("data integrity violation: external_id {external_id} has {} active rows ({active_ids:?})", .active_ids.len())]
pub struct DataIntegrityViolation {
    pub external_id: String,
    pub active_ids: Vec<i64>,
}

/// All mirror rows for one external id, oldest first
#[derive(Debug, Clone)]
pub struct RegionalHistory {
    external_id: String,
    rows: Vec<LocalRegional>,
    current: Option<usize>,
}

impl RegionalHistory {
    fn empty(external_id: String) -> Self {
        Self {
            external_id,
            rows: Vec::new(),
            current: None,
        }
    }

    /// Build a history from rows that all share one external id
    pub fn from_rows(
        external_id: impl Into<String>,
        rows: Vec<LocalRegional>,
    ) -> Result<Self, DataIntegrityViolation> {
        let mut history = Self::empty(external_id.into());
        for row in rows {
            history.push(row)?;
        }
        Ok(history)
    }

    fn push(&mut self, row: LocalRegional) -> Result<(), DataIntegrityViolation> {
        if row.active {
            if let Some(existing) = self.current {
                return Err(DataIntegrityViolation {
                    external_id: self.external_id.clone(),
                    active_ids: vec![self.rows[existing].id, row.id],
                });
            }
            self.current = Some(self.rows.len());
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    /// The live row, if any
    pub fn current(&self) -> Option<&LocalRegional> {
        self.current.map(|idx| &self.rows[idx])
    }

    pub fn rows(&self) -> &[LocalRegional] {
        &self.rows
    }

    pub fn state(&self) -> RegionalState {
        match (self.rows.is_empty(), self.current) {
            (true, _) => RegionalState::NoRow,
            (false, Some(_)) => RegionalState::Active,
            (false, None) => RegionalState::Superseded,
        }
    }
}

/// The whole mirror grouped by external id
#[derive(Debug, Default)]
pub struct MirrorIndex {
    histories: BTreeMap<String, RegionalHistory>,
}

impl MirrorIndex {
    /// Group rows into histories, rejecting a second active row per id
    ///
    /// Rows are ordered by id within each history. The violation reports
    /// every active row for the offending id, not just the first two.
    pub fn build(local: &[LocalRegional]) -> Result<Self, DataIntegrityViolation> {
        let mut grouped: BTreeMap<&str, Vec<&LocalRegional>> = BTreeMap::new();
        for row in local {
            grouped.entry(row.external_id.as_str()).or_default().push(row);
        }

        let mut histories = BTreeMap::new();
        for (external_id, mut rows) in grouped {
            rows.sort_by_key(|row| row.id);

            let active_ids: Vec<i64> = rows.iter().filter(|r| r.active).map(|r| r.id).collect();
            if active_ids.len() > 1 {
                return Err(DataIntegrityViolation {
                    external_id: external_id.to_string(),
                    active_ids,
                });
            }

            let history =
                RegionalHistory::from_rows(external_id, rows.into_iter().cloned().collect())?;
            histories.insert(external_id.to_string(), history);
        }

        Ok(Self { histories })
    }

    pub fn history(&self, external_id: &str) -> Option<&RegionalHistory> {
        self.histories.get(external_id)
    }

    pub fn state(&self, external_id: &str) -> RegionalState {
        self.history(external_id)
            .map(RegionalHistory::state)
            .unwrap_or(RegionalState::NoRow)
    }

    /// Live row for an external id
    pub fn current(&self, external_id: &str) -> Option<&LocalRegional> {
        self.history(external_id).and_then(RegionalHistory::current)
    }

    /// Every live row, ordered by external id
    pub fn active_rows(&self) -> impl Iterator<Item = &LocalRegional> {
        self.histories.values().filter_map(RegionalHistory::current)
    }
}
