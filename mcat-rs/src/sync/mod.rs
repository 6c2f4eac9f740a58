//! Regional synchronization runs
//!
//! A run fetches the external list, reconciles it against the mirror and
//! applies the plan. Runs never overlap: a trigger that arrives while another
//! run is in flight is skipped, not queued.

pub mod runs;
pub mod service;

pub use runs::{SyncRunRecord, SyncRunStatus};
pub use service::{RegionalSyncService, SyncSettings};

use crate::regional::{DataIntegrityViolation, SourceError};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// What started a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Scheduled,
    OnDemand,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::Scheduled => "scheduled",
            SyncTrigger::OnDemand => "on_demand",
        }
    }
}

impl std::str::FromStr for SyncTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(SyncTrigger::Scheduled),
            "on_demand" => Ok(SyncTrigger::OnDemand),
            other => Err(format!("Unknown sync trigger: {}", other)),
        }
    }
}

/// Counts reported for an applied run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub run_id: Uuid,
    pub inserted: usize,
    pub deactivated: usize,
}

/// Result of a trigger that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The run fetched, reconciled and committed (possibly an empty plan)
    Applied(SyncSummary),
    /// Another run was in flight; nothing was done
    Skipped,
}

/// Why a run produced no changes
#[derive(Debug, Error)]
pub enum SyncError {
    /// External fetch failed or timed out; the mirror was not touched
    #[error("regional source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    /// Source returned an empty list while empty lists are not trusted
    #[error("regional source returned an empty list; treated as an outage")]
    SuspectedOutage,

    /// Mirror already violates the one-active-row invariant
    #[error(transparent)]
    DataIntegrityViolation(#[from] DataIntegrityViolation),

    /// Reading or writing the mirror failed; the transaction was rolled back
    #[error("regional storage error: {0}")]
    Storage(#[from] mcat_common::Error),
}
