//! Single-flight regional sync service
//!
//! Shared by the scheduler and the on-demand API trigger. The in-flight guard
//! is a `tokio::sync::Mutex<()>` acquired with `try_lock`; the guard lives on
//! the stack of [`RegionalSyncService::run`], so it is released on every exit
//! path, including errors and cancellation of the calling future.
//!
//! `is_running` reads a flag owned by the same guard rather than probing the
//! mutex, so status polling can never make a real trigger skip.

use super::runs::{self, SyncRunRecord, SyncRunStatus};
use super::{SyncError, SyncOutcome, SyncSummary, SyncTrigger};
use crate::regional::{ApplySummary, RegionalSource, SourceError, SqliteRegionalStore};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Runtime knobs for sync runs
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Upper bound on the external fetch; a run that exceeds it is abandoned
    pub fetch_timeout: Duration,
    /// When false, an empty fetch is rejected as a suspected outage
    pub trust_empty_source: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            trust_empty_source: true,
        }
    }
}

/// Held for the duration of one run
struct InFlight<'a> {
    _lock: MutexGuard<'a, ()>,
    running: &'a AtomicBool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

pub struct RegionalSyncService {
    source: Arc<dyn RegionalSource>,
    store: SqliteRegionalStore,
    settings: SyncSettings,
    in_flight: Mutex<()>,
    running: AtomicBool,
}

impl RegionalSyncService {
    pub fn new(
        source: Arc<dyn RegionalSource>,
        store: SqliteRegionalStore,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            store,
            settings,
            in_flight: Mutex::new(()),
            running: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &SqliteRegionalStore {
        &self.store
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// Whether a run currently holds the in-flight guard
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<InFlight<'_>> {
        let lock = self.in_flight.try_lock().ok()?;
        self.running.store(true, Ordering::Release);
        Some(InFlight {
            _lock: lock,
            running: &self.running,
        })
    }

    /// Execute one run unless another is in flight
    pub async fn run(&self, trigger: SyncTrigger) -> Result<SyncOutcome, SyncError> {
        let Some(_in_flight) = self.try_begin() else {
            debug!(trigger = trigger.as_str(), "Regional sync already running; trigger skipped");
            return Ok(SyncOutcome::Skipped);
        };

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, trigger = trigger.as_str(), source = %self.source.describe(), "Regional sync started");

        let result = self.fetch_and_apply().await;

        let (status, summary, error_text) = match &result {
            Ok(summary) => (SyncRunStatus::Applied, *summary, None),
            Err(e) => (SyncRunStatus::Failed, ApplySummary::default(), Some(e.to_string())),
        };

        let record = SyncRunRecord {
            run_id,
            trigger,
            status,
            inserted: summary.inserted,
            deactivated: summary.deactivated,
            error: error_text,
            started_at,
            finished_at: Utc::now(),
        };
        if let Err(e) = runs::save_run(self.store.pool(), &record).await {
            warn!(%run_id, "Failed to record regional sync run: {}", e);
        }

        match result {
            Ok(summary) => {
                info!(
                    %run_id,
                    inserted = summary.inserted,
                    deactivated = summary.deactivated,
                    "Regional sync finished"
                );
                Ok(SyncOutcome::Applied(SyncSummary {
                    run_id,
                    inserted: summary.inserted,
                    deactivated: summary.deactivated,
                }))
            }
            Err(e) => {
                match &e {
                    SyncError::DataIntegrityViolation(violation) => error!(
                        %run_id,
                        external_id = %violation.external_id,
                        active_ids = ?violation.active_ids,
                        "Regional mirror corrupted; reconciliation aborted"
                    ),
                    SyncError::Storage(_) => error!(%run_id, "Regional sync failed: {}", e),
                    _ => warn!(%run_id, "Regional sync skipped: {}", e),
                }
                Err(e)
            }
        }
    }

    async fn fetch_and_apply(&self) -> Result<ApplySummary, SyncError> {
        let timeout = self.settings.fetch_timeout;
        let records = tokio::time::timeout(timeout, self.source.fetch_all())
            .await
            .map_err(|_| SourceError::Timeout(timeout))??;

        if records.is_empty() && !self.settings.trust_empty_source {
            return Err(SyncError::SuspectedOutage);
        }

        self.store.reconcile_with(&records).await
    }
}
