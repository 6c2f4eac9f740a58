//! SQLite-backed regional mirror
//!
//! Rows in `regionals` are only ever inserted or flipped to inactive. Plans
//! are applied inside one transaction, deactivations first, so the partial
//! unique index on active rows is never violated mid-plan and a failure
//! leaves nothing half-applied.

use super::history::RegionalHistory;
use super::model::{Attributes, LocalRegional, ReconciliationPlan, RegionalRecord};
use super::reconciler::reconcile;
use crate::sync::SyncError;
use chrono::{DateTime, Utc};
use mcat_common::{Error, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};

const SELECT_COLUMNS: &str =
    "SELECT id, external_id, name, attributes, active, created_at, updated_at FROM regionals";

/// Row counts written by one applied plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub inserted: usize,
    pub deactivated: usize,
}

/// Regional mirror persisted in the shared SQLite database
#[derive(Clone)]
pub struct SqliteRegionalStore {
    pool: SqlitePool,
}

impl SqliteRegionalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Every mirror row, active and historical
    pub async fn load_active_and_history(&self) -> Result<Vec<LocalRegional>> {
        let mut conn = self.pool.acquire().await?;
        load_all(&mut conn).await
    }

    /// Apply a precomputed plan atomically
    pub async fn apply_plan(&self, plan: &ReconciliationPlan) -> Result<ApplySummary> {
        let mut tx = self.pool.begin().await?;
        let summary = apply_in(&mut tx, plan).await?;
        tx.commit().await?;
        Ok(summary)
    }

    /// Load, reconcile and apply in a single transaction
    ///
    /// Concurrent readers never observe an external id whose old row is
    /// retired while its replacement is still pending.
    pub async fn reconcile_with(
        &self,
        external: &[RegionalRecord],
    ) -> std::result::Result<ApplySummary, SyncError> {
        let mut tx = self.pool.begin().await.map_err(Error::from)?;

        let local = load_all(&mut tx).await?;
        let plan = reconcile(external, &local)?;

        if plan.is_empty() {
            debug!(rows = local.len(), "Regional mirror already up to date");
            tx.commit().await.map_err(Error::from)?;
            return Ok(ApplySummary::default());
        }

        let summary = apply_in(&mut tx, &plan).await?;
        tx.commit().await.map_err(Error::from)?;

        info!(
            inserted = summary.inserted,
            deactivated = summary.deactivated,
            "Regional plan applied"
        );
        Ok(summary)
    }

    /// Live rows ordered by external id
    pub async fn list_active(&self) -> Result<Vec<LocalRegional>> {
        let rows = sqlx::query(&format!(
            "{} WHERE active = 1 ORDER BY external_id",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_regional).collect()
    }

    /// Full history for one external id, or `None` if it was never mirrored
    pub async fn history_for(&self, external_id: &str) -> Result<Option<RegionalHistory>> {
        let rows = sqlx::query(&format!(
            "{} WHERE external_id = ? ORDER BY id",
            SELECT_COLUMNS
        ))
        .bind(external_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let rows = rows
            .iter()
            .map(row_to_regional)
            .collect::<Result<Vec<_>>>()?;

        RegionalHistory::from_rows(external_id, rows)
            .map(Some)
            .map_err(|e| Error::Internal(e.to_string()))
    }

    pub async fn count_rows(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM regionals")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn load_all(conn: &mut SqliteConnection) -> Result<Vec<LocalRegional>> {
    let rows = sqlx::query(&format!("{} ORDER BY id", SELECT_COLUMNS))
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(row_to_regional).collect()
}

async fn apply_in(conn: &mut SqliteConnection, plan: &ReconciliationPlan) -> Result<ApplySummary> {
    let now = Utc::now();
    let mut summary = ApplySummary::default();

    for id in &plan.to_deactivate {
        let result =
            sqlx::query("UPDATE regionals SET active = 0, updated_at = ? WHERE id = ? AND active = 1")
                .bind(now)
                .bind(*id)
                .execute(&mut *conn)
                .await?;

        // The plan was computed against a different mirror state
        if result.rows_affected() != 1 {
            return Err(Error::Internal(format!(
                "Regional {} is not an active row; plan is stale",
                id
            )));
        }
        summary.deactivated += 1;
    }

    for record in &plan.to_insert {
        let attributes = serde_json::to_string(&record.attributes)
            .map_err(|e| Error::Internal(format!("Serialize attributes failed: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO regionals (external_id, name, attributes, active, created_at, updated_at)
            VALUES (?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&record.external_id)
        .bind(&record.name)
        .bind(attributes)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        summary.inserted += 1;
    }

    Ok(summary)
}

fn row_to_regional(row: &SqliteRow) -> Result<LocalRegional> {
    let attributes_json: String = row.try_get("attributes")?;
    let attributes: Attributes = serde_json::from_str(&attributes_json)
        .map_err(|e| Error::InvalidInput(format!("Stored attributes are not valid JSON: {}", e)))?;

    Ok(LocalRegional {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        name: row.try_get("name")?,
        attributes,
        active: row.try_get("active")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}
