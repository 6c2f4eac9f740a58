//! Sync run log (`regional_sync_runs` table)

use super::SyncTrigger;
use chrono::{DateTime, Utc};
use mcat_common::{Error, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    Applied,
    Failed,
}

impl SyncRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncRunStatus::Applied => "applied",
            SyncRunStatus::Failed => "failed",
        }
    }
}

/// One finished run
#[derive(Debug, Clone, Serialize)]
pub struct SyncRunRecord {
    pub run_id: Uuid,
    pub trigger: SyncTrigger,
    pub status: SyncRunStatus,
    pub inserted: usize,
    pub deactivated: usize,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub async fn save_run(pool: &SqlitePool, run: &SyncRunRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO regional_sync_runs (
            guid, trigger_kind, status, inserted, deactivated, error, started_at, finished_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(run.run_id.to_string())
    .bind(run.trigger.as_str())
    .bind(run.status.as_str())
    .bind(run.inserted as i64)
    .bind(run.deactivated as i64)
    .bind(&run.error)
    .bind(run.started_at)
    .bind(run.finished_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recently started run
pub async fn load_last_run(pool: &SqlitePool) -> Result<Option<SyncRunRecord>> {
    let row = sqlx::query(
        r#"
        SELECT guid, trigger_kind, status, inserted, deactivated, error, started_at, finished_at
        FROM regional_sync_runs
        ORDER BY started_at DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let guid: String = row.try_get("guid")?;
    let trigger: String = row.try_get("trigger_kind")?;
    let status: String = row.try_get("status")?;
    let inserted: i64 = row.try_get("inserted")?;
    let deactivated: i64 = row.try_get("deactivated")?;

    Ok(Some(SyncRunRecord {
        run_id: Uuid::parse_str(&guid)
            .map_err(|e| Error::InvalidInput(format!("Invalid run guid {}: {}", guid, e)))?,
        trigger: trigger.parse().map_err(Error::InvalidInput)?,
        status: match status.as_str() {
            "applied" => SyncRunStatus::Applied,
            "failed" => SyncRunStatus::Failed,
            other => return Err(Error::InvalidInput(format!("Unknown run status: {}", other))),
        },
        inserted: inserted as usize,
        deactivated: deactivated as usize,
        error: row.try_get("error")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_last_run_is_most_recent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        mcat_common::db::init::init_schema(&pool).await.unwrap();

        assert!(load_last_run(&pool).await.unwrap().is_none());

        let earlier = Utc::now() - Duration::minutes(5);
        let older = SyncRunRecord {
            run_id: Uuid::new_v4(),
            trigger: SyncTrigger::Scheduled,
            status: SyncRunStatus::Applied,
            inserted: 3,
            deactivated: 0,
            error: None,
            started_at: earlier,
            finished_at: earlier,
        };
        let newer = SyncRunRecord {
            run_id: Uuid::new_v4(),
            trigger: SyncTrigger::OnDemand,
            status: SyncRunStatus::Failed,
            inserted: 0,
            deactivated: 0,
            error: Some("regional source unavailable".to_string()),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        save_run(&pool, &newer).await.unwrap();
        save_run(&pool, &older).await.unwrap();

        let last = load_last_run(&pool).await.unwrap().unwrap();
        assert_eq!(last.run_id, newer.run_id);
        assert_eq!(last.trigger, SyncTrigger::OnDemand);
        assert_eq!(last.status, SyncRunStatus::Failed);
        assert_eq!(last.error.as_deref(), Some("regional source unavailable"));
    }
}
