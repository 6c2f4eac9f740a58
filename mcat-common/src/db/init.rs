//! Database initialization
//!
//! Opens (or creates) the shared SQLite database and brings the schema up to
//! date. Every statement is idempotent, so all services may call
//! [`init_database`] on startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Connection-scoped pragmas go on the options so every pooled
    // connection gets them. WAL lets API readers proceed while a sync run
    // holds the write transaction.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create every mcat table on an already-open pool
///
/// Used directly by tests running against `sqlite::memory:`.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_regionals_table(pool).await?;
    create_regional_sync_runs_table(pool).await?;
    Ok(())
}

pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Regional mirror: append-only rows, soft deactivation via `active`
pub async fn create_regionals_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS regionals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL,
            name TEXT NOT NULL,
            attributes TEXT NOT NULL DEFAULT '{}',
            active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            CHECK (active IN (0, 1))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_regionals_external_id ON regionals(external_id)")
        .execute(pool)
        .await?;

    // At most one active row per external_id
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_regionals_one_active ON regionals(external_id) WHERE active = 1",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_regional_sync_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS regional_sync_runs (
            guid TEXT PRIMARY KEY,
            trigger_kind TEXT NOT NULL,
            status TEXT NOT NULL,
            inserted INTEGER NOT NULL DEFAULT 0,
            deactivated INTEGER NOT NULL DEFAULT 0,
            error TEXT,
            started_at TIMESTAMP NOT NULL,
            finished_at TIMESTAMP NOT NULL,
            CHECK (trigger_kind IN ('scheduled', 'on_demand')),
            CHECK (status IN ('applied', 'failed')),
            CHECK (inserted >= 0),
            CHECK (deactivated >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_regional_sync_runs_started ON regional_sync_runs(started_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
