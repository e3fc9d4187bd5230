//! Database initialization
//!
//! Opens (creating if needed) the SQLite file and creates the schema
//! idempotently. UUIDs are stored as TEXT, timestamps as INTEGER Unix
//! milliseconds.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::Result;

const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Applied to every pooled connection
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_followups_table(&pool).await?;
    create_followup_actions_table(&pool).await?;
    create_audit_events_table(&pool).await?;
    create_append_only_triggers(&pool).await?;

    Ok(pool)
}

async fn create_followups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS followups (
            id TEXT PRIMARY KEY,
            report_id TEXT NOT NULL,
            patient_id TEXT NOT NULL,
            recommended_modality TEXT NOT NULL,
            body_region TEXT NOT NULL,
            reason TEXT NOT NULL DEFAULT '',
            interval_months INTEGER NOT NULL CHECK (interval_months > 0),
            due_date INTEGER,
            status TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'routine',
            assigned_to TEXT,
            created_by TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_followups_status ON followups(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_followups_due_date ON followups(due_date)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_followups_patient ON followups(patient_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_followups_assigned ON followups(assigned_to)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_followup_actions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS followup_actions (
            id TEXT PRIMARY KEY,
            recommendation_id TEXT NOT NULL REFERENCES followups(id),
            action_type TEXT NOT NULL,
            previous_status TEXT,
            new_status TEXT,
            note TEXT NOT NULL DEFAULT '',
            created_by TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            ip_address TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_followup_actions_recommendation \
         ON followup_actions(recommendation_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_audit_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_events (
            id TEXT PRIMARY KEY,
            actor_id TEXT,
            action TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT,
            timestamp INTEGER NOT NULL,
            ip_address TEXT,
            user_agent TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            success INTEGER NOT NULL DEFAULT 1,
            error_detail TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_events_timestamp ON audit_events(timestamp)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_audit_events_entity ON audit_events(entity_type, entity_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_events_actor ON audit_events(actor_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Reject UPDATE and DELETE on the action trail and the audit log
async fn create_append_only_triggers(pool: &SqlitePool) -> Result<()> {
    for table in ["followup_actions", "audit_events"] {
        for op in ["UPDATE", "DELETE"] {
            let sql = format!(
                "CREATE TRIGGER IF NOT EXISTS {table}_no_{op_lower} \
                 BEFORE {op} ON {table} \
                 BEGIN SELECT RAISE(ABORT, '{table} is append-only'); END",
                table = table,
                op = op,
                op_lower = op.to_ascii_lowercase(),
            );
            sqlx::query(&sql).execute(pool).await?;
        }
    }
    Ok(())
}
