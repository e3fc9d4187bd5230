//! SQLite audit logger

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::audit::{trace_event, AuditAction, AuditEntry, AuditEvent, AuditLogger, AuditQuery};
use crate::{time, Error, Result};

const AUDIT_COLUMNS: &str = "id, actor_id, action, entity_type, entity_id, timestamp, \
     ip_address, user_agent, metadata, success, error_detail";

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: String,
    actor_id: Option<String>,
    action: String,
    entity_type: String,
    entity_id: Option<String>,
    timestamp: i64,
    ip_address: Option<String>,
    user_agent: Option<String>,
    metadata: String,
    success: bool,
    error_detail: Option<String>,
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Invalid UUID in audit_events: {} ({})", value, e)))
}

impl TryFrom<AuditRow> for AuditEvent {
    type Error = Error;

    fn try_from(row: AuditRow) -> Result<Self> {
        let action: AuditAction = row
            .action
            .parse()
            .map_err(|_| Error::Internal(format!("Unrecognized audit action: {}", row.action)))?;
        let timestamp = time::from_millis(row.timestamp).ok_or_else(|| {
            Error::Internal(format!("Audit timestamp out of range: {}", row.timestamp))
        })?;

        Ok(AuditEvent::restore(
            parse_uuid(&row.id)?,
            row.actor_id.as_deref().map(parse_uuid).transpose()?,
            action,
            row.entity_type,
            row.entity_id.as_deref().map(parse_uuid).transpose()?,
            timestamp,
            row.ip_address,
            row.user_agent,
            serde_json::from_str(&row.metadata)?,
            row.success,
            row.error_detail,
        ))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &AuditQuery) {
    qb.push(" WHERE 1 = 1");

    if let Some(actor) = query.actor_id {
        qb.push(" AND actor_id = ").push_bind(actor.to_string());
    }
    if let Some(entity_type) = &query.entity_type {
        qb.push(" AND entity_type = ").push_bind(entity_type.clone());
    }
    if let Some(entity) = query.entity_id {
        qb.push(" AND entity_id = ").push_bind(entity.to_string());
    }
    if let Some(action) = query.action {
        qb.push(" AND action = ").push_bind(action.as_str());
    }
    if let Some(success) = query.success {
        qb.push(" AND success = ").push_bind(success);
    }
    if let Some(since) = query.since {
        qb.push(" AND timestamp >= ").push_bind(time::to_millis(since));
    }
    if let Some(until) = query.until {
        qb.push(" AND timestamp < ").push_bind(time::to_millis(until));
    }
}

/// Append-only audit log in the `audit_events` table
#[derive(Clone)]
pub struct SqliteAuditLogger {
    pool: SqlitePool,
}

impl SqliteAuditLogger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLogger for SqliteAuditLogger {
    async fn record(&self, entry: AuditEntry) -> Result<AuditEvent> {
        let event = entry.into_event(time::now());

        let sql = format!(
            "INSERT INTO audit_events ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            AUDIT_COLUMNS
        );
        sqlx::query(&sql)
            .bind(event.id().to_string())
            .bind(event.actor_id().map(|id| id.to_string()))
            .bind(event.action().as_str())
            .bind(event.entity_type())
            .bind(event.entity_id().map(|id| id.to_string()))
            .bind(time::to_millis(event.timestamp()))
            .bind(event.ip_address())
            .bind(event.user_agent())
            .bind(serde_json::to_string(event.metadata())?)
            .bind(event.success())
            .bind(event.error_detail())
            .execute(&self.pool)
            .await?;

        trace_event(&event);
        Ok(event)
    }

    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEvent>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM audit_events", AUDIT_COLUMNS));
        push_filters(&mut qb, query);
        qb.push(" ORDER BY timestamp DESC, rowid DESC");
        qb.push(" LIMIT ").push_bind(query.effective_limit());
        qb.push(" OFFSET ").push_bind(query.effective_offset());

        let rows: Vec<AuditRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(AuditEvent::try_from).collect()
    }

    async fn count(&self, query: &AuditQuery) -> Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM audit_events");
        push_filters(&mut qb, query);

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }
}
