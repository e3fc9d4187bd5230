//! SQLite follow-up store and unit of work

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::followup::codes::canonical_modality;
use crate::followup::{
    ActionType, FollowUpAction, FollowUpPriority, FollowUpRecommendation, FollowUpStatus,
};
use crate::store::{ActionStore, FollowUpStore, Page, RecommendationStore, UnitOfWork, WorklistFilters};
use crate::{time, Error, Result};

const FOLLOWUP_COLUMNS: &str = "id, report_id, patient_id, recommended_modality, body_region, \
     reason, interval_months, due_date, status, priority, assigned_to, created_by, created_at, \
     updated_at, version";

const ACTION_COLUMNS: &str = "id, recommendation_id, action_type, previous_status, new_status, \
     note, created_by, created_at, ip_address";

#[derive(Debug, sqlx::FromRow)]
struct FollowUpRow {
    id: String,
    report_id: String,
    patient_id: String,
    recommended_modality: String,
    body_region: String,
    reason: String,
    interval_months: i64,
    due_date: Option<i64>,
    status: String,
    priority: String,
    assigned_to: Option<String>,
    created_by: String,
    created_at: i64,
    updated_at: i64,
    version: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct ActionRow {
    id: String,
    recommendation_id: String,
    action_type: String,
    previous_status: Option<String>,
    new_status: Option<String>,
    note: String,
    created_by: String,
    created_at: i64,
    ip_address: Option<String>,
}

fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Invalid UUID in {}: {} ({})", column, value, e)))
}

fn parse_stored<T: std::str::FromStr>(column: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Internal(format!("Unrecognized {} in store: {}", column, value)))
}

fn parse_millis(column: &str, millis: i64) -> Result<chrono::DateTime<chrono::Utc>> {
    time::from_millis(millis)
        .ok_or_else(|| Error::Internal(format!("Timestamp out of range in {}: {}", column, millis)))
}

impl TryFrom<FollowUpRow> for FollowUpRecommendation {
    type Error = Error;

    fn try_from(row: FollowUpRow) -> Result<Self> {
        let interval_months = u32::try_from(row.interval_months).map_err(|_| {
            Error::Internal(format!("interval_months out of range: {}", row.interval_months))
        })?;

        Ok(FollowUpRecommendation::restore(
            parse_uuid("id", &row.id)?,
            parse_uuid("report_id", &row.report_id)?,
            parse_uuid("patient_id", &row.patient_id)?,
            row.recommended_modality,
            row.body_region,
            row.reason,
            interval_months,
            row.due_date.map(|ms| parse_millis("due_date", ms)).transpose()?,
            parse_stored::<FollowUpStatus>("status", &row.status)?,
            parse_stored::<FollowUpPriority>("priority", &row.priority)?,
            row.assigned_to
                .as_deref()
                .map(|s| parse_uuid("assigned_to", s))
                .transpose()?,
            parse_uuid("created_by", &row.created_by)?,
            parse_millis("created_at", row.created_at)?,
            parse_millis("updated_at", row.updated_at)?,
            row.version,
        ))
    }
}

impl TryFrom<ActionRow> for FollowUpAction {
    type Error = Error;

    fn try_from(row: ActionRow) -> Result<Self> {
        Ok(FollowUpAction::restore(
            parse_uuid("id", &row.id)?,
            parse_uuid("recommendation_id", &row.recommendation_id)?,
            parse_stored::<ActionType>("action_type", &row.action_type)?,
            row.previous_status
                .as_deref()
                .map(|s| parse_stored::<FollowUpStatus>("previous_status", s))
                .transpose()?,
            row.new_status
                .as_deref()
                .map(|s| parse_stored::<FollowUpStatus>("new_status", s))
                .transpose()?,
            row.note,
            parse_uuid("created_by", &row.created_by)?,
            parse_millis("created_at", row.created_at)?,
            row.ip_address,
        ))
    }
}

/// Append WHERE clauses for the worklist filters
fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filters: &WorklistFilters) {
    qb.push(" WHERE 1 = 1");

    if !filters.statuses.is_empty() {
        qb.push(" AND status IN (");
        let mut separated = qb.separated(", ");
        for status in &filters.statuses {
            separated.push_bind(status.as_str());
        }
        separated.push_unseparated(")");
    }
    if let Some(assignee) = filters.assigned_to {
        qb.push(" AND assigned_to = ").push_bind(assignee.to_string());
    }
    if let Some(patient) = filters.patient_id {
        qb.push(" AND patient_id = ").push_bind(patient.to_string());
    }
    if let Some(modality) = &filters.modality {
        qb.push(" AND recommended_modality = ")
            .push_bind(canonical_modality(modality));
    }
    if let Some(before) = filters.due_before {
        qb.push(" AND due_date < ").push_bind(time::to_millis(before));
    }
    if let Some(after) = filters.due_after {
        qb.push(" AND due_date >= ").push_bind(time::to_millis(after));
    }
}

/// SQLite-backed recommendation and action store
#[derive(Clone)]
pub struct SqliteFollowUpStore {
    pool: SqlitePool,
}

impl SqliteFollowUpStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RecommendationStore for SqliteFollowUpStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<FollowUpRecommendation>> {
        let sql = format!("SELECT {} FROM followups WHERE id = ?", FOLLOWUP_COLUMNS);
        let row: Option<FollowUpRow> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(FollowUpRecommendation::try_from).transpose()
    }

    async fn list_matching(
        &self,
        filters: &WorklistFilters,
        page: Page,
    ) -> Result<Vec<FollowUpRecommendation>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM followups", FOLLOWUP_COLUMNS));
        push_filters(&mut qb, filters);
        qb.push(" ORDER BY due_date IS NULL, due_date ASC, created_at ASC, rowid ASC");
        qb.push(" LIMIT ").push_bind(page.limit);
        qb.push(" OFFSET ").push_bind(page.offset);

        let rows: Vec<FollowUpRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        debug!("Worklist query returned {} rows", rows.len());

        rows.into_iter().map(FollowUpRecommendation::try_from).collect()
    }

    async fn count_matching(&self, filters: &WorklistFilters) -> Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM followups");
        push_filters(&mut qb, filters);

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }
}

#[async_trait]
impl ActionStore for SqliteFollowUpStore {
    async fn list_for_recommendation(&self, recommendation_id: Uuid) -> Result<Vec<FollowUpAction>> {
        let sql = format!(
            "SELECT {} FROM followup_actions WHERE recommendation_id = ? \
             ORDER BY created_at ASC, rowid ASC",
            ACTION_COLUMNS
        );
        let rows: Vec<ActionRow> = sqlx::query_as(&sql)
            .bind(recommendation_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(FollowUpAction::try_from).collect()
    }
}

#[async_trait]
impl FollowUpStore for SqliteFollowUpStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteUnitOfWork { tx }))
    }
}

/// One SQLite transaction; rolled back on drop unless committed
pub struct SqliteUnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl SqliteUnitOfWork {
    async fn insert_recommendation(&mut self, rec: &FollowUpRecommendation) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO followups (
                id, report_id, patient_id, recommended_modality, body_region, reason,
                interval_months, due_date, status, priority, assigned_to, created_by,
                created_at, updated_at, version
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(rec.id().to_string())
        .bind(rec.report_id().to_string())
        .bind(rec.patient_id().to_string())
        .bind(rec.recommended_modality())
        .bind(rec.body_region())
        .bind(rec.reason())
        .bind(i64::from(rec.interval_months()))
        .bind(rec.due_date().map(time::to_millis))
        .bind(rec.status().as_str())
        .bind(rec.priority().as_str())
        .bind(rec.assigned_to().map(|id| id.to_string()))
        .bind(rec.created_by().to_string())
        .bind(time::to_millis(rec.created_at()))
        .bind(time::to_millis(rec.updated_at()))
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                Error::Conflict(format!("Follow-up {} already exists", rec.id())),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_recommendation(&mut self, rec: &FollowUpRecommendation) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE followups
            SET recommended_modality = ?, body_region = ?, reason = ?, interval_months = ?,
                due_date = ?, status = ?, priority = ?, assigned_to = ?, updated_at = ?,
                version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(rec.recommended_modality())
        .bind(rec.body_region())
        .bind(rec.reason())
        .bind(i64::from(rec.interval_months()))
        .bind(rec.due_date().map(time::to_millis))
        .bind(rec.status().as_str())
        .bind(rec.priority().as_str())
        .bind(rec.assigned_to().map(|id| id.to_string()))
        .bind(time::to_millis(rec.updated_at()))
        .bind(rec.id().to_string())
        .bind(rec.version())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM followups WHERE id = ?")
            .bind(rec.id().to_string())
            .fetch_one(&mut *self.tx)
            .await?;
        if exists == 0 {
            Err(Error::NotFound(format!("Follow-up {}", rec.id())))
        } else {
            Err(Error::Conflict(format!(
                "Follow-up {} was modified concurrently (expected version {})",
                rec.id(),
                rec.version()
            )))
        }
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn save_recommendation(
        &mut self,
        recommendation: &FollowUpRecommendation,
    ) -> Result<FollowUpRecommendation> {
        if recommendation.version() == 0 {
            self.insert_recommendation(recommendation).await?;
        } else {
            self.update_recommendation(recommendation).await?;
        }
        Ok(recommendation.clone().with_version(recommendation.version() + 1))
    }

    async fn append_action(&mut self, action: &FollowUpAction) -> Result<()> {
        let sql = format!(
            "INSERT INTO followup_actions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            ACTION_COLUMNS
        );
        sqlx::query(&sql)
            .bind(action.id().to_string())
            .bind(action.recommendation_id().to_string())
            .bind(action.action_type().as_str())
            .bind(action.previous_status().map(|s| s.as_str()))
            .bind(action.new_status().map(|s| s.as_str()))
            .bind(action.note())
            .bind(action.created_by().to_string())
            .bind(time::to_millis(action.created_at()))
            .bind(action.ip_address())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
