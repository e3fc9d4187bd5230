//! Follow-up endpoints: create, worklist, detail, status, assignment, notes, reminders

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use loopguard_common::audit::{AuditAction, ENTITY_FOLLOWUP};
use loopguard_common::followup::RecommendationInterval;
use loopguard_common::services::{UpdateStatus, WorklistItem, WorklistPage};
use loopguard_common::store::{Page, WorklistFilters};
use loopguard_common::{time, FollowUpAction, FollowUpPriority, FollowUpStatus, NewFollowUp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::{Caller, Role};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const COORDINATION_ROLES: &[Role] = &[Role::Coordinator, Role::Admin];
const AUTHORING_ROLES: &[Role] = &[Role::Radiologist, Role::Admin];

#[derive(Debug, Deserialize)]
pub struct CreateFollowUpRequest {
    pub report_id: Uuid,
    pub patient_id: Uuid,
    pub recommended_modality: String,
    pub body_region: String,
    #[serde(default)]
    pub reason: String,
    pub interval_months: Option<u32>,
    /// Free-text interval ("6-12 months"), used when `interval_months` is absent
    pub interval: Option<String>,
    #[serde(default)]
    pub priority: FollowUpPriority,
    /// Report finalization time; the due date counts from here
    pub reference_date: Option<DateTime<Utc>>,
}

impl CreateFollowUpRequest {
    fn into_new_followup(self) -> ApiResult<(NewFollowUp, Option<DateTime<Utc>>)> {
        let interval_months = match (self.interval_months, self.interval.as_deref()) {
            (Some(months), _) => months,
            (None, Some(text)) => RecommendationInterval::parse(text)?.to_months(),
            (None, None) => {
                return Err(ApiError::BadRequest(
                    "interval_months or interval is required".to_string(),
                ))
            }
        };

        Ok((
            NewFollowUp {
                report_id: self.report_id,
                patient_id: self.patient_id,
                recommended_modality: self.recommended_modality,
                body_region: self.body_region,
                reason: self.reason,
                interval_months,
                priority: self.priority,
            },
            self.reference_date,
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WorklistParams {
    /// Comma-separated statuses, e.g. `pending,scheduled`
    pub status: Option<String>,
    pub modality: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub due_before: Option<DateTime<Utc>>,
    pub due_after: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl WorklistParams {
    fn filters(&self) -> ApiResult<WorklistFilters> {
        let statuses = match &self.status {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<FollowUpStatus>().map_err(ApiError::from))
                .collect::<ApiResult<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(WorklistFilters {
            statuses,
            assigned_to: self.assigned_to,
            patient_id: self.patient_id,
            modality: self
                .modality
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
            due_before: self.due_before,
            due_after: self.due_after,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub note: Option<String>,
    /// Optimistic-concurrency guard; omit to skip the check
    pub expected_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    /// `null` clears the assignment
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub note: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReminderRequest {
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FollowUpDetailResponse {
    #[serde(flatten)]
    pub followup: WorklistItem,
    pub history: Vec<FollowUpAction>,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdateResponse {
    #[serde(flatten)]
    pub followup: WorklistItem,
    pub previous_status: FollowUpStatus,
    pub action: FollowUpAction,
}

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    #[serde(flatten)]
    pub followup: WorklistItem,
    pub action: FollowUpAction,
}

/// POST /api/followups
pub async fn create_followup(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<CreateFollowUpRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<WorklistItem>)> {
    caller
        .require_role(&state, AUTHORING_ROLES, AuditAction::Create, ENTITY_FOLLOWUP, None)
        .await?;

    let Json(request) = payload?;
    let (input, reference_date) = request.into_new_followup()?;

    let rec = state
        .service
        .create(input, reference_date, &caller.actor)
        .await?;

    Ok((StatusCode::CREATED, Json(WorklistItem::new(rec, time::now()))))
}

/// GET /api/followups/worklist
pub async fn get_worklist(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<WorklistParams>,
) -> ApiResult<Json<WorklistPage>> {
    let filters = params.filters()?;
    let page = Page::new(params.limit, params.offset);

    let worklist = state
        .service
        .worklist(filters, page, &caller.actor, time::now())
        .await?;
    Ok(Json(worklist))
}

/// GET /api/followups/:id
pub async fn get_followup(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FollowUpDetailResponse>> {
    let detail = state.service.get(id, &caller.actor).await?;
    Ok(Json(FollowUpDetailResponse {
        followup: WorklistItem::new(detail.recommendation, time::now()),
        history: detail.history,
    }))
}

/// GET /api/followups/:id/history
pub async fn get_history(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<FollowUpAction>>> {
    let history = state.service.history(id, &caller.actor).await?;
    Ok(Json(history))
}

/// PATCH /api/followups/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<Json<StatusUpdateResponse>> {
    caller
        .require_role(&state, COORDINATION_ROLES, AuditAction::Update, ENTITY_FOLLOWUP, Some(id))
        .await?;

    let Json(request) = payload?;
    let status: FollowUpStatus = request.status.parse()?;

    let update = state
        .service
        .update_status(
            UpdateStatus {
                id,
                status,
                note: request.note,
                expected_version: request.expected_version,
            },
            &caller.actor,
        )
        .await?;

    Ok(Json(StatusUpdateResponse {
        followup: WorklistItem::new(update.recommendation, time::now()),
        previous_status: update.previous_status,
        action: update.action,
    }))
}

/// PATCH /api/followups/:id/assignment
pub async fn update_assignment(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<AssignmentRequest>, JsonRejection>,
) -> ApiResult<Json<AssignmentResponse>> {
    caller
        .require_role(&state, COORDINATION_ROLES, AuditAction::Update, ENTITY_FOLLOWUP, Some(id))
        .await?;

    let Json(request) = payload?;
    let assignment = state
        .service
        .assign(id, request.assigned_to, &caller.actor)
        .await?;

    Ok(Json(AssignmentResponse {
        followup: WorklistItem::new(assignment.recommendation, time::now()),
        action: assignment.action,
    }))
}

/// POST /api/followups/:id/notes
pub async fn add_note(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<NoteRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<FollowUpAction>)> {
    let Json(request) = payload?;
    let action = state
        .service
        .add_note(id, &request.note, &caller.actor)
        .await?;
    Ok((StatusCode::CREATED, Json(action)))
}

/// POST /api/followups/:id/reminders
pub async fn record_reminder(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReminderRequest>>,
) -> ApiResult<(StatusCode, Json<FollowUpAction>)> {
    caller
        .require_role(&state, COORDINATION_ROLES, AuditAction::Update, ENTITY_FOLLOWUP, Some(id))
        .await?;

    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let action = state
        .service
        .record_reminder(id, request.note.as_deref(), &caller.actor)
        .await?;
    Ok((StatusCode::CREATED, Json(action)))
}

/// Build follow-up routes
pub fn followup_routes() -> Router<AppState> {
    Router::new()
        .route("/api/followups", post(create_followup))
        .route("/api/followups/worklist", get(get_worklist))
        .route("/api/followups/:id", get(get_followup))
        .route("/api/followups/:id/history", get(get_history))
        .route("/api/followups/:id/status", patch(update_status))
        .route("/api/followups/:id/assignment", patch(update_assignment))
        .route("/api/followups/:id/notes", post(add_note))
        .route("/api/followups/:id/reminders", post(record_reminder))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_list_parsed() {
        let params = WorklistParams {
            status: Some("pending, Scheduled,".to_string()),
            modality: Some("  ".to_string()),
            ..Default::default()
        };
        let filters = params.filters().unwrap();
        assert_eq!(
            filters.statuses,
            vec![FollowUpStatus::Pending, FollowUpStatus::Scheduled]
        );
        assert!(filters.modality.is_none());
    }

    #[test]
    fn test_unknown_status_rejected() {
        let params = WorklistParams {
            status: Some("pending,archived".to_string()),
            ..Default::default()
        };
        assert!(matches!(params.filters(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_interval_text_converted_to_months() {
        let request: CreateFollowUpRequest = serde_json::from_value(serde_json::json!({
            "report_id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "recommended_modality": "CT",
            "body_region": "chest",
            "interval": "6-12 months"
        }))
        .unwrap();
        let (input, reference) = request.into_new_followup().unwrap();
        assert_eq!(input.interval_months, 6);
        assert_eq!(input.priority, FollowUpPriority::Routine);
        assert!(reference.is_none());
    }

    #[test]
    fn test_missing_interval_rejected() {
        let request: CreateFollowUpRequest = serde_json::from_value(serde_json::json!({
            "report_id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "recommended_modality": "CT",
            "body_region": "chest"
        }))
        .unwrap();
        assert!(matches!(
            request.into_new_followup(),
            Err(ApiError::BadRequest(_))
        ));
    }
}
