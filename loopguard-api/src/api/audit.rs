//! Audit trail browsing (admin only)

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use loopguard_common::audit::{AuditAction, AuditQuery, ENTITY_AUDIT_LOG};
use loopguard_common::services::AuditLogPage;

use crate::actor::{Caller, Role};
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/audit
///
/// Filters: `actor_id`, `entity_type`, `entity_id`, `action`, `success`,
/// `since`, `until`, `limit`, `offset`.
pub async fn get_audit_log(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<AuditLogPage>> {
    caller
        .require_role(&state, &[Role::Admin], AuditAction::Read, ENTITY_AUDIT_LOG, None)
        .await?;

    let page = state.service.audit_log(query, &caller.actor).await?;
    Ok(Json(page))
}

/// Build audit routes
pub fn audit_routes() -> Router<AppState> {
    Router::new().route("/api/audit", get(get_audit_log))
}
