//! Admin dashboard metrics

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use loopguard_common::audit::{AuditAction, ENTITY_METRICS};
use loopguard_common::services::{MetricsRange, MetricsReport};
use loopguard_common::time;
use serde::Deserialize;

use crate::actor::{Caller, Role};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const DEFAULT_DAYS: u32 = 30;
const MAX_DAYS: u32 = 365;

#[derive(Debug, Deserialize)]
pub struct MetricsParams {
    pub days: Option<u32>,
}

/// GET /api/metrics?days=N
pub async fn get_metrics(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<MetricsParams>,
) -> ApiResult<Json<MetricsReport>> {
    caller
        .require_role(&state, &[Role::Admin], AuditAction::Read, ENTITY_METRICS, None)
        .await?;

    let days = params.days.unwrap_or(DEFAULT_DAYS);
    if days == 0 || days > MAX_DAYS {
        return Err(ApiError::BadRequest(format!(
            "days must be between 1 and {}",
            MAX_DAYS
        )));
    }

    let now = time::now();
    let report = state
        .service
        .metrics(MetricsRange::last_days(days, now), &caller.actor, now)
        .await?;
    Ok(Json(report))
}

/// Build metrics routes
pub fn metrics_routes() -> Router<AppState> {
    Router::new().route("/api/metrics", get(get_metrics))
}
