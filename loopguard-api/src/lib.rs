//! loopguard-api library - HTTP surface for the follow-up tracker

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use loopguard_common::services::FollowUpService;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod actor;
pub mod api;
pub mod error;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: FollowUpService,
    /// Origins allowed by CORS; empty means same-origin only
    pub cors_origins: Vec<String>,
}

impl AppState {
    pub fn new(service: FollowUpService, cors_origins: Vec<String>) -> Self {
        Self {
            service,
            cors_origins,
        }
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods([Method::GET, Method::POST, Method::PATCH])
            .allow_headers([
                header::CONTENT_TYPE,
                HeaderName::from_static(actor::ACTOR_ID_HEADER),
                HeaderName::from_static(actor::ACTOR_ROLE_HEADER),
            ]),
    )
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origins);

    let router = Router::new()
        .merge(api::health_routes())
        .merge(api::followup_routes())
        .merge(api::metrics_routes())
        .merge(api::audit_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}
