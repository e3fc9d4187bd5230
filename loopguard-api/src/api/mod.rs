//! HTTP API handlers

pub mod audit;
pub mod followups;
pub mod health;
pub mod metrics;

pub use audit::audit_routes;
pub use followups::followup_routes;
pub use health::health_routes;
pub use metrics::metrics_routes;
