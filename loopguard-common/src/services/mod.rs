//! Application services
//!
//! `FollowUpService` runs each use case against the store and audit
//! collaborators. Every mutating call and every bulk read records exactly
//! one audit event, including failed attempts. Authorization is the
//! caller's responsibility.

mod annotate;
mod audit_log;
mod create;
mod metrics;
mod queries;
mod update_status;
mod worklist;

use std::sync::Arc;

use tracing::error;

use crate::audit::{AuditEntry, AuditLogger};
use crate::store::FollowUpStore;
use crate::Result;

pub use annotate::Assignment;
pub use audit_log::AuditLogPage;
pub use metrics::{
    MetricsRange, MetricsReport, ModalityBreakdown, StatusBreakdown, METRICS_SCAN_LIMIT,
};
pub use queries::FollowUpDetail;
pub use update_status::{StatusUpdate, UpdateStatus};
pub use worklist::{WorklistItem, WorklistPage};

/// Follow-up use cases over injected collaborators
#[derive(Clone)]
pub struct FollowUpService {
    store: Arc<dyn FollowUpStore>,
    audit: Arc<dyn AuditLogger>,
}

impl FollowUpService {
    pub fn new(store: Arc<dyn FollowUpStore>, audit: Arc<dyn AuditLogger>) -> Self {
        Self { store, audit }
    }

    pub fn audit(&self) -> &Arc<dyn AuditLogger> {
        &self.audit
    }

    /// Record the outcome of an operation as one audit event
    ///
    /// On success the event comes from `success`; on failure `failure` is
    /// marked failed with the error. A failed audit write after a failed
    /// operation is logged and the original error returned.
    async fn audited<T>(
        &self,
        result: Result<T>,
        success: impl FnOnce(&T) -> AuditEntry,
        failure: AuditEntry,
    ) -> Result<T> {
        match result {
            Ok(value) => {
                self.audit.record(success(&value)).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(audit_err) = self.audit.record(failure.failed_with(&err)).await {
                    error!("Failed to record audit event for failed operation: {}", audit_err);
                }
                Err(err)
            }
        }
    }
}
