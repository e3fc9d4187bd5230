use serde::Serialize;

use super::FollowUpService;
use crate::audit::{AuditAction, AuditEntry, AuditEvent, AuditQuery, ENTITY_AUDIT_LOG};
use crate::followup::Actor;
use crate::Result;

#[derive(Debug, Clone, Serialize)]
pub struct AuditLogPage {
    pub events: Vec<AuditEvent>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl FollowUpService {
    /// Read the compliance trail, newest first
    ///
    /// The read itself is audited after the query runs, so it does not
    /// appear in its own results.
    pub async fn audit_log(&self, query: AuditQuery, actor: &Actor) -> Result<AuditLogPage> {
        let result: Result<AuditLogPage> = async {
            let events = self.audit.query(&query).await?;
            let total = self.audit.count(&query).await?;
            Ok(AuditLogPage {
                events,
                total,
                limit: query.effective_limit(),
                offset: query.effective_offset(),
            })
        }
        .await;

        let entry = AuditEntry::new(AuditAction::Read, ENTITY_AUDIT_LOG).actor(actor);
        self.audited(
            result,
            |page| entry.clone().meta("result_count", page.events.len()),
            entry.clone(),
        )
        .await
    }
}
