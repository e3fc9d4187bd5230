use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use super::FollowUpService;
use crate::audit::{AuditAction, AuditEntry, ENTITY_FOLLOWUP};
use crate::followup::{Actor, FollowUpRecommendation, FollowUpStatus};
use crate::store::{Page, WorklistFilters};
use crate::Result;

/// One worklist row: the stored recommendation plus display fields
#[derive(Debug, Clone, Serialize)]
pub struct WorklistItem {
    #[serde(flatten)]
    pub recommendation: FollowUpRecommendation,
    pub effective_status: FollowUpStatus,
    pub days_until_due: Option<i64>,
    pub is_overdue: bool,
}

impl WorklistItem {
    pub fn new(recommendation: FollowUpRecommendation, now: DateTime<Utc>) -> Self {
        Self {
            effective_status: recommendation.effective_status(now),
            days_until_due: recommendation.days_until_due(now),
            is_overdue: recommendation.is_overdue_at(now),
            recommendation,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorklistPage {
    pub items: Vec<WorklistItem>,
    /// Matching rows across all pages
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl FollowUpService {
    /// Filtered, paginated worklist ordered by due date
    pub async fn worklist(
        &self,
        filters: WorklistFilters,
        page: Page,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<WorklistPage> {
        let result: Result<WorklistPage> = async {
            // One extra row tells us whether another page exists
            let lookahead = Page {
                limit: page.limit + 1,
                offset: page.offset,
            };
            let mut rows = self.store.list_matching(&filters, lookahead).await?;
            let has_more = rows.len() as i64 > page.limit;
            rows.truncate(page.limit as usize);

            let total = self.store.count_matching(&filters).await?;

            Ok(WorklistPage {
                items: rows.into_iter().map(|r| WorklistItem::new(r, now)).collect(),
                total,
                limit: page.limit,
                offset: page.offset,
                has_more,
            })
        }
        .await;

        let statuses: Vec<&str> = filters.statuses.iter().map(|s| s.as_str()).collect();
        let entry = AuditEntry::new(AuditAction::Read, ENTITY_FOLLOWUP)
            .actor(actor)
            .meta(
                "query",
                json!({
                    "statuses": statuses,
                    "modality": filters.modality.clone(),
                    "assigned_to": filters.assigned_to.map(|id| id.to_string()),
                    "patient_id": filters.patient_id.map(|id| id.to_string()),
                    "limit": page.limit,
                    "offset": page.offset,
                }),
            );

        self.audited(
            result,
            |worklist| entry.clone().meta("result_count", worklist.items.len()),
            entry.clone(),
        )
        .await
    }
}
