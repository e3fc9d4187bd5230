use chrono::{DateTime, Utc};
use tracing::info;

use super::FollowUpService;
use crate::audit::{AuditAction, AuditEntry, ENTITY_FOLLOWUP};
use crate::followup::{Actor, FollowUpAction, FollowUpRecommendation, NewFollowUp};
use crate::{time, Result};

impl FollowUpService {
    /// Create a pending recommendation with its due date and `created` action
    ///
    /// The due date counts from `reference_date` (normally the report's
    /// finalization time), or from now when absent.
    pub async fn create(
        &self,
        input: NewFollowUp,
        reference_date: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> Result<FollowUpRecommendation> {
        let failure = AuditEntry::new(AuditAction::Create, ENTITY_FOLLOWUP)
            .actor(actor)
            .meta("report_id", input.report_id.to_string())
            .meta("modality", input.recommended_modality.clone())
            .meta("interval_months", input.interval_months);

        let result = self.create_inner(input, reference_date, actor).await;

        self.audited(
            result,
            |rec| {
                AuditEntry::new(AuditAction::Create, ENTITY_FOLLOWUP)
                    .entity(rec.id())
                    .actor(actor)
                    .meta("report_id", rec.report_id().to_string())
                    .meta("modality", rec.recommended_modality())
                    .meta("interval_months", rec.interval_months())
            },
            failure,
        )
        .await
    }

    async fn create_inner(
        &self,
        input: NewFollowUp,
        reference_date: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> Result<FollowUpRecommendation> {
        let now = time::now();
        let mut rec = FollowUpRecommendation::new(input, actor.id, now)?;
        rec.compute_due_date(Some(reference_date.unwrap_or(now)));

        let action = FollowUpAction::created(
            rec.id(),
            rec.status(),
            format!("Created with {} month interval", rec.interval_months()),
            actor,
            now,
        );

        let mut uow = self.store.begin().await?;
        let saved = uow.save_recommendation(&rec).await?;
        uow.append_action(&action).await?;
        uow.commit().await?;

        info!(
            "Created follow-up {} ({} {}, due {})",
            saved.id(),
            saved.recommended_modality(),
            saved.body_region(),
            saved
                .due_date()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        );
        Ok(saved)
    }
}
