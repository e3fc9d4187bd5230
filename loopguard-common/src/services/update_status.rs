use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::FollowUpService;
use crate::audit::{AuditAction, AuditEntry, ENTITY_FOLLOWUP};
use crate::followup::{Actor, FollowUpAction, FollowUpRecommendation, FollowUpStatus};
use crate::{time, Error, Result};

/// A requested status change
#[derive(Debug, Clone)]
pub struct UpdateStatus {
    pub id: Uuid,
    pub status: FollowUpStatus,
    pub note: Option<String>,
    /// Reject with `Conflict` unless the stored version matches
    pub expected_version: Option<i64>,
}

/// Result of a successful status change
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub recommendation: FollowUpRecommendation,
    pub previous_status: FollowUpStatus,
    pub action: FollowUpAction,
}

impl FollowUpService {
    /// Move a recommendation to a new status and append the paired action
    ///
    /// The entity update and its action commit together or not at all.
    pub async fn update_status(&self, request: UpdateStatus, actor: &Actor) -> Result<StatusUpdate> {
        let failure = AuditEntry::new(AuditAction::Update, ENTITY_FOLLOWUP)
            .entity(request.id)
            .actor(actor)
            .meta("new_status", request.status.as_str());

        let result = self.update_status_inner(request, actor).await;

        self.audited(
            result,
            |update| {
                AuditEntry::new(AuditAction::Update, ENTITY_FOLLOWUP)
                    .entity(update.recommendation.id())
                    .actor(actor)
                    .meta("previous_status", update.previous_status.as_str())
                    .meta("new_status", update.recommendation.status().as_str())
                    .meta("note", update.action.note())
            },
            failure,
        )
        .await
    }

    async fn update_status_inner(&self, request: UpdateStatus, actor: &Actor) -> Result<StatusUpdate> {
        let mut rec = self
            .store
            .get_by_id(request.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Follow-up {}", request.id)))?;

        if let Some(expected) = request.expected_version {
            if expected != rec.version() {
                return Err(Error::Conflict(format!(
                    "Follow-up {} is at version {}, expected {}",
                    rec.id(),
                    rec.version(),
                    expected
                )));
            }
        }

        let previous_status = rec.status();
        let note = request.note.unwrap_or_default();
        let action = match rec.transition(request.status, note.trim(), actor, time::now()) {
            Ok(action) => action,
            Err(err) => {
                warn!("Rejected status change on {}: {}", rec.id(), err);
                return Err(err);
            }
        };

        let mut uow = self.store.begin().await?;
        let saved = uow.save_recommendation(&rec).await?;
        uow.append_action(&action).await?;
        uow.commit().await?;

        info!(
            "Follow-up {} status {} -> {}",
            saved.id(),
            previous_status,
            saved.status()
        );

        Ok(StatusUpdate {
            recommendation: saved,
            previous_status,
            action,
        })
    }
}
