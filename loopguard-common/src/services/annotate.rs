//! Assignment, notes, and reminders

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::FollowUpService;
use crate::audit::{AuditAction, AuditEntry, ENTITY_FOLLOWUP};
use crate::followup::{Actor, FollowUpAction, FollowUpRecommendation};
use crate::{time, Error, Result};

/// Result of an assignment change
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub recommendation: FollowUpRecommendation,
    pub action: FollowUpAction,
}

impl FollowUpService {
    /// Set or clear the coordinator responsible for a recommendation
    pub async fn assign(
        &self,
        id: Uuid,
        assignee: Option<Uuid>,
        actor: &Actor,
    ) -> Result<Assignment> {
        let assignee_meta = assignee.map(|a| a.to_string());
        let failure = AuditEntry::new(AuditAction::Update, ENTITY_FOLLOWUP)
            .entity(id)
            .actor(actor)
            .meta("assigned_to", assignee_meta.clone());

        let result = self.assign_inner(id, assignee, actor).await;

        self.audited(
            result,
            |assignment| {
                AuditEntry::new(AuditAction::Update, ENTITY_FOLLOWUP)
                    .entity(id)
                    .actor(actor)
                    .meta("assigned_to", assignee_meta)
                    .meta("note", assignment.action.note())
            },
            failure,
        )
        .await
    }

    async fn assign_inner(&self, id: Uuid, assignee: Option<Uuid>, actor: &Actor) -> Result<Assignment> {
        if assignee.is_some_and(|a| a.is_nil()) {
            return Err(Error::Validation("assignee must not be the nil UUID".to_string()));
        }

        let mut rec = self
            .store
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Follow-up {}", id)))?;

        let action = rec.assign(assignee, actor, time::now());

        let mut uow = self.store.begin().await?;
        let saved = uow.save_recommendation(&rec).await?;
        uow.append_action(&action).await?;
        uow.commit().await?;

        info!("Follow-up {}: {}", id, action.note());
        Ok(Assignment {
            recommendation: saved,
            action,
        })
    }

    /// Append a free-text note to a recommendation's trail
    pub async fn add_note(&self, id: Uuid, note: &str, actor: &Actor) -> Result<FollowUpAction> {
        let entry = || {
            AuditEntry::new(AuditAction::Update, ENTITY_FOLLOWUP)
                .entity(id)
                .actor(actor)
                .meta("action_type", "note_added")
        };

        let result = async {
            let note = note.trim();
            if note.is_empty() {
                return Err(Error::Validation("note must not be empty".to_string()));
            }
            self.append_to_trail(id, |rec_id, now| {
                FollowUpAction::note_added(rec_id, note, actor, now)
            })
            .await
        }
        .await;

        self.audited(result, |_| entry(), entry()).await
    }

    /// Record that the patient or referrer was reminded
    pub async fn record_reminder(
        &self,
        id: Uuid,
        note: Option<&str>,
        actor: &Actor,
    ) -> Result<FollowUpAction> {
        let entry = || {
            AuditEntry::new(AuditAction::Update, ENTITY_FOLLOWUP)
                .entity(id)
                .actor(actor)
                .meta("action_type", "reminder_sent")
        };

        let note = note.map(str::trim).unwrap_or_default();
        let result = self
            .append_to_trail(id, |rec_id, now| {
                FollowUpAction::reminder_sent(rec_id, note, actor, now)
            })
            .await;

        self.audited(result, |_| entry(), entry()).await
    }

    /// Append one action to an existing recommendation without changing it
    async fn append_to_trail(
        &self,
        id: Uuid,
        build: impl FnOnce(Uuid, chrono::DateTime<chrono::Utc>) -> FollowUpAction,
    ) -> Result<FollowUpAction> {
        let rec = self
            .store
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Follow-up {}", id)))?;

        let action = build(rec.id(), time::now());

        let mut uow = self.store.begin().await?;
        uow.append_action(&action).await?;
        uow.commit().await?;

        info!("Follow-up {}: {} recorded", id, action.action_type());
        Ok(action)
    }
}
