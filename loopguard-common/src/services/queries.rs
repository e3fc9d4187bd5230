use serde::Serialize;
use uuid::Uuid;

use super::FollowUpService;
use crate::audit::{AuditAction, AuditEntry, ENTITY_FOLLOWUP};
use crate::followup::{Actor, FollowUpAction, FollowUpRecommendation};
use crate::{Error, Result};

/// A recommendation with its full action trail, oldest first
#[derive(Debug, Clone, Serialize)]
pub struct FollowUpDetail {
    pub recommendation: FollowUpRecommendation,
    pub history: Vec<FollowUpAction>,
}

impl FollowUpService {
    pub async fn get(&self, id: Uuid, actor: &Actor) -> Result<FollowUpDetail> {
        let result: Result<FollowUpDetail> = async {
            let recommendation = self
                .store
                .get_by_id(id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Follow-up {}", id)))?;
            let history = self.store.list_for_recommendation(id).await?;
            Ok(FollowUpDetail {
                recommendation,
                history,
            })
        }
        .await;

        let entry = AuditEntry::new(AuditAction::Read, ENTITY_FOLLOWUP)
            .entity(id)
            .actor(actor);
        self.audited(
            result,
            |detail| entry.clone().meta("history_len", detail.history.len()),
            entry.clone(),
        )
        .await
    }

    /// Action trail only
    pub async fn history(&self, id: Uuid, actor: &Actor) -> Result<Vec<FollowUpAction>> {
        let result = async {
            if self.store.get_by_id(id).await?.is_none() {
                return Err(Error::NotFound(format!("Follow-up {}", id)));
            }
            self.store.list_for_recommendation(id).await
        }
        .await;

        let entry = AuditEntry::new(AuditAction::Read, ENTITY_FOLLOWUP)
            .entity(id)
            .actor(actor)
            .meta("view", "history");
        self.audited(result, |_| entry.clone(), entry.clone()).await
    }
}
