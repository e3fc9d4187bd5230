//! Immutable entries in a recommendation's action trail

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{ActionType, Actor, FollowUpStatus};

/// One state change or note on a recommendation
///
/// Constructed once and never mutated: fields are private and only read
/// accessors are exposed. Stores can append these but never update or
/// delete them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowUpAction {
    id: Uuid,
    recommendation_id: Uuid,
    action_type: ActionType,
    previous_status: Option<FollowUpStatus>,
    new_status: Option<FollowUpStatus>,
    note: String,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    ip_address: Option<String>,
}

impl FollowUpAction {
    fn build(
        recommendation_id: Uuid,
        action_type: ActionType,
        previous_status: Option<FollowUpStatus>,
        new_status: Option<FollowUpStatus>,
        note: impl Into<String>,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recommendation_id,
            action_type,
            previous_status,
            new_status,
            note: note.into(),
            created_by: actor.id,
            created_at: at,
            ip_address: actor.ip_address.clone(),
        }
    }

    /// First entry of every trail
    pub fn created(
        recommendation_id: Uuid,
        status: FollowUpStatus,
        note: impl Into<String>,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Self {
        Self::build(recommendation_id, ActionType::Created, None, Some(status), note, actor, at)
    }

    pub fn status_changed(
        recommendation_id: Uuid,
        previous: FollowUpStatus,
        new: FollowUpStatus,
        note: impl Into<String>,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Self {
        Self::build(
            recommendation_id,
            ActionType::StatusChanged,
            Some(previous),
            Some(new),
            note,
            actor,
            at,
        )
    }

    pub fn note_added(
        recommendation_id: Uuid,
        note: impl Into<String>,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Self {
        Self::build(recommendation_id, ActionType::NoteAdded, None, None, note, actor, at)
    }

    pub fn assigned(
        recommendation_id: Uuid,
        note: impl Into<String>,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Self {
        Self::build(recommendation_id, ActionType::Assigned, None, None, note, actor, at)
    }

    pub fn reminder_sent(
        recommendation_id: Uuid,
        note: impl Into<String>,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Self {
        Self::build(recommendation_id, ActionType::ReminderSent, None, None, note, actor, at)
    }

    /// Rehydrate a stored action
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: Uuid,
        recommendation_id: Uuid,
        action_type: ActionType,
        previous_status: Option<FollowUpStatus>,
        new_status: Option<FollowUpStatus>,
        note: String,
        created_by: Uuid,
        created_at: DateTime<Utc>,
        ip_address: Option<String>,
    ) -> Self {
        Self {
            id,
            recommendation_id,
            action_type,
            previous_status,
            new_status,
            note,
            created_by,
            created_at,
            ip_address,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn recommendation_id(&self) -> Uuid {
        self.recommendation_id
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn previous_status(&self) -> Option<FollowUpStatus> {
        self.previous_status
    }

    pub fn new_status(&self) -> Option<FollowUpStatus> {
        self.new_status
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn created_by(&self) -> Uuid {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time;

    #[test]
    fn test_status_changed_carries_both_statuses_and_actor() {
        let actor = Actor::new(Uuid::new_v4()).with_ip_address("10.0.0.7");
        let rec_id = Uuid::new_v4();
        let at = time::now();

        let action = FollowUpAction::status_changed(
            rec_id,
            FollowUpStatus::Pending,
            FollowUpStatus::Scheduled,
            "booked for March",
            &actor,
            at,
        );

        assert_eq!(action.recommendation_id(), rec_id);
        assert_eq!(action.action_type(), ActionType::StatusChanged);
        assert_eq!(action.previous_status(), Some(FollowUpStatus::Pending));
        assert_eq!(action.new_status(), Some(FollowUpStatus::Scheduled));
        assert_eq!(action.note(), "booked for March");
        assert_eq!(action.created_by(), actor.id);
        assert_eq!(action.created_at(), at);
        assert_eq!(action.ip_address(), Some("10.0.0.7"));
    }

    #[test]
    fn test_created_has_no_previous_status() {
        let actor = Actor::new(Uuid::new_v4());
        let action = FollowUpAction::created(
            Uuid::new_v4(),
            FollowUpStatus::Pending,
            "",
            &actor,
            time::now(),
        );
        assert_eq!(action.previous_status(), None);
        assert_eq!(action.new_status(), Some(FollowUpStatus::Pending));
        assert_eq!(action.ip_address(), None);
    }

    #[test]
    fn test_each_action_gets_fresh_id() {
        let actor = Actor::new(Uuid::new_v4());
        let rec_id = Uuid::new_v4();
        let a = FollowUpAction::note_added(rec_id, "first", &actor, time::now());
        let b = FollowUpAction::note_added(rec_id, "second", &actor, time::now());
        assert_ne!(a.id(), b.id());
    }
}
