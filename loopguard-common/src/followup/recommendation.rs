//! The follow-up recommendation entity and its lifecycle rules

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::codes::{canonical_body_region, canonical_modality};
use super::{Actor, FollowUpAction, FollowUpPriority, FollowUpStatus};
use crate::{time, Error, Result};

/// Days per month in due-date arithmetic (fixed approximation, not calendar months)
pub const DAYS_PER_MONTH: i64 = 30;

/// Longest accepted interval (100 years)
pub const MAX_INTERVAL_MONTHS: u32 = 1200;

/// Input for creating a recommendation
#[derive(Debug, Clone)]
pub struct NewFollowUp {
    pub report_id: Uuid,
    pub patient_id: Uuid,
    pub recommended_modality: String,
    pub body_region: String,
    pub reason: String,
    pub interval_months: u32,
    pub priority: FollowUpPriority,
}

/// A radiologist's recommendation that a patient return for imaging
///
/// Status only changes through [`update_status`](Self::update_status) or
/// [`transition`](Self::transition), both of which enforce the transition
/// table on [`FollowUpStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowUpRecommendation {
    id: Uuid,
    report_id: Uuid,
    patient_id: Uuid,
    recommended_modality: String,
    body_region: String,
    reason: String,
    interval_months: u32,
    due_date: Option<DateTime<Utc>>,
    status: FollowUpStatus,
    priority: FollowUpPriority,
    assigned_to: Option<Uuid>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl FollowUpRecommendation {
    /// Validate input and build a pending recommendation
    ///
    /// The due date is left unset; call [`compute_due_date`](Self::compute_due_date).
    pub fn new(input: NewFollowUp, created_by: Uuid, now: DateTime<Utc>) -> Result<Self> {
        if input.report_id.is_nil() {
            return Err(Error::Validation("report_id is required".to_string()));
        }
        if input.patient_id.is_nil() {
            return Err(Error::Validation("patient_id is required".to_string()));
        }
        if created_by.is_nil() {
            return Err(Error::Validation("created_by is required".to_string()));
        }
        if input.recommended_modality.trim().is_empty() {
            return Err(Error::Validation("recommended_modality is required".to_string()));
        }
        if input.body_region.trim().is_empty() {
            return Err(Error::Validation("body_region is required".to_string()));
        }
        if input.interval_months == 0 {
            return Err(Error::Validation(
                "interval_months must be a positive number of months".to_string(),
            ));
        }
        if input.interval_months > MAX_INTERVAL_MONTHS {
            return Err(Error::Validation(format!(
                "interval_months must be at most {}",
                MAX_INTERVAL_MONTHS
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            report_id: input.report_id,
            patient_id: input.patient_id,
            recommended_modality: canonical_modality(&input.recommended_modality),
            body_region: canonical_body_region(&input.body_region),
            reason: input.reason.trim().to_string(),
            interval_months: input.interval_months,
            due_date: None,
            status: FollowUpStatus::Pending,
            priority: input.priority,
            assigned_to: None,
            created_by,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Set and return the due date: `reference + interval_months * 30` days
    ///
    /// `reference` defaults to now.
    pub fn compute_due_date(&mut self, reference: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let base = reference.unwrap_or_else(time::now);
        let due = base
            .checked_add_signed(Duration::days(DAYS_PER_MONTH * i64::from(self.interval_months)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.due_date = Some(due);
        due
    }

    pub fn is_overdue(&self) -> bool {
        self.is_overdue_at(time::now())
    }

    /// False without a due date or once closed; otherwise strictly past due
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            None => false,
            Some(_) if self.status.is_closed() => false,
            Some(due) => now > due,
        }
    }

    pub fn can_transition_to(&self, target: FollowUpStatus) -> bool {
        self.status.can_transition_to(target)
    }

    /// Validated status change; writes no history on its own
    pub fn update_status(&mut self, target: FollowUpStatus) -> Result<()> {
        self.update_status_at(target, time::now())
    }

    pub fn update_status_at(&mut self, target: FollowUpStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.can_transition_to(target) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }

    /// Change status and produce the paired `status_changed` action
    ///
    /// The caller must persist the returned action in the same unit of work
    /// as the updated recommendation.
    #[must_use = "the action must be persisted together with the status change"]
    pub fn transition(
        &mut self,
        target: FollowUpStatus,
        note: impl Into<String>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<FollowUpAction> {
        let previous = self.status;
        self.update_status_at(target, now)?;
        Ok(FollowUpAction::status_changed(self.id, previous, target, note, actor, now))
    }

    /// Set or clear the assignee and produce the paired `assigned` action
    #[must_use = "the action must be persisted together with the assignment"]
    pub fn assign(
        &mut self,
        assignee: Option<Uuid>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> FollowUpAction {
        let note = match (self.assigned_to, assignee) {
            (_, Some(to)) => format!("Assigned to {}", to),
            (Some(from), None) => format!("Unassigned from {}", from),
            (None, None) => "Assignment cleared".to_string(),
        };
        self.assigned_to = assignee;
        self.updated_at = now;
        FollowUpAction::assigned(self.id, note, actor, now)
    }

    /// Status to display: `overdue` while past due and still open
    pub fn effective_status(&self, now: DateTime<Utc>) -> FollowUpStatus {
        if self.is_overdue_at(now) {
            FollowUpStatus::Overdue
        } else {
            self.status
        }
    }

    /// Whole days until the due date, floored (negative once past due)
    pub fn days_until_due(&self, now: DateTime<Utc>) -> Option<i64> {
        self.due_date
            .map(|due| (due - now).num_seconds().div_euclid(86_400))
    }

    /// Rehydrate a stored recommendation
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: Uuid,
        report_id: Uuid,
        patient_id: Uuid,
        recommended_modality: String,
        body_region: String,
        reason: String,
        interval_months: u32,
        due_date: Option<DateTime<Utc>>,
        status: FollowUpStatus,
        priority: FollowUpPriority,
        assigned_to: Option<Uuid>,
        created_by: Uuid,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        version: i64,
    ) -> Self {
        Self {
            id,
            report_id,
            patient_id,
            recommended_modality,
            body_region,
            reason,
            interval_months,
            due_date,
            status,
            priority,
            assigned_to,
            created_by,
            created_at,
            updated_at,
            version,
        }
    }

    pub(crate) fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn report_id(&self) -> Uuid {
        self.report_id
    }

    pub fn patient_id(&self) -> Uuid {
        self.patient_id
    }

    pub fn recommended_modality(&self) -> &str {
        &self.recommended_modality
    }

    pub fn body_region(&self) -> &str {
        &self.body_region
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn interval_months(&self) -> u32 {
        self.interval_months
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    pub fn status(&self) -> FollowUpStatus {
        self.status
    }

    pub fn priority(&self) -> FollowUpPriority {
        self.priority
    }

    pub fn assigned_to(&self) -> Option<Uuid> {
        self.assigned_to
    }

    pub fn created_by(&self) -> Uuid {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Optimistic-concurrency counter; 0 until first persisted
    pub fn version(&self) -> i64 {
        self.version
    }
}
