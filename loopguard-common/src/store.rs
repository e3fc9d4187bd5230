//! Persistence collaborators for the follow-up domain
//!
//! Services depend only on these traits; `db::followups` provides the
//! SQLite implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::followup::{FollowUpAction, FollowUpRecommendation, FollowUpStatus};
use crate::Result;

/// Worklist filters; `None`/empty means "don't filter"
#[derive(Debug, Clone, Default)]
pub struct WorklistFilters {
    pub statuses: Vec<FollowUpStatus>,
    pub assigned_to: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub modality: Option<String>,
    /// Due strictly before this instant
    pub due_before: Option<DateTime<Utc>>,
    /// Due at or after this instant
    pub due_after: Option<DateTime<Utc>>,
}

/// Offset pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;

    /// Clamp a requested page to 1..=MAX_LIMIT and a non-negative offset
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<FollowUpRecommendation>>;

    /// Ordered by due date ascending (no due date last), then creation time
    async fn list_matching(
        &self,
        filters: &WorklistFilters,
        page: Page,
    ) -> Result<Vec<FollowUpRecommendation>>;

    async fn count_matching(&self, filters: &WorklistFilters) -> Result<i64>;
}

#[async_trait]
pub trait ActionStore: Send + Sync {
    /// Oldest first; same-instant actions in insertion order
    async fn list_for_recommendation(&self, recommendation_id: Uuid) -> Result<Vec<FollowUpAction>>;
}

/// Writes that must land together
///
/// Nothing is visible to readers until [`commit`](UnitOfWork::commit).
/// Dropping an uncommitted unit of work discards its writes.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Insert (version 0) or update with a version check
    ///
    /// Returns the recommendation carrying its new version. A stale version
    /// or a duplicate id is `Error::Conflict`.
    async fn save_recommendation(
        &mut self,
        recommendation: &FollowUpRecommendation,
    ) -> Result<FollowUpRecommendation>;

    async fn append_action(&mut self, action: &FollowUpAction) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Read access plus the ability to open a unit of work
#[async_trait]
pub trait FollowUpStore: RecommendationStore + ActionStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults() {
        assert_eq!(
            Page::default(),
            Page {
                limit: 50,
                offset: 0
            }
        );
    }

    #[test]
    fn test_page_clamps_limit_and_offset() {
        assert_eq!(Page::new(Some(0), None).limit, 1);
        assert_eq!(Page::new(Some(1000), None).limit, 200);
        assert_eq!(Page::new(Some(25), Some(-10)).offset, 0);
        assert_eq!(Page::new(Some(25), Some(75)), Page { limit: 25, offset: 75 });
    }
}
