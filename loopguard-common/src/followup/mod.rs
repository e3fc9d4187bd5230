//! Follow-up recommendation domain
//!
//! The entity, its lifecycle state machine, the append-only action trail,
//! and the value objects they use.

mod action;
pub mod codes;
pub mod interval;
mod recommendation;
mod status;

use uuid::Uuid;

pub use action::FollowUpAction;
pub use interval::{IntervalUnit, RecommendationInterval};
pub use recommendation::{
    FollowUpRecommendation, NewFollowUp, DAYS_PER_MONTH, MAX_INTERVAL_MONTHS,
};
pub use status::{ActionType, FollowUpPriority, FollowUpStatus};

/// Who is performing an operation, as seen by actions and audit events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Actor {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }
}
