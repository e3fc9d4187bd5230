//! Closed enumerations for follow-up status, priority, and action type

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Lifecycle status of a follow-up recommendation
///
/// `Overdue` is a display status: no transition produces it, but a stored
/// record may carry it and must still be movable out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpStatus {
    Pending,
    Scheduled,
    Completed,
    Cancelled,
    Overdue,
}

impl FollowUpStatus {
    pub const ALL: [FollowUpStatus; 5] = [
        FollowUpStatus::Pending,
        FollowUpStatus::Scheduled,
        FollowUpStatus::Completed,
        FollowUpStatus::Cancelled,
        FollowUpStatus::Overdue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FollowUpStatus::Pending => "pending",
            FollowUpStatus::Scheduled => "scheduled",
            FollowUpStatus::Completed => "completed",
            FollowUpStatus::Cancelled => "cancelled",
            FollowUpStatus::Overdue => "overdue",
        }
    }

    /// Statuses reachable in one step from `self`
    ///
    /// Completed and cancelled may only be reopened to pending. Whether that
    /// reopening stays allowed in production is a product-policy decision.
    pub fn allowed_transitions(&self) -> &'static [FollowUpStatus] {
        use FollowUpStatus::*;
        match self {
            Pending => &[Scheduled, Completed, Cancelled],
            Scheduled => &[Pending, Completed, Cancelled],
            Completed => &[Pending],
            Cancelled => &[Pending],
            Overdue => &[Scheduled, Completed, Cancelled],
        }
    }

    pub fn can_transition_to(&self, target: FollowUpStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }

    /// Completed and cancelled follow-ups are closed and never overdue
    pub fn is_closed(&self) -> bool {
        matches!(self, FollowUpStatus::Completed | FollowUpStatus::Cancelled)
    }
}

impl fmt::Display for FollowUpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FollowUpStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(FollowUpStatus::Pending),
            "scheduled" => Ok(FollowUpStatus::Scheduled),
            "completed" => Ok(FollowUpStatus::Completed),
            "cancelled" => Ok(FollowUpStatus::Cancelled),
            "overdue" => Ok(FollowUpStatus::Overdue),
            other => Err(Error::Validation(format!("Unknown follow-up status: {}", other))),
        }
    }
}

/// Clinical priority of a follow-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpPriority {
    #[default]
    Routine,
    Urgent,
    Stat,
}

impl FollowUpPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowUpPriority::Routine => "routine",
            FollowUpPriority::Urgent => "urgent",
            FollowUpPriority::Stat => "stat",
        }
    }
}

impl fmt::Display for FollowUpPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FollowUpPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "routine" => Ok(FollowUpPriority::Routine),
            "urgent" => Ok(FollowUpPriority::Urgent),
            "stat" => Ok(FollowUpPriority::Stat),
            other => Err(Error::Validation(format!("Unknown priority: {}", other))),
        }
    }
}

/// Kind of entry in a recommendation's action trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Created,
    StatusChanged,
    NoteAdded,
    Assigned,
    ReminderSent,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Created => "created",
            ActionType::StatusChanged => "status_changed",
            ActionType::NoteAdded => "note_added",
            ActionType::Assigned => "assigned",
            ActionType::ReminderSent => "reminder_sent",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ActionType::Created),
            "status_changed" => Ok(ActionType::StatusChanged),
            "note_added" => Ok(ActionType::NoteAdded),
            "assigned" => Ok(ActionType::Assigned),
            "reminder_sent" => Ok(ActionType::ReminderSent),
            other => Err(Error::Validation(format!("Unknown action type: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FollowUpStatus::*;

    #[test]
    fn test_transition_table_matches_lifecycle() {
        let expected: [(FollowUpStatus, &[FollowUpStatus]); 5] = [
            (Pending, &[Scheduled, Completed, Cancelled]),
            (Scheduled, &[Pending, Completed, Cancelled]),
            (Completed, &[Pending]),
            (Cancelled, &[Pending]),
            (Overdue, &[Scheduled, Completed, Cancelled]),
        ];

        for (from, allowed) in expected {
            for to in FollowUpStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&to),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_named_transitions() {
        assert!(Pending.can_transition_to(Scheduled));
        assert!(Completed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Scheduled));
        assert!(!Cancelled.can_transition_to(Completed));
    }

    #[test]
    fn test_no_transition_reaches_overdue() {
        for from in FollowUpStatus::ALL {
            assert!(!from.can_transition_to(Overdue));
        }
    }

    #[test]
    fn test_no_self_transitions() {
        for status in FollowUpStatus::ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_status_parse_and_display() {
        for status in FollowUpStatus::ALL {
            assert_eq!(status.to_string().parse::<FollowUpStatus>().unwrap(), status);
        }
        assert_eq!(" Scheduled ".parse::<FollowUpStatus>().unwrap(), Scheduled);
        assert!(matches!(
            "archived".parse::<FollowUpStatus>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Cancelled).unwrap(), "\"cancelled\"");
        assert_eq!(
            serde_json::to_string(&ActionType::StatusChanged).unwrap(),
            "\"status_changed\""
        );
    }

    #[test]
    fn test_priority_default_is_routine() {
        assert_eq!(FollowUpPriority::default(), FollowUpPriority::Routine);
        assert_eq!("STAT".parse::<FollowUpPriority>().unwrap(), FollowUpPriority::Stat);
    }
}
