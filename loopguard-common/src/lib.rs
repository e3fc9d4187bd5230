//! # LoopGuard Common Library
//!
//! Shared code for the LoopGuard follow-up tracker including:
//! - Follow-up lifecycle state machine and action trail
//! - Value objects (intervals, modality and body-region codes)
//! - Collaborator traits (stores, unit of work, audit logger)
//! - SQLite implementations of those collaborators
//! - Application services used by the HTTP layer
//! - Configuration loading

pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod followup;
pub mod services;
pub mod store;
pub mod time;

pub use error::{Error, Result};
pub use followup::{
    ActionType, Actor, FollowUpAction, FollowUpPriority, FollowUpRecommendation, FollowUpStatus,
    NewFollowUp,
};
