//! Compliance audit trail
//!
//! Separate from the per-recommendation action trail: one event per
//! service call (create, update, bulk read, refused request), kept in an
//! append-only store and also emitted as a `tracing` event on target
//! `loopguard::audit`.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::followup::Actor;
use crate::{Error, Result};

/// Entity type label for follow-up recommendations
pub const ENTITY_FOLLOWUP: &str = "FollowUpRecommendation";
/// Entity type label for metrics reports
pub const ENTITY_METRICS: &str = "Metrics";
/// Entity type label for reads of the audit log itself
pub const ENTITY_AUDIT_LOG: &str = "AuditLog";

/// Default and maximum page size for audit queries
pub const DEFAULT_AUDIT_LIMIT: i64 = 100;
pub const MAX_AUDIT_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Read,
    Update,
    Delete,
    Export,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Read => "read",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Export => "export",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(AuditAction::Create),
            "read" => Ok(AuditAction::Read),
            "update" => Ok(AuditAction::Update),
            "delete" => Ok(AuditAction::Delete),
            "export" => Ok(AuditAction::Export),
            other => Err(Error::Validation(format!("Unknown audit action: {}", other))),
        }
    }
}

/// A recorded audit event; immutable once built
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    id: Uuid,
    actor_id: Option<Uuid>,
    action: AuditAction,
    entity_type: String,
    entity_id: Option<Uuid>,
    timestamp: DateTime<Utc>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    metadata: Value,
    success: bool,
    error_detail: Option<String>,
}

impl AuditEvent {
    /// Rehydrate a stored event
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: Uuid,
        actor_id: Option<Uuid>,
        action: AuditAction,
        entity_type: String,
        entity_id: Option<Uuid>,
        timestamp: DateTime<Utc>,
        ip_address: Option<String>,
        user_agent: Option<String>,
        metadata: Value,
        success: bool,
        error_detail: Option<String>,
    ) -> Self {
        Self {
            id,
            actor_id,
            action,
            entity_type,
            entity_id,
            timestamp,
            ip_address,
            user_agent,
            metadata,
            success,
            error_detail,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn actor_id(&self) -> Option<Uuid> {
        self.actor_id
    }

    pub fn action(&self) -> AuditAction {
        self.action
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn entity_id(&self) -> Option<Uuid> {
        self.entity_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Always a JSON object
    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }
}

/// Builder for an event about to be recorded
///
/// ```rust,ignore
/// let entry = AuditEntry::new(AuditAction::Update, ENTITY_FOLLOWUP)
///     .entity(rec.id())
///     .actor(&actor)
///     .meta("new_status", "scheduled");
/// audit.record(entry).await?;
/// ```
#[derive(Debug, Clone)]
pub struct AuditEntry {
    action: AuditAction,
    entity_type: String,
    entity_id: Option<Uuid>,
    actor_id: Option<Uuid>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    metadata: Map<String, Value>,
    success: bool,
    error_detail: Option<String>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, entity_type: impl Into<String>) -> Self {
        Self {
            action,
            entity_type: entity_type.into(),
            entity_id: None,
            actor_id: None,
            ip_address: None,
            user_agent: None,
            metadata: Map::new(),
            success: true,
            error_detail: None,
        }
    }

    pub fn entity(mut self, id: Uuid) -> Self {
        self.entity_id = Some(id);
        self
    }

    /// Copy actor id, client IP and user agent
    pub fn actor(mut self, actor: &Actor) -> Self {
        self.actor_id = Some(actor.id);
        self.ip_address = actor.ip_address.clone();
        self.user_agent = actor.user_agent.clone();
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Mark the attempt as failed
    pub fn failed(mut self, detail: impl Into<String>) -> Self {
        self.success = false;
        self.error_detail = Some(detail.into());
        self
    }

    /// Mark as failed from an error, keeping its kind in the metadata
    pub fn failed_with(self, err: &Error) -> Self {
        self.meta("error_kind", err.kind()).failed(err.to_string())
    }

    /// Stamp an id and timestamp
    pub fn into_event(self, timestamp: DateTime<Utc>) -> AuditEvent {
        AuditEvent {
            id: Uuid::new_v4(),
            actor_id: self.actor_id,
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            timestamp,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            metadata: Value::Object(self.metadata),
            success: self.success,
            error_detail: self.error_detail,
        }
    }
}

/// Filters for reading the audit trail; all optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub actor_id: Option<Uuid>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub success: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditQuery {
    /// Page size clamped to 1..=MAX_AUDIT_LIMIT
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_AUDIT_LIMIT)
            .clamp(1, MAX_AUDIT_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Append-only sink for audit events
#[async_trait]
pub trait AuditLogger: Send + Sync {
    /// Persist one event and return it as stored
    async fn record(&self, entry: AuditEntry) -> Result<AuditEvent>;

    /// Matching events, newest first
    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEvent>>;

    /// Number of matching events, ignoring limit/offset
    async fn count(&self, query: &AuditQuery) -> Result<i64>;
}

/// Mirror a recorded event to the log
pub fn trace_event(event: &AuditEvent) {
    let actor = event
        .actor_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let entity = event
        .entity_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());

    if event.success {
        tracing::info!(
            target: "loopguard::audit",
            audit_id = %event.id,
            action = %event.action,
            entity_type = %event.entity_type,
            entity_id = %entity,
            actor_id = %actor,
            "audit"
        );
    } else {
        tracing::warn!(
            target: "loopguard::audit",
            audit_id = %event.id,
            action = %event.action,
            entity_type = %event.entity_type,
            entity_id = %entity,
            actor_id = %actor,
            error = event.error_detail.as_deref().unwrap_or(""),
            "audit (failed)"
        );
    }
}
