//! Caller identity and role checks
//!
//! Identity arrives in headers set by the upstream gateway:
//! `x-actor-id` (UUID) and `x-actor-role`. Client IP is the first hop of
//! `x-forwarded-for`.

use std::fmt;
use std::str::FromStr;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use loopguard_common::audit::{AuditAction, AuditEntry};
use loopguard_common::Actor;
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Radiologist,
    Coordinator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Radiologist => "radiologist",
            Role::Coordinator => "coordinator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "radiologist" => Ok(Role::Radiologist),
            "coordinator" => Ok(Role::Coordinator),
            "admin" => Ok(Role::Admin),
            other => Err(ApiError::Unauthorized(format!("Unknown role: {}", other))),
        }
    }
}

/// Authenticated caller of a request
#[derive(Debug, Clone)]
pub struct Caller {
    pub actor: Actor,
    pub role: Role,
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_str(parts, ACTOR_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", ACTOR_ID_HEADER)))?;
        let id = Uuid::parse_str(id)
            .map_err(|_| ApiError::Unauthorized(format!("Invalid {} header", ACTOR_ID_HEADER)))?;
        if id.is_nil() {
            return Err(ApiError::Unauthorized(format!("Invalid {} header", ACTOR_ID_HEADER)));
        }

        let role: Role = header_str(parts, ACTOR_ROLE_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", ACTOR_ROLE_HEADER)))?
            .parse()?;

        let mut actor = Actor::new(id);
        if let Some(ip) = header_str(parts, FORWARDED_FOR_HEADER)
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            actor = actor.with_ip_address(ip);
        }
        if let Some(agent) = header_str(parts, "user-agent") {
            actor = actor.with_user_agent(agent);
        }

        Ok(Caller { actor, role })
    }
}

impl Caller {
    /// Refuse unless the caller holds one of `allowed`
    ///
    /// A refusal is recorded as a failed audit event before returning 403.
    pub async fn require_role(
        &self,
        state: &AppState,
        allowed: &[Role],
        action: AuditAction,
        entity_type: &str,
        entity_id: Option<Uuid>,
    ) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            return Ok(());
        }

        warn!(
            "Refused {} on {} for actor {} with role {}",
            action, entity_type, self.actor.id, self.role
        );

        let mut entry = AuditEntry::new(action, entity_type)
            .actor(&self.actor)
            .meta("role", self.role.as_str())
            .failed("Permission denied");
        if let Some(id) = entity_id {
            entry = entry.entity(id);
        }
        state.service.audit().record(entry).await?;

        Err(ApiError::Forbidden(format!(
            "Role {} may not perform this operation",
            self.role
        )))
    }
}
