//! Access gate primitives.
//!
//! Callers identify themselves with an actor id and a role; deployments may additionally require
//! a shared API key. Identity is asserted by a trusted front end, not verified here.

use meditache_types::ActorId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header carrying the calling actor's id.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";
/// Header carrying the calling actor's role.
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("invalid API key")]
    InvalidApiKey,
    #[error("missing or blank actor id")]
    MissingActor,
    #[error("missing actor role")]
    MissingRole,
    #[error("unknown actor role '{0}'")]
    UnknownRole(String),
    #[error("role {0} is not allowed to perform this action")]
    Forbidden(Role),
}

impl AuthError {
    /// True when the caller is identified but lacks permission, as opposed to unauthenticated.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, AuthError::Forbidden(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Doctor,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Doctor => "DOCTOR",
            Role::Staff => "STAFF",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        [Role::Admin, Role::Doctor, Role::Staff]
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AuthError::UnknownRole(wanted.to_string()))
    }
}

/// An authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
}

impl Actor {
    /// Builds an actor from raw header values.
    pub fn from_headers(actor_id: Option<&str>, role: Option<&str>) -> Result<Self, AuthError> {
        let id = actor_id
            .and_then(|raw| ActorId::new(raw).ok())
            .ok_or(AuthError::MissingActor)?;
        let role = role.ok_or(AuthError::MissingRole)?.parse()?;

        Ok(Self { id, role })
    }

    /// Fails with [`AuthError::Forbidden`] unless the actor holds one of `allowed`.
    pub fn require_any(&self, allowed: &[Role]) -> Result<(), AuthError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden(self.role))
        }
    }
}

/// Validates the provided API key against the configured one.
pub fn validate_api_key(provided_key: Option<&str>, expected_key: &str) -> Result<(), AuthError> {
    match provided_key {
        None => Err(AuthError::MissingApiKey),
        Some(key) if key == expected_key => Ok(()),
        Some(_) => Err(AuthError::InvalidApiKey),
    }
}
