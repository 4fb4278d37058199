use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Canary, CanaryType, TriggerEvent};

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub password: String,
}

// -- Canaries --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCanaryRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CanaryType,
    #[serde(default)]
    pub redirect: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCanaryRequest {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CanaryType,
    #[serde(default)]
    pub redirect: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteByNameQuery {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteByNameResponse {
    pub deleted: usize,
}

/// A trigger event without the canary id, as listed under its canary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    pub user_agent: String,
    pub accept_language: String,
}

impl From<TriggerEvent> for TriggerRecord {
    fn from(event: TriggerEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            ip: event.ip,
            user_agent: event.user_agent,
            accept_language: event.accept_language,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CanaryType,
    pub redirect: String,
    pub created_at: DateTime<Utc>,
}

impl From<Canary> for CanaryResponse {
    fn from(canary: Canary) -> Self {
        Self {
            id: canary.id,
            name: canary.name,
            kind: canary.kind,
            redirect: canary.redirect,
            created_at: canary.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryWithHistory {
    #[serde(flatten)]
    pub canary: CanaryResponse,
    pub history: Vec<TriggerRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CanariesResponse {
    pub canaries: Vec<CanaryWithHistory>,
}
