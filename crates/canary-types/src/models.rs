use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An account. The password hash never leaves the store layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// What a canary serves back when somebody opens it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanaryType {
    /// A 1x1 pixel, for emails and documents
    Image,
    /// A short plain text page
    Text,
    /// Redirects to the canary's target URL
    Redirect,
}

impl CanaryType {
    pub const ALL: [CanaryType; 3] = [CanaryType::Image, CanaryType::Text, CanaryType::Redirect];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
            Self::Redirect => "redirect",
        }
    }
}

impl fmt::Display for CanaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown canary type '{0}' (expected image, text or redirect)")]
pub struct UnknownCanaryType(pub String);

impl FromStr for CanaryType {
    type Err = UnknownCanaryType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownCanaryType(s.to_string()))
    }
}

/// A tripwire owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canary {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CanaryType,
    /// Only meaningful for `CanaryType::Redirect`
    pub redirect: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

/// One recorded activation of a canary. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub canary_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    pub user_agent: String,
    pub accept_language: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canary_type_parses_lowercase_names() {
        assert_eq!("image".parse::<CanaryType>().unwrap(), CanaryType::Image);
        assert_eq!("redirect".parse::<CanaryType>().unwrap(), CanaryType::Redirect);
        assert!("Image".parse::<CanaryType>().is_err());
        assert!("gif".parse::<CanaryType>().is_err());
    }

    #[test]
    fn canary_serializes_kind_as_type() {
        let canary = Canary {
            id: Uuid::nil(),
            name: "invoice".into(),
            kind: CanaryType::Text,
            redirect: String::new(),
            owner: "peter".into(),
            created_at: DateTime::default(),
        };

        let json = serde_json::to_value(&canary).unwrap();
        assert_eq!(json["type"], "text");
        assert!(json.get("kind").is_none());
    }
}
