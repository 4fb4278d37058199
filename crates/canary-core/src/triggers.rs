use canary_db::Database;
use canary_types::CanaryType;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::convert::canary_from_row;
use crate::error::{CoreError, Result};

/// Request metadata captured for a trigger event.
#[derive(Debug, Clone, Default)]
pub struct TriggerMetadata {
    pub ip: String,
    pub user_agent: String,
    pub accept_language: String,
}

/// What the boundary needs to render the decoy response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triggered {
    pub kind: CanaryType,
    pub redirect: String,
}

/// Records canary activations. Needs no authentication: whoever opens the
/// tripwire triggers it.
pub struct TriggerIngestor<'a> {
    db: &'a Database,
}

impl<'a> TriggerIngestor<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// The event is stored before anything is returned, and no decoy is
    /// handed out for an unknown id or a failed write.
    pub fn trigger(&self, id: Uuid, metadata: &TriggerMetadata) -> Result<Triggered> {
        let row = self
            .db
            .get_canary(&id.to_string())?
            .ok_or(CoreError::NotFound)?;
        let canary = canary_from_row(row)?;

        self.db.insert_trigger_event(
            &canary.id.to_string(),
            Utc::now(),
            &metadata.ip,
            &metadata.user_agent,
            &metadata.accept_language,
        )?;

        info!("Canary {} triggered from {}", canary.id, metadata.ip);
        Ok(Triggered {
            kind: canary.kind,
            redirect: canary.redirect,
        })
    }
}
