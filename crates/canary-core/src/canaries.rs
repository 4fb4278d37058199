use canary_db::Database;
use canary_db::models::CanaryRow;
use canary_types::{Canary, CanaryType, TriggerEvent, User};
use chrono::{SubsecRound, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::convert::{canary_from_row, event_from_row};
use crate::error::{CoreError, Result};
use crate::sessions::SessionManager;

/// Canary CRUD and trigger history, gated on token ownership.
///
/// Every operation starts by resolving the token. Operations on a single
/// canary then go through `authorize`, which denies with `NotAllowed`
/// whether the canary belongs to someone else or does not exist at all.
pub struct CanaryService<'a> {
    db: &'a Database,
    sessions: &'a SessionManager,
}

impl<'a> CanaryService<'a> {
    pub fn new(db: &'a Database, sessions: &'a SessionManager) -> Self {
        Self { db, sessions }
    }

    /// Names need not be unique; the id is always generated here.
    pub fn add(&self, token: &str, name: &str, kind: CanaryType, redirect: &str) -> Result<Canary> {
        let owner = self.sessions.resolve_token(token)?;

        let canary = Canary {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind,
            redirect: redirect.to_string(),
            owner: owner.username,
            // The store keeps microseconds; match it so reads compare equal
            created_at: Utc::now().trunc_subsecs(6),
        };
        self.db.insert_canary(&CanaryRow {
            id: canary.id.to_string(),
            owner: canary.owner.clone(),
            name: canary.name.clone(),
            kind: kind.as_str().to_string(),
            redirect: canary.redirect.clone(),
            created_at: canary_db::format_timestamp(canary.created_at),
        })?;

        info!("User '{}' created canary {} ({})", canary.owner, canary.id, kind);
        Ok(canary)
    }

    /// Only the caller's own canaries, oldest first.
    pub fn list(&self, token: &str) -> Result<Vec<Canary>> {
        let owner = self.sessions.resolve_token(token)?;
        let canaries = self
            .db
            .get_canaries_by_owner(&owner.username)?
            .into_iter()
            .map(canary_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(canaries)
    }

    pub fn get(&self, token: &str, id: Uuid) -> Result<Canary> {
        let (_, canary) = self.authorize(token, id)?;
        Ok(canary)
    }

    /// Overwrites name, type and redirect. Id and owner never change.
    pub fn update(&self, token: &str, id: Uuid, name: &str, kind: CanaryType, redirect: &str) -> Result<()> {
        self.authorize(token, id)?;
        if !self
            .db
            .update_canary(&id.to_string(), name, kind.as_str(), redirect)?
        {
            return Err(CoreError::NotFound);
        }
        Ok(())
    }

    pub fn delete_by_id(&self, token: &str, id: Uuid) -> Result<()> {
        let (owner, _) = self.authorize(token, id)?;
        if !self.db.delete_canary_cascade(&id.to_string())? {
            return Err(CoreError::NotFound);
        }
        info!("User '{}' deleted canary {}", owner.username, id);
        Ok(())
    }

    /// Deletes every canary the caller owns under `name`. Returns how many.
    pub fn delete_by_name(&self, token: &str, name: &str) -> Result<usize> {
        let owner = self.sessions.resolve_token(token)?;

        let mut deleted = 0;
        for canary in self.db.get_canaries_by_owner(&owner.username)? {
            if canary.name != name {
                continue;
            }
            if self.db.delete_canary_cascade(&canary.id)? {
                deleted += 1;
            }
        }

        info!("User '{}' deleted {} canaries named '{}'", owner.username, deleted, name);
        Ok(deleted)
    }

    /// Clears the trigger history but keeps the canary.
    pub fn wipe(&self, token: &str, id: Uuid) -> Result<()> {
        self.authorize(token, id)?;
        let wiped = self.db.delete_trigger_events(&id.to_string())?;
        debug!("Wiped {} trigger events from canary {}", wiped, id);
        Ok(())
    }

    pub fn history(&self, token: &str, id: Uuid) -> Result<Vec<TriggerEvent>> {
        self.authorize(token, id)?;
        let events = self
            .db
            .get_trigger_events(&id.to_string())?
            .into_iter()
            .map(event_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(events)
    }

    /// The ownership gate: token → user, id → canary, exact owner match.
    fn authorize(&self, token: &str, id: Uuid) -> Result<(User, Canary)> {
        let user = self.sessions.resolve_token(token)?;

        let row = self
            .db
            .get_canary(&id.to_string())?
            .ok_or(CoreError::NotAllowed)?;
        if row.owner != user.username {
            debug!("User '{}' denied access to canary {}", user.username, id);
            return Err(CoreError::NotAllowed);
        }

        Ok((user, canary_from_row(row)?))
    }
}
