//! Store rows to public model types.

use anyhow::{Context, Result};
use canary_db::models::{CanaryRow, TriggerEventRow, UserRow};
use canary_db::parse_timestamp;
use canary_types::{Canary, CanaryType, TriggerEvent, User};
use uuid::Uuid;

pub(crate) fn user_from_row(row: UserRow) -> Result<User> {
    Ok(User {
        created_at: parse_timestamp(&row.created_at)?,
        username: row.username,
    })
}

pub(crate) fn canary_from_row(row: CanaryRow) -> Result<Canary> {
    let id: Uuid = row
        .id
        .parse()
        .with_context(|| format!("Corrupt canary id '{}'", row.id))?;
    let kind: CanaryType = row
        .kind
        .parse()
        .with_context(|| format!("Corrupt type on canary '{}'", row.id))?;

    Ok(Canary {
        id,
        kind,
        created_at: parse_timestamp(&row.created_at)?,
        name: row.name,
        redirect: row.redirect,
        owner: row.owner,
    })
}

pub(crate) fn event_from_row(row: TriggerEventRow) -> Result<TriggerEvent> {
    Ok(TriggerEvent {
        canary_id: row
            .canary_id
            .parse()
            .with_context(|| format!("Corrupt canary id '{}' on event {}", row.canary_id, row.id))?,
        timestamp: parse_timestamp(&row.timestamp)?,
        ip: row.ip,
        user_agent: row.user_agent,
        accept_language: row.accept_language,
    })
}
