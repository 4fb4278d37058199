use crate::models::{CanaryRow, TokenRow, TriggerEventRow, UserRow};
use crate::{Database, format_timestamp};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str, password_hash: &str, created_at: DateTime<Utc>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, created_at) VALUES (?1, ?2, ?3)",
                (username, password_hash, format_timestamp(created_at)),
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, username))
    }

    /// Returns false when no such user exists.
    pub fn update_password(&self, username: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?1 WHERE username = ?2",
                (password_hash, username),
            )?;
            Ok(changed > 0)
        })
    }

    /// Removes the user together with their trigger events, canaries and
    /// tokens, in that order and in one transaction. Any failing step rolls
    /// back the whole sequence. Returns false when no such user exists.
    pub fn delete_user_cascade(&self, username: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM trigger_events
                 WHERE canary_id IN (SELECT id FROM canaries WHERE owner = ?1)",
                [username],
            )?;
            conn.execute("DELETE FROM canaries WHERE owner = ?1", [username])?;
            conn.execute("DELETE FROM tokens WHERE owner = ?1", [username])?;
            let changed = conn.execute("DELETE FROM users WHERE username = ?1", [username])?;
            Ok(changed > 0)
        })
    }

    // -- Canaries --

    pub fn insert_canary(&self, canary: &CanaryRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO canaries (id, owner, name, kind, redirect, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    canary.id,
                    canary.owner,
                    canary.name,
                    canary.kind,
                    canary.redirect,
                    canary.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_canary(&self, id: &str) -> Result<Option<CanaryRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, owner, name, kind, redirect, created_at FROM canaries WHERE id = ?1",
                [id],
                canary_from_row,
            )
            .optional()
        })
    }

    pub fn get_canaries_by_owner(&self, owner: &str) -> Result<Vec<CanaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner, name, kind, redirect, created_at
                 FROM canaries
                 WHERE owner = ?1
                 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([owner], canary_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Overwrites the mutable fields; id and owner are never touched.
    /// Returns false when the canary does not exist.
    pub fn update_canary(&self, id: &str, name: &str, kind: &str, redirect: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE canaries SET name = ?1, kind = ?2, redirect = ?3 WHERE id = ?4",
                (name, kind, redirect, id),
            )?;
            Ok(changed > 0)
        })
    }

    /// Deletes the canary and its trigger events in one transaction, so a
    /// concurrent trigger can't slip an event in between the two.
    pub fn delete_canary_cascade(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM trigger_events WHERE canary_id = ?1", [id])?;
            let changed = conn.execute("DELETE FROM canaries WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Tokens --

    pub fn insert_token(&self, id: &str, owner: &str, last_active: DateTime<Utc>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO tokens (id, owner, last_active) VALUES (?1, ?2, ?3)",
                (id, owner, format_timestamp(last_active)),
            )?;
            Ok(())
        })
    }

    pub fn get_token(&self, id: &str) -> Result<Option<TokenRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, owner, last_active FROM tokens WHERE id = ?1",
                [id],
                token_from_row,
            )
            .optional()
        })
    }

    pub fn list_tokens(&self) -> Result<Vec<TokenRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, owner, last_active FROM tokens")?;
            let rows = stmt
                .query_map([], token_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_token(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM tokens WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }


    // -- Trigger events --

    pub fn insert_trigger_event(
        &self,
        canary_id: &str,
        timestamp: DateTime<Utc>,
        ip: &str,
        user_agent: &str,
        accept_language: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO trigger_events (canary_id, timestamp, ip, user_agent, accept_language)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![canary_id, format_timestamp(timestamp), ip, user_agent, accept_language],
            )?;
            Ok(())
        })
    }

    pub fn get_trigger_events(&self, canary_id: &str) -> Result<Vec<TriggerEventRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, canary_id, timestamp, ip, user_agent, accept_language
                 FROM trigger_events
                 WHERE canary_id = ?1
                 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([canary_id], |row| {
                    Ok(TriggerEventRow {
                        id: row.get(0)?,
                        canary_id: row.get(1)?,
                        timestamp: row.get(2)?,
                        ip: row.get(3)?,
                        user_agent: row.get(4)?,
                        accept_language: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_trigger_events(&self, canary_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM trigger_events WHERE canary_id = ?1", [canary_id])?)
        })
    }
}

fn query_user(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT username, password, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                username: row.get(0)?,
                password: row.get(1)?,
                created_at: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn canary_from_row(row: &Row<'_>) -> rusqlite::Result<CanaryRow> {
    Ok(CanaryRow {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        kind: row.get(3)?,
        redirect: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<TokenRow> {
    Ok(TokenRow {
        id: row.get(0)?,
        owner: row.get(1)?,
        last_active: row.get(2)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_timestamp;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("peter", "$argon2id$fake", Utc::now()).unwrap();
        db.insert_canary(&CanaryRow {
            id: "c-1".into(),
            owner: "peter".into(),
            name: "test".into(),
            kind: "image".into(),
            redirect: String::new(),
            created_at: format_timestamp(Utc::now()),
        })
        .unwrap();
        db
    }

    #[test]
    fn user_lookup_is_case_sensitive() {
        let db = seeded();
        assert!(db.get_user("peter").unwrap().is_some());
        assert!(db.get_user("Peter").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = seeded();
        assert!(db.create_user("peter", "other", Utc::now()).is_err());
    }

    #[test]
    fn update_canary_keeps_id_and_owner() {
        let db = seeded();
        assert!(db.update_canary("c-1", "renamed", "redirect", "https://example.com").unwrap());

        let row = db.get_canary("c-1").unwrap().unwrap();
        assert_eq!(row.name, "renamed");
        assert_eq!(row.kind, "redirect");
        assert_eq!(row.redirect, "https://example.com");
        assert_eq!(row.owner, "peter");

        assert!(!db.update_canary("missing", "x", "text", "").unwrap());
    }

    #[test]
    fn canary_cascade_takes_its_events() {
        let db = seeded();
        db.insert_trigger_event("c-1", Utc::now(), "127.0.0.1", "curl", "en").unwrap();

        assert!(db.delete_canary_cascade("c-1").unwrap());
        assert!(db.get_canary("c-1").unwrap().is_none());
        assert!(db.get_trigger_events("c-1").unwrap().is_empty());
        assert!(!db.delete_canary_cascade("c-1").unwrap());
    }

    #[test]
    fn user_cascade_removes_everything_owned() {
        let db = seeded();
        db.insert_trigger_event("c-1", Utc::now(), "127.0.0.1", "curl", "en").unwrap();
        db.insert_token("tok", "peter", Utc::now()).unwrap();

        assert!(db.delete_user_cascade("peter").unwrap());
        assert!(db.get_user("peter").unwrap().is_none());
        assert!(db.get_canary("c-1").unwrap().is_none());
        assert!(db.get_trigger_events("c-1").unwrap().is_empty());
        assert!(db.get_token("tok").unwrap().is_none());
        assert!(!db.delete_user_cascade("peter").unwrap());
    }

    #[test]
    fn failed_user_cascade_rolls_back() {
        let db = seeded();
        db.insert_token("tok", "peter", Utc::now()).unwrap();
        db.with_conn(|conn| Ok(conn.execute_batch("DROP TABLE trigger_events")?))
            .unwrap();

        assert!(db.delete_user_cascade("peter").is_err());
        assert!(db.get_user("peter").unwrap().is_some());
        assert!(db.get_canary("c-1").unwrap().is_some());
        assert!(db.get_token("tok").unwrap().is_some());
    }

    #[test]
    fn trigger_events_wipe_leaves_canary() {
        let db = seeded();
        db.insert_trigger_event("c-1", Utc::now(), "10.0.0.1", "a", "de").unwrap();
        db.insert_trigger_event("c-1", Utc::now(), "10.0.0.2", "b", "fr").unwrap();

        let events = db.get_trigger_events("c-1").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].ip, "10.0.0.1");

        assert_eq!(db.delete_trigger_events("c-1").unwrap(), 2);
        assert!(db.get_trigger_events("c-1").unwrap().is_empty());
        assert!(db.get_canary("c-1").unwrap().is_some());
    }

    #[test]
    fn tokens_round_trip_timestamps() {
        let db = seeded();
        let issued = Utc::now();
        db.insert_token("tok", "peter", issued).unwrap();

        let row = db.get_token("tok").unwrap().unwrap();
        assert_eq!(row.owner, "peter");
        let parsed = parse_timestamp(&row.last_active).unwrap();
        assert_eq!(parsed.timestamp_micros(), issued.timestamp_micros());

        assert!(db.get_token("doesn't exist").unwrap().is_none());
        assert_eq!(db.list_tokens().unwrap().len(), 1);
        assert!(db.delete_token("tok").unwrap());
        assert!(db.list_tokens().unwrap().is_empty());
    }

    #[test]
    fn token_for_unknown_user_is_rejected() {
        let db = seeded();
        assert!(db.insert_token("tok", "nobody", Utc::now()).is_err());
    }

    #[test]
    fn parses_sqlite_naive_timestamps() {
        let ts = parse_timestamp("2024-05-01 12:30:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T12:30:00+00:00");
        assert!(parse_timestamp("yesterday").is_err());
    }
}
